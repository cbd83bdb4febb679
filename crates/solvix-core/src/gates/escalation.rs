//! Escalation ladder.
//!
//! The harshest severity a case has earned is derived from its toned
//! contact history:
//!
//! | History | Ceiling |
//! |---------|---------|
//! | no toned contact | `professional` |
//! | last rung held long enough, or any broken promise | one rung above last |
//! | otherwise | last rung |
//!
//! The ceiling never sits below `professional`. A promise still inside its
//! grace period caps it at `professional`.

use chrono::{DateTime, Utc};

use super::{Gate, GateDecision, GateInput, GateName};
use crate::gates::policy::EscalationPolicy;
use crate::gates::promise::PromiseSummary;
use crate::context::CaseContext;
use crate::taxonomy::{Severity, Tone};

/// How the ceiling was derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationCeiling {
    pub ceiling: Severity,

    /// Severity of the most recent toned touch.
    pub last: Option<Severity>,

    /// Consecutive most-recent touches at `last`.
    pub streak: u32,

    /// Whole days since the first touch of the streak.
    pub days_at_level: i64,

    pub step_earned: bool,
    pub capped_by_promise: bool,
}

impl EscalationCeiling {
    pub fn derive(
        ctx: &CaseContext,
        promises: &PromiseSummary,
        policy: &EscalationPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        let history = toned_history(ctx);

        let Some(&(_, last_tone)) = history.first() else {
            return Self {
                ceiling: Severity::PROFESSIONAL,
                last: None,
                streak: 0,
                days_at_level: 0,
                step_earned: false,
                capped_by_promise: false,
            };
        };

        let last = last_tone.severity();
        let streak_items: Vec<_> = history
            .iter()
            .take_while(|(_, tone)| tone.severity() == last)
            .collect();
        let streak = streak_items.len() as u32;
        let first_at = streak_items.iter().filter_map(|(at, _)| *at).min();
        let days_at_level = first_at
            .map(|at| (now - at).num_days().max(0))
            .unwrap_or(0);

        let step_earned = streak >= policy.touches_per_level
            || days_at_level >= i64::from(policy.days_per_level)
            || promises.has_broken();

        let mut ceiling = if step_earned { last.next() } else { last };
        ceiling = ceiling.max(Severity::PROFESSIONAL);

        let capped_by_promise = promises.has_current() && ceiling > Severity::PROFESSIONAL;
        if capped_by_promise {
            ceiling = Severity::PROFESSIONAL;
        }

        Self {
            ceiling,
            last: Some(last),
            streak,
            days_at_level,
            step_earned,
            capped_by_promise,
        }
    }
}

/// Toned touches, most recent first.
///
/// Falls back to the summary's last tone when the touch list carries none.
fn toned_history(ctx: &CaseContext) -> Vec<(Option<DateTime<Utc>>, Tone)> {
    let mut history: Vec<(Option<DateTime<Utc>>, Tone)> = ctx
        .recent_touches
        .iter()
        .filter_map(|t| t.tone.map(|tone| (Some(t.sent_at), tone)))
        .collect();
    history.sort_by(|a, b| b.0.cmp(&a.0));

    if history.is_empty() {
        if let Some(comm) = &ctx.communication {
            if let Some(tone) = comm.last_tone_used {
                history.push((comm.last_touch_at, tone));
            }
        }
    }

    history
}

/// Blocks actions harsher than the case has earned.
pub struct EscalationGate;

impl Gate for EscalationGate {
    fn name(&self) -> GateName {
        GateName::EscalationAppropriate
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateDecision {
        let derived = EscalationCeiling::derive(
            input.context,
            input.promises,
            &input.policy.escalation,
            input.now,
        );
        let requested = input.action.severity();

        let basis = match derived.last {
            None => "no prior toned contact".to_string(),
            Some(last) => format!(
                "last tone {} held for {} touches over {} days, {} broken promises",
                last.label(),
                derived.streak,
                derived.days_at_level,
                input.promises.effective_broken
            ),
        };
        let mut reason = format!(
            "{} is severity {}, justified ceiling is {} ({basis})",
            input.action.describe(),
            requested.0,
            derived.ceiling
        );
        if derived.capped_by_promise {
            reason.push_str("; capped by a promise within grace");
        }

        let decision = if requested <= derived.ceiling {
            GateDecision::allow(self.name(), reason)
        } else {
            GateDecision::block(
                self.name(),
                reason,
                format!("Use a tone no harsher than {}", derived.ceiling.label()),
            )
        };

        decision
            .with_figure("requested_severity", requested.0)
            .with_figure("ceiling_severity", derived.ceiling.0)
            .with_figure("touches_at_level", derived.streak)
            .with_figure("days_at_level", derived.days_at_level)
            .with_figure("broken_promises", input.promises.effective_broken)
            .with_figure("promise_grace_days", input.promises.grace_days)
    }
}
