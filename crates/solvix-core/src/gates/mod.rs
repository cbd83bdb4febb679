//! Deterministic compliance gates.
//!
//! Every gate sees the same [`GateInput`] and returns one [`GateDecision`].
//! Gates never see each other's output and all of them run on every call,
//! so a response always lists the full set in [`GateName::ALL`] order.
//!
//! | Gate | Blocks when |
//! |------|-------------|
//! | `touch_cap` | contacts in the rolling period exceed the cap |
//! | `cooling_off` | the last contact is more recent than the minimum interval |
//! | `dispute_active` | a dispute is open |
//! | `hardship` | hardship is indicated and the action is not hardship-appropriate |
//! | `unsubscribe` | the party opted out |
//! | `escalation_appropriate` | the action is harsher than the history justifies |

mod contact;
mod decision;
mod escalation;
mod flags;
mod policy;
mod promise;

pub use contact::{CoolingOffGate, TouchCapGate};
pub use decision::{GateDecision, GateEvaluationResult, GateName};
pub use escalation::{EscalationCeiling, EscalationGate};
pub use flags::{DisputeGate, HardshipGate, UnsubscribeGate};
pub use policy::{
    EscalationPolicy, GatePolicy, DEFAULT_DAYS_PER_LEVEL, DEFAULT_PROMISE_GRACE_DAYS,
    DEFAULT_TOUCHES_PER_LEVEL,
};
pub use promise::{promise_status, PromiseStatus, PromiseSummary};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::context::{CaseContext, ValidationError};
use crate::taxonomy::ProposedAction;

/// Largest batch accepted by [`GateEvaluator::evaluate_batch`].
pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GateError {
    #[error("invalid case context: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid case context at index {index}: {source}")]
    BatchItem {
        index: usize,
        #[source]
        source: ValidationError,
    },

    #[error("batch of {got} contexts exceeds the maximum of {max}")]
    BatchTooLarge { got: usize, max: usize },

    #[error("batch must contain at least one context")]
    EmptyBatch,
}

/// Everything a gate may look at.
pub struct GateInput<'a> {
    pub context: &'a CaseContext,
    pub action: &'a ProposedAction,
    pub now: DateTime<Utc>,
    pub policy: &'a GatePolicy,
    pub promises: &'a PromiseSummary,
}

/// A single named rule.
pub trait Gate: Send + Sync {
    fn name(&self) -> GateName;

    fn evaluate(&self, input: &GateInput<'_>) -> GateDecision;
}

/// Runs the fixed gate list against a context.
pub struct GateEvaluator {
    policy: GatePolicy,
    gates: [Box<dyn Gate>; 6],
}

impl Default for GateEvaluator {
    fn default() -> Self {
        Self::new(GatePolicy::default())
    }
}

impl GateEvaluator {
    pub fn new(policy: GatePolicy) -> Self {
        Self {
            policy,
            gates: [
                Box::new(TouchCapGate),
                Box::new(CoolingOffGate),
                Box::new(DisputeGate),
                Box::new(HardshipGate),
                Box::new(UnsubscribeGate),
                Box::new(EscalationGate),
            ],
        }
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Evaluate against the wall clock.
    pub fn evaluate(
        &self,
        context: &CaseContext,
        action: &ProposedAction,
    ) -> Result<GateEvaluationResult, GateError> {
        self.evaluate_at(context, action, Utc::now())
    }

    /// Evaluate as of `now`. Same inputs always give the same result.
    pub fn evaluate_at(
        &self,
        context: &CaseContext,
        action: &ProposedAction,
        now: DateTime<Utc>,
    ) -> Result<GateEvaluationResult, GateError> {
        context.validate(now)?;

        let promises =
            PromiseSummary::compute(context, now, self.policy.default_promise_grace_days);
        let input = GateInput {
            context,
            action,
            now,
            policy: &self.policy,
            promises: &promises,
        };

        let decisions: Vec<GateDecision> =
            self.gates.iter().map(|gate| gate.evaluate(&input)).collect();
        let result = GateEvaluationResult::from_decisions(decisions, now);

        tracing::debug!(
            party_id = %context.party.party_id,
            action = %action.describe(),
            allowed = result.allowed(),
            blocked = result.blocking().count(),
            "Gates evaluated"
        );

        Ok(result)
    }

    /// Evaluate many contexts against one action with a shared `now`.
    ///
    /// Every context is validated before any is evaluated; the first invalid
    /// one fails the whole batch.
    pub fn evaluate_batch(
        &self,
        contexts: &[CaseContext],
        action: &ProposedAction,
        now: DateTime<Utc>,
    ) -> Result<Vec<GateEvaluationResult>, GateError> {
        if contexts.is_empty() {
            return Err(GateError::EmptyBatch);
        }
        if contexts.len() > MAX_BATCH_SIZE {
            return Err(GateError::BatchTooLarge {
                got: contexts.len(),
                max: MAX_BATCH_SIZE,
            });
        }

        for (index, context) in contexts.iter().enumerate() {
            context
                .validate(now)
                .map_err(|source| GateError::BatchItem { index, source })?;
        }

        contexts
            .iter()
            .map(|context| self.evaluate_at(context, action, now))
            .collect()
    }
}

#[cfg(test)]
mod tests;
