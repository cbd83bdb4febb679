//! `contextual_coherence`: the draft should read as if the writer knew the
//! case history. Failures here are warnings.

use solvix_core::CaseContext;

use super::{Guardrail, GuardrailCheck, Severity};

const NAME: &str = "contextual_coherence";

const DEMAND_PHRASES: &[&str] = &[
    "pay immediately",
    "pay now",
    "immediate payment",
    "pay in full",
    "demand payment",
    "must pay",
    "required to pay",
    "failure to pay will result",
    "legal action",
    "collection agency",
];

const DISPUTE_PHRASES: &[&str] = &[
    "dispute",
    "under review",
    "investigating",
    "looking into",
    "resolve",
    "concern",
    "issue",
];

const HARSH_PHRASES: &[&str] = &[
    "failure to pay",
    "will be forced",
    "no choice but",
    "legal consequences",
    "must pay immediately",
    "demand",
    "threaten",
];

const EMPATHY_PHRASES: &[&str] = &[
    "understand",
    "difficult",
    "challenging",
    "work with you",
    "payment plan",
    "options",
    "help",
    "support",
    "flexibility",
    "circumstances",
];

const HISTORY_PHRASES: &[&str] = &[
    "previous",
    "history",
    "past",
    "again",
    "before",
    "commitment",
    "promise",
    "assured",
];

/// Broken promises at which the draft should mention the history.
const BROKEN_PROMISES_TO_MENTION: u32 = 2;

pub struct ContextualCoherenceGuardrail;

impl Guardrail for ContextualCoherenceGuardrail {
    fn name(&self) -> &'static str {
        NAME
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn check(&self, draft: &str, context: &CaseContext) -> Vec<GuardrailCheck> {
        let lower = draft.to_lowercase();
        let mut checks = Vec::new();

        if context.active_dispute {
            checks.push(check_dispute(&lower));
        }
        if context.hardship_indicated {
            checks.push(check_hardship(&lower));
        }
        if context.broken_promises_count >= BROKEN_PROMISES_TO_MENTION {
            checks.push(check_promise_history(&lower, context.broken_promises_count));
        }

        if checks.is_empty() {
            checks.push(GuardrailCheck::pass(
                NAME,
                Severity::Medium,
                "No special case conditions to check",
            ));
        }
        checks
    }
}

fn found<'a>(text: &str, phrases: &[&'a str]) -> Vec<&'a str> {
    phrases.iter().copied().filter(|p| text.contains(p)).collect()
}

fn check_dispute(lower: &str) -> GuardrailCheck {
    let demands = found(lower, DEMAND_PHRASES);
    let acknowledged = !found(lower, DISPUTE_PHRASES).is_empty();

    if acknowledged {
        GuardrailCheck::pass(NAME, Severity::Medium, "Draft acknowledges the open dispute")
    } else if demands.is_empty() {
        GuardrailCheck::fail(
            NAME,
            Severity::Medium,
            "Draft does not acknowledge the open dispute",
        )
    } else {
        GuardrailCheck::fail(
            NAME,
            Severity::Medium,
            format!(
                "Draft demands payment during an open dispute ({})",
                demands.join(", ")
            ),
        )
    }
}

fn check_hardship(lower: &str) -> GuardrailCheck {
    let harsh = found(lower, HARSH_PHRASES);
    let empathetic = found(lower, EMPATHY_PHRASES);

    match (empathetic.is_empty(), harsh.is_empty()) {
        (false, _) => {
            GuardrailCheck::pass(NAME, Severity::Medium, "Draft uses a supportive tone")
        }
        (true, true) => GuardrailCheck::fail(
            NAME,
            Severity::Medium,
            "Draft lacks supportive language for a hardship case",
        ),
        (true, false) => GuardrailCheck::fail(
            NAME,
            Severity::Medium,
            format!("Draft is harsh for a hardship case ({})", harsh.join(", ")),
        ),
    }
}

fn check_promise_history(lower: &str, broken: u32) -> GuardrailCheck {
    if found(lower, HISTORY_PHRASES).is_empty() {
        GuardrailCheck::fail(
            NAME,
            Severity::Medium,
            format!("Draft does not mention the {broken} broken promises"),
        )
    } else {
        GuardrailCheck::pass(NAME, Severity::Medium, "Draft mentions the payment history")
    }
}
