//! # solvix-core
//!
//! Deterministic half of the Solvix collections engine.
//!
//! This crate holds the case model every operation receives, the closed
//! vocabularies (categories, tones, actions) and the compliance gate
//! evaluator. Nothing here performs I/O or calls an LLM.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same context, action and `now` give the same result
//! 2. **Exhaustive**: every gate runs on every call, no short-circuiting
//! 3. **Derived verdict**: the aggregate `allowed` is always the AND of the gates
//! 4. **Fail fast**: malformed contexts are errors, never "allowed"
//!
//! ## Example
//!
//! ```rust,ignore
//! use solvix_core::{evaluate_gates, CaseContext, ProposedAction, Tone};
//!
//! let context: CaseContext = serde_json::from_str(payload)?;
//! let result = evaluate_gates(&context, &ProposedAction::email(Tone::Firm))?;
//!
//! if !result.allowed() {
//!     println!("blocked: {:?}", result.recommended_action());
//! }
//! ```

pub mod context;
pub mod gates;
pub mod taxonomy;

pub use context::{
    BehaviorInfo, CaseContext, Channel, CommunicationInfo, Obligation, ObligationStatus,
    OrganizationDefaults, PartyInfo, PromiseOutcome, PromiseRecord, Touch, ValidationError,
};
pub use gates::{
    EscalationPolicy, GateDecision, GateError, GateEvaluationResult, GateEvaluator, GateName,
    GatePolicy, MAX_BATCH_SIZE,
};
pub use taxonomy::{ActionKind, Category, Objective, ProposedAction, Severity, Tone, UnknownLabel};

/// Evaluate all gates with the default policy against the wall clock.
pub fn evaluate_gates(
    context: &CaseContext,
    action: &ProposedAction,
) -> Result<GateEvaluationResult, GateError> {
    GateEvaluator::default().evaluate(context, action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_gates_from_json() {
        let context: CaseContext = serde_json::from_str(
            r#"{
                "party": {"party_id": "P-42", "name": "Acme Ltd"},
                "obligations": [
                    {"invoice_number": "INV-9", "amount_due": 310.5, "due_date": "2025-01-01", "days_past_due": 40}
                ],
                "unsubscribe_requested": true
            }"#,
        )
        .unwrap();

        let result = evaluate_gates(&context, &ProposedAction::email(Tone::FriendlyReminder)).unwrap();
        assert!(!result.allowed());
        assert!(!result.decision(GateName::Unsubscribe).unwrap().allowed);
    }
}
