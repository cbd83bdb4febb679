//! Gates driven by caller-supplied flags.

use super::{Gate, GateDecision, GateInput, GateName};

pub struct DisputeGate;

impl Gate for DisputeGate {
    fn name(&self) -> GateName {
        GateName::DisputeActive
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateDecision {
        let disputed = input.context.active_dispute;
        let decision = if disputed {
            GateDecision::block(
                self.name(),
                "Active dispute on the account; collection contact is paused",
                "Resolve the dispute before further collection contact",
            )
        } else {
            GateDecision::allow(self.name(), "No active dispute")
        };
        decision.with_figure("active_dispute", disputed)
    }
}

/// Only hardship-appropriate actions pass while hardship is indicated.
pub struct HardshipGate;

impl Gate for HardshipGate {
    fn name(&self) -> GateName {
        GateName::Hardship
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateDecision {
        let flagged = input.context.hardship_indicated;
        let action = input.action.describe();

        let decision = if !flagged {
            GateDecision::allow(self.name(), "No hardship indicated")
        } else if input.action.is_hardship_appropriate() {
            GateDecision::allow(
                self.name(),
                format!("Hardship indicated; {action} is hardship-appropriate"),
            )
        } else {
            GateDecision::block(
                self.name(),
                format!("Hardship indicated; {action} is not hardship-appropriate"),
                "Use a concerned_inquiry tone or route the case to hardship review",
            )
        };

        decision
            .with_figure("hardship_indicated", flagged)
            .with_figure("current_promises", input.promises.current)
    }
}

pub struct UnsubscribeGate;

impl Gate for UnsubscribeGate {
    fn name(&self) -> GateName {
        GateName::Unsubscribe
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateDecision {
        let opted_out = input.context.unsubscribe_requested;
        let decision = if opted_out {
            GateDecision::block(
                self.name(),
                "Party has opted out of contact",
                "Do not contact; the party has unsubscribed",
            )
        } else {
            GateDecision::allow(self.name(), "Party has not opted out")
        };
        decision.with_figure("unsubscribe_requested", opted_out)
    }
}
