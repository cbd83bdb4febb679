//! Gate outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// The fixed set of gates, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateName {
    TouchCap,
    CoolingOff,
    DisputeActive,
    Hardship,
    Unsubscribe,
    EscalationAppropriate,
}

impl GateName {
    pub const ALL: [GateName; 6] = [
        GateName::TouchCap,
        GateName::CoolingOff,
        GateName::DisputeActive,
        GateName::Hardship,
        GateName::Unsubscribe,
        GateName::EscalationAppropriate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GateName::TouchCap => "touch_cap",
            GateName::CoolingOff => "cooling_off",
            GateName::DisputeActive => "dispute_active",
            GateName::Hardship => "hardship",
            GateName::Unsubscribe => "unsubscribe",
            GateName::EscalationAppropriate => "escalation_appropriate",
        }
    }
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of a single gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub gate: GateName,
    pub allowed: bool,
    pub reason: String,

    /// Quantities the gate compared, keyed by name.
    #[serde(default)]
    pub figures: BTreeMap<String, Value>,

    /// Remedy offered when this gate blocks.
    #[serde(skip)]
    remedy: Option<String>,
}

impl GateDecision {
    pub fn allow(gate: GateName, reason: impl Into<String>) -> Self {
        Self {
            gate,
            allowed: true,
            reason: reason.into(),
            figures: BTreeMap::new(),
            remedy: None,
        }
    }

    pub fn block(gate: GateName, reason: impl Into<String>, remedy: impl Into<String>) -> Self {
        Self {
            gate,
            allowed: false,
            reason: reason.into(),
            figures: BTreeMap::new(),
            remedy: Some(remedy.into()),
        }
    }

    pub fn with_figure(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.figures.insert(key.to_string(), value.into());
        self
    }

    pub fn remedy(&self) -> Option<&str> {
        self.remedy.as_deref()
    }
}

/// Aggregate verdict over every gate.
///
/// `allowed` is derived from the decisions and cannot be set directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateEvaluationResult {
    allowed: bool,
    gate_results: Vec<GateDecision>,
    recommended_action: Option<String>,
    evaluated_at: DateTime<Utc>,
}

impl GateEvaluationResult {
    /// Build the aggregate from decisions in evaluation order.
    pub fn from_decisions(decisions: Vec<GateDecision>, evaluated_at: DateTime<Utc>) -> Self {
        let allowed = decisions.iter().all(|d| d.allowed);
        let recommended_action = decisions
            .iter()
            .find(|d| !d.allowed)
            .and_then(|d| d.remedy.clone());

        Self {
            allowed,
            gate_results: decisions,
            recommended_action,
            evaluated_at,
        }
    }

    pub fn allowed(&self) -> bool {
        self.allowed
    }

    pub fn decisions(&self) -> &[GateDecision] {
        &self.gate_results
    }

    pub fn decision(&self, gate: GateName) -> Option<&GateDecision> {
        self.gate_results.iter().find(|d| d.gate == gate)
    }

    pub fn blocking(&self) -> impl Iterator<Item = &GateDecision> {
        self.gate_results.iter().filter(|d| !d.allowed)
    }

    pub fn recommended_action(&self) -> Option<&str> {
        self.recommended_action.as_deref()
    }

    pub fn evaluated_at(&self) -> DateTime<Utc> {
        self.evaluated_at
    }
}
