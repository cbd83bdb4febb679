//! Tunable gate policy.

use serde::{Deserialize, Serialize};

/// Grace period applied when neither party nor organization sets one.
pub const DEFAULT_PROMISE_GRACE_DAYS: u32 = 3;

/// Consecutive touches at one severity that earn the next rung.
pub const DEFAULT_TOUCHES_PER_LEVEL: u32 = 2;

/// Days spent at one severity that earn the next rung.
pub const DEFAULT_DAYS_PER_LEVEL: u32 = 14;

/// Policy shared by every gate in one evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    #[serde(default = "default_grace")]
    pub default_promise_grace_days: u32,

    #[serde(default)]
    pub escalation: EscalationPolicy,
}

/// How fast tone may climb the severity ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    #[serde(default = "default_touches_per_level")]
    pub touches_per_level: u32,

    #[serde(default = "default_days_per_level")]
    pub days_per_level: u32,
}

fn default_grace() -> u32 {
    DEFAULT_PROMISE_GRACE_DAYS
}

fn default_touches_per_level() -> u32 {
    DEFAULT_TOUCHES_PER_LEVEL
}

fn default_days_per_level() -> u32 {
    DEFAULT_DAYS_PER_LEVEL
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            default_promise_grace_days: DEFAULT_PROMISE_GRACE_DAYS,
            escalation: EscalationPolicy::default(),
        }
    }
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            touches_per_level: DEFAULT_TOUCHES_PER_LEVEL,
            days_per_level: DEFAULT_DAYS_PER_LEVEL,
        }
    }
}

impl GatePolicy {
    pub fn with_grace_days(mut self, days: u32) -> Self {
        self.default_promise_grace_days = days;
        self
    }

    pub fn with_escalation(mut self, escalation: EscalationPolicy) -> Self {
        self.escalation = escalation;
        self
    }
}
