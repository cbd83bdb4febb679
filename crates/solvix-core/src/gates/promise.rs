//! Promise-to-pay status with grace period.
//!
//! A pending promise is current until `grace_days` whole days have passed
//! after the promised date. Only then does it count as broken.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::context::{CaseContext, PromiseOutcome, PromiseRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromiseStatus {
    /// Pending and within grace (or not yet due)
    Current,
    Broken,
    Kept,
}

/// Classify one promise at `today` using `grace_days`.
pub fn promise_status(promise: &PromiseRecord, today: NaiveDate, grace_days: u32) -> PromiseStatus {
    match promise.outcome {
        PromiseOutcome::Kept => PromiseStatus::Kept,
        PromiseOutcome::Broken => PromiseStatus::Broken,
        PromiseOutcome::Pending => {
            let elapsed = (today - promise.promise_date).num_days();
            if elapsed > i64::from(grace_days) {
                PromiseStatus::Broken
            } else {
                PromiseStatus::Current
            }
        }
    }
}

/// Promise picture for one context at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromiseSummary {
    pub grace_days: u32,

    /// Pending promises still inside their grace period.
    pub current: u32,

    /// Pending promises that have run past grace.
    pub lapsed: u32,

    /// Recorded broken count plus lapsed promises.
    pub effective_broken: u32,
}

impl PromiseSummary {
    pub fn compute(ctx: &CaseContext, now: DateTime<Utc>, system_grace_days: u32) -> Self {
        let grace_days = ctx.effective_grace_days(system_grace_days);
        let today = now.date_naive();

        let mut current = 0u32;
        let mut lapsed = 0u32;
        for promise in &ctx.promises {
            if promise.outcome != PromiseOutcome::Pending {
                continue;
            }
            match promise_status(promise, today, grace_days) {
                PromiseStatus::Current => current += 1,
                PromiseStatus::Broken => lapsed += 1,
                PromiseStatus::Kept => {}
            }
        }

        Self {
            grace_days,
            current,
            lapsed,
            effective_broken: ctx.broken_promises_count.saturating_add(lapsed),
        }
    }

    pub fn has_current(&self) -> bool {
        self.current > 0
    }

    pub fn has_broken(&self) -> bool {
        self.effective_broken > 0
    }
}
