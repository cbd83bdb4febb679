//! Contact-frequency gates: `touch_cap` and `cooling_off`.

use chrono::Duration;

use super::{Gate, GateDecision, GateInput, GateName};

/// Limits contacts inside the rolling period.
pub struct TouchCapGate;

impl Gate for TouchCapGate {
    fn name(&self) -> GateName {
        GateName::TouchCap
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateDecision {
        let ctx = input.context;
        let period_days = ctx.organization.touch_period_days;
        let cap = ctx.effective_touch_cap();
        let window_start = input.now - Duration::days(i64::from(period_days));

        let listed = ctx
            .recent_touches
            .iter()
            .filter(|t| t.sent_at > window_start)
            .count() as u64;
        // The touch list may be truncated; the backend's counters may not be.
        let reported = u64::from(ctx.reported_touch_count());
        let count = listed.max(reported);

        let noun = if count == 1 { "contact" } else { "contacts" };
        let reason = format!("{count} {noun} in {period_days} days, cap is {cap}");

        let decision = if count <= u64::from(cap) {
            GateDecision::allow(self.name(), reason)
        } else {
            GateDecision::block(
                self.name(),
                reason,
                format!("Pause contact until fewer than {cap} touches fall within {period_days} days"),
            )
        };

        decision
            .with_figure("touch_count", count)
            .with_figure("touches_listed", listed)
            .with_figure("touches_reported", reported)
            .with_figure("touch_cap", cap)
            .with_figure("period_days", period_days)
    }
}

/// Enforces a minimum gap since the last contact.
pub struct CoolingOffGate;

impl Gate for CoolingOffGate {
    fn name(&self) -> GateName {
        GateName::CoolingOff
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateDecision {
        let interval = input.context.effective_touch_interval_days();

        let Some(last) = input.context.most_recent_touch_at() else {
            return GateDecision::allow(self.name(), "No prior contact on record")
                .with_figure("min_days", interval);
        };

        // a touch inside the clock-skew allowance counts as just now
        let days_since = (input.now - last).num_days().max(0);
        let since_unit = if days_since == 1 { "day" } else { "days" };
        let reason =
            format!("{days_since} {since_unit} since last contact, minimum is {interval}");

        let decision = if days_since >= i64::from(interval) {
            GateDecision::allow(self.name(), reason)
        } else {
            let wait = i64::from(interval) - days_since;
            let unit = if wait == 1 { "day" } else { "days" };
            GateDecision::block(
                self.name(),
                reason,
                format!("Wait {wait} more {unit} before next contact"),
            )
        };

        decision
            .with_figure("days_since_last_touch", days_since)
            .with_figure("min_days", interval)
            .with_figure("last_touch_at", last.to_rfc3339())
    }
}
