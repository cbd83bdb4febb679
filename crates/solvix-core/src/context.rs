//! Per-call case context.
//!
//! The caller sends everything the engine needs to know about a debtor in
//! one value. Nothing here is persisted and nothing is mutated during
//! evaluation.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::taxonomy::Tone;

/// Touch cap used when neither the party nor the organization sets one.
pub const DEFAULT_TOUCH_CAP: u32 = 10;

/// Length of the rolling touch-cap window, in days.
pub const DEFAULT_TOUCH_PERIOD_DAYS: u32 = 30;

/// Minimum days between two contacts.
pub const DEFAULT_TOUCH_INTERVAL_DAYS: u32 = 3;

/// How far ahead of `now` a recorded touch may sit before it is rejected.
/// Covers clock drift between the backend and this service.
pub const MAX_CLOCK_SKEW_SECONDS: i64 = 300;

/// Errors raised when a context cannot be evaluated safely.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("party_id must not be empty")]
    EmptyPartyId,

    #[error("{field} must not be negative (got {value})")]
    NegativeAmount { field: String, value: f64 },

    #[error("{field} is not a finite number")]
    NonFiniteAmount { field: String },

    #[error("touch at {sent_at} is in the future (now is {now})")]
    TouchInFuture {
        sent_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("{field} must be at least {min} (got {value})")]
    BelowMinimum { field: String, min: u32, value: u32 },

    #[error("{field}: {message}")]
    Invalid { field: String, message: String },
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Who the case is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyInfo {
    pub party_id: String,

    #[serde(default)]
    pub customer_code: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub relationship_tier: Option<String>,

    /// Overrides the organization touch cap for this party.
    #[serde(default)]
    pub touch_cap_override: Option<u32>,

    /// Overrides the organization promise grace period for this party.
    #[serde(default, alias = "grace_days_override")]
    pub promise_grace_days_override: Option<u32>,

    /// Touches this calendar month, as counted by the backend.
    #[serde(default)]
    pub monthly_touch_count: u32,
}

fn default_currency() -> String {
    "GBP".to_string()
}

impl PartyInfo {
    pub fn new(party_id: impl Into<String>) -> Self {
        Self {
            party_id: party_id.into(),
            customer_code: String::new(),
            name: String::new(),
            currency: default_currency(),
            relationship_tier: None,
            touch_cap_override: None,
            promise_grace_days_override: None,
            monthly_touch_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationStatus {
    Open,
    PartiallyPaid,
    Disputed,
    Paid,
}

impl ObligationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObligationStatus::Open => "open",
            ObligationStatus::PartiallyPaid => "partially_paid",
            ObligationStatus::Disputed => "disputed",
            ObligationStatus::Paid => "paid",
        }
    }
}

/// A single invoice the party owes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    pub invoice_number: String,
    pub amount_due: f64,
    pub due_date: NaiveDate,

    #[serde(default)]
    pub days_past_due: u32,

    #[serde(default = "default_obligation_status", alias = "state")]
    pub status: ObligationStatus,
}

fn default_obligation_status() -> ObligationStatus {
    ObligationStatus::Open
}

/// Summary of the contact history kept by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunicationInfo {
    #[serde(default)]
    pub touch_count: u32,

    #[serde(default)]
    pub last_touch_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_touch_channel: Option<Channel>,

    #[serde(default)]
    pub last_tone_used: Option<Tone>,

    #[serde(default)]
    pub last_response_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Phone,
    Sms,
    Letter,
}

/// One outbound contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Touch {
    pub sent_at: DateTime<Utc>,

    #[serde(default = "default_channel")]
    pub channel: Channel,

    #[serde(default)]
    pub tone: Option<Tone>,

    #[serde(default)]
    pub had_response: bool,
}

fn default_channel() -> Channel {
    Channel::Email
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromiseOutcome {
    Pending,
    Kept,
    Broken,
}

/// A promise-to-pay as recorded by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromiseRecord {
    pub promise_date: NaiveDate,

    #[serde(default, alias = "promise_amount")]
    pub amount: Option<f64>,

    #[serde(default = "default_promise_outcome")]
    pub outcome: PromiseOutcome,
}

fn default_promise_outcome() -> PromiseOutcome {
    PromiseOutcome::Pending
}

/// Organization-level contact policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationDefaults {
    #[serde(default = "default_touch_cap")]
    pub touch_cap: u32,

    #[serde(default = "default_touch_period_days")]
    pub touch_period_days: u32,

    #[serde(default = "default_touch_interval_days")]
    pub touch_interval_days: u32,

    /// Falls back to the system default when unset.
    #[serde(default)]
    pub promise_grace_days: Option<u32>,

    #[serde(default = "default_brand_tone")]
    pub brand_tone: Tone,
}

fn default_touch_cap() -> u32 {
    DEFAULT_TOUCH_CAP
}

fn default_touch_period_days() -> u32 {
    DEFAULT_TOUCH_PERIOD_DAYS
}

fn default_touch_interval_days() -> u32 {
    DEFAULT_TOUCH_INTERVAL_DAYS
}

fn default_brand_tone() -> Tone {
    Tone::Professional
}

impl Default for OrganizationDefaults {
    fn default() -> Self {
        Self {
            touch_cap: DEFAULT_TOUCH_CAP,
            touch_period_days: DEFAULT_TOUCH_PERIOD_DAYS,
            touch_interval_days: DEFAULT_TOUCH_INTERVAL_DAYS,
            promise_grace_days: None,
            brand_tone: Tone::Professional,
        }
    }
}

/// Payment behaviour observed for the party.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorInfo {
    #[serde(default)]
    pub segment: Option<String>,

    #[serde(default)]
    pub on_time_rate: Option<f64>,

    #[serde(default)]
    pub avg_days_to_pay: Option<f64>,
}

/// Everything known about a case at call time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseContext {
    pub party: PartyInfo,

    #[serde(default)]
    pub obligations: Vec<Obligation>,

    #[serde(default)]
    pub communication: Option<CommunicationInfo>,

    #[serde(default)]
    pub recent_touches: Vec<Touch>,

    #[serde(default)]
    pub promises: Vec<PromiseRecord>,

    #[serde(default)]
    pub case_state: Option<String>,

    /// Broken promises already recorded by the backend.
    #[serde(default)]
    pub broken_promises_count: u32,

    #[serde(default)]
    pub active_dispute: bool,

    #[serde(default)]
    pub hardship_indicated: bool,

    #[serde(default)]
    pub unsubscribe_requested: bool,

    #[serde(default)]
    pub organization: OrganizationDefaults,

    #[serde(default)]
    pub behavior: Option<BehaviorInfo>,

    // Resolved values some backends send at the top level. When present they
    // take precedence over `organization`, but not over party overrides.
    #[serde(default)]
    pub touch_cap: Option<u32>,

    #[serde(default)]
    pub touch_interval_days: Option<u32>,

    #[serde(default)]
    pub promise_grace_days: Option<u32>,

    #[serde(default)]
    pub brand_tone: Option<Tone>,

    #[serde(default)]
    pub monthly_touch_count: Option<u32>,
}

impl CaseContext {
    /// A minimal context for the given party, with organization defaults.
    pub fn new(party_id: impl Into<String>) -> Self {
        Self {
            party: PartyInfo::new(party_id),
            obligations: Vec::new(),
            communication: None,
            recent_touches: Vec::new(),
            promises: Vec::new(),
            case_state: None,
            broken_promises_count: 0,
            active_dispute: false,
            hardship_indicated: false,
            unsubscribe_requested: false,
            organization: OrganizationDefaults::default(),
            behavior: None,
            touch_cap: None,
            touch_interval_days: None,
            promise_grace_days: None,
            brand_tone: None,
            monthly_touch_count: None,
        }
    }

    /// Check the context is fit for evaluation at `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if self.party.party_id.trim().is_empty() {
            return Err(ValidationError::EmptyPartyId);
        }

        for (i, obligation) in self.obligations.iter().enumerate() {
            check_amount(&format!("obligations[{i}].amount_due"), obligation.amount_due)?;
        }

        for (i, promise) in self.promises.iter().enumerate() {
            if let Some(amount) = promise.amount {
                check_amount(&format!("promises[{i}].amount"), amount)?;
            }
        }

        let latest_allowed = now + Duration::seconds(MAX_CLOCK_SKEW_SECONDS);
        let summary_touch = self.communication.as_ref().and_then(|c| c.last_touch_at);
        for sent_at in self.recent_touches.iter().map(|t| t.sent_at).chain(summary_touch) {
            if sent_at > latest_allowed {
                return Err(ValidationError::TouchInFuture { sent_at, now });
            }
        }

        if self.organization.touch_period_days == 0 {
            return Err(ValidationError::BelowMinimum {
                field: "organization.touch_period_days".to_string(),
                min: 1,
                value: 0,
            });
        }

        Ok(())
    }

    /// Cap in force for this party.
    pub fn effective_touch_cap(&self) -> u32 {
        self.party
            .touch_cap_override
            .or(self.touch_cap)
            .unwrap_or(self.organization.touch_cap)
    }

    pub fn effective_touch_interval_days(&self) -> u32 {
        self.touch_interval_days
            .unwrap_or(self.organization.touch_interval_days)
    }

    /// Grace period in force for this party, given the system default.
    pub fn effective_grace_days(&self, system_default: u32) -> u32 {
        self.party
            .promise_grace_days_override
            .or(self.promise_grace_days)
            .or(self.organization.promise_grace_days)
            .unwrap_or(system_default)
    }

    pub fn effective_brand_tone(&self) -> Tone {
        self.brand_tone.unwrap_or(self.organization.brand_tone)
    }

    /// Highest touch count the backend reports, across the summary and the
    /// monthly counters. Zero when none is sent.
    pub fn reported_touch_count(&self) -> u32 {
        let summary = self.communication.as_ref().map_or(0, |c| c.touch_count);
        summary
            .max(self.party.monthly_touch_count)
            .max(self.monthly_touch_count.unwrap_or(0))
    }

    /// Latest known contact, from either the touch list or the summary.
    pub fn most_recent_touch_at(&self) -> Option<DateTime<Utc>> {
        let from_touches = self.recent_touches.iter().map(|t| t.sent_at).max();
        let from_summary = self.communication.as_ref().and_then(|c| c.last_touch_at);
        from_touches.max(from_summary)
    }

    /// Obligations still owed, most overdue first.
    pub fn outstanding_by_overdue(&self) -> Vec<&Obligation> {
        let mut open: Vec<&Obligation> = self
            .obligations
            .iter()
            .filter(|o| o.status != ObligationStatus::Paid)
            .collect();
        open.sort_by(|a, b| {
            b.days_past_due
                .cmp(&a.days_past_due)
                .then_with(|| a.invoice_number.cmp(&b.invoice_number))
        });
        open
    }

    pub fn total_outstanding(&self) -> f64 {
        self.obligations
            .iter()
            .filter(|o| o.status != ObligationStatus::Paid)
            .map(|o| o.amount_due)
            .sum()
    }
}

fn check_amount(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteAmount {
            field: field.to_string(),
        });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeAmount {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn obligation(number: &str, amount: f64, days_past_due: u32) -> Obligation {
        Obligation {
            invoice_number: number.to_string(),
            amount_due: amount,
            due_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            days_past_due,
            status: ObligationStatus::Open,
        }
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let ctx: CaseContext =
            serde_json::from_str(r#"{"party": {"party_id": "P-1"}}"#).unwrap();
        assert_eq!(ctx.party.currency, "GBP");
        assert_eq!(ctx.organization.touch_cap, DEFAULT_TOUCH_CAP);
        assert_eq!(ctx.organization.touch_interval_days, DEFAULT_TOUCH_INTERVAL_DAYS);
        assert_eq!(ctx.organization.brand_tone, Tone::Professional);
        assert!(ctx.validate(now()).is_ok());
    }

    #[test]
    fn test_empty_party_id_rejected() {
        let ctx = CaseContext::new("  ");
        assert_eq!(ctx.validate(now()), Err(ValidationError::EmptyPartyId));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut ctx = CaseContext::new("P-1");
        ctx.obligations.push(obligation("INV-1", -5.0, 10));
        let err = ctx.validate(now()).unwrap_err();
        assert!(matches!(err, ValidationError::NegativeAmount { .. }));
        assert!(err.to_string().contains("obligations[0].amount_due"));
    }

    #[test]
    fn test_future_touch_rejected() {
        let mut ctx = CaseContext::new("P-1");
        ctx.recent_touches.push(Touch {
            sent_at: now() + Duration::hours(1),
            channel: Channel::Email,
            tone: None,
            had_response: false,
        });
        assert!(matches!(
            ctx.validate(now()),
            Err(ValidationError::TouchInFuture { .. })
        ));
    }

    #[test]
    fn test_touch_within_clock_skew_accepted() {
        let mut ctx = CaseContext::new("P-1");
        ctx.recent_touches.push(Touch {
            sent_at: now() + Duration::minutes(1),
            channel: Channel::Email,
            tone: None,
            had_response: false,
        });
        ctx.communication = Some(CommunicationInfo {
            last_touch_at: Some(now() + Duration::seconds(MAX_CLOCK_SKEW_SECONDS)),
            ..Default::default()
        });
        assert!(ctx.validate(now()).is_ok());

        ctx.communication = Some(CommunicationInfo {
            last_touch_at: Some(now() + Duration::seconds(MAX_CLOCK_SKEW_SECONDS + 1)),
            ..Default::default()
        });
        assert!(matches!(
            ctx.validate(now()),
            Err(ValidationError::TouchInFuture { .. })
        ));
    }

    #[test]
    fn test_grace_resolution_order() {
        let mut ctx = CaseContext::new("P-1");
        assert_eq!(ctx.effective_grace_days(3), 3);
        ctx.organization.promise_grace_days = Some(5);
        assert_eq!(ctx.effective_grace_days(3), 5);
        ctx.promise_grace_days = Some(4);
        assert_eq!(ctx.effective_grace_days(3), 4);
        ctx.party.promise_grace_days_override = Some(1);
        assert_eq!(ctx.effective_grace_days(3), 1);
    }

    #[test]
    fn test_top_level_fields_resolve_before_organization() {
        let ctx: CaseContext = serde_json::from_str(
            r#"{
                "party": {"party_id": "P-1", "grace_days_override": 6, "monthly_touch_count": 2},
                "obligations": [
                    {"invoice_number": "INV-9", "amount_due": 10.0,
                     "due_date": "2025-01-01", "state": "disputed"}
                ],
                "promises": [{"promise_date": "2025-03-01", "promise_amount": 250.0}],
                "touch_cap": 2,
                "touch_interval_days": 7,
                "brand_tone": "firm",
                "monthly_touch_count": 5,
                "organization": {"touch_cap": 20, "touch_interval_days": 1}
            }"#,
        )
        .unwrap();

        assert_eq!(ctx.effective_touch_cap(), 2);
        assert_eq!(ctx.effective_touch_interval_days(), 7);
        assert_eq!(ctx.effective_brand_tone(), Tone::Firm);
        assert_eq!(ctx.effective_grace_days(3), 6);
        assert_eq!(ctx.reported_touch_count(), 5);
        assert_eq!(ctx.obligations[0].status, ObligationStatus::Disputed);
        assert_eq!(ctx.promises[0].amount, Some(250.0));

        let mut overridden = ctx.clone();
        overridden.party.touch_cap_override = Some(8);
        assert_eq!(overridden.effective_touch_cap(), 8);
    }

    #[test]
    fn test_reported_touch_count_takes_largest_counter() {
        let mut ctx = CaseContext::new("P-1");
        assert_eq!(ctx.reported_touch_count(), 0);
        ctx.communication = Some(CommunicationInfo {
            touch_count: 7,
            ..Default::default()
        });
        ctx.party.monthly_touch_count = 3;
        assert_eq!(ctx.reported_touch_count(), 7);
        ctx.monthly_touch_count = Some(9);
        assert_eq!(ctx.reported_touch_count(), 9);
    }

    #[test]
    fn test_most_recent_touch_uses_both_sources() {
        let mut ctx = CaseContext::new("P-1");
        assert_eq!(ctx.most_recent_touch_at(), None);

        ctx.recent_touches.push(Touch {
            sent_at: now() - Duration::days(5),
            channel: Channel::Email,
            tone: None,
            had_response: false,
        });
        ctx.communication = Some(CommunicationInfo {
            last_touch_at: Some(now() - Duration::days(2)),
            ..Default::default()
        });
        assert_eq!(ctx.most_recent_touch_at(), Some(now() - Duration::days(2)));
    }

    #[test]
    fn test_outstanding_sorted_most_overdue_first() {
        let mut ctx = CaseContext::new("P-1");
        ctx.obligations.push(obligation("INV-A", 100.0, 10));
        ctx.obligations.push(obligation("INV-B", 50.0, 45));
        let mut paid = obligation("INV-C", 75.0, 90);
        paid.status = ObligationStatus::Paid;
        ctx.obligations.push(paid);

        let sorted: Vec<&str> = ctx
            .outstanding_by_overdue()
            .iter()
            .map(|o| o.invoice_number.as_str())
            .collect();
        assert_eq!(sorted, vec!["INV-B", "INV-A"]);
        assert_eq!(ctx.total_outstanding(), 150.0);
    }
}
