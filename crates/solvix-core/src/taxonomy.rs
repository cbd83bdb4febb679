//! Closed vocabularies shared by every operation.
//!
//! Categories, tones, proposed actions and draft objectives are fixed sets.
//! Callers send them as strings; parsing happens once at the boundary and
//! everything downstream works with the enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a label is outside its closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownLabel {
    /// Which vocabulary was being parsed ("category", "tone", ...)
    pub kind: &'static str,

    /// The rejected input, as supplied
    pub value: String,
}

/// Email classification category.
///
/// The declaration order is the priority order used when an email carries
/// more than one intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Insolvency,
    Dispute,
    AlreadyPaid,
    Unsubscribe,
    Hostile,
    PromiseToPay,
    Hardship,
    PlanRequest,
    Redirect,
    RequestInfo,
    OutOfOffice,
    Cooperative,
    Unclear,
}

impl Category {
    /// Every category, in priority order.
    pub const ALL: [Category; 13] = [
        Category::Insolvency,
        Category::Dispute,
        Category::AlreadyPaid,
        Category::Unsubscribe,
        Category::Hostile,
        Category::PromiseToPay,
        Category::Hardship,
        Category::PlanRequest,
        Category::Redirect,
        Category::RequestInfo,
        Category::OutOfOffice,
        Category::Cooperative,
        Category::Unclear,
    ];

    /// Canonical wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Insolvency => "INSOLVENCY",
            Category::Dispute => "DISPUTE",
            Category::AlreadyPaid => "ALREADY_PAID",
            Category::Unsubscribe => "UNSUBSCRIBE",
            Category::Hostile => "HOSTILE",
            Category::PromiseToPay => "PROMISE_TO_PAY",
            Category::Hardship => "HARDSHIP",
            Category::PlanRequest => "PLAN_REQUEST",
            Category::Redirect => "REDIRECT",
            Category::RequestInfo => "REQUEST_INFO",
            Category::OutOfOffice => "OUT_OF_OFFICE",
            Category::Cooperative => "COOPERATIVE",
            Category::Unclear => "UNCLEAR",
        }
    }

    /// Exact match against the canonical label (case-sensitive).
    pub fn from_canonical(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == label)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownLabel;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownLabel {
                kind: "category",
                value: s.to_string(),
            })
    }
}

/// Tone of an outbound communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    FriendlyReminder,
    Professional,
    Firm,
    FinalNotice,
    ConcernedInquiry,
}

impl Tone {
    pub const ALL: [Tone; 5] = [
        Tone::FriendlyReminder,
        Tone::Professional,
        Tone::Firm,
        Tone::FinalNotice,
        Tone::ConcernedInquiry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::FriendlyReminder => "friendly_reminder",
            Tone::Professional => "professional",
            Tone::Firm => "firm",
            Tone::FinalNotice => "final_notice",
            Tone::ConcernedInquiry => "concerned_inquiry",
        }
    }

    /// Position on the escalation ladder.
    pub fn severity(&self) -> Severity {
        match self {
            Tone::ConcernedInquiry => Severity::CONCERNED_INQUIRY,
            Tone::FriendlyReminder => Severity::FRIENDLY_REMINDER,
            Tone::Professional => Severity::PROFESSIONAL,
            Tone::Firm => Severity::FIRM,
            Tone::FinalNotice => Severity::FINAL_NOTICE,
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownLabel {
                kind: "tone",
                value: s.to_string(),
            })
    }
}

/// Kind of outbound action a caller wants to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SendEmail,
    CreateCase,
    Escalate,
    CloseCase,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::SendEmail => "send_email",
            ActionKind::CreateCase => "create_case",
            ActionKind::Escalate => "escalate",
            ActionKind::CloseCase => "close_case",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action proposed for gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedAction {
    pub action: ActionKind,

    #[serde(default)]
    pub tone: Option<Tone>,
}

impl ProposedAction {
    pub fn new(action: ActionKind) -> Self {
        Self { action, tone: None }
    }

    pub fn email(tone: Tone) -> Self {
        Self {
            action: ActionKind::SendEmail,
            tone: Some(tone),
        }
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = Some(tone);
        self
    }

    /// Severity of this action on the escalation ladder.
    ///
    /// Emails take the severity of their tone (professional when unset);
    /// non-contact actions sit at the bottom; `escalate` sits above every tone.
    pub fn severity(&self) -> Severity {
        match self.action {
            ActionKind::SendEmail => self
                .tone
                .map(|t| t.severity())
                .unwrap_or(Severity::PROFESSIONAL),
            ActionKind::Escalate => Severity::ESCALATION,
            ActionKind::CreateCase | ActionKind::CloseCase => Severity::NON_CONTACT,
        }
    }

    /// Whether the action stays acceptable while the party reports hardship.
    pub fn is_hardship_appropriate(&self) -> bool {
        match self.action {
            ActionKind::CloseCase => true,
            ActionKind::SendEmail | ActionKind::CreateCase => {
                self.tone == Some(Tone::ConcernedInquiry)
            }
            ActionKind::Escalate => false,
        }
    }

    /// Human label used in gate reasons, e.g. `send_email (firm)`.
    pub fn describe(&self) -> String {
        match self.tone {
            Some(tone) => format!("{} ({})", self.action, tone),
            None => self.action.to_string(),
        }
    }
}

/// A rung on the escalation ladder. Total order; higher is harsher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Severity(pub u8);

impl Severity {
    pub const NON_CONTACT: Severity = Severity(0);
    pub const CONCERNED_INQUIRY: Severity = Severity(0);
    pub const FRIENDLY_REMINDER: Severity = Severity(1);
    pub const PROFESSIONAL: Severity = Severity(2);
    pub const FIRM: Severity = Severity(3);
    pub const FINAL_NOTICE: Severity = Severity(4);
    pub const ESCALATION: Severity = Severity(5);

    /// One rung up, saturating at the top of the ladder.
    pub fn next(self) -> Severity {
        Severity(self.0.saturating_add(1).min(Self::ESCALATION.0))
    }

    pub fn label(&self) -> &'static str {
        match self.0 {
            0 => "concerned_inquiry",
            1 => "friendly_reminder",
            2 => "professional",
            3 => "firm",
            4 => "final_notice",
            _ => "escalate",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.label())
    }
}

/// What a generated draft is trying to achieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    FollowUp,
    PromiseReminder,
    Escalation,
    InitialContact,
}

impl Objective {
    pub const ALL: [Objective; 4] = [
        Objective::FollowUp,
        Objective::PromiseReminder,
        Objective::Escalation,
        Objective::InitialContact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Objective::FollowUp => "follow_up",
            Objective::PromiseReminder => "promise_reminder",
            Objective::Escalation => "escalation",
            Objective::InitialContact => "initial_contact",
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Objective {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|o| o.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownLabel {
                kind: "objective",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!(" hardship ".parse::<Category>().unwrap(), Category::Hardship);
        assert_eq!("promise_to_pay".parse::<Category>().unwrap(), Category::PromiseToPay);
        assert!("HOSTILITY".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_canonical_is_exact() {
        assert_eq!(Category::from_canonical("OUT_OF_OFFICE"), Some(Category::OutOfOffice));
        assert_eq!(Category::from_canonical("out_of_office"), None);
    }

    #[test]
    fn test_category_serde_uses_wire_labels() {
        let json = serde_json::to_string(&Category::AlreadyPaid).unwrap();
        assert_eq!(json, "\"ALREADY_PAID\"");
        for category in Category::ALL {
            let back: Category =
                serde_json::from_str(&format!("\"{}\"", category.as_str())).unwrap();
            assert_eq!(back, category);
        }
    }

    #[test]
    fn test_unknown_tone_names_value() {
        let err = "aggressive".parse::<Tone>().unwrap_err();
        assert_eq!(err.kind, "tone");
        assert!(err.to_string().contains("aggressive"));
    }

    #[test]
    fn test_action_severity_ladder() {
        assert_eq!(ProposedAction::new(ActionKind::SendEmail).severity(), Severity::PROFESSIONAL);
        assert_eq!(ProposedAction::email(Tone::FinalNotice).severity(), Severity::FINAL_NOTICE);
        assert_eq!(ProposedAction::new(ActionKind::Escalate).severity(), Severity::ESCALATION);
        assert_eq!(ProposedAction::new(ActionKind::CloseCase).severity(), Severity::NON_CONTACT);
        assert!(Severity::FIRM > Severity::PROFESSIONAL);
        assert_eq!(Severity::ESCALATION.next(), Severity::ESCALATION);
    }

    #[test]
    fn test_hardship_appropriate_actions() {
        assert!(ProposedAction::email(Tone::ConcernedInquiry).is_hardship_appropriate());
        assert!(ProposedAction::new(ActionKind::CloseCase).is_hardship_appropriate());
        assert!(!ProposedAction::email(Tone::Firm).is_hardship_appropriate());
        assert!(!ProposedAction::new(ActionKind::Escalate).is_hardship_appropriate());
    }
}
