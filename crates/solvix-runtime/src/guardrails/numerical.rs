//! `numerical_consistency`: stated totals and days overdue must add up.

use lazy_static::lazy_static;
use regex::Regex;
use solvix_core::{CaseContext, ObligationStatus};

use super::{parse_figure, Guardrail, GuardrailCheck, Severity};

lazy_static! {
    static ref TOTALS: Vec<Regex> = vec![
        Regex::new(
            r"(?i)\btotal\s+(?:outstanding|amount|due|owed|balance)(?:\s+(?:is|of))?\s*:?\s*(?:[£$€]|(?:GBP|USD|EUR|AUD|CAD|NZD)\b)?\s*([\d,]+(?:\.\d{2})?)"
        )
        .unwrap(),
        Regex::new(
            r"(?i)\bowe(?:s|d)?\s+(?:us\s+)?(?:a\s+total\s+of\s+)?(?:[£$€]|(?:GBP|USD|EUR|AUD|CAD|NZD)\b)\s*([\d,]+(?:\.\d{2})?)"
        )
        .unwrap(),
        Regex::new(r"(?i)[£$€]\s*([\d,]+(?:\.\d{2})?)\s+(?:in\s+)?total\b").unwrap(),
        Regex::new(
            r"(?i)\bcombined\s+(?:balance|amount)\s+(?:of|is)\s+(?:[£$€]|(?:GBP|USD|EUR|AUD|CAD|NZD)\b)?\s*([\d,]+(?:\.\d{2})?)"
        )
        .unwrap(),
    ];

    static ref DAYS_OVERDUE: Vec<Regex> = vec![
        Regex::new(r"(?i)\b(\d+)\s+days?\s+(?:past\s+due|overdue|late)").unwrap(),
        Regex::new(r"(?i)\boverdue\s+(?:by|for)\s+(\d+)\s+days?").unwrap(),
    ];
}

const NAME: &str = "numerical_consistency";

pub struct NumericalConsistencyGuardrail;

impl Guardrail for NumericalConsistencyGuardrail {
    fn name(&self) -> &'static str {
        NAME
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn check(&self, draft: &str, context: &CaseContext) -> Vec<GuardrailCheck> {
        vec![check_totals(draft, context), check_days_overdue(draft, context)]
    }
}

fn check_totals(draft: &str, context: &CaseContext) -> GuardrailCheck {
    let actual = context.total_outstanding();

    let wrong = TOTALS
        .iter()
        .flat_map(|pattern| pattern.captures_iter(draft))
        .filter_map(|caps| parse_figure(&caps[1]))
        .find(|stated| (stated - actual).abs() > 0.01);

    match wrong {
        Some(stated) => GuardrailCheck::fail(
            NAME,
            Severity::Critical,
            format!("Stated total {stated:.2} does not match the outstanding total {actual:.2}"),
        ),
        None => GuardrailCheck::pass(NAME, Severity::Critical, "Totals validated"),
    }
}

/// Mentions within one day of an obligation's figure pass.
fn check_days_overdue(draft: &str, context: &CaseContext) -> GuardrailCheck {
    let known: Vec<i64> = context
        .obligations
        .iter()
        .filter(|o| o.status != ObligationStatus::Paid)
        .map(|o| i64::from(o.days_past_due))
        .collect();

    let wrong = DAYS_OVERDUE
        .iter()
        .flat_map(|pattern| pattern.captures_iter(draft))
        .filter_map(|caps| caps[1].parse::<i64>().ok())
        .filter(|days| *days > 0)
        .find(|days| !known.iter().any(|k| (days - k).abs() <= 1));

    match wrong {
        Some(days) => {
            let mut sorted = known.clone();
            sorted.sort_unstable();
            sorted.dedup();
            let listed: Vec<String> = sorted.iter().map(i64::to_string).collect();
            GuardrailCheck::fail(
                NAME,
                Severity::Critical,
                format!(
                    "{days} days overdue matches no invoice; invoices are {} days overdue",
                    if listed.is_empty() {
                        "not".to_string()
                    } else {
                        listed.join(", ")
                    }
                ),
            )
        }
        None => GuardrailCheck::pass(NAME, Severity::Critical, "Days overdue validated"),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::context;
    use super::*;

    #[test]
    fn test_correct_total_passes() {
        let ctx = context();
        for draft in [
            "The total outstanding is GBP 1,550.50.",
            "You owe us £1,550.50 across two invoices.",
            "That is £1,550.50 in total.",
            "A combined balance of 1550.50 remains.",
        ] {
            assert!(check_totals(draft, &ctx).passed, "{draft}");
        }
    }

    #[test]
    fn test_wrong_total_fails() {
        let check = check_totals("The total due: £1,600.00", &context());
        assert!(!check.passed);
        assert!(check.message.contains("1600.00"));
        assert!(check.message.contains("1550.50"));
    }

    #[test]
    fn test_owe_without_currency_is_not_a_total() {
        assert!(check_totals("You owed 3 invoices last quarter", &context()).passed);
    }

    #[test]
    fn test_days_overdue_tolerates_one_day() {
        let ctx = context();
        assert!(check_days_overdue("INV-1001 is 46 days overdue", &ctx).passed);
        assert!(check_days_overdue("overdue by 28 days", &ctx).passed);

        let check = check_days_overdue("now 90 days past due", &ctx);
        assert!(!check.passed);
        assert!(check.message.contains("28, 45"));
    }
}
