//! `factual_grounding`: invoice numbers and amounts must come from the context.

use lazy_static::lazy_static;
use regex::Regex;
use solvix_core::{CaseContext, ObligationStatus};

use super::{list_amounts, parse_figure, Guardrail, GuardrailCheck, Severity};

lazy_static! {
    static ref INVOICE_REFS: Vec<Regex> = vec![
        Regex::new(r"(?i)\bINV[-\s]?(\d+)").unwrap(),
        Regex::new(r"(?i)\binvoice\s*#?\s*(\d+)").unwrap(),
        Regex::new(r"(?i)\binvoice\s+number\s*:?\s*([A-Z0-9-]*\d[A-Z0-9-]*)").unwrap(),
        Regex::new(r"#(\d{4,})").unwrap(),
    ];

    static ref AMOUNTS: Vec<Regex> = vec![
        Regex::new(r"[£$€]\s*([\d,]+(?:\.\d{2})?)").unwrap(),
        Regex::new(r"([\d,]+(?:\.\d{2})?)\s*(?:GBP|USD|EUR|AUD|CAD|NZD)\b").unwrap(),
        Regex::new(r"\b(?:GBP|USD|EUR|AUD|CAD|NZD)\s*([\d,]+(?:\.\d{2})?)").unwrap(),
    ];

    static ref DIGITS: Regex = Regex::new(r"\d+").unwrap();
}

const NAME: &str = "factual_grounding";

pub struct FactualGroundingGuardrail;

impl Guardrail for FactualGroundingGuardrail {
    fn name(&self) -> &'static str {
        NAME
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn check(&self, draft: &str, context: &CaseContext) -> Vec<GuardrailCheck> {
        vec![check_invoices(draft, context), check_amounts(draft, context)]
    }
}

fn check_invoices(draft: &str, context: &CaseContext) -> GuardrailCheck {
    let known: Vec<String> = context
        .obligations
        .iter()
        .map(|o| o.invoice_number.trim().to_uppercase())
        .filter(|n| !n.is_empty())
        .collect();
    let known_digits: Vec<&str> = known
        .iter()
        .filter_map(|n| DIGITS.find(n).map(|m| m.as_str()))
        .collect();

    let mut unknown: Vec<String> = Vec::new();
    for pattern in INVOICE_REFS.iter() {
        for caps in pattern.captures_iter(draft) {
            let token = caps[1].to_uppercase();
            let grounded = known.iter().any(|n| n.contains(&token))
                || known_digits.contains(&token.as_str());
            let mention = caps[0].trim().to_string();
            if !grounded && !unknown.contains(&mention) {
                unknown.push(mention);
            }
        }
    }

    if unknown.is_empty() {
        GuardrailCheck::pass(NAME, Severity::Critical, "All invoice numbers validated")
    } else {
        GuardrailCheck::fail(
            NAME,
            Severity::Critical,
            format!(
                "Invoice numbers not found in context: {}. Valid invoices: {}",
                unknown.join(", "),
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            ),
        )
    }
}

fn check_amounts(draft: &str, context: &CaseContext) -> GuardrailCheck {
    let mut known: Vec<f64> = context
        .obligations
        .iter()
        .filter(|o| o.status != ObligationStatus::Paid)
        .map(|o| o.amount_due)
        .collect();
    known.extend(context.promises.iter().filter_map(|p| p.amount));
    known.push(context.total_outstanding());

    let grounded = |amount: f64| {
        known
            .iter()
            .any(|k| (amount - k).abs() < 0.01 || amount == k.trunc())
    };

    let mut unknown: Vec<f64> = Vec::new();
    for pattern in AMOUNTS.iter() {
        for caps in pattern.captures_iter(draft) {
            let Some(amount) = parse_figure(&caps[1]) else {
                continue;
            };
            if !grounded(amount) && !unknown.contains(&amount) {
                unknown.push(amount);
            }
        }
    }

    if unknown.is_empty() {
        GuardrailCheck::pass(NAME, Severity::Critical, "All monetary amounts validated")
    } else {
        GuardrailCheck::fail(
            NAME,
            Severity::Critical,
            format!(
                "Amounts not found in context: {}. Valid amounts: {}",
                list_amounts(&unknown),
                list_amounts(&known)
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::context;
    use super::*;

    #[test]
    fn test_known_invoice_forms_accepted() {
        let ctx = context();
        for draft in [
            "Regarding INV-1001 and INV 1002.",
            "invoice #1001 is overdue",
            "Invoice number: INV-1002",
            "Reference #1001",
            "Quote the invoice number in your reply",
        ] {
            assert!(check_invoices(draft, &ctx).passed, "{draft}");
        }
    }

    #[test]
    fn test_invented_invoice_rejected() {
        let check = check_invoices("Your invoice INV-4242 remains unpaid.", &context());
        assert!(!check.passed);
        assert!(check.message.contains("INV-4242"));
        assert!(check.message.contains("INV-1001, INV-1002"));
    }

    #[test]
    fn test_amounts_match_lines_total_or_whole_units() {
        let ctx = context();
        assert!(check_amounts("£1,200.00 plus £350.50, GBP 1,550.50 in all", &ctx).passed);
        assert!(check_amounts("roughly 1200 GBP", &ctx).passed);
        assert!(check_amounts("No figures at all", &ctx).passed);

        let check = check_amounts("A balance of £999.99 remains", &ctx);
        assert!(!check.passed);
        assert!(check.message.contains("999.99"));
    }

    #[test]
    fn test_paid_invoices_are_not_valid_amounts() {
        let mut ctx = context();
        ctx.obligations[1].status = ObligationStatus::Paid;
        assert!(!check_amounts("£350.50 is due", &ctx).passed);
        assert!(check_amounts("£1,200.00 is due", &ctx).passed);
    }
}
