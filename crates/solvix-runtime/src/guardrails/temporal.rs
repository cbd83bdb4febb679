//! `temporal_consistency`: dates named in a draft must be an obligation due
//! date or a recorded promise date.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use solvix_core::CaseContext;

use super::{Guardrail, GuardrailCheck, Severity};

lazy_static! {
    static ref DUE_DATES: Vec<Regex> = vec![
        Regex::new(r"(?i)\bdue\s+(?:on|by)\s+(\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{4}-\d{2}-\d{2})").unwrap(),
        Regex::new(r"(?i)\bdue\s+date\s*:?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{4}-\d{2}-\d{2})").unwrap(),
        Regex::new(
            r"(?i)\b(\d{1,2}(?:st|nd|rd|th)?\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s+\d{4})\b"
        )
        .unwrap(),
    ];

    static ref ORDINAL: Regex = Regex::new(r"(?i)(\d)(?:st|nd|rd|th)\b").unwrap();
}

const NUMERIC_FORMATS: [&str; 6] = [
    "%d/%m/%Y", "%d-%m-%Y", "%d/%m/%y", "%d-%m-%y", "%m/%d/%Y", "%Y-%m-%d",
];

const NAME: &str = "temporal_consistency";

pub struct TemporalConsistencyGuardrail;

impl Guardrail for TemporalConsistencyGuardrail {
    fn name(&self) -> &'static str {
        NAME
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn check(&self, draft: &str, context: &CaseContext) -> Vec<GuardrailCheck> {
        vec![check_due_dates(draft, context)]
    }
}

/// Every date the text could mean. `03/04/2025` yields both orders.
fn date_readings(text: &str) -> Vec<NaiveDate> {
    let cleaned = ORDINAL.replace_all(text.trim(), "$1");
    let mut readings: Vec<NaiveDate> = NUMERIC_FORMATS
        .iter()
        .chain(["%d %B %Y"].iter())
        .filter_map(|format| NaiveDate::parse_from_str(&cleaned, format).ok())
        .collect();
    readings.dedup();
    readings
}

fn check_due_dates(draft: &str, context: &CaseContext) -> GuardrailCheck {
    let known: Vec<NaiveDate> = context
        .obligations
        .iter()
        .map(|o| o.due_date)
        .chain(context.promises.iter().map(|p| p.promise_date))
        .collect();

    for pattern in DUE_DATES.iter() {
        for caps in pattern.captures_iter(draft) {
            let readings = date_readings(&caps[1]);
            if readings.is_empty() {
                continue;
            }
            let matches_known = readings
                .iter()
                .any(|date| known.iter().any(|k| (*date - *k).num_days().abs() <= 1));
            if !matches_known {
                let mut listed: Vec<String> = known.iter().map(|d| d.to_string()).collect();
                listed.sort();
                return GuardrailCheck::fail(
                    NAME,
                    Severity::High,
                    format!(
                        "Date {} not found in obligations or promises (known dates: {})",
                        caps[1].trim(),
                        if listed.is_empty() {
                            "none".to_string()
                        } else {
                            listed.join(", ")
                        }
                    ),
                );
            }
        }
    }

    GuardrailCheck::pass(NAME, Severity::High, "Dates validated")
}
