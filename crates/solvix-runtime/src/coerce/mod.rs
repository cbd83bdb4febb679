//! Response coercion.
//!
//! Turns raw provider text into typed values. Classification answers are
//! read from a JSON object when one is present and valid, otherwise from
//! plain text. A label outside the taxonomy is always rejected; no default
//! category is ever substituted.
//!
//! ## Matching order (classification)
//!
//! | Step | Source                                   | Match rule                        |
//! |------|------------------------------------------|-----------------------------------|
//! | 1    | first balanced `{...}` passing the schema | `category` or `classification`    |
//! | 2    | `Category: X` label line                  | case-insensitive, trimmed         |
//! | 3    | whole response                            | case-insensitive, trimmed         |
//! | 4    | earliest `UPPER_SNAKE` token              | exact canonical spelling          |

mod schema;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use solvix_core::Category;

pub use schema::{classification_shape_errors, is_classification_shape};

/// Confidence used when the provider gives none.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Longest raw text kept on an error.
const MAX_RAW_LEN: usize = 2000;

lazy_static! {
    static ref FENCE_LINE: Regex = Regex::new(r"(?m)^[ \t]*```[\w-]*[ \t]*$\n?").unwrap();

    static ref LABEL_LINE: Regex = Regex::new(
        r#"(?im)^[\s*_>#-]*(?:category|classification)[\s*_]*[:=][\s*_"'`]*([A-Za-z][A-Za-z _-]*?)[\s*_"'`.]*$"#
    ).unwrap();

    static ref CONFIDENCE_LINE: Regex = Regex::new(
        r"(?im)^[\s*_>#-]*confidence[\s*_]*[:=][\s*_]*([0-9]*\.?[0-9]+)\s*(%)?"
    ).unwrap();

    static ref RATIONALE_LINE: Regex = Regex::new(
        r"(?im)^[\s*_>#-]*(?:rationale|reasoning)[\s*_]*[:=][\s*_]*(.+?)\s*$"
    ).unwrap();

    static ref CANONICAL_TOKEN: Regex = Regex::new(r"\b[A-Z][A-Z_]*[A-Z]\b").unwrap();

    static ref BLANK_RUN: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Coercion failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoerceError {
    #[error("no known category in provider response")]
    Unrecognized { raw: String },

    #[error("provider returned an empty draft")]
    EmptyDraft,
}

impl CoerceError {
    fn unrecognized(raw: &str) -> Self {
        let raw = if raw.len() > MAX_RAW_LEN {
            let mut end = MAX_RAW_LEN;
            while !raw.is_char_boundary(end) {
                end -= 1;
            }
            &raw[..end]
        } else {
            raw
        };
        CoerceError::Unrecognized {
            raw: raw.to_string(),
        }
    }
}

/// Facts the provider pulled out of the email.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promise_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub promise_amount: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_contact: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_email: Option<String>,
}

impl ExtractedData {
    pub fn is_empty(&self) -> bool {
        self == &ExtractedData::default()
    }

    /// Read leniently; unparseable fields are dropped.
    fn from_json(map: &Map<String, Value>) -> Self {
        let text = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            promise_date: text("promise_date")
                .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            promise_amount: map.get("promise_amount").and_then(number).filter(|n| *n >= 0.0),
            dispute_type: text("dispute_type"),
            dispute_reason: text("dispute_reason"),
            redirect_contact: text("redirect_contact"),
            redirect_email: text("redirect_email"),
        }
    }
}

/// A classification read from provider output.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercedClassification {
    pub category: Category,
    pub confidence: f64,
    pub rationale: Option<String>,
    pub extracted_data: Option<ExtractedData>,
}

/// A draft read from provider output.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercedDraft {
    pub subject: Option<String>,
    pub body: String,
}

fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

/// Clamp into [0, 1]. Non-finite input gets the default.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        DEFAULT_CONFIDENCE
    }
}

fn json_confidence(value: Option<&Value>) -> f64 {
    let Some(value) = value else {
        return DEFAULT_CONFIDENCE;
    };
    let percent = matches!(value, Value::String(s) if s.trim_end().ends_with('%'));
    match number(value) {
        Some(n) if percent => clamp_confidence(n / 100.0),
        Some(n) => clamp_confidence(n),
        None => DEFAULT_CONFIDENCE,
    }
}

fn strip_fences(raw: &str) -> String {
    FENCE_LINE.replace_all(raw, "").into_owned()
}

/// Byte ranges of top-level balanced `{...}` spans, in order.
fn object_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        spans.push(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    spans
}

/// First balanced span that parses as a JSON object.
fn first_json_object(text: &str) -> Option<Map<String, Value>> {
    object_spans(text)
        .into_iter()
        .find_map(|span| match serde_json::from_str::<Value>(span) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
}

/// Label text in free form, e.g. "promise to pay" or "Already-Paid".
fn parse_label(text: &str) -> Option<Category> {
    let normalized: String = text
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();
    normalized.parse().ok()
}

fn structured(text: &str) -> Option<Result<CoercedClassification, CoerceError>> {
    let candidate = object_spans(text).into_iter().find_map(|span| {
        let value: Value = serde_json::from_str(span).ok()?;
        if is_classification_shape(&value) {
            Some(value)
        } else {
            tracing::debug!(errors = ?classification_shape_errors(&value), "skipping JSON object");
            None
        }
    })?;
    let Value::Object(map) = candidate else {
        return None;
    };

    let label = map
        .get("category")
        .or_else(|| map.get("classification"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    let Some(category) = parse_label(label) else {
        // The provider answered in structured form with an unknown label.
        return Some(Err(CoerceError::unrecognized(text)));
    };

    let rationale = map
        .get("rationale")
        .or_else(|| map.get("reasoning"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let extracted_data = map
        .get("extracted_data")
        .and_then(Value::as_object)
        .map(ExtractedData::from_json)
        .filter(|data| !data.is_empty());

    Some(Ok(CoercedClassification {
        category,
        confidence: json_confidence(map.get("confidence")),
        rationale,
        extracted_data,
    }))
}

fn plain(text: &str) -> Option<CoercedClassification> {
    let category = LABEL_LINE
        .captures_iter(text)
        .find_map(|caps| parse_label(&caps[1]))
        .or_else(|| parse_label(text))
        .or_else(|| {
            CANONICAL_TOKEN
                .find_iter(text)
                .find_map(|m| Category::from_canonical(m.as_str()))
        })?;

    let confidence = CONFIDENCE_LINE
        .captures(text)
        .and_then(|caps| {
            let value: f64 = caps[1].parse().ok()?;
            Some(if caps.get(2).is_some() {
                value / 100.0
            } else {
                value
            })
        })
        .map(clamp_confidence)
        .unwrap_or(DEFAULT_CONFIDENCE);

    let rationale = RATIONALE_LINE
        .captures(text)
        .map(|caps| caps[1].to_string())
        .filter(|s| !s.is_empty());

    Some(CoercedClassification {
        category,
        confidence,
        rationale,
        extracted_data: None,
    })
}

/// Coerce provider output into one of the 13 categories.
///
/// # Errors
///
/// [`CoerceError::Unrecognized`] carrying the raw text when no known label
/// can be found.
pub fn coerce_classification(raw: &str) -> Result<CoercedClassification, CoerceError> {
    let text = strip_fences(raw);

    if let Some(result) = structured(&text) {
        return result;
    }

    match plain(&text) {
        Some(found) => Ok(found),
        None => {
            tracing::warn!(raw_len = raw.len(), "provider response named no known category");
            Err(CoerceError::unrecognized(raw))
        }
    }
}

/// Trim trailing spaces per line, collapse blank runs, trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    let joined = text
        .replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUN.replace_all(&joined, "\n\n").trim().to_string()
}

/// Coerce provider output into a draft body and optional subject.
///
/// # Errors
///
/// [`CoerceError::EmptyDraft`] when the body is blank after normalization.
pub fn coerce_draft(raw: &str) -> Result<CoercedDraft, CoerceError> {
    let text = strip_fences(raw);

    let (subject, body) = match first_json_object(&text) {
        Some(map) if map.get("body").is_some_and(Value::is_string) => {
            let body = map.get("body").and_then(Value::as_str).unwrap_or_default();
            let subject = map
                .get("subject")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            (subject, body.to_string())
        }
        _ => (None, text),
    };

    let body = normalize_whitespace(&body);
    if body.is_empty() {
        return Err(CoerceError::EmptyDraft);
    }
    Ok(CoercedDraft { subject, body })
}
