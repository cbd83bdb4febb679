//! Embedded JSON Schema for structured classification answers.

use std::sync::OnceLock;

/// Schema text, embedded at compile time.
const CLASSIFICATION_SCHEMA_JSON: &str =
    include_str!("../../schemas/classification_response.schema.json");

static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn validator() -> Result<&'static jsonschema::Validator, &'static str> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(CLASSIFICATION_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {e}"))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {e}"))
    });

    result.as_ref().map_err(String::as_str)
}

/// Whether `value` has the shape of a classification answer.
///
/// A schema that fails to load rejects everything; the caller then falls
/// back to plain-text matching.
pub fn is_classification_shape(value: &serde_json::Value) -> bool {
    match validator() {
        Ok(v) => v.is_valid(value),
        Err(e) => {
            tracing::error!(error = e, "classification schema unavailable");
            false
        }
    }
}

/// Validation messages for diagnostics.
pub fn classification_shape_errors(value: &serde_json::Value) -> Vec<String> {
    match validator() {
        Ok(v) => v
            .iter_errors(value)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect(),
        Err(e) => vec![e.to_string()],
    }
}
