//! Email classification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solvix_core::{CaseContext, Category};

use crate::client::LlmRequest;
use crate::coerce::{coerce_classification, ExtractedData};
use crate::error::EngineError;
use crate::orchestrator::LlmOrchestrator;
use crate::prompts::{render_classification_prompt, CLASSIFY_SYSTEM_PROMPT};

/// Sampling temperature for classification.
pub const CLASSIFY_TEMPERATURE: f32 = 0.2;

pub const MAX_SUBJECT_CHARS: usize = 500;
pub const MAX_BODY_CHARS: usize = 50_000;
pub const MAX_FROM_ADDRESS_CHARS: usize = 320;
pub const MAX_FROM_NAME_CHARS: usize = 200;

/// The inbound email to classify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
    pub from_address: String,

    #[serde(default)]
    pub from_name: Option<String>,

    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), EngineError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(EngineError::Validation(format!(
            "{field} must be {min} to {max} characters, got {len}"
        )));
    }
    Ok(())
}

impl EmailContent {
    pub fn validate(&self) -> Result<(), EngineError> {
        check_len("email.subject", &self.subject, 1, MAX_SUBJECT_CHARS)?;
        check_len("email.body", &self.body, 1, MAX_BODY_CHARS)?;
        check_len("email.from_address", &self.from_address, 1, MAX_FROM_ADDRESS_CHARS)?;
        if let Some(name) = &self.from_name {
            check_len("email.from_name", name, 0, MAX_FROM_NAME_CHARS)?;
        }
        Ok(())
    }
}

/// One classified email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub category: Category,
    pub confidence: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<ExtractedData>,

    pub tokens_used: u32,

    /// Provider that answered.
    pub provider: String,
}

/// Classifies inbound emails through the orchestrator.
#[derive(Debug, Clone)]
pub struct Classifier {
    orchestrator: Arc<LlmOrchestrator>,
}

impl Classifier {
    pub fn new(orchestrator: Arc<LlmOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Build the request without calling any provider.
    pub fn build_request(context: &CaseContext, email: &EmailContent) -> LlmRequest {
        LlmRequest::new(
            CLASSIFY_SYSTEM_PROMPT,
            render_classification_prompt(context, email),
        )
        .with_temperature(CLASSIFY_TEMPERATURE)
        .json()
    }

    /// Classify `email` in the light of `context`.
    ///
    /// # Errors
    ///
    /// Validation errors are returned before any provider call.
    /// [`EngineError::LlmNotConfigured`], [`EngineError::LlmUnavailable`]
    /// and [`EngineError::UnrecognizedClassification`] pass through
    /// unchanged; no fallback category is ever invented.
    pub async fn classify(
        &self,
        context: &CaseContext,
        email: &EmailContent,
    ) -> Result<ClassificationResult, EngineError> {
        context.validate(Utc::now())?;
        email.validate()?;

        let request = Self::build_request(context, email);
        let response = self.orchestrator.run(&request).await?;
        let coerced = coerce_classification(&response.content)?;

        tracing::info!(
            party_id = %context.party.party_id,
            category = coerced.category.as_str(),
            confidence = coerced.confidence,
            provider = %response.provider,
            tokens = response.usage.total(),
            "email classified"
        );

        Ok(ClassificationResult {
            category: coerced.category,
            confidence: coerced.confidence,
            rationale: coerced.rationale,
            extracted_data: coerced.extracted_data,
            tokens_used: response.usage.total(),
            provider: response.provider,
        })
    }
}
