//! Draft generation.
//!
//! Category, tone and objective arrive as caller strings and are parsed
//! before anything else happens, so an unknown value never costs a
//! provider call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use solvix_core::{CaseContext, Category, Objective, Tone};

use crate::client::LlmRequest;
use crate::coerce::coerce_draft;
use crate::error::EngineError;
use crate::guardrails::{GuardrailPipeline, GuardrailValidation};
use crate::orchestrator::LlmOrchestrator;
use crate::prompts::{draft_system_prompt, render_draft_prompt, DraftPromptInput};

/// Sampling temperature for drafts.
pub const DRAFT_TEMPERATURE: f32 = 0.7;

pub const MAX_CUSTOM_INSTRUCTIONS_CHARS: usize = 1000;

/// Corrected drafts requested after a blocking guardrail failure.
pub const MAX_GUARDRAIL_RETRIES: u32 = 2;

lazy_static! {
    static ref INJECTION_PATTERN: Regex = Regex::new(
        r"(?i)\b(ignore\s+previous|ignore\s+above|disregard|system\s+prompt|forget\s+your\s+instructions|new\s+instructions|you\s+are\s+now|act\s+as|pretend\s+to\s+be|override|bypass)\b"
    ).unwrap();
}

/// A draft request as received from a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRequest {
    pub category: String,

    #[serde(default = "default_tone")]
    pub tone: String,

    #[serde(default)]
    pub objective: Option<String>,

    #[serde(default)]
    pub custom_instructions: Option<String>,
}

fn default_tone() -> String {
    Tone::Professional.as_str().to_string()
}

impl DraftRequest {
    pub fn new(category: impl Into<String>, tone: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            tone: tone.into(),
            objective: None,
            custom_instructions: None,
        }
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.custom_instructions = Some(instructions.into());
        self
    }

    /// Parse and check every field. Tone is checked first.
    pub fn parse(&self) -> Result<DraftSpec, EngineError> {
        let tone: Tone = self
            .tone
            .parse()
            .map_err(|_| EngineError::InvalidTone(self.tone.clone()))?;
        let category: Category = self
            .category
            .parse()
            .map_err(|_| EngineError::InvalidCategory(self.category.clone()))?;
        let objective = self
            .objective
            .as_deref()
            .filter(|o| !o.trim().is_empty())
            .map(|o| {
                o.parse::<Objective>()
                    .map_err(|_| EngineError::InvalidObjective(o.to_string()))
            })
            .transpose()?;

        let custom_instructions = match self.custom_instructions.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => {
                check_instructions(text)?;
                Some(text.to_string())
            }
        };

        Ok(DraftSpec {
            category,
            tone,
            objective,
            custom_instructions,
        })
    }
}

fn check_instructions(text: &str) -> Result<(), EngineError> {
    let len = text.chars().count();
    if len > MAX_CUSTOM_INSTRUCTIONS_CHARS {
        return Err(EngineError::Validation(format!(
            "custom_instructions must be at most {MAX_CUSTOM_INSTRUCTIONS_CHARS} characters, got {len}"
        )));
    }
    if let Some(found) = INJECTION_PATTERN.find(text) {
        tracing::warn!(pattern = found.as_str(), "rejected custom instructions");
        return Err(EngineError::Validation(
            "custom_instructions contains a disallowed instruction pattern".to_string(),
        ));
    }
    Ok(())
}

/// A fully parsed draft request.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftSpec {
    pub category: Category,
    pub tone: Tone,
    pub objective: Option<Objective>,
    pub custom_instructions: Option<String>,
}

/// A generated draft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    pub body: String,

    pub tone: Tone,

    pub category: Category,

    /// Invoice numbers from the context that appear in the body.
    pub invoices_referenced: Vec<String>,

    /// Summed over every attempt, corrections included.
    pub tokens_used: u32,

    pub provider: String,

    pub guardrail_validation: GuardrailValidation,
}

/// Invoice numbers of `context` that occur in `body`, in context order.
pub fn invoices_referenced(context: &CaseContext, body: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for obligation in &context.obligations {
        let number = obligation.invoice_number.trim();
        if !number.is_empty() && body.contains(number) && !found.iter().any(|n| n == number) {
            found.push(number.to_string());
        }
    }
    found
}

/// Generates collection email drafts through the orchestrator.
#[derive(Debug, Clone)]
pub struct Generator {
    orchestrator: Arc<LlmOrchestrator>,
    guardrails: Arc<GuardrailPipeline>,
}

impl Generator {
    pub fn new(orchestrator: Arc<LlmOrchestrator>) -> Self {
        Self::with_guardrails(orchestrator, GuardrailPipeline::default())
    }

    pub fn with_guardrails(
        orchestrator: Arc<LlmOrchestrator>,
        guardrails: GuardrailPipeline,
    ) -> Self {
        Self {
            orchestrator,
            guardrails: Arc::new(guardrails),
        }
    }

    /// Build the request without calling any provider.
    pub fn build_request(context: &CaseContext, spec: &DraftSpec, now: DateTime<Utc>) -> LlmRequest {
        let input = DraftPromptInput {
            tone: spec.tone,
            objective: spec.objective,
            custom_instructions: spec.custom_instructions.as_deref(),
            now,
        };
        LlmRequest::new(
            draft_system_prompt(spec.category, spec.tone),
            render_draft_prompt(context, &input),
        )
        .with_temperature(DRAFT_TEMPERATURE)
        .json()
    }

    /// Generate a draft for `request`.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidTone`], [`EngineError::InvalidCategory`],
    /// [`EngineError::InvalidObjective`] and validation errors are returned
    /// before any provider call. Provider failures mirror
    /// [`crate::Classifier::classify`].
    pub async fn generate(
        &self,
        context: &CaseContext,
        request: &DraftRequest,
    ) -> Result<DraftResult, EngineError> {
        let spec = request.parse()?;
        self.generate_spec(context, &spec).await
    }

    /// Generate from an already parsed request.
    pub async fn generate_spec(
        &self,
        context: &CaseContext,
        spec: &DraftSpec,
    ) -> Result<DraftResult, EngineError> {
        let now = Utc::now();
        context.validate(now)?;

        let mut request = Self::build_request(context, spec, now);
        let base_prompt = request.user.clone();
        let mut tokens_used = 0;
        let mut attempt = 0;

        let (draft, report, provider) = loop {
            attempt += 1;
            let response = self.orchestrator.run(&request).await?;
            tokens_used += response.usage.total();
            let draft = coerce_draft(&response.content)?;
            let report = self.guardrails.validate(&draft.body, context);

            if !report.should_block() || attempt > MAX_GUARDRAIL_RETRIES {
                break (draft, report, response.provider);
            }
            tracing::info!(
                party_id = %context.party.party_id,
                attempt,
                failed = ?report.blocking_guardrails(),
                "draft failed guardrails, requesting a correction"
            );
            request.user = format!("{base_prompt}{}", report.retry_feedback());
        };

        let validation = report.summary(attempt);
        if validation.blocking_failures.is_empty() {
            tracing::debug!(attempts = attempt, warnings = ?validation.warnings, "draft passed guardrails");
        } else {
            tracing::warn!(
                party_id = %context.party.party_id,
                attempts = attempt,
                failed = ?validation.blocking_failures,
                "returning draft that still fails guardrails"
            );
        }

        let referenced = invoices_referenced(context, &draft.body);

        tracing::info!(
            party_id = %context.party.party_id,
            category = spec.category.as_str(),
            tone = spec.tone.as_str(),
            invoices_referenced = referenced.len(),
            provider = %provider,
            tokens = tokens_used,
            attempts = attempt,
            "draft generated"
        );

        Ok(DraftResult {
            subject: draft.subject,
            body: draft.body,
            tone: spec.tone,
            category: spec.category,
            invoices_referenced: referenced,
            tokens_used,
            provider,
            guardrail_validation: validation,
        })
    }
}
