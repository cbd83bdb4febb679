//! # solvix-runtime
//!
//! LLM-backed half of the Solvix collections engine.
//!
//! This crate classifies inbound emails and generates collection drafts by
//! calling one or more LLM providers. Gate evaluation stays in
//! `solvix-core` and never reaches this crate's network layer; [`Engine`]
//! simply exposes all three operations behind one handle.
//!
//! ## Layers
//!
//! - [`providers`]: one HTTP attempt per call (Gemini, OpenAI, Anthropic)
//! - [`client`]: timeout, retry and backoff for one provider
//! - [`orchestrator`]: ordered fallback across providers
//! - [`coerce`]: raw text to typed values, rejecting unknown labels
//! - [`classifier`] and [`generator`]: prompt assembly and result shaping
//! - [`guardrails`]: checks a draft against the context, asking for a
//!   corrected draft when it invents figures
//!
//! ## Example
//!
//! ```rust,ignore
//! use solvix_runtime::{Engine, EmailContent, RuntimeConfig};
//!
//! let config = RuntimeConfig::load(None)?;
//! let engine = Engine::from_config(&config);
//!
//! let result = engine.classify(&context, &email).await?;
//! println!("{} ({:.2})", result.category, result.confidence);
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use solvix_core::{
    CaseContext, GateEvaluationResult, GateEvaluator, GatePolicy, ProposedAction,
};

pub mod classifier;
pub mod client;
pub mod coerce;
pub mod config;
pub mod error;
pub mod generator;
pub mod guardrails;
pub mod orchestrator;
pub mod prompts;
pub mod providers;

pub use classifier::{ClassificationResult, Classifier, EmailContent};
pub use client::{BackoffSettings, ClientSettings, LlmRequest, ProviderClient};
pub use coerce::{
    coerce_classification, coerce_draft, CoerceError, ExtractedData, DEFAULT_CONFIDENCE,
};
pub use config::{ConfigError, RuntimeConfig};
pub use error::{EngineError, ErrorKind};
pub use generator::{DraftRequest, DraftResult, DraftSpec, Generator, MAX_GUARDRAIL_RETRIES};
pub use guardrails::{
    Guardrail, GuardrailCheck, GuardrailPipeline, GuardrailReport, GuardrailValidation, Severity,
};
pub use orchestrator::{LlmOrchestrator, LlmResponse, ProviderDescriptor};
pub use providers::{LlmProvider, ProviderError, ProviderKind};

/// All three operations behind one shareable handle.
pub struct Engine {
    orchestrator: Arc<LlmOrchestrator>,
    classifier: Classifier,
    generator: Generator,
    gates: GateEvaluator,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("providers", &self.orchestrator.describe())
            .field("gate_policy", self.gates.policy())
            .finish()
    }
}

impl Engine {
    pub fn new(orchestrator: LlmOrchestrator, policy: GatePolicy) -> Self {
        let orchestrator = Arc::new(orchestrator);
        Self {
            classifier: Classifier::new(Arc::clone(&orchestrator)),
            generator: Generator::new(Arc::clone(&orchestrator)),
            gates: GateEvaluator::new(policy),
            orchestrator,
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(LlmOrchestrator::from_config(config), config.gates.clone())
    }

    /// Whether any provider has credentials. Makes no network call.
    pub fn is_llm_configured(&self) -> bool {
        self.orchestrator.is_configured()
    }

    pub fn providers(&self) -> Vec<ProviderDescriptor> {
        self.orchestrator.describe()
    }

    pub fn gate_policy(&self) -> &GatePolicy {
        self.gates.policy()
    }

    pub async fn classify(
        &self,
        context: &CaseContext,
        email: &EmailContent,
    ) -> Result<ClassificationResult, EngineError> {
        self.classifier.classify(context, email).await
    }

    pub async fn generate_draft(
        &self,
        context: &CaseContext,
        request: &DraftRequest,
    ) -> Result<DraftResult, EngineError> {
        self.generator.generate(context, request).await
    }

    /// Evaluate gates against the wall clock.
    pub fn evaluate_gates(
        &self,
        context: &CaseContext,
        action: &ProposedAction,
    ) -> Result<GateEvaluationResult, EngineError> {
        self.evaluate_gates_at(context, action, Utc::now())
    }

    pub fn evaluate_gates_at(
        &self,
        context: &CaseContext,
        action: &ProposedAction,
        now: DateTime<Utc>,
    ) -> Result<GateEvaluationResult, EngineError> {
        Ok(self.gates.evaluate_at(context, action, now)?)
    }

    /// Evaluate up to [`solvix_core::MAX_BATCH_SIZE`] contexts with one `now`.
    pub fn evaluate_gates_batch(
        &self,
        contexts: &[CaseContext],
        action: &ProposedAction,
    ) -> Result<Vec<GateEvaluationResult>, EngineError> {
        Ok(self.gates.evaluate_batch(contexts, action, Utc::now())?)
    }
}
