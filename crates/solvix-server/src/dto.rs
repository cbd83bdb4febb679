//! Request and response bodies.

use serde::{Deserialize, Serialize};
use solvix_core::{ActionKind, CaseContext, GateEvaluationResult, ProposedAction, Tone};
use solvix_runtime::{DraftRequest, EmailContent, ProviderDescriptor};

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyRequest {
    pub email: EmailContent,
    pub context: CaseContext,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateDraftRequest {
    pub context: CaseContext,

    #[serde(flatten)]
    pub draft: DraftRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateGatesRequest {
    pub context: CaseContext,
    pub proposed_action: ActionKind,

    #[serde(default)]
    pub proposed_tone: Option<Tone>,
}

impl EvaluateGatesRequest {
    pub fn action(&self) -> ProposedAction {
        proposed(self.proposed_action, self.proposed_tone)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateGatesBatchRequest {
    pub contexts: Vec<CaseContext>,
    pub proposed_action: ActionKind,

    #[serde(default)]
    pub proposed_tone: Option<Tone>,
}

impl EvaluateGatesBatchRequest {
    pub fn action(&self) -> ProposedAction {
        proposed(self.proposed_action, self.proposed_tone)
    }
}

fn proposed(action: ActionKind, tone: Option<Tone>) -> ProposedAction {
    ProposedAction { action, tone }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluateGatesBatchResponse {
    pub results: Vec<GateEvaluationResult>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: f64,
    pub llm_configured: bool,
    pub providers: Vec<ProviderDescriptor>,
}
