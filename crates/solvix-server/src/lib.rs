//! HTTP surface for the Solvix collections engine.
//!
//! Routes:
//!
//! - `POST /classify`
//! - `POST /generate-draft`
//! - `POST /evaluate-gates`
//! - `POST /evaluate-gates/batch`
//! - `GET /health`
//!
//! LLM-backed handlers run on a detached task so a dropped connection does
//! not cancel an in-flight provider call. Every response carries an
//! `x-request-id` header.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use solvix_core::GateEvaluationResult;
use solvix_runtime::{ClassificationResult, DraftResult, Engine, EngineError};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod dto;
pub mod error;

use dto::{
    ClassifyRequest, EvaluateGatesBatchRequest, EvaluateGatesBatchResponse,
    EvaluateGatesRequest, GenerateDraftRequest, HealthResponse,
};
use error::ApiError;

#[derive(Debug, Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    started: Instant,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
            started: Instant::now(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/classify", post(classify))
        .route("/generate-draft", post(generate_draft))
        .route("/evaluate-gates", post(evaluate_gates))
        .route("/evaluate-gates/batch", post(evaluate_gates_batch))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors),
        )
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run `work` on its own task and map both failure layers to the envelope.
async fn detached<T, F>(headers: &HeaderMap, work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: std::future::Future<Output = Result<T, EngineError>> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(Ok(value)) => Ok(Json(value)),
        Ok(Err(err)) => Err(ApiError::from(err).for_request(headers)),
        Err(join) => Err(ApiError::internal(format!("request task failed: {join}"))
            .for_request(headers)),
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started.elapsed().as_secs_f64(),
        llm_configured: state.engine.is_llm_configured(),
        providers: state.engine.providers(),
    })
}

async fn classify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ClassifyRequest>, JsonRejection>,
) -> ApiResult<ClassificationResult> {
    let Json(request) = body.map_err(|r| ApiError::from(r).for_request(&headers))?;
    let engine = Arc::clone(&state.engine);

    detached(&headers, async move {
        engine.classify(&request.context, &request.email).await
    })
    .await
}

async fn generate_draft(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<GenerateDraftRequest>, JsonRejection>,
) -> ApiResult<DraftResult> {
    let Json(request) = body.map_err(|r| ApiError::from(r).for_request(&headers))?;
    let engine = Arc::clone(&state.engine);

    detached(&headers, async move {
        engine.generate_draft(&request.context, &request.draft).await
    })
    .await
}

async fn evaluate_gates(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<EvaluateGatesRequest>, JsonRejection>,
) -> ApiResult<GateEvaluationResult> {
    let Json(request) = body.map_err(|r| ApiError::from(r).for_request(&headers))?;

    state
        .engine
        .evaluate_gates(&request.context, &request.action())
        .map(Json)
        .map_err(|err| ApiError::from(err).for_request(&headers))
}

async fn evaluate_gates_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<EvaluateGatesBatchRequest>, JsonRejection>,
) -> ApiResult<EvaluateGatesBatchResponse> {
    let Json(request) = body.map_err(|r| ApiError::from(r).for_request(&headers))?;

    let results = state
        .engine
        .evaluate_gates_batch(&request.contexts, &request.action())
        .map_err(|err| ApiError::from(err).for_request(&headers))?;

    tracing::info!(total = results.len(), "batch gates evaluated");
    Ok(Json(EvaluateGatesBatchResponse {
        total: results.len(),
        results,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use solvix_core::GatePolicy;
    use solvix_runtime::LlmOrchestrator;
    use tower::ServiceExt;

    fn app() -> Router {
        build_router(AppState::new(Engine::new(
            LlmOrchestrator::default(),
            GatePolicy::default(),
        )))
    }

    fn post_json(uri: &str, payload: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn context() -> Value {
        json!({ "party": { "party_id": "p-1", "customer_code": "ACME" } })
    }

    #[tokio::test]
    async fn health_reports_unconfigured_llm() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["llm_configured"], false);
        assert_eq!(body["providers"], json!([]));
    }

    #[tokio::test]
    async fn evaluate_gates_allows_clean_context() {
        let response = app()
            .oneshot(post_json(
                "/evaluate-gates",
                json!({
                    "context": context(),
                    "proposed_action": "send_email",
                    "proposed_tone": "professional"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["allowed"], true);
        assert_eq!(body["gate_results"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn batch_rejects_empty_list() {
        let response = app()
            .oneshot(post_json(
                "/evaluate-gates/batch",
                json!({ "contexts": [], "proposed_action": "send_email" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error_code"], "VALIDATION_ERROR");
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn batch_evaluates_each_context() {
        let response = app()
            .oneshot(post_json(
                "/evaluate-gates/batch",
                json!({
                    "contexts": [context(), context()],
                    "proposed_action": "create_case"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["total"], 2);
    }

    #[tokio::test]
    async fn classify_without_provider_is_unavailable() {
        let response = app()
            .oneshot(post_json(
                "/classify",
                json!({
                    "context": context(),
                    "email": {
                        "subject": "Re: invoice",
                        "body": "We will pay on Friday.",
                        "from_address": "ap@acme.test"
                    }
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["error_code"], "LLM_NOT_CONFIGURED");
    }

    #[tokio::test]
    async fn generate_draft_rejects_unknown_tone_before_llm() {
        let response = app()
            .oneshot(post_json(
                "/generate-draft",
                json!({ "context": context(), "category": "COOPERATIVE", "tone": "rude" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error_code"], "INVALID_TONE");
    }

    #[tokio::test]
    async fn malformed_json_uses_error_envelope() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/evaluate-gates")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error_code"], "VALIDATION_ERROR");
        assert!(body["timestamp"].is_string());
    }
}
