use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::adapters::{PurchaseEvent, QuizCompletion, SocialListeningEvent, SurveyResponse};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::history::AuditEntry;
use crate::profile::{CognitiveProfile, MergeResult};
use crate::service::ProfileService;
use crate::signal::{RawSignal, Signal};
use crate::store::InMemoryProfileStore;

const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub service: ProfileService,
}

impl AppState {
    /// In-memory store with the given config.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            service: ProfileService::new(Arc::new(InMemoryProfileStore::new()), config),
        }
    }

    /// Load config from `PROFILE_ENGINE_CONFIG_PATH` / `config/engine.toml`.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::with_config(EngineConfig::load()?))
    }
}

pub fn router(state: AppState) -> Router {
    let mut r = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/profiles/{entity_id}", get(get_profile))
        .route("/profiles/{entity_id}/history", get(get_history))
        .route("/profiles/{entity_id}/signals", post(submit_signal))
        .route("/profiles/{entity_id}/quiz", post(submit_quiz))
        .route("/profiles/{entity_id}/survey", post(submit_survey))
        .route("/profiles/{entity_id}/social", post(submit_social))
        .route("/profiles/{entity_id}/purchase", post(submit_purchase));

    if debug_routes_enabled() {
        r = r.route("/debug/config", get(debug_config));
    }

    r.layer(CorsLayer::very_permissive()).with_state(state)
}

fn debug_routes_enabled() -> bool {
    std::env::var("DEBUG_ROUTES").ok().as_deref() == Some("1")
}

/// Engine errors as HTTP responses: `{ "error": kind, "message": text }`.
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Conflict { .. } | EngineError::Duplicate { .. } => StatusCode::CONFLICT,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn get_profile(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Result<Json<CognitiveProfile>, Response> {
    match state.service.profile(&entity_id).await {
        Ok(Some(p)) => Ok(Json(p)),
        Ok(None) => Err(StatusCode::NOT_FOUND.into_response()),
        Err(e) => Err(ApiError(e).into_response()),
    }
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn get_history(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Json<Vec<AuditEntry>> {
    let n = q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Json(state.service.history(&entity_id, n))
}

async fn submit_signal(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Json(raw): Json<RawSignal>,
) -> ApiResult<MergeResult> {
    Ok(Json(state.service.submit_raw(&entity_id, raw).await?))
}

async fn submit(state: &AppState, entity_id: &str, signal: Signal) -> ApiResult<MergeResult> {
    Ok(Json(state.service.submit_signal(entity_id, signal).await?))
}

async fn submit_quiz(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Json(ev): Json<QuizCompletion>,
) -> ApiResult<MergeResult> {
    let signal = state.service.adapters().quiz(ev);
    submit(&state, &entity_id, signal).await
}

async fn submit_survey(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Json(ev): Json<SurveyResponse>,
) -> ApiResult<MergeResult> {
    let signal = state.service.adapters().survey(ev);
    submit(&state, &entity_id, signal).await
}

async fn submit_social(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Json(ev): Json<SocialListeningEvent>,
) -> ApiResult<MergeResult> {
    let signal = state.service.adapters().social(ev);
    submit(&state, &entity_id, signal).await
}

async fn submit_purchase(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Json(ev): Json<PurchaseEvent>,
) -> ApiResult<MergeResult> {
    let signal = state.service.adapters().purchase(ev);
    submit(&state, &entity_id, signal).await
}

async fn debug_config(State(state): State<AppState>) -> Json<EngineConfig> {
    Json(state.service.config().clone())
}
