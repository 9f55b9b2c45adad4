//! HTTP API for the Commission Engine.
//!
//! This module exposes a small REST API around the evaluation engine
//! and the in-memory rule collection using the
//! [`axum`](https://crates.io/crates/axum) framework.  Evaluation
//! handlers take a snapshot of the rules under a short read lock and
//! evaluate outside of it, so administrative edits never wait on a
//! long batch.

use crate::engine::CommissionEngine;
use crate::error::{ImportError, RuleSetError};
use crate::models::{BatchEvaluation, CommissionRule, RuleOutcome, TransactionContext};
use crate::ruleset::{builtin_templates, ExportDocument, RejectedRecord, RuleSet, RuleTemplate};
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Application state shared across requests.
pub struct AppState {
    pub engine: CommissionEngine,
    pub rules: RwLock<RuleSet>,
}

impl AppState {
    pub fn new(engine: CommissionEngine, rules: RuleSet) -> Self {
        Self {
            engine,
            rules: RwLock::new(rules),
        }
    }

    async fn snapshot(&self) -> Vec<CommissionRule> {
        self.rules.read().await.snapshot()
    }
}

/// Error returned by handlers, rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RuleSetError> for ApiError {
    fn from(err: RuleSetError) -> Self {
        let status = match err {
            RuleSetError::NotFound(_) | RuleSetError::TemplateNotFound(_) => StatusCode::NOT_FOUND,
            RuleSetError::DuplicateId(_) => StatusCode::CONFLICT,
            RuleSetError::Invalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub transaction: TransactionContext,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub outcomes: Vec<RuleOutcome>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub transactions: Vec<TransactionContext>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Enable,
    Disable,
    Delete,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub action: BulkAction,
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub affected: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    pub rejected: Vec<RejectedRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResponse {
    pub is_active: bool,
}

/// Build the API router around the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/evaluate", post(evaluate_handler))
        .route("/api/evaluate/batch", post(batch_handler))
        .route("/api/rules", get(list_rules_handler).post(create_rule_handler))
        .route("/api/rules/bulk", post(bulk_handler))
        .route("/api/rules/export", get(export_handler))
        .route("/api/rules/import", post(import_handler))
        .route(
            "/api/rules/:id",
            put(replace_rule_handler).delete(delete_rule_handler),
        )
        .route("/api/rules/:id/toggle", post(toggle_handler))
        .route("/api/templates", get(templates_handler))
        .route("/api/templates/:name/instantiate", post(instantiate_handler))
        .with_state(state)
}

/// Handler for POST /api/evaluate
pub async fn evaluate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EvaluateRequest>,
) -> ApiResult<EvaluateResponse> {
    let rules = state.snapshot().await;
    let outcomes = state.engine.evaluate_rules(&rules, &request.transaction);
    Ok(Json(EvaluateResponse { outcomes }))
}

/// Handler for POST /api/evaluate/batch
///
/// The batch runs on the blocking pool; dropping the request raises
/// the cancellation flag so transactions not yet started are skipped.
pub async fn batch_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<BatchEvaluation> {
    let rules = state.snapshot().await;
    let cancel = Arc::new(AtomicBool::new(false));
    let _guard = CancelOnDrop(Arc::clone(&cancel));
    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || {
        engine.evaluate_batch(&rules, &request.transactions, &cancel)
    })
    .await;
    match result {
        Ok(batch) => Ok(Json(batch)),
        Err(err) => {
            error!(error = %err, "batch evaluation task failed");
            Err(ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "batch evaluation failed".to_string(),
            })
        }
    }
}

/// Raises the cancellation flag when dropped.  Raising it after the
/// batch has finished is a no-op.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Handler for GET /api/rules
pub async fn list_rules_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<CommissionRule>> {
    Ok(Json(state.snapshot().await))
}

/// Handler for POST /api/rules
pub async fn create_rule_handler(
    State(state): State<Arc<AppState>>,
    Json(rule): Json<CommissionRule>,
) -> ApiResult<CommissionRule> {
    state.rules.write().await.insert(rule.clone())?;
    Ok(Json(rule))
}

/// Handler for PUT /api/rules/:id
pub async fn replace_rule_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(rule): Json<CommissionRule>,
) -> ApiResult<CommissionRule> {
    if rule.id != id {
        return Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            message: format!("rule id {} does not match path id {}", rule.id, id),
        });
    }
    state.rules.write().await.replace(rule.clone())?;
    Ok(Json(rule))
}

/// Handler for DELETE /api/rules/:id
pub async fn delete_rule_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<CommissionRule> {
    let removed = state.rules.write().await.remove(&id)?;
    Ok(Json(removed))
}

/// Handler for POST /api/rules/:id/toggle
pub async fn toggle_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ToggleResponse> {
    let is_active = state.rules.write().await.toggle(&id)?;
    Ok(Json(ToggleResponse { is_active }))
}

/// Handler for POST /api/rules/bulk
pub async fn bulk_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkRequest>,
) -> ApiResult<BulkResponse> {
    let mut rules = state.rules.write().await;
    let affected = match request.action {
        BulkAction::Enable => rules.bulk_set_active(&request.ids, true),
        BulkAction::Disable => rules.bulk_set_active(&request.ids, false),
        BulkAction::Delete => rules.bulk_delete(&request.ids),
    };
    Ok(Json(BulkResponse { affected }))
}

/// Handler for GET /api/rules/export
pub async fn export_handler(State(state): State<Arc<AppState>>) -> ApiResult<ExportDocument> {
    Ok(Json(state.rules.read().await.export(Utc::now())))
}

/// Handler for POST /api/rules/import
///
/// The body is taken as raw text so that malformed JSON is reported as
/// an import error rather than an extractor rejection.
pub async fn import_handler(
    State(state): State<Arc<AppState>>,
    body: String,
) -> ApiResult<ImportSummary> {
    let report = state.rules.write().await.import_json(&body)?;
    Ok(Json(ImportSummary {
        imported: report.imported_count(),
        rejected: report.rejected,
    }))
}

/// Handler for GET /api/templates
pub async fn templates_handler() -> ApiResult<Vec<RuleTemplate>> {
    Ok(Json(builtin_templates()))
}

/// Handler for POST /api/templates/:name/instantiate
pub async fn instantiate_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<CommissionRule> {
    let rule = state.rules.write().await.add_from_template(&name)?;
    Ok(Json(rule))
}

/// Launch the API server.  Binds to the supplied address and blocks
/// until the server terminates (e.g. when interrupted).
pub async fn serve(addr: &str, state: Arc<AppState>) -> Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "server listening");
    axum::serve(listener, router).await?;
    Ok(())
}
