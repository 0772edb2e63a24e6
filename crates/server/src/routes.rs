use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use fincat_classify::BatchOutcome;
use fincat_core::{ClassificationRequest, ClassificationResult};
use serde::Deserialize;
use tokio::sync::watch;

use crate::error::ApiError;
use crate::AppState;

pub async fn health() -> &'static str {
    "ok"
}

/// POST /classify
pub async fn classify(
    State(state): State<AppState>,
    body: Result<Json<ClassificationRequest>, JsonRejection>,
) -> Result<Json<ClassificationResult>, ApiError> {
    let Json(request) = body?;
    let result = state.engine.classify(request).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub transactions: Vec<ClassificationRequest>,
}

/// POST /classify/batch
///
/// The cancel sender lives as long as this handler. A client that hangs up
/// drops the handler and with it every unfinished classification.
pub async fn classify_batch(
    State(state): State<AppState>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchOutcome>, ApiError> {
    let Json(batch) = body?;
    let (_cancel, cancelled) = watch::channel(false);
    tracing::info!(size = batch.transactions.len(), "classifying batch");
    let outcome = state.engine.classify_batch(batch.transactions, cancelled).await;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub category_id: String,
    #[serde(default)]
    pub cost_center_id: Option<String>,
}

/// POST /transactions/{transaction_id}/confirm
///
/// Records a reviewer's verdict. The transaction then counts as history, so
/// its organization's cached patterns are dropped.
pub async fn confirm(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    body: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(verdict) = body?;
    let category_id = verdict.category_id.trim();
    if category_id.is_empty() {
        return Err(ApiError::BadRequest("category_id is required".to_string()));
    }
    let cost_center_id = verdict
        .cost_center_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let organization_id =
        fincat_storage::confirm_classification(&state.db, &transaction_id, category_id, cost_center_id)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "no transaction '{transaction_id}' whose organization has category '{category_id}'{}",
                    cost_center_id
                        .map(|cc| format!(" and cost center '{cc}'"))
                        .unwrap_or_default()
                ))
            })?;

    state.engine.invalidate_patterns(&organization_id).await;
    tracing::info!(%transaction_id, %organization_id, category_id, "classification confirmed");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /organizations/{organization_id}/patterns/invalidate
pub async fn invalidate_patterns(
    State(state): State<AppState>,
    Path(organization_id): Path<String>,
) -> StatusCode {
    state.engine.invalidate_patterns(&organization_id).await;
    StatusCode::NO_CONTENT
}
