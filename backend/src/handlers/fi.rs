//! Account Aggregator FI API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::aa::service::{FiFetchOutcome, FiRequestOutcome};
use crate::aa::{AaClient, FiFetchInput, FiRequestInput, FiSession};
use crate::error::ApiError;
use crate::models::ApiResponse;

/// POST /api/fi/request
pub async fn fi_request(
    State(aa_client): State<Arc<AaClient>>,
    Json(request): Json<FiRequestInput>,
) -> Result<Json<ApiResponse<FiRequestOutcome>>, ApiError> {
    let outcome = aa_client.fi_request(request).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// POST /api/fi/fetch
pub async fn fi_fetch(
    State(aa_client): State<Arc<AaClient>>,
    Json(request): Json<FiFetchInput>,
) -> Result<Json<ApiResponse<FiFetchOutcome>>, ApiError> {
    let outcome = aa_client.fi_fetch(request).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// GET /api/fi/sessions/:txn_id
pub async fn get_fi_session(
    State(aa_client): State<Arc<AaClient>>,
    Path(txn_id): Path<Uuid>,
) -> Result<Json<ApiResponse<FiSession>>, ApiError> {
    let session = aa_client
        .sessions()
        .get_by_txn(txn_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("FI session {} not found", txn_id)))?;
    Ok(Json(ApiResponse::ok(session)))
}
