//! Consent API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::consent::{ConsentRecord, ConsentService, CreateConsentRequest};
use crate::error::ApiError;
use crate::models::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct ConsentListQuery {
    pub user_reference_id: String,
}

/// POST /api/consents
pub async fn create_consent(
    State(consents): State<Arc<ConsentService>>,
    Json(request): Json<CreateConsentRequest>,
) -> Result<Json<ApiResponse<ConsentRecord>>, ApiError> {
    let record = consents.create(request).await?;
    Ok(Json(ApiResponse::ok(record)))
}

/// GET /api/consents/:id
pub async fn get_consent(
    State(consents): State<Arc<ConsentService>>,
    Path(consent_id): Path<String>,
) -> Result<Json<ApiResponse<ConsentRecord>>, ApiError> {
    let record = consents.get(&consent_id).await?;
    Ok(Json(ApiResponse::ok(record)))
}

/// GET /api/consents?user_reference_id=
pub async fn list_consents(
    State(consents): State<Arc<ConsentService>>,
    Query(query): Query<ConsentListQuery>,
) -> Result<Json<ApiResponse<Vec<ConsentRecord>>>, ApiError> {
    let records = consents.list_by_user(&query.user_reference_id).await?;
    Ok(Json(ApiResponse::ok(records)))
}

/// POST /api/consents/:id/revoke
pub async fn revoke_consent(
    State(consents): State<Arc<ConsentService>>,
    Path(consent_id): Path<String>,
) -> Result<Json<ApiResponse<ConsentRecord>>, ApiError> {
    let record = consents.revoke(&consent_id).await?;
    Ok(Json(ApiResponse::ok(record)))
}
