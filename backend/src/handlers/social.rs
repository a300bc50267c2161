//! Social profile API handlers

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::services::social::{SocialScoreResult, SocialService};

#[derive(Debug, Deserialize)]
pub struct SocialConnectRequest {
    pub profile_urls: Vec<String>,
}

/// POST /api/social/connect
pub async fn connect_social(
    State(social_service): State<Arc<SocialService>>,
    Json(request): Json<SocialConnectRequest>,
) -> Result<Json<ApiResponse<SocialScoreResult>>, ApiError> {
    let result = social_service.connect(&request.profile_urls).await?;
    Ok(Json(ApiResponse::ok(result)))
}
