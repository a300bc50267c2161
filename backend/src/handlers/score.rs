//! Aggregate scoring API handler

use axum::Json;

use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::services::scoring::{compute_nova_score, NovaScoreResult, ScoreInputs};

/// POST /api/score
///
/// The single aggregated scoring call: takes the per-source signals and
/// returns the NovaScore with attributions and audit hash.
pub async fn aggregate_score(
    Json(inputs): Json<ScoreInputs>,
) -> Result<Json<ApiResponse<NovaScoreResult>>, ApiError> {
    let result = compute_nova_score(&inputs)?;
    Ok(Json(ApiResponse::ok(result)))
}
