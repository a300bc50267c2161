//! Aadhaar OTP API handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::aadhaar::OtpService;
use crate::error::ApiError;
use crate::models::ApiResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct InitiateRequest {
    #[validate(length(equal = 12))]
    pub aadhaar: String,
    #[serde(default)]
    #[validate(length(min = 10, max = 13))]
    pub demo_phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitiateResponse {
    pub txn_id: Uuid,
    pub degraded: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    #[validate(length(equal = 12))]
    pub aadhaar: String,
    #[validate(length(equal = 6))]
    pub otp: String,
    pub txn_id: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub jwt: String,
    pub degraded: bool,
}

/// POST /api/aadhaar/initiate
pub async fn initiate_otp(
    State(otp_service): State<Arc<OtpService>>,
    Json(request): Json<InitiateRequest>,
) -> Result<Json<ApiResponse<InitiateResponse>>, ApiError> {
    request.validate()?;
    let outcome = otp_service
        .initiate(&request.aadhaar, request.demo_phone.as_deref())
        .await?;

    Ok(Json(ApiResponse::ok(InitiateResponse {
        txn_id: outcome.txn_id,
        degraded: outcome.degraded,
    })))
}

/// POST /api/aadhaar/verify
pub async fn verify_otp(
    State(otp_service): State<Arc<OtpService>>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<ApiResponse<VerifyResponse>>, ApiError> {
    request.validate()?;
    let outcome = otp_service
        .verify(&request.aadhaar, &request.otp, &request.txn_id)
        .await?;

    Ok(Json(ApiResponse::ok(VerifyResponse {
        jwt: outcome.token,
        degraded: outcome.degraded,
    })))
}
