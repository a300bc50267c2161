//! Shared API models for the Credence backend

use serde::{Deserialize, Serialize};

/// Standard success envelope for API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// `postgres` or `memory`
    pub store_mode: String,
    pub environment: String,
    pub version: String,
}
