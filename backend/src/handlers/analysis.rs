//! Analyser API handlers: UPI, GST, and utility bills

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::aa::{AaClient, FiFetchInput};
use crate::analysis::gst::{ComplianceReport, GstService};
use crate::analysis::transactions::normalize_value;
use crate::analysis::upi::{analyze_upi, UpiAnalytics};
use crate::analysis::utility::{ReliabilityReport, UtilityFetchInput, UtilityService};
use crate::error::ApiError;
use crate::models::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct UpiAnalyseRequest {
    /// Raw transactions in any accepted shape
    #[serde(default)]
    pub transactions: Option<Value>,
    /// Alternatively, an FI session to analyse
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GstFetchRequest {
    pub gstin: String,
    #[serde(default)]
    pub return_types: Option<Vec<String>>,
}

/// POST /api/upi/analyse
pub async fn analyse_upi(
    State(aa_client): State<Arc<AaClient>>,
    Json(request): Json<UpiAnalyseRequest>,
) -> Result<Json<ApiResponse<UpiAnalytics>>, ApiError> {
    let transactions = match (request.transactions, request.session_id) {
        (Some(raw), _) => normalize_value(&raw),
        (None, Some(session_id)) => {
            let fetched = aa_client
                .fi_fetch(FiFetchInput {
                    session_id,
                    fip_id: None,
                    link_ref_numbers: None,
                })
                .await?;
            let mut transactions = fetched.analysis.credits;
            transactions.extend(fetched.analysis.debits);
            transactions
        }
        (None, None) => {
            return Err(ApiError::Validation(
                "either transactions or session_id is required".to_string(),
            ))
        }
    };

    Ok(Json(ApiResponse::ok(analyze_upi(&transactions))))
}

/// POST /api/gst/fetch
pub async fn fetch_gst_compliance(
    State(gst_service): State<Arc<GstService>>,
    Json(request): Json<GstFetchRequest>,
) -> Result<Json<ApiResponse<ComplianceReport>>, ApiError> {
    let report = gst_service
        .fetch_compliance(&request.gstin, request.return_types.as_deref())
        .await?;
    Ok(Json(ApiResponse::ok(report)))
}

/// POST /api/utility/fetch
pub async fn fetch_utility_reliability(
    State(utility_service): State<Arc<UtilityService>>,
    Json(request): Json<UtilityFetchInput>,
) -> Result<Json<ApiResponse<ReliabilityReport>>, ApiError> {
    let report = utility_service.fetch_reliability(&request).await?;
    Ok(Json(ApiResponse::ok(report)))
}
