//! Route definitions for the Credence API

use axum::{
    routing::{get, post},
    Router,
};

use crate::app_state::AppState;
use crate::handlers::*;

// Aadhaar OTP routes
pub fn aadhaar_routes() -> Router<AppState> {
    Router::new()
        .route("/api/aadhaar/initiate", post(initiate_otp))
        .route("/api/aadhaar/verify", post(verify_otp))
}

// Consent lifecycle routes
pub fn consent_routes() -> Router<AppState> {
    Router::new()
        .route("/api/consents", post(create_consent))
        .route("/api/consents", get(list_consents))
        .route("/api/consents/:id", get(get_consent))
        .route("/api/consents/:id/revoke", post(revoke_consent))
}

// Account Aggregator FI routes
pub fn fi_routes() -> Router<AppState> {
    Router::new()
        .route("/api/fi/request", post(fi_request))
        .route("/api/fi/fetch", post(fi_fetch))
        .route("/api/fi/sessions/:txn_id", get(get_fi_session))
}

// Analyser routes: UPI, GST, utility bills
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/api/upi/analyse", post(analyse_upi))
        .route("/api/gst/fetch", post(fetch_gst_compliance))
        .route("/api/utility/fetch", post(fetch_utility_reliability))
}

// Behavioural quiz routes
pub fn behaviour_routes() -> Router<AppState> {
    Router::new()
        .route("/api/behaviour/questions", get(get_questions))
        .route("/api/behaviour/submit", post(submit_quiz))
}

// Social profile routes
pub fn social_routes() -> Router<AppState> {
    Router::new().route("/api/social/connect", post(connect_social))
}

// Aggregate scoring route
pub fn score_routes() -> Router<AppState> {
    Router::new().route("/api/score", post(aggregate_score))
}
