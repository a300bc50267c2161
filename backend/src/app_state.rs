//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::aa::AaClient;
use crate::aadhaar::OtpService;
use crate::analysis::gst::GstService;
use crate::analysis::utility::UtilityService;
use crate::consent::ConsentService;
use crate::services::social::SocialService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub otp_service: Arc<OtpService>,
    pub consent_service: Arc<ConsentService>,
    pub aa_client: Arc<AaClient>,
    pub gst_service: Arc<GstService>,
    pub utility_service: Arc<UtilityService>,
    pub social_service: Arc<SocialService>,
    pub environment: String,
}

impl FromRef<AppState> for Arc<OtpService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.otp_service.clone()
    }
}

impl FromRef<AppState> for Arc<ConsentService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.consent_service.clone()
    }
}

impl FromRef<AppState> for Arc<AaClient> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.aa_client.clone()
    }
}

impl FromRef<AppState> for Arc<GstService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.gst_service.clone()
    }
}

impl FromRef<AppState> for Arc<UtilityService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.utility_service.clone()
    }
}

impl FromRef<AppState> for Arc<SocialService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.social_service.clone()
    }
}
