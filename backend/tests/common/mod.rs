//! Shared fakes for integration tests
//!
//! Tests never touch the network: every outbound capability is faked here.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use credence_backend::aa::{AaClient, AaSettings, DetachedJwsSigner, FiSessionStore};
use credence_backend::aadhaar::{IdentityStore, OtpService, OtpSettings};
use credence_backend::consent::model::{
    CreateConsentRequest, DataLife, DataLifeUnit, DataRange, FiType,
};
use credence_backend::consent::ConsentService;
use credence_backend::transport::{HttpResponse, HttpTransport, SmsSender, TransportError};

/// HTTP fake that always fails, forcing degraded paths everywhere.
pub struct UnreachableHttp;

#[async_trait]
impl HttpTransport for UnreachableHttp {
    async fn post_json(
        &self,
        _url: &str,
        _headers: &[(&str, String)],
        _body: &serde_json::Value,
        _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Unreachable("test transport is offline".into()))
    }

    async fn post_xml(
        &self,
        _url: &str,
        _body: String,
        _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Unreachable("test transport is offline".into()))
    }

    async fn get(
        &self,
        _url: &str,
        _headers: &[(&str, String)],
        _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Unreachable("test transport is offline".into()))
    }
}

/// SMS fake that accepts everything silently.
pub struct NullSms;

#[async_trait]
impl SmsSender for NullSms {
    async fn send(&self, _phone: &str, _message: &str) -> Result<(), TransportError> {
        Ok(())
    }
}

/// An OTP service wired for degraded mode with the default test OTP.
pub fn degraded_otp_service() -> OtpService {
    OtpService::new(
        Arc::new(IdentityStore::new(3, Duration::from_secs(300))),
        Arc::new(UnreachableHttp),
        Arc::new(NullSms),
        OtpSettings {
            auth_url: "https://auth.test/".into(),
            aua_code: "public".into(),
            sub_aua_code: "public".into(),
            license_key: String::new(),
            uidai_public_pem: None,
            test_otp: "123456".into(),
            allow_degraded: true,
            jwt_secret: "integration-test-secret".into(),
            jwt_ttl_minutes: 30,
        },
    )
}

/// An AA client wired for degraded mode over a memory consent store.
pub fn degraded_aa_client(consents: Arc<ConsentService>) -> AaClient {
    let signer = Arc::new(
        DetachedJwsSigner::from_pem(None, "test-client", "fallback-secret", true)
            .expect("fallback signer"),
    );
    AaClient::new(
        Arc::new(UnreachableHttp),
        signer,
        consents,
        Arc::new(FiSessionStore::new()),
        AaSettings {
            base_url: "https://aa.test".into(),
            client_api_key: "key".into(),
            fiu_entity_id: "FIU".into(),
            allow_degraded: true,
        },
    )
}

/// A deposit consent request for the given user.
pub fn deposit_consent_request(user: &str) -> CreateConsentRequest {
    use chrono::TimeZone;
    CreateConsentRequest {
        user_reference_id: user.to_string(),
        fi_types: vec![FiType::Deposit],
        data_range: DataRange {
            from: chrono::Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            to: chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        },
        data_life: DataLife {
            unit: DataLifeUnit::Month,
            value: 6,
        },
        purpose: None,
        frequency: None,
    }
}
