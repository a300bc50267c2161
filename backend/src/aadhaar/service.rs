//! Aadhaar OTP authentication state machine
//!
//! initiate: validate the identifier, build and seal a PID block, dispatch
//! the Auth envelope, record the session. verify: rebuild the PID with the
//! entered OTP, dispatch, and on success issue the identity JWT. Failed
//! verifies feed the per-identity attempt counter; crossing the limit locks
//! the identity for the configured window.
//!
//! When UIDAI is unreachable (or its public key is missing) and degraded
//! mode is allowed, the flow falls back to a configured test OTP and flags
//! every response it produces that way.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use thiserror::Error;
use uuid::Uuid;

use crate::aadhaar::envelope::{
    auth_endpoint, build_auth_xml, build_pid_xml, response_indicates_success, seal_pid,
    AuthEnvelopeParams, EnvelopeError,
};
use crate::aadhaar::jwt::{issue_identity_token, JwtError};
use crate::aadhaar::store::IdentityStore;
use crate::crypto::sha256_hex;
use crate::error::ApiError;
use crate::transport::{HttpTransport, SmsSender, UIDAI_TIMEOUT};

fn aadhaar_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{12}$").expect("valid regex"))
}

fn otp_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{6}$").expect("valid regex"))
}

/// OTP flow errors
#[derive(Error, Debug)]
pub enum AadhaarError {
    #[error("identifier must be exactly 12 digits")]
    InvalidId,

    #[error("OTP must be exactly 6 digits")]
    InvalidOtpFormat,

    #[error("transaction id is missing or malformed")]
    InvalidTxnId,

    #[error("identity is locked for {remaining_seconds}s")]
    Locked { remaining_seconds: u64 },

    #[error("no OTP session found, initiate first")]
    NoSession,

    #[error("transaction id does not match the active session")]
    TxnMismatch,

    #[error("OTP verification failed, {attempts_left} attempt(s) left")]
    OtpInvalid { attempts_left: u32 },

    #[error("key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("UIDAI unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("token issuance failed: {0}")]
    Token(#[from] JwtError),
}

impl From<AadhaarError> for ApiError {
    fn from(err: AadhaarError) -> Self {
        match err {
            AadhaarError::InvalidId
            | AadhaarError::InvalidOtpFormat
            | AadhaarError::InvalidTxnId => ApiError::Validation(err.to_string()),
            AadhaarError::Locked { remaining_seconds } => ApiError::RateLimited {
                retry_after_seconds: remaining_seconds,
            },
            AadhaarError::NoSession => ApiError::NotFound(err.to_string()),
            AadhaarError::TxnMismatch => ApiError::Conflict(err.to_string()),
            AadhaarError::OtpInvalid { .. } => ApiError::Unauthorized(err.to_string()),
            AadhaarError::KeyUnavailable(msg) => ApiError::KeyUnavailable(msg),
            AadhaarError::UpstreamUnreachable(msg) => ApiError::UpstreamUnreachable(msg),
            AadhaarError::Token(e) => ApiError::Internal(e.to_string()),
        }
    }
}

/// Configuration slice the OTP service needs
#[derive(Clone)]
pub struct OtpSettings {
    pub auth_url: String,
    pub aua_code: String,
    pub sub_aua_code: String,
    pub license_key: String,
    /// PEM contents, loaded once at startup
    pub uidai_public_pem: Option<String>,
    pub test_otp: String,
    pub allow_degraded: bool,
    pub jwt_secret: String,
    pub jwt_ttl_minutes: i64,
}

/// Result of a successful initiate
#[derive(Debug, Clone)]
pub struct InitiateOutcome {
    pub txn_id: Uuid,
    pub degraded: bool,
}

/// Result of a successful verify
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub token: String,
    pub degraded: bool,
}

/// Aadhaar OTP service
pub struct OtpService {
    store: Arc<IdentityStore>,
    http: Arc<dyn HttpTransport>,
    sms: Arc<dyn SmsSender>,
    settings: OtpSettings,
}

impl OtpService {
    pub fn new(
        store: Arc<IdentityStore>,
        http: Arc<dyn HttpTransport>,
        sms: Arc<dyn SmsSender>,
        settings: OtpSettings,
    ) -> Self {
        Self {
            store,
            http,
            sms,
            settings,
        }
    }

    /// Start an OTP flow for an identifier. Creates (or replaces) the OTP
    /// session and triggers delivery.
    pub async fn initiate(
        &self,
        aadhaar: &str,
        demo_phone: Option<&str>,
    ) -> Result<InitiateOutcome, AadhaarError> {
        if !aadhaar_pattern().is_match(aadhaar) {
            return Err(AadhaarError::InvalidId);
        }

        let hashed = sha256_hex(aadhaar.as_bytes());
        if self.store.is_locked(&hashed).await {
            return Err(AadhaarError::Locked {
                remaining_seconds: self.store.remaining_lockout(&hashed).await,
            });
        }

        let txn_id = Uuid::new_v4();
        let now = chrono::Utc::now();

        let pid = build_pid_xml("", now);
        let sealed = self.seal(&pid, now)?;
        let mut degraded = sealed.key_degraded;

        let envelope = build_auth_xml(
            &AuthEnvelopeParams {
                uid: aadhaar,
                aua_code: &self.settings.aua_code,
                sub_aua_code: &self.settings.sub_aua_code,
                txn_id: &txn_id.to_string(),
                license_key: &self.settings.license_key,
            },
            &sealed,
        );
        let endpoint = auth_endpoint(&self.settings.auth_url, &self.settings.aua_code, aadhaar);

        match self.http.post_xml(&endpoint, envelope, UIDAI_TIMEOUT).await {
            Ok(response) if response.status < 400 => {
                tracing::debug!(txn = %txn_id, "OTP delivery requested from UIDAI");
            }
            outcome => {
                if !self.settings.allow_degraded {
                    let reason = match outcome {
                        Ok(response) => format!("status {}", response.status),
                        Err(e) => e.to_string(),
                    };
                    return Err(AadhaarError::UpstreamUnreachable(reason));
                }
                degraded = true;
                tracing::warn!(txn = %txn_id, "UIDAI dispatch failed, delivering test OTP");
                if let Some(phone) = demo_phone {
                    let message =
                        format!("Your Credence verification code is {}", self.settings.test_otp);
                    if let Err(e) = self.sms.send(phone, &message).await {
                        tracing::warn!(error = %e, "test OTP SMS delivery failed");
                    }
                }
            }
        }

        self.store.put_session(&hashed, txn_id).await;

        Ok(InitiateOutcome { txn_id, degraded })
    }

    /// Verify an entered OTP against the active session. Issues the identity
    /// JWT on success; feeds the attempt counter on failure.
    pub async fn verify(
        &self,
        aadhaar: &str,
        otp: &str,
        txn_id: &str,
    ) -> Result<VerifyOutcome, AadhaarError> {
        if !aadhaar_pattern().is_match(aadhaar) {
            return Err(AadhaarError::InvalidId);
        }
        if !otp_pattern().is_match(otp) {
            return Err(AadhaarError::InvalidOtpFormat);
        }
        let txn_id: Uuid = txn_id.parse().map_err(|_| AadhaarError::InvalidTxnId)?;

        let hashed = sha256_hex(aadhaar.as_bytes());
        if self.store.is_locked(&hashed).await {
            return Err(AadhaarError::Locked {
                remaining_seconds: self.store.remaining_lockout(&hashed).await,
            });
        }

        let session = self
            .store
            .get_session(&hashed)
            .await
            .ok_or(AadhaarError::NoSession)?;
        if session.txn_id != txn_id {
            return Err(AadhaarError::TxnMismatch);
        }

        let now = chrono::Utc::now();
        let pid = build_pid_xml(otp, now);
        let sealed = self.seal(&pid, now)?;
        let mut degraded = sealed.key_degraded;

        let envelope = build_auth_xml(
            &AuthEnvelopeParams {
                uid: aadhaar,
                aua_code: &self.settings.aua_code,
                sub_aua_code: &self.settings.sub_aua_code,
                txn_id: &txn_id.to_string(),
                license_key: &self.settings.license_key,
            },
            &sealed,
        );
        let endpoint = auth_endpoint(&self.settings.auth_url, &self.settings.aua_code, aadhaar);

        let confirmed = match self.http.post_xml(&endpoint, envelope, UIDAI_TIMEOUT).await {
            Ok(response) if response_indicates_success(&response.body) => true,
            Ok(_) => false,
            Err(e) => {
                if !self.settings.allow_degraded {
                    return Err(AadhaarError::UpstreamUnreachable(e.to_string()));
                }
                degraded = true;
                otp == self.settings.test_otp
            }
        };

        if !confirmed {
            let outcome = self.store.increment_failed(&hashed).await;
            if outcome.locked {
                return Err(AadhaarError::Locked {
                    remaining_seconds: self.store.remaining_lockout(&hashed).await,
                });
            }
            return Err(AadhaarError::OtpInvalid {
                attempts_left: outcome.attempts_left,
            });
        }

        let token = issue_identity_token(
            &hashed,
            &txn_id.to_string(),
            &self.settings.jwt_secret,
            self.settings.jwt_ttl_minutes,
        )?;
        self.store.clear_session(&hashed).await;
        self.store.reset(&hashed).await;

        Ok(VerifyOutcome { token, degraded })
    }

    fn seal(
        &self,
        pid: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<crate::aadhaar::envelope::SealedPid, AadhaarError> {
        seal_pid(
            pid,
            self.settings.uidai_public_pem.as_deref(),
            self.settings.allow_degraded,
            now,
        )
        .map_err(|e| match e {
            EnvelopeError::KeyUnavailable(msg) => AadhaarError::KeyUnavailable(msg),
            EnvelopeError::SealFailed(inner) => AadhaarError::KeyUnavailable(inner.to_string()),
        })
    }
}
