//! Account Aggregator request/fetch pipeline
//!
//! Builds FI-request payloads with ECDH key-material placeholders, signs
//! them with the detached JWS, dispatches to the AA gateway, and tracks the
//! resulting session. The fetch leg decrypts the returned financial data
//! (`IV || ciphertext || tag` under AES-256-GCM) and hands the plaintext to
//! the transaction analyser.
//!
//! When the gateway is unreachable and degraded mode is allowed, the
//! request leg synthesises a dev session id and the fetch leg produces a
//! deterministic sample; every such result is flagged.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::aa::jws::DetachedJwsSigner;
use crate::aa::session::{FiSession, FiSessionStatus, FiSessionStore};
use crate::analysis::transactions::{analyze_value, TransactionAnalysis};
use crate::consent::{ConsentService, ConsentStatus, FiType};
use crate::crypto::{open_transfer_blob, random_bytes, sha256_bytes, AES_KEY_LEN};
use crate::encoding::{b64_decode, b64_encode, utc_timestamp_millis};
use crate::error::ApiError;
use crate::transport::{HttpTransport, AA_TIMEOUT};

/// Configuration slice the AA client needs
#[derive(Clone)]
pub struct AaSettings {
    pub base_url: String,
    pub client_api_key: String,
    pub fiu_entity_id: String,
    pub allow_degraded: bool,
}

/// Input for `fi.request`
#[derive(Debug, Deserialize)]
pub struct FiRequestInput {
    pub consent_id: String,
    pub fi_type: FiType,
    #[serde(default)]
    pub masked_account: Option<String>,
    #[serde(default)]
    pub link_ref: Option<String>,
    #[serde(default)]
    pub fip_id: Option<String>,
    #[serde(default)]
    pub from: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<chrono::DateTime<Utc>>,
}

/// Outcome of `fi.request`
#[derive(Debug, serde::Serialize)]
pub struct FiRequestOutcome {
    pub txn_id: Uuid,
    pub session_id: String,
    pub timestamp: String,
    pub jws_signature: String,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aa_response: Option<Value>,
}

/// Input for `fi.fetch`
#[derive(Debug, Deserialize)]
pub struct FiFetchInput {
    pub session_id: String,
    #[serde(default)]
    pub fip_id: Option<String>,
    #[serde(default)]
    pub link_ref_numbers: Option<Vec<String>>,
}

/// Outcome of `fi.fetch`
#[derive(Debug, serde::Serialize)]
pub struct FiFetchOutcome {
    pub txn_id: Uuid,
    pub session_id: String,
    pub analysis: TransactionAnalysis,
    pub degraded: bool,
}

/// FIU-side Account Aggregator client
pub struct AaClient {
    http: Arc<dyn HttpTransport>,
    signer: Arc<DetachedJwsSigner>,
    consents: Arc<ConsentService>,
    sessions: Arc<FiSessionStore>,
    settings: AaSettings,
}

impl AaClient {
    pub fn new(
        http: Arc<dyn HttpTransport>,
        signer: Arc<DetachedJwsSigner>,
        consents: Arc<ConsentService>,
        sessions: Arc<FiSessionStore>,
        settings: AaSettings,
    ) -> Self {
        Self {
            http,
            signer,
            consents,
            sessions,
            settings,
        }
    }

    pub fn sessions(&self) -> &FiSessionStore {
        &self.sessions
    }

    /// Build, sign, and dispatch an FI request under an ACTIVE consent.
    pub async fn fi_request(&self, input: FiRequestInput) -> Result<FiRequestOutcome, ApiError> {
        let consent = self.consents.get(&input.consent_id).await?;
        if consent.status != ConsentStatus::Active {
            return Err(ApiError::Conflict(format!(
                "consent {} is {}, an ACTIVE consent is required",
                consent.consent_id,
                consent.status.as_str()
            )));
        }

        let txn_id = Uuid::new_v4();
        let now = Utc::now();
        let timestamp = utc_timestamp_millis(now);

        let from = input.from.unwrap_or(consent.data_range.from);
        let to = input.to.unwrap_or(consent.data_range.to);
        if from >= to {
            return Err(ApiError::Validation(
                "data range 'from' must be earlier than 'to'".to_string(),
            ));
        }

        let payload = build_fi_request_payload(
            txn_id,
            &timestamp,
            &consent.consent_id.to_string(),
            &input,
            from,
            to,
        );
        let jws_signature = self.signer.sign_detached(&payload)?;

        let url = format!("{}/FI/request", self.settings.base_url);
        let headers = self.aa_headers(&jws_signature);

        let mut degraded = self.signer.is_degraded();
        let mut aa_response = None;
        let mut transfer_key_b64 = None;

        let session_id = match self
            .http
            .post_json(&url, &headers, &payload, AA_TIMEOUT)
            .await
        {
            Ok(response) => {
                let body: Value = serde_json::from_str(&response.body).unwrap_or(Value::Null);
                let upstream_session = body
                    .get("sessionId")
                    .or_else(|| body.get("SessionId"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                aa_response = Some(body);
                match upstream_session {
                    Some(id) => id,
                    None => self.degraded_session_id(txn_id, &mut degraded, "missing sessionId")?,
                }
            }
            Err(e) => {
                if !self.settings.allow_degraded {
                    return Err(e.into());
                }
                self.degraded_session_id(txn_id, &mut degraded, &e.to_string())?
            }
        };

        if degraded {
            // Degraded transfers carry their own key so the fetch leg stays
            // exercisable without the real ECDH handshake.
            transfer_key_b64 = Some(b64_encode(&random_bytes(AES_KEY_LEN)));
        }

        self.sessions
            .insert(FiSession {
                txn_id,
                session_id: session_id.clone(),
                consent_id: consent.consent_id,
                fi_type: input.fi_type,
                masked_account_number: input.masked_account.clone(),
                status: FiSessionStatus::Pending,
                created_at: now,
                payload,
                jws_signature: jws_signature.clone(),
                degraded,
                transfer_key_b64,
            })
            .await;

        Ok(FiRequestOutcome {
            txn_id,
            session_id,
            timestamp,
            jws_signature,
            degraded,
            aa_response,
        })
    }

    /// Fetch and decrypt the financial data for a session, then analyse it.
    pub async fn fi_fetch(&self, input: FiFetchInput) -> Result<FiFetchOutcome, ApiError> {
        if input.session_id.trim().is_empty() {
            return Err(ApiError::Validation("session_id is required".to_string()));
        }

        let session = self
            .sessions
            .get_by_session(&input.session_id)
            .await
            .ok_or_else(|| {
                ApiError::NotFound(format!("FI session '{}' not found", input.session_id))
            })?;

        let fetch_txn = Uuid::new_v4();
        let payload = json!({
            "ver": "2.0.0",
            "timestamp": utc_timestamp_millis(Utc::now()),
            "txnid": fetch_txn,
            "sessionId": session.session_id,
            "fipId": input.fip_id.clone().unwrap_or_default(),
            "linkRefNumber": input.link_ref_numbers.clone().unwrap_or_default(),
        });
        let jws_signature = self.signer.sign_detached(&payload)?;

        let url = format!("{}/FI/fetch", self.settings.base_url);
        let headers = self.aa_headers(&jws_signature);

        let mut degraded = session.degraded;
        let fi_plaintext = match self
            .http
            .post_json(&url, &headers, &payload, AA_TIMEOUT)
            .await
        {
            Ok(response) => {
                let body: Value = serde_json::from_str(&response.body).unwrap_or(Value::Null);
                match self.extract_fi(&body, &session) {
                    Ok(plaintext) => plaintext,
                    Err(e) => {
                        self.sessions
                            .set_status(session.txn_id, FiSessionStatus::Failed)
                            .await;
                        return Err(e);
                    }
                }
            }
            Err(e) => {
                if !self.settings.allow_degraded {
                    self.sessions
                        .set_status(session.txn_id, FiSessionStatus::Failed)
                        .await;
                    return Err(e.into());
                }
                degraded = true;
                tracing::warn!(session = %session.session_id, error = %e,
                    "AA fetch failed, producing sample FI data");
                sample_fi_payload(&session.session_id)
            }
        };

        let analysis = analyze_value(&fi_plaintext);
        self.sessions
            .set_status(session.txn_id, FiSessionStatus::Ready)
            .await;

        Ok(FiFetchOutcome {
            txn_id: session.txn_id,
            session_id: session.session_id,
            analysis,
            degraded,
        })
    }

    /// Pull the FI plaintext out of a fetch response: the encrypted blob if
    /// present, a plaintext `FI` field otherwise. Decryption failures are
    /// surfaced, never silently bypassed.
    fn extract_fi(&self, body: &Value, session: &FiSession) -> Result<Value, ApiError> {
        if let Some(encrypted_b64) = body.get("encryptedFI").and_then(Value::as_str) {
            let blob = b64_decode(encrypted_b64)
                .map_err(|e| ApiError::DecryptionFailure(format!("bad base64: {}", e)))?;

            let key_b64 = body
                .get("encryptedFIKey")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| session.transfer_key_b64.clone())
                .ok_or_else(|| {
                    ApiError::DecryptionFailure("no transfer key available".to_string())
                })?;
            let key_bytes = b64_decode(&key_b64)
                .map_err(|e| ApiError::DecryptionFailure(format!("bad key encoding: {}", e)))?;
            let key: [u8; AES_KEY_LEN] = key_bytes
                .try_into()
                .map_err(|_| ApiError::DecryptionFailure("transfer key must be 32 bytes".into()))?;

            let plaintext = open_transfer_blob(&key, &blob)
                .map_err(|e| ApiError::DecryptionFailure(e.to_string()))?;
            return serde_json::from_slice(&plaintext)
                .map_err(|e| ApiError::DecryptionFailure(format!("plaintext not JSON: {}", e)));
        }

        if let Some(fi) = body.get("FI") {
            return Ok(fi.clone());
        }

        Err(ApiError::UpstreamUnreachable(
            "fetch response carried neither encryptedFI nor FI".to_string(),
        ))
    }

    fn degraded_session_id(
        &self,
        txn_id: Uuid,
        degraded: &mut bool,
        reason: &str,
    ) -> Result<String, ApiError> {
        if !self.settings.allow_degraded {
            return Err(ApiError::UpstreamUnreachable(reason.to_string()));
        }
        *degraded = true;
        tracing::warn!(%reason, "AA request degraded, synthesising session id");
        let txn = txn_id.to_string();
        Ok(format!("dev-session-{}", &txn[..8]))
    }

    fn aa_headers<'a>(&'a self, jws: &str) -> Vec<(&'a str, String)> {
        vec![
            ("X-JWS-Signature", jws.to_string()),
            ("client_api_key", self.settings.client_api_key.clone()),
            ("fiu_entity_id", self.settings.fiu_entity_id.clone()),
        ]
    }
}

/// The §6.2 FI-request body with ECDH key-material placeholders.
fn build_fi_request_payload(
    txn_id: Uuid,
    timestamp: &str,
    consent_id: &str,
    input: &FiRequestInput,
    from: chrono::DateTime<Utc>,
    to: chrono::DateTime<Utc>,
) -> Value {
    let nonce: String = random_bytes(16).iter().map(|b| format!("{:02x}", b)).collect();
    let key_expiry = utc_timestamp_millis(Utc::now() + chrono::Duration::hours(24));

    json!({
        "ver": "2.0.0",
        "timestamp": timestamp,
        "txnid": txn_id,
        "Consent": { "id": consent_id, "digitalSignature": "" },
        "FIDataRange": {
            "from": utc_timestamp_millis(from),
            "to": utc_timestamp_millis(to),
        },
        "KeyMaterial": {
            "cryptoAlg": "ECDH",
            "curve": "Curve25519",
            "params": { "KeyPairGenerator": "ECDH" },
            "DHPublicKey": { "expiry": key_expiry, "Parameters": "", "KeyValue": "" },
            "Nonce": nonce,
        },
        "FI": [{
            "fipId": input.fip_id.clone().unwrap_or_else(|| "FIP-DEFAULT".to_string()),
            "data": [{
                "linkRefNumber": input.link_ref.clone().unwrap_or_default(),
                "maskedAccNumber": input.masked_account.clone().unwrap_or_default(),
                "fiType": input.fi_type,
            }],
        }],
    })
}

/// Deterministic sample transactions for the degraded fetch path. Seeded
/// from the session id so repeated fetches agree.
fn sample_fi_payload(seed: &str) -> Value {
    let digest = sha256_bytes(seed.as_bytes());
    let salary = 40_000.0 + f64::from(digest[0]) * 200.0;
    let rent = 8_000.0 + f64::from(digest[1]) * 40.0;

    let mut records = Vec::new();
    for month in 1..=6u8 {
        let idx = usize::from(month);
        records.push(json!({
            "txnId": format!("sample-{}-sal", month),
            "type": "CREDIT", "mode": "NEFT",
            "amount": salary,
            "currentBalance": salary * f64::from(month),
            "narration": "SALARY CREDIT ACME TRADING",
            "valueDate": format!("2025-{:02}-01", month),
        }));
        records.push(json!({
            "txnId": format!("sample-{}-rent", month),
            "type": "DEBIT", "mode": "UPI",
            "amount": rent,
            "currentBalance": salary * f64::from(month) - rent,
            "narration": "UPI RENT TO LANDLORD",
            "valueDate": format!("2025-{:02}-03", month),
        }));
        records.push(json!({
            "txnId": format!("sample-{}-misc", month),
            "type": "DEBIT", "mode": "UPI",
            "amount": 500.0 + f64::from(digest[idx % 32]) * 10.0,
            "currentBalance": 0.0,
            "narration": "UPI GROCERY STORE",
            "valueDate": format!("2025-{:02}-10", month),
        }));
    }
    json!({ "Transactions": records })
}
