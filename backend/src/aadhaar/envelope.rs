//! UIDAI Auth envelope construction
//!
//! Builds the PID block, seals it under a fresh session key, wraps the
//! session key for UIDAI, and assembles the outbound Auth XML. The PID
//! plaintext is MAC'd under the same session key so the receiver can check
//! integrity independently of the GCM tag.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::crypto::{
    hmac_sha256, random_session_key, seal_aes_gcm, wrap_rsa_oaep_sha256, CryptoError,
};
use crate::encoding::{b64_encode, ist_timestamp, xml_escape};

/// Placeholder wrapped key used when the UIDAI public key cannot be read.
/// Dev-only; production refuses to run without the real key.
const DEV_SENTINEL_WRAPPED_KEY: &[u8] = b"DEV-SENTINEL-SKEY-UNAVAILABLE";

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("session key wrapping failed: {0}")]
    KeyUnavailable(String),

    #[error("PID sealing failed: {0}")]
    SealFailed(#[from] CryptoError),
}

/// The sealed PID material that goes into the Auth envelope
#[derive(Debug, Clone)]
pub struct SealedPid {
    /// base64 of the RSA-OAEP-wrapped session key (or the dev sentinel)
    pub skey_b64: String,
    /// Certificate-identifier timestamp carried on the Skey element
    pub ci: String,
    /// base64 of HMAC-SHA256(pid plaintext) under the session key
    pub hmac_b64: String,
    /// base64 of `IV || ciphertext || tag` of the PID plaintext
    pub data_b64: String,
    /// True when the sentinel replaced a real wrapped key
    pub key_degraded: bool,
}

/// Build the PID block: empty `otp` for initiate, the 6-digit value for
/// verify. The timestamp is IST per the UIDAI envelope dialect.
pub fn build_pid_xml(otp: &str, at: DateTime<Utc>) -> String {
    format!(
        r#"<Pid ts="{}" ver="2.0" wadh=""><Pv otp="{}"/></Pid>"#,
        xml_escape(&ist_timestamp(at)),
        xml_escape(otp)
    )
}

/// Seal a PID block: draw a fresh 32-byte session key, AES-GCM-seal the
/// plaintext (fresh IV inside the seal), MAC the plaintext, and wrap the
/// session key for UIDAI.
///
/// When the public key PEM is absent or unreadable and degraded mode is
/// allowed, a documented sentinel stands in for the wrapped key and the
/// result is flagged. With degradation disallowed the failure surfaces.
pub fn seal_pid(
    pid_xml: &str,
    uidai_public_pem: Option<&str>,
    allow_degraded: bool,
    now: DateTime<Utc>,
) -> Result<SealedPid, EnvelopeError> {
    let session_key = random_session_key();

    let sealed = seal_aes_gcm(&session_key, pid_xml.as_bytes())?;
    let mac = hmac_sha256(&session_key, pid_xml.as_bytes());

    let (wrapped, key_degraded) = match uidai_public_pem {
        Some(pem) => match wrap_rsa_oaep_sha256(pem, &session_key) {
            Ok(wrapped) => (wrapped, false),
            Err(CryptoError::KeyUnavailable(reason)) if allow_degraded => {
                tracing::warn!(%reason, "UIDAI public key unusable, substituting dev sentinel");
                (DEV_SENTINEL_WRAPPED_KEY.to_vec(), true)
            }
            Err(e) => return Err(EnvelopeError::KeyUnavailable(e.to_string())),
        },
        None if allow_degraded => (DEV_SENTINEL_WRAPPED_KEY.to_vec(), true),
        None => {
            return Err(EnvelopeError::KeyUnavailable(
                "UIDAI public key not configured".to_string(),
            ))
        }
    };

    Ok(SealedPid {
        skey_b64: b64_encode(&wrapped),
        ci: ist_timestamp(now),
        hmac_b64: b64_encode(&mac),
        data_b64: b64_encode(&sealed.to_transfer_bytes()),
        key_degraded,
    })
}

/// Parameters for the Auth envelope beyond the sealed PID
pub struct AuthEnvelopeParams<'a> {
    pub uid: &'a str,
    pub aua_code: &'a str,
    pub sub_aua_code: &'a str,
    pub txn_id: &'a str,
    pub license_key: &'a str,
}

/// Assemble the Auth XML envelope. Every attribute value passes through the
/// XML escaper.
pub fn build_auth_xml(params: &AuthEnvelopeParams<'_>, sealed: &SealedPid) -> String {
    format!(
        concat!(
            r#"<Auth uid="{uid}" ac="{ac}" sa="{sa}" ver="2.5" txn="{txn}" lk="{lk}" rc="Y" tid="public">"#,
            r#"<Uses pi="n" pa="n" pfa="n" bio="n" bt="n" pin="n" otp="y"/>"#,
            r#"<Tkn type="001" value=""/>"#,
            r#"<Meta udc="AADHAAR_OTP_AUTH" fdc="" idc="" pip="" lot="P" lov=""/>"#,
            r#"<Skey ci="{ci}">{skey}</Skey>"#,
            r#"<Hmac>{hmac}</Hmac>"#,
            r#"<Data type="X">{data}</Data>"#,
            r#"</Auth>"#
        ),
        uid = xml_escape(params.uid),
        ac = xml_escape(params.aua_code),
        sa = xml_escape(params.sub_aua_code),
        txn = xml_escape(params.txn_id),
        lk = xml_escape(params.license_key),
        ci = xml_escape(&sealed.ci),
        skey = sealed.skey_b64,
        hmac = sealed.hmac_b64,
        data = sealed.data_b64,
    )
}

/// UIDAI auth endpoint: `{auth_url}{aua}/{uid[0]}/{uid[1]}`
pub fn auth_endpoint(auth_url: &str, aua_code: &str, uid: &str) -> String {
    let mut chars = uid.chars();
    let d0 = chars.next().unwrap_or('0');
    let d1 = chars.next().unwrap_or('0');
    format!("{}{}/{}/{}", auth_url, aua_code, d0, d1)
}

/// A UIDAI auth response is successful iff it carries `ret="y"` (either
/// quoting style).
pub fn response_indicates_success(body: &str) -> bool {
    body.contains(r#"ret="y""#) || body.contains("ret='y'")
}
