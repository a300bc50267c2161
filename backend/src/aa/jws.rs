//! Detached JWS signing for Account Aggregator payloads
//!
//! Produces the compact serialisation with the payload segment removed
//! (`header..signature`). The header carries `b64: false` with `crit:
//! ["b64"]`, so the payload is signed as-is; we still base64url-encode it
//! once to build the signing input for transit.
//!
//! When the RSA private key PEM is unavailable, a dev-only HMAC-SHA256
//! fallback signs under a configured secret. Production wiring refuses the
//! fallback.

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::Pkcs1v15Sign;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

use crate::crypto::{hmac_sha256, sha256_bytes};
use crate::encoding::b64url_encode;
use crate::error::ApiError;

#[derive(Error, Debug)]
pub enum JwsError {
    #[error("signing key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("payload serialisation failed: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<JwsError> for ApiError {
    fn from(err: JwsError) -> Self {
        match err {
            JwsError::KeyUnavailable(msg) => ApiError::KeyUnavailable(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// The protected header of every AA detached JWS
#[derive(Serialize)]
struct ProtectedHeader<'a> {
    alg: &'static str,
    kid: &'a str,
    b64: bool,
    crit: [&'static str; 1],
}

enum SigningKey {
    Rsa(Box<RsaPrivateKey>),
    /// Dev-only stand-in when no PEM is configured
    HmacFallback(Vec<u8>),
}

/// RS256 detached-JWS signer keyed by the FIU client id
pub struct DetachedJwsSigner {
    key: SigningKey,
    kid: String,
}

impl DetachedJwsSigner {
    /// Build a signer from PEM contents. With no usable PEM and the fallback
    /// allowed, signs HMAC-SHA256 under the given secret and warns; with the
    /// fallback disallowed the key failure surfaces.
    pub fn from_pem(
        pem: Option<&str>,
        kid: &str,
        fallback_secret: &str,
        allow_fallback: bool,
    ) -> Result<Self, JwsError> {
        let key = match pem {
            Some(pem) => {
                let parsed = RsaPrivateKey::from_pkcs8_pem(pem)
                    .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem));
                match parsed {
                    Ok(key) => SigningKey::Rsa(Box::new(key)),
                    Err(e) if allow_fallback => {
                        tracing::warn!(error = %e, "AA signing key unusable, using HMAC fallback");
                        SigningKey::HmacFallback(fallback_secret.as_bytes().to_vec())
                    }
                    Err(e) => return Err(JwsError::KeyUnavailable(e.to_string())),
                }
            }
            None if allow_fallback => {
                tracing::warn!("no AA signing key configured, using HMAC fallback");
                SigningKey::HmacFallback(fallback_secret.as_bytes().to_vec())
            }
            None => {
                return Err(JwsError::KeyUnavailable(
                    "AA signing key not configured".to_string(),
                ))
            }
        };

        Ok(Self {
            key,
            kid: kid.to_string(),
        })
    }

    /// Build a signer directly from a parsed key (tests).
    pub fn from_key(key: RsaPrivateKey, kid: &str) -> Self {
        Self {
            key: SigningKey::Rsa(Box::new(key)),
            kid: kid.to_string(),
        }
    }

    /// Whether this signer runs on the HMAC fallback
    pub fn is_degraded(&self) -> bool {
        matches!(self.key, SigningKey::HmacFallback(_))
    }

    /// Sign a payload, returning `header..signature`.
    pub fn sign_detached(&self, payload: &serde_json::Value) -> Result<String, JwsError> {
        let header = ProtectedHeader {
            alg: "RS256",
            kid: &self.kid,
            b64: false,
            crit: ["b64"],
        };
        let header_b64 = b64url_encode(serde_json::to_string(&header)?.as_bytes());
        let payload_b64 = b64url_encode(serde_json::to_string(payload)?.as_bytes());
        let signing_input = format!("{}.{}", header_b64, payload_b64);

        let signature = match &self.key {
            SigningKey::Rsa(private_key) => {
                let digest = sha256_bytes(signing_input.as_bytes());
                private_key
                    .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
                    .map_err(|e| JwsError::SigningFailed(e.to_string()))?
            }
            SigningKey::HmacFallback(secret) => {
                hmac_sha256(secret, signing_input.as_bytes()).to_vec()
            }
        };

        Ok(format!("{}..{}", header_b64, b64url_encode(&signature)))
    }
}

/// Verify a detached RS256 JWS against a payload and public key. Mirrors the
/// signer; used by tests and by callers that echo-check upstream responses.
pub fn verify_detached_rs256(
    jws: &str,
    payload: &serde_json::Value,
    public_key: &RsaPublicKey,
) -> bool {
    let mut parts = jws.split('.');
    let (Some(header_b64), Some(""), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let Ok(payload_json) = serde_json::to_string(payload) else {
        return false;
    };
    let payload_b64 = b64url_encode(payload_json.as_bytes());
    let signing_input = format!("{}.{}", header_b64, payload_b64);

    let Ok(signature) = crate::encoding::b64url_decode(signature_b64) else {
        return false;
    };
    let digest = sha256_bytes(signing_input.as_bytes());
    public_key
        .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::b64url_decode;
    use serde_json::json;

    fn test_keypair() -> (RsaPrivateKey, RsaPublicKey) {
        // Small modulus keeps test key generation fast; fine for tests only.
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
        let public = RsaPublicKey::from(&private);
        (private, public)
    }

    #[test]
    fn test_detached_shape_two_dots_empty_payload() {
        let (private, _) = test_keypair();
        let signer = DetachedJwsSigner::from_key(private, "client-1");
        let jws = signer.sign_detached(&json!({"a": 1})).unwrap();

        let parts: Vec<&str> = jws.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].is_empty());
        assert!(!parts[0].is_empty());
        assert!(!parts[2].is_empty());
    }

    #[test]
    fn test_header_carries_b64_false_crit() {
        let (private, _) = test_keypair();
        let signer = DetachedJwsSigner::from_key(private, "client-1");
        let jws = signer.sign_detached(&json!({"a": 1})).unwrap();

        let header_b64 = jws.split('.').next().unwrap();
        let header: serde_json::Value =
            serde_json::from_slice(&b64url_decode(header_b64).unwrap()).unwrap();
        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["kid"], "client-1");
        assert_eq!(header["b64"], false);
        assert_eq!(header["crit"], json!(["b64"]));
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let (private, public) = test_keypair();
        let signer = DetachedJwsSigner::from_key(private, "client-1");
        let payload = json!({"ver": "2.0.0", "txnid": "t-1"});

        let jws = signer.sign_detached(&payload).unwrap();
        assert!(verify_detached_rs256(&jws, &payload, &public));
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let (private, public) = test_keypair();
        let signer = DetachedJwsSigner::from_key(private, "client-1");
        let payload = json!({"amount": 100});

        let jws = signer.sign_detached(&payload).unwrap();
        assert!(!verify_detached_rs256(&jws, &json!({"amount": 101}), &public));
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let (private, _) = test_keypair();
        let (_, other_public) = test_keypair();
        let signer = DetachedJwsSigner::from_key(private, "client-1");
        let payload = json!({"a": 1});

        let jws = signer.sign_detached(&payload).unwrap();
        assert!(!verify_detached_rs256(&jws, &payload, &other_public));
    }

    #[test]
    fn test_fallback_signer_is_degraded_and_deterministic() {
        let signer = DetachedJwsSigner::from_pem(None, "client-1", "secret", true).unwrap();
        assert!(signer.is_degraded());

        let a = signer.sign_detached(&json!({"x": 1})).unwrap();
        let b = signer.sign_detached(&json!({"x": 1})).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fallback_refused_when_disallowed() {
        let result = DetachedJwsSigner::from_pem(None, "client-1", "secret", false);
        assert!(matches!(result, Err(JwsError::KeyUnavailable(_))));
    }

    #[test]
    fn test_garbage_pem_with_fallback_allowed() {
        let signer =
            DetachedJwsSigner::from_pem(Some("not a pem"), "client-1", "secret", true).unwrap();
        assert!(signer.is_degraded());
    }
}
