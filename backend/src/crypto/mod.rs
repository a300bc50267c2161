//! Cryptographic primitives for Credence
//!
//! AES-256-GCM sealing, RSA-OAEP-SHA256 session-key wrapping, HMAC-SHA256
//! integrity, and SHA-256 digests. All random material comes from the OS
//! CSPRNG. Errors stay vague on the decryption path; the difference between
//! "wrong key" and "corrupted ciphertext" is not surfaced.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// AES-256 key length in bytes
pub const AES_KEY_LEN: usize = 32;

/// GCM IV length in bytes
pub const AES_IV_LEN: usize = 12;

/// GCM authentication tag length in bytes
pub const GCM_TAG_LEN: usize = 16;

type HmacSha256 = Hmac<Sha256>;

/// Errors from the crypto primitives
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("seal failed")]
    SealFailed,

    #[error("decryption failed")]
    OpenFailed,

    #[error("invalid key length: expected {AES_KEY_LEN} bytes")]
    InvalidKeyLength,

    #[error("ciphertext too short")]
    CiphertextTooShort,

    #[error("key unavailable: {0}")]
    KeyUnavailable(String),
}

/// Output of an AES-GCM seal: the IV drawn for this seal, the ciphertext,
/// and the detached 16-byte tag.
#[derive(Debug, Clone)]
pub struct SealedBox {
    pub iv: [u8; AES_IV_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; GCM_TAG_LEN],
}

impl SealedBox {
    /// Pack as `IV || ciphertext || tag`, the transfer layout used on the
    /// wire for both the PID data block and AA encrypted FI blobs.
    pub fn to_transfer_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(AES_IV_LEN + self.ciphertext.len() + GCM_TAG_LEN);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }
}

/// Fill a buffer of `n` bytes from the OS CSPRNG.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// Draw a fresh 32-byte session key.
pub fn random_session_key() -> [u8; AES_KEY_LEN] {
    let mut key = [0u8; AES_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

/// Seal plaintext with AES-256-GCM.
///
/// The 12-byte IV is drawn from the OS CSPRNG inside this function,
/// immediately before the seal; callers never supply or reuse one.
pub fn seal_aes_gcm(key: &[u8; AES_KEY_LEN], plaintext: &[u8]) -> Result<SealedBox, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::SealFailed)?;

    let mut iv = [0u8; AES_IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    // aes-gcm appends the 16-byte tag to the ciphertext; split it back off
    // so callers can carry it detached.
    let mut sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::SealFailed)?;
    if sealed.len() < GCM_TAG_LEN {
        return Err(CryptoError::SealFailed);
    }
    let tag_start = sealed.len() - GCM_TAG_LEN;
    let mut tag = [0u8; GCM_TAG_LEN];
    tag.copy_from_slice(&sealed[tag_start..]);
    sealed.truncate(tag_start);

    Ok(SealedBox {
        iv,
        ciphertext: sealed,
        tag,
    })
}

/// Open an AES-256-GCM seal. Fails if the key is wrong or any bit of the
/// ciphertext or tag has been altered.
pub fn open_aes_gcm(
    key: &[u8; AES_KEY_LEN],
    iv: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if iv.len() != AES_IV_LEN || tag.len() != GCM_TAG_LEN {
        return Err(CryptoError::OpenFailed);
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::OpenFailed)?;
    let nonce = Nonce::from_slice(iv);

    let mut joined = Vec::with_capacity(ciphertext.len() + GCM_TAG_LEN);
    joined.extend_from_slice(ciphertext);
    joined.extend_from_slice(tag);

    cipher
        .decrypt(nonce, joined.as_slice())
        .map_err(|_| CryptoError::OpenFailed)
}

/// Open a transfer blob laid out as `IV(12) || ciphertext || tag(16)`.
pub fn open_transfer_blob(
    key: &[u8; AES_KEY_LEN],
    blob: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < AES_IV_LEN + GCM_TAG_LEN {
        return Err(CryptoError::CiphertextTooShort);
    }
    let (iv, rest) = blob.split_at(AES_IV_LEN);
    let (ciphertext, tag) = rest.split_at(rest.len() - GCM_TAG_LEN);
    open_aes_gcm(key, iv, ciphertext, tag)
}

/// Wrap bytes under an RSA public key with OAEP-SHA256.
///
/// The PEM may be SPKI ("PUBLIC KEY") or PKCS#1 ("RSA PUBLIC KEY"); both are
/// tried. A missing or unparseable key is `KeyUnavailable`; the caller
/// decides whether a dev-only sentinel substitutes.
pub fn wrap_rsa_oaep_sha256(public_pem: &str, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let public_key = RsaPublicKey::from_public_key_pem(public_pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(public_pem))
        .map_err(|e| CryptoError::KeyUnavailable(e.to_string()))?;

    public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), data)
        .map_err(|e| CryptoError::KeyUnavailable(e.to_string()))
}

/// HMAC-SHA256 of `data` under a 32-byte key.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    let out = mac.finalize().into_bytes();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&out);
    bytes
}

/// SHA-256 of `data` as a lowercase 64-char hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex_encode(&hasher.finalize())
}

/// SHA-256 of `data` as raw bytes.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&out);
    bytes
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
