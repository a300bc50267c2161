//! Scoring and crypto property tests
//!
//! The quantified laws: GCM round-trip, base64url round-trip, detached-JWS
//! round-trip, quiz bounds, and NovaScore composition with its audit trail.

use credence_backend::aa::jws::{verify_detached_rs256, DetachedJwsSigner};
use credence_backend::analysis::quiz::{score_quiz, QuizResponse, OPTIONS};
use credence_backend::crypto::{open_aes_gcm, random_bytes, seal_aes_gcm, sha256_hex};
use credence_backend::encoding::{b64url_decode, b64url_encode};
use credence_backend::services::scoring::{
    compute_nova_score, CashflowSignal, GstSignal, ScoreInputs, SocialSignal, Tier,
};

// ============================================================================
// Crypto Laws
// ============================================================================

#[test]
fn test_gcm_round_trip_and_tamper_detection() {
    let key: [u8; 32] = random_bytes(32).try_into().unwrap();

    for plaintext in [&b""[..], b"x", b"a longer message with some structure"] {
        let sealed = seal_aes_gcm(&key, plaintext).unwrap();
        let opened = open_aes_gcm(&key, &sealed.iv, &sealed.ciphertext, &sealed.tag).unwrap();
        assert_eq!(opened, plaintext);

        // Any flipped ciphertext bit is rejected.
        if !sealed.ciphertext.is_empty() {
            let mut corrupt = sealed.ciphertext.clone();
            corrupt[0] ^= 0x01;
            assert!(open_aes_gcm(&key, &sealed.iv, &corrupt, &sealed.tag).is_err());
        }

        // So is any flipped tag bit.
        let mut bad_tag = sealed.tag;
        bad_tag[15] ^= 0x80;
        assert!(open_aes_gcm(&key, &sealed.iv, &sealed.ciphertext, &bad_tag).is_err());
    }
}

#[test]
fn test_base64url_round_trip_alphabet() {
    for len in [0usize, 1, 2, 3, 31, 32, 57] {
        let data = random_bytes(len);
        let encoded = b64url_encode(&data);
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert_eq!(b64url_decode(&encoded).unwrap(), data);
    }
}

#[test]
fn test_detached_jws_round_trip_and_tamper_detection() {
    let mut rng = rand::thread_rng();
    let private = rsa::RsaPrivateKey::new(&mut rng, 2048).unwrap();
    let public = rsa::RsaPublicKey::from(&private);
    let signer = DetachedJwsSigner::from_key(private, "test-kid");

    let payload = serde_json::json!({
        "ver": "2.0.0",
        "Consent": {"id": "c-1", "digitalSignature": ""},
    });
    let jws = signer.sign_detached(&payload).unwrap();

    assert!(verify_detached_rs256(&jws, &payload, &public));

    let tampered = serde_json::json!({
        "ver": "2.0.0",
        "Consent": {"id": "c-2", "digitalSignature": ""},
    });
    assert!(!verify_detached_rs256(&jws, &tampered, &public));
}

// ============================================================================
// Quiz Bounds
// ============================================================================

#[test]
fn test_quiz_bounds_hold_for_every_uniform_choice() {
    for choice in OPTIONS {
        let responses: Vec<QuizResponse> = (1..=5)
            .map(|id| QuizResponse {
                id,
                choice: choice.to_string(),
            })
            .collect();
        let scored = score_quiz(&responses).unwrap();
        assert!((5..=25).contains(&scored.total_score));
        assert!(scored.behaviour_score >= 0.2 && scored.behaviour_score <= 1.0);
    }
}

// ============================================================================
// NovaScore Composition
// ============================================================================

fn healthy_inputs() -> ScoreInputs {
    ScoreInputs {
        cashflow: Some(CashflowSignal {
            total_inflow: 150_000.0,
            total_outflow: 100_000.0,
            period_months: Some(1),
        }),
        gst: Some(GstSignal {
            compliance_score: 0.92,
            avg_monthly_turnover: 145_000.0,
        }),
        utility_reliability: Some(88.0),
        upi_diversity: Some(0.85),
        behaviour_score: Some(0.84),
        social: Some(SocialSignal {
            social_score: 0.7,
            network_strength: 0.85,
        }),
        identity_verified: Some(true),
    }
}

#[test]
fn test_healthy_borrower_is_prime() {
    let result = compute_nova_score(&healthy_inputs()).unwrap();
    // 750 + 40 (ratio 1.5) + 30 (network 0.85) + 0 (variance ~3%)
    assert_eq!(result.score, 820);
    assert_eq!(result.tier, Tier::Prime);
    assert!(result.score >= 300 && result.score <= 900);
}

#[test]
fn test_divergent_turnover_drags_score() {
    let mut inputs = healthy_inputs();
    inputs.gst = Some(GstSignal {
        compliance_score: 0.92,
        avg_monthly_turnover: 400_000.0,
    });
    let result = compute_nova_score(&inputs).unwrap();
    assert_eq!(result.score, 770);
    assert!(result
        .explanations
        .iter()
        .any(|e| e.feature == "turnover_variance" && e.impact < 0));
}

#[test]
fn test_audit_hash_binds_score_and_inputs() {
    let result = compute_nova_score(&healthy_inputs()).unwrap();

    // The hash is reproducible from its published preimage.
    let preimage = format!(
        r#"{{"score":{},"inputs_digest":"{}","timestamp_ms":{}}}"#,
        result.score, result.inputs_digest, result.timestamp_ms
    );
    assert_eq!(result.audit_hash, sha256_hex(preimage.as_bytes()));

    // Different inputs yield a different digest.
    let mut other = healthy_inputs();
    other.behaviour_score = Some(0.2);
    let other_result = compute_nova_score(&other).unwrap();
    assert_ne!(result.inputs_digest, other_result.inputs_digest);
}

#[test]
fn test_sparse_inputs_have_low_confidence() {
    let sparse = compute_nova_score(&ScoreInputs::default()).unwrap();
    let full = compute_nova_score(&healthy_inputs()).unwrap();
    assert!(sparse.confidence < full.confidence);
    assert!(sparse.confidence >= 0.0 && full.confidence <= 1.0);
}
