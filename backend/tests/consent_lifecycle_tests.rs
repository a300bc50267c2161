//! Consent lifecycle tests
//!
//! Creation, retrieval, revocation monotonicity, and the FI pipeline's
//! dependence on an ACTIVE consent.

mod common;

use std::sync::Arc;

use credence_backend::aa::FiRequestInput;
use credence_backend::consent::{ConsentService, ConsentStatus, FiType};
use credence_backend::error::ApiError;

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_create_revoke_revoke_again() {
    let service = ConsentService::new(None);

    let created = service
        .create(common::deposit_consent_request("u1"))
        .await
        .unwrap();
    assert_eq!(created.status, ConsentStatus::Active);
    assert!(created.revoked_at.is_none());

    let id = created.consent_id.to_string();
    let revoked = service.revoke(&id).await.unwrap();
    assert_eq!(revoked.status, ConsentStatus::Revoked);
    assert!(revoked.revoked_at.is_some());

    // Revocation is terminal: a second revoke conflicts and the status
    // never returns to ACTIVE.
    assert!(matches!(
        service.revoke(&id).await,
        Err(ApiError::Conflict(_))
    ));
    assert_eq!(
        service.get(&id).await.unwrap().status,
        ConsentStatus::Revoked
    );
}

#[tokio::test]
async fn test_revoked_at_set_only_on_revocation() {
    let service = ConsentService::new(None);
    let created = service
        .create(common::deposit_consent_request("u1"))
        .await
        .unwrap();
    assert!(created.revoked_at.is_none());

    let revoked = service
        .revoke(&created.consent_id.to_string())
        .await
        .unwrap();
    assert!(revoked.revoked_at.unwrap() >= created.created_at);
}

#[tokio::test]
async fn test_queries_require_valid_uuid() {
    let service = ConsentService::new(None);
    assert!(matches!(
        service.get("xyz").await,
        Err(ApiError::Validation(_))
    ));
    assert!(matches!(
        service.revoke("123-456").await,
        Err(ApiError::Validation(_))
    ));
}

#[tokio::test]
async fn test_artefact_reflects_request() {
    let service = ConsentService::new(None);
    let mut request = common::deposit_consent_request("u1");
    request.fi_types = vec![FiType::Deposit, FiType::Gst];

    let created = service.create(request).await.unwrap();
    let artefact = &created.consent_artefact;
    assert_eq!(artefact["Customer"]["id"], "u1");
    assert_eq!(artefact["fiTypes"][0], "DEPOSIT");
    assert_eq!(artefact["fiTypes"][1], "GST");
    assert_eq!(artefact["consentId"], created.consent_id.to_string());
}

// ============================================================================
// Consent Gating of the FI Pipeline
// ============================================================================

#[tokio::test]
async fn test_fi_request_refused_after_revocation() {
    let consents = Arc::new(ConsentService::new(None));
    let aa_client = common::degraded_aa_client(consents.clone());

    let consent = consents
        .create(common::deposit_consent_request("u1"))
        .await
        .unwrap();
    let consent_id = consent.consent_id.to_string();

    // Works while ACTIVE.
    let outcome = aa_client
        .fi_request(FiRequestInput {
            consent_id: consent_id.clone(),
            fi_type: FiType::Deposit,
            masked_account: None,
            link_ref: None,
            fip_id: None,
            from: None,
            to: None,
        })
        .await
        .unwrap();
    assert!(outcome.degraded);

    // Refused once REVOKED; a caller never sees ACTIVE behaviour after
    // observing the revocation.
    consents.revoke(&consent_id).await.unwrap();
    let refused = aa_client
        .fi_request(FiRequestInput {
            consent_id,
            fi_type: FiType::Deposit,
            masked_account: None,
            link_ref: None,
            fip_id: None,
            from: None,
            to: None,
        })
        .await;
    assert!(matches!(refused, Err(ApiError::Conflict(_))));
}
