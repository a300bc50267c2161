//! FI session tracking
//!
//! One record per FI request, keyed by `txn_id` with a secondary index by
//! `session_id` for the fetch leg. Both maps live under a single lock so a
//! session is never visible in one index and missing from the other.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::consent::FiType;

/// FI session lifecycle
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FiSessionStatus {
    Pending,
    Ready,
    Failed,
}

/// A stored FI request session
#[derive(Debug, Serialize, Clone)]
pub struct FiSession {
    pub txn_id: Uuid,
    pub session_id: String,
    pub consent_id: Uuid,
    pub fi_type: FiType,
    pub masked_account_number: Option<String>,
    pub status: FiSessionStatus,
    pub created_at: DateTime<Utc>,
    /// The request body that was sent
    pub payload: serde_json::Value,
    /// The detached JWS that signed it
    pub jws_signature: String,
    pub degraded: bool,
    /// Degraded-mode transfer key (base64); never serialised outward
    #[serde(skip)]
    pub transfer_key_b64: Option<String>,
}

#[derive(Default)]
struct Indexes {
    by_txn: HashMap<Uuid, FiSession>,
    by_session: HashMap<String, Uuid>,
}

/// In-process FI session store
#[derive(Default)]
pub struct FiSessionStore {
    inner: RwLock<Indexes>,
}

impl FiSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: FiSession) {
        let mut inner = self.inner.write().await;
        inner
            .by_session
            .insert(session.session_id.clone(), session.txn_id);
        inner.by_txn.insert(session.txn_id, session);
    }

    pub async fn get_by_txn(&self, txn_id: Uuid) -> Option<FiSession> {
        self.inner.read().await.by_txn.get(&txn_id).cloned()
    }

    pub async fn get_by_session(&self, session_id: &str) -> Option<FiSession> {
        let inner = self.inner.read().await;
        let txn_id = inner.by_session.get(session_id)?;
        inner.by_txn.get(txn_id).cloned()
    }

    pub async fn set_status(&self, txn_id: Uuid, status: FiSessionStatus) {
        let mut inner = self.inner.write().await;
        if let Some(session) = inner.by_txn.get_mut(&txn_id) {
            session.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(txn_id: Uuid, session_id: &str) -> FiSession {
        FiSession {
            txn_id,
            session_id: session_id.to_string(),
            consent_id: Uuid::new_v4(),
            fi_type: FiType::Deposit,
            masked_account_number: Some("XXXXXX1234".to_string()),
            status: FiSessionStatus::Pending,
            created_at: Utc::now(),
            payload: serde_json::json!({}),
            jws_signature: "h..s".to_string(),
            degraded: false,
            transfer_key_b64: None,
        }
    }

    #[tokio::test]
    async fn test_lookup_by_both_keys() {
        let store = FiSessionStore::new();
        let txn = Uuid::new_v4();
        store.insert(session(txn, "sess-1")).await;

        assert_eq!(store.get_by_txn(txn).await.unwrap().session_id, "sess-1");
        assert_eq!(store.get_by_session("sess-1").await.unwrap().txn_id, txn);
        assert!(store.get_by_session("sess-2").await.is_none());
    }

    #[tokio::test]
    async fn test_status_transition() {
        let store = FiSessionStore::new();
        let txn = Uuid::new_v4();
        store.insert(session(txn, "sess-1")).await;

        store.set_status(txn, FiSessionStatus::Ready).await;
        assert_eq!(
            store.get_by_txn(txn).await.unwrap().status,
            FiSessionStatus::Ready
        );
    }

    #[tokio::test]
    async fn test_fetch_sees_most_recent_request() {
        let store = FiSessionStore::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        store.insert(session(first, "sess-1")).await;
        store.insert(session(second, "sess-2")).await;

        assert_eq!(store.get_by_session("sess-1").await.unwrap().txn_id, first);
        assert_eq!(store.get_by_session("sess-2").await.unwrap().txn_id, second);
    }
}
