//! Rate-limited identity store
//!
//! Tracks failed OTP attempts and live OTP sessions per hashed identity.
//! Records are keyed by the SHA-256 hex of the raw identifier; the raw
//! Aadhaar number never enters this map. The lockout window is wall-clock
//! relative to a monotonic instant, so a process restart clears it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Default failed verifies before lockout
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default lockout window
pub const DEFAULT_LOCKOUT: Duration = Duration::from_secs(300);

/// Per-identity failure record. Absent record means zero failures, unlocked.
#[derive(Debug, Clone)]
struct AttemptRecord {
    failed_count: u32,
    locked_until: Option<Instant>,
}

/// A live OTP session. At most one per identity; replaced on each initiate.
#[derive(Debug, Clone)]
pub struct OtpSession {
    pub txn_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Outcome of recording a failed verify
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub locked: bool,
    pub attempts_left: u32,
}

/// In-process identity store with per-identity attempt counting and OTP
/// session tracking. Every operation takes the lock once; no observer sees
/// a half-updated record.
pub struct IdentityStore {
    attempts: RwLock<HashMap<String, AttemptRecord>>,
    sessions: RwLock<HashMap<String, OtpSession>>,
    max_attempts: u32,
    lockout: Duration,
}

impl IdentityStore {
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            attempts: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            max_attempts,
            lockout,
        }
    }

    /// Whether the identity is currently locked out. An expired lock is
    /// cleared as a side effect, restoring the absent-record invariant.
    pub async fn is_locked(&self, hashed_id: &str) -> bool {
        let mut attempts = self.attempts.write().await;
        match attempts.get(hashed_id) {
            Some(record) => match record.locked_until {
                Some(until) if until > Instant::now() => true,
                Some(_) => {
                    // Lock expired; the identity starts clean.
                    attempts.remove(hashed_id);
                    false
                }
                None => false,
            },
            None => false,
        }
    }

    /// Seconds remaining on the lockout, zero when unlocked.
    pub async fn remaining_lockout(&self, hashed_id: &str) -> u64 {
        let attempts = self.attempts.read().await;
        attempts
            .get(hashed_id)
            .and_then(|r| r.locked_until)
            .map(|until| until.saturating_duration_since(Instant::now()).as_secs())
            .unwrap_or(0)
    }

    /// Record a failed verify. Crossing `max_attempts` sets the lock.
    pub async fn increment_failed(&self, hashed_id: &str) -> FailureOutcome {
        let mut attempts = self.attempts.write().await;
        let record = attempts
            .entry(hashed_id.to_string())
            .or_insert(AttemptRecord {
                failed_count: 0,
                locked_until: None,
            });
        record.failed_count += 1;

        if record.failed_count >= self.max_attempts {
            record.locked_until = Some(Instant::now() + self.lockout);
            FailureOutcome {
                locked: true,
                attempts_left: 0,
            }
        } else {
            FailureOutcome {
                locked: false,
                attempts_left: self.max_attempts - record.failed_count,
            }
        }
    }

    /// Clear the failure record on successful verify.
    pub async fn reset(&self, hashed_id: &str) {
        self.attempts.write().await.remove(hashed_id);
    }

    /// Store an OTP session, replacing any earlier one for this identity.
    pub async fn put_session(&self, hashed_id: &str, txn_id: Uuid) {
        self.sessions.write().await.insert(
            hashed_id.to_string(),
            OtpSession {
                txn_id,
                created_at: Utc::now(),
            },
        );
    }

    pub async fn get_session(&self, hashed_id: &str) -> Option<OtpSession> {
        self.sessions.read().await.get(hashed_id).cloned()
    }

    /// Consume the session (on successful verify).
    pub async fn clear_session(&self, hashed_id: &str) {
        self.sessions.write().await.remove(hashed_id);
    }
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT)
    }
}
