//! Consent store
//!
//! Primary persistence is the `consent_log` relational table; when the pool
//! is absent at startup or a write fails, the service falls back to an
//! in-memory map with identical semantics and warns once per process.
//! Revocation uses a conditional UPDATE so a caller never observes ACTIVE
//! after another has observed REVOKED.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::consent::model::{ConsentRecord, ConsentStatus, CreateConsentRequest};
use crate::error::ApiError;

static FALLBACK_WARNING: Once = Once::new();

fn warn_fallback(reason: &str) {
    let reason = reason.to_string();
    FALLBACK_WARNING.call_once(|| {
        tracing::warn!(%reason, "consent store degraded to in-memory persistence");
    });
}

/// Row shape of `consent_log`
#[derive(sqlx::FromRow)]
struct ConsentRow {
    consent_id: Uuid,
    user_reference_id: String,
    status: String,
    fi_types: serde_json::Value,
    data_range: serde_json::Value,
    data_life: serde_json::Value,
    purpose: serde_json::Value,
    frequency: serde_json::Value,
    consent_artefact: serde_json::Value,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
    revoked_at: Option<chrono::DateTime<Utc>>,
}

impl ConsentRow {
    fn into_record(self) -> Result<ConsentRecord, ApiError> {
        Ok(ConsentRecord {
            consent_id: self.consent_id,
            user_reference_id: self.user_reference_id,
            status: ConsentStatus::parse(&self.status)
                .ok_or_else(|| ApiError::Internal(format!("bad status '{}'", self.status)))?,
            fi_types: serde_json::from_value(self.fi_types)
                .map_err(|e| ApiError::Internal(e.to_string()))?,
            data_range: serde_json::from_value(self.data_range)
                .map_err(|e| ApiError::Internal(e.to_string()))?,
            data_life: serde_json::from_value(self.data_life)
                .map_err(|e| ApiError::Internal(e.to_string()))?,
            purpose: serde_json::from_value(self.purpose)
                .map_err(|e| ApiError::Internal(e.to_string()))?,
            frequency: serde_json::from_value(self.frequency)
                .map_err(|e| ApiError::Internal(e.to_string()))?,
            consent_artefact: self.consent_artefact,
            created_at: self.created_at,
            updated_at: self.updated_at,
            revoked_at: self.revoked_at,
        })
    }
}

/// Consent artefact CRUD with lifecycle enforcement
pub struct ConsentService {
    pool: Option<PgPool>,
    memory: RwLock<HashMap<Uuid, ConsentRecord>>,
    degraded: AtomicBool,
}

impl ConsentService {
    pub fn new(pool: Option<PgPool>) -> Self {
        if pool.is_none() {
            warn_fallback("no database pool configured");
        }
        Self {
            degraded: AtomicBool::new(pool.is_none()),
            pool,
            memory: RwLock::new(HashMap::new()),
        }
    }

    /// Create the backing tables when a pool is live. Failure flips the
    /// service to memory mode rather than aborting startup.
    pub async fn ensure_schema(&self) {
        let Some(pool) = &self.pool else { return };
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS consent_log (
                consent_id UUID PRIMARY KEY,
                user_reference_id TEXT NOT NULL,
                status TEXT NOT NULL,
                fi_types JSONB NOT NULL,
                data_range JSONB NOT NULL,
                data_life JSONB NOT NULL,
                purpose JSONB NOT NULL,
                frequency JSONB NOT NULL,
                consent_artefact JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                revoked_at TIMESTAMPTZ
            );
            CREATE INDEX IF NOT EXISTS idx_consent_log_user ON consent_log (user_reference_id);
            CREATE INDEX IF NOT EXISTS idx_consent_log_status ON consent_log (status);
            CREATE INDEX IF NOT EXISTS idx_consent_log_created ON consent_log (created_at);
        "#;
        if let Err(e) = sqlx::raw_sql(ddl).execute(pool).await {
            warn_fallback(&e.to_string());
            self.degraded.store(true, Ordering::Relaxed);
        }
    }

    /// Whether the service is running on the in-memory fallback
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn live_pool(&self) -> Option<&PgPool> {
        if self.degraded.load(Ordering::Relaxed) {
            None
        } else {
            self.pool.as_ref()
        }
    }

    fn fall_back(&self, reason: &str) {
        warn_fallback(reason);
        self.degraded.store(true, Ordering::Relaxed);
    }

    /// Validate and persist a new ACTIVE consent.
    pub async fn create(&self, request: CreateConsentRequest) -> Result<ConsentRecord, ApiError> {
        request.validate()?;
        let record = ConsentRecord::from_request(request, Utc::now());

        if let Some(pool) = self.live_pool() {
            let result = sqlx::query(
                r#"
                INSERT INTO consent_log (
                    consent_id, user_reference_id, status, fi_types, data_range,
                    data_life, purpose, frequency, consent_artefact,
                    created_at, updated_at, revoked_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(record.consent_id)
            .bind(&record.user_reference_id)
            .bind(record.status.as_str())
            .bind(serde_json::to_value(&record.fi_types)?)
            .bind(serde_json::to_value(record.data_range)?)
            .bind(serde_json::to_value(record.data_life)?)
            .bind(serde_json::to_value(&record.purpose)?)
            .bind(serde_json::to_value(&record.frequency)?)
            .bind(&record.consent_artefact)
            .bind(record.created_at)
            .bind(record.updated_at)
            .bind(record.revoked_at)
            .execute(pool)
            .await;

            match result {
                Ok(_) => return Ok(record),
                Err(e) => self.fall_back(&e.to_string()),
            }
        }

        self.memory
            .write()
            .await
            .insert(record.consent_id, record.clone());
        Ok(record)
    }

    /// Fetch a consent by id. The id must be a syntactically valid UUIDv4.
    pub async fn get(&self, consent_id: &str) -> Result<ConsentRecord, ApiError> {
        let id = parse_consent_id(consent_id)?;

        if let Some(pool) = self.live_pool() {
            let row: Option<ConsentRow> =
                sqlx::query_as(r#"SELECT * FROM consent_log WHERE consent_id = $1"#)
                    .bind(id)
                    .fetch_optional(pool)
                    .await?;
            return row
                .map(ConsentRow::into_record)
                .transpose()?
                .ok_or_else(|| ApiError::NotFound(format!("consent {} not found", id)));
        }

        self.memory
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("consent {} not found", id)))
    }

    /// List consents for a user reference, newest first.
    pub async fn list_by_user(&self, user_reference_id: &str) -> Result<Vec<ConsentRecord>, ApiError> {
        if user_reference_id.trim().is_empty() {
            return Err(ApiError::Validation(
                "user_reference_id must be a non-empty string".to_string(),
            ));
        }

        if let Some(pool) = self.live_pool() {
            let rows: Vec<ConsentRow> = sqlx::query_as(
                r#"
                SELECT * FROM consent_log
                WHERE user_reference_id = $1
                ORDER BY created_at DESC
                "#,
            )
            .bind(user_reference_id)
            .fetch_all(pool)
            .await?;
            return rows.into_iter().map(ConsentRow::into_record).collect();
        }

        let memory = self.memory.read().await;
        let mut records: Vec<ConsentRecord> = memory
            .values()
            .filter(|r| r.user_reference_id == user_reference_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Revoke an ACTIVE consent. Revoking anything else is a conflict;
    /// revoking an unknown id is not found.
    pub async fn revoke(&self, consent_id: &str) -> Result<ConsentRecord, ApiError> {
        let id = parse_consent_id(consent_id)?;
        let now = Utc::now();

        if let Some(pool) = self.live_pool() {
            // Row-level conditional update: only an ACTIVE row transitions.
            let updated = sqlx::query(
                r#"
                UPDATE consent_log
                SET status = 'REVOKED', revoked_at = $2, updated_at = $2
                WHERE consent_id = $1 AND status = 'ACTIVE'
                "#,
            )
            .bind(id)
            .bind(now)
            .execute(pool)
            .await?
            .rows_affected();

            if updated == 0 {
                // Distinguish missing from non-ACTIVE for the caller.
                let exists: Option<ConsentRow> =
                    sqlx::query_as(r#"SELECT * FROM consent_log WHERE consent_id = $1"#)
                        .bind(id)
                        .fetch_optional(pool)
                        .await?;
                return match exists {
                    Some(row) => Err(ApiError::Conflict(format!(
                        "consent {} is {}, only ACTIVE consents can be revoked",
                        id, row.status
                    ))),
                    None => Err(ApiError::NotFound(format!("consent {} not found", id))),
                };
            }

            return self.get(&id.to_string()).await;
        }

        let mut memory = self.memory.write().await;
        let record = memory
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound(format!("consent {} not found", id)))?;
        if record.status != ConsentStatus::Active {
            return Err(ApiError::Conflict(format!(
                "consent {} is {}, only ACTIVE consents can be revoked",
                id,
                record.status.as_str()
            )));
        }
        record.status = ConsentStatus::Revoked;
        record.revoked_at = Some(now);
        record.updated_at = now;
        Ok(record.clone())
    }
}

fn parse_consent_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse::<Uuid>()
        .map_err(|_| ApiError::Validation(format!("'{}' is not a valid UUID", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::model::{DataLife, DataLifeUnit, DataRange, FiType};
    use chrono::TimeZone;

    fn request(user: &str) -> CreateConsentRequest {
        CreateConsentRequest {
            user_reference_id: user.to_string(),
            fi_types: vec![FiType::Deposit],
            data_range: DataRange {
                from: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                to: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            },
            data_life: DataLife {
                unit: DataLifeUnit::Month,
                value: 6,
            },
            purpose: None,
            frequency: None,
        }
    }

    fn memory_service() -> ConsentService {
        ConsentService::new(None)
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let service = memory_service();
        let created = service.create(request("u1")).await.unwrap();
        assert_eq!(created.status, ConsentStatus::Active);

        let fetched = service.get(&created.consent_id.to_string()).await.unwrap();
        assert_eq!(fetched.consent_id, created.consent_id);
        assert_eq!(fetched.user_reference_id, "u1");
    }

    #[tokio::test]
    async fn test_get_rejects_malformed_uuid() {
        let service = memory_service();
        let err = service.get("not-a-uuid").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_unknown_id() {
        let service = memory_service();
        let err = service.get(&Uuid::new_v4().to_string()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_revoke_lifecycle() {
        let service = memory_service();
        let created = service.create(request("u1")).await.unwrap();
        let id = created.consent_id.to_string();

        let revoked = service.revoke(&id).await.unwrap();
        assert_eq!(revoked.status, ConsentStatus::Revoked);
        assert!(revoked.revoked_at.is_some());

        // Second revoke conflicts; the record stays REVOKED.
        let err = service.revoke(&id).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        let fetched = service.get(&id).await.unwrap();
        assert_eq!(fetched.status, ConsentStatus::Revoked);
    }

    #[tokio::test]
    async fn test_revoke_unknown_id() {
        let service = memory_service();
        let err = service
            .revoke(&Uuid::new_v4().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_by_user_newest_first() {
        let service = memory_service();
        let first = service.create(request("u1")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = service.create(request("u1")).await.unwrap();
        let _other = service.create(request("u2")).await.unwrap();

        let listed = service.list_by_user("u1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].consent_id, second.consent_id);
        assert_eq!(listed[1].consent_id, first.consent_id);
    }

    #[tokio::test]
    async fn test_invalid_request_not_persisted() {
        let service = memory_service();
        let mut bad = request("u1");
        bad.fi_types.clear();
        assert!(service.create(bad).await.is_err());
        assert!(service.list_by_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_mode_is_degraded() {
        let service = memory_service();
        assert!(service.is_degraded());
    }
}
