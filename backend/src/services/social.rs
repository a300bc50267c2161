//! Social profile metadata aggregation
//!
//! Validates profile URLs per platform, pulls metadata through the
//! `PlatformFetcher` capability, and computes a weighted social score from
//! min-max-normalised signals. Only the minimal session record is persisted:
//! no handle, no URL.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::crypto::sha256_bytes;
use crate::error::ApiError;
use crate::transport::TransportError;

/// Normalisation bounds
const NETWORK_MAX: f64 = 50_000.0;
const POST_FREQUENCY_MAX: f64 = 30.0;
const ACCOUNT_AGE_DAYS_MAX: f64 = 3_650.0;
const INTERACTION_RATE_MAX: f64 = 1_000.0;

/// Supported platforms
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linkedin,
    Twitter,
    Instagram,
    Youtube,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linkedin => "linkedin",
            Platform::Twitter => "twitter",
            Platform::Instagram => "instagram",
            Platform::Youtube => "youtube",
        }
    }
}

struct PlatformMatcher {
    platform: Platform,
    pattern: Regex,
}

fn matchers() -> &'static [PlatformMatcher] {
    static MATCHERS: OnceLock<Vec<PlatformMatcher>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        vec![
            PlatformMatcher {
                platform: Platform::Linkedin,
                pattern: Regex::new(
                    r"^https?://(?:www\.)?linkedin\.com/(?:in|company)/([A-Za-z0-9_-]+)/?$",
                )
                .expect("valid regex"),
            },
            PlatformMatcher {
                platform: Platform::Twitter,
                pattern: Regex::new(r"^https?://(?:www\.)?(?:twitter|x)\.com/([A-Za-z0-9_]+)/?$")
                    .expect("valid regex"),
            },
            PlatformMatcher {
                platform: Platform::Instagram,
                pattern: Regex::new(r"^https?://(?:www\.)?instagram\.com/([A-Za-z0-9_.]+)/?$")
                    .expect("valid regex"),
            },
            PlatformMatcher {
                platform: Platform::Youtube,
                pattern: Regex::new(
                    r"^https?://(?:www\.)?youtube\.com/(?:@|channel/|c/)?([A-Za-z0-9_.-]+)/?$",
                )
                .expect("valid regex"),
            },
        ]
    })
}

/// Match a profile URL to a platform and extract the identifier.
pub fn validate_profile_url(url: &str) -> Option<(Platform, String)> {
    for matcher in matchers() {
        if let Some(captures) = matcher.pattern.captures(url.trim()) {
            return Some((matcher.platform, captures[1].to_string()));
        }
    }
    None
}

/// Metadata every fetcher implementation returns, whatever its source
#[derive(Debug, Clone)]
pub struct PlatformMetrics {
    pub platform: Platform,
    /// Followers / connections / subscribers
    pub network: u32,
    pub posts_last_6_months: u32,
    pub account_created_at: Option<DateTime<Utc>>,
    /// Average engagements per post
    pub interaction_rate: f64,
}

/// Capability for fetching per-platform metadata. The aggregator never
/// learns whether a scraper, an OAuth client, or a sample generator is
/// behind it.
#[async_trait]
pub trait PlatformFetcher: Send + Sync {
    async fn fetch(
        &self,
        platform: Platform,
        identifier: &str,
    ) -> Result<PlatformMetrics, TransportError>;
}

/// Deterministic sample fetcher: metrics derive from a hash of the platform
/// and identifier, so repeated calls agree.
pub struct SamplePlatformFetcher;

#[async_trait]
impl PlatformFetcher for SamplePlatformFetcher {
    async fn fetch(
        &self,
        platform: Platform,
        identifier: &str,
    ) -> Result<PlatformMetrics, TransportError> {
        let digest = sha256_bytes(format!("{}:{}", platform.as_str(), identifier).as_bytes());
        let age_days = 200 + u32::from(digest[2]) * 10;
        Ok(PlatformMetrics {
            platform,
            network: 150 + u32::from(digest[0]) * 90,
            posts_last_6_months: u32::from(digest[1]) % 90,
            account_created_at: Some(Utc::now() - chrono::Duration::days(i64::from(age_days))),
            interaction_rate: f64::from(digest[3]) * 2.5,
        })
    }
}

/// Normalised per-signal breakdown
#[derive(Debug, Serialize, Clone)]
pub struct SocialBreakdown {
    pub network: u32,
    pub post_frequency: f64,
    pub account_age_days: i64,
    pub interaction_rate: f64,
}

/// Result of `social.connect`
#[derive(Debug, Serialize, Clone)]
pub struct SocialScoreResult {
    pub session_id: Uuid,
    /// Weighted score in [0, 1], 4 dp
    pub social_score: f64,
    pub platforms_used: Vec<String>,
    pub breakdown: SocialBreakdown,
    pub invalid_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// The minimal persisted record
#[derive(Debug, Clone, Serialize)]
struct SocialSessionRecord {
    session_id: Uuid,
    social_score: f64,
    platforms_used: Vec<String>,
    created_at: DateTime<Utc>,
}

/// Social score aggregator
pub struct SocialService {
    fetcher: Arc<dyn PlatformFetcher>,
    pool: Option<PgPool>,
    memory: RwLock<Vec<SocialSessionRecord>>,
}

impl SocialService {
    pub fn new(fetcher: Arc<dyn PlatformFetcher>, pool: Option<PgPool>) -> Self {
        Self {
            fetcher,
            pool,
            memory: RwLock::new(Vec::new()),
        }
    }

    /// Create the backing table when a pool is live.
    pub async fn ensure_schema(&self) {
        let Some(pool) = &self.pool else { return };
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS social_sessions (
                session_id UUID PRIMARY KEY,
                social_score DOUBLE PRECISION NOT NULL,
                platforms_used JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            );
        "#;
        if let Err(e) = sqlx::raw_sql(ddl).execute(pool).await {
            tracing::warn!(error = %e, "social_sessions schema setup failed, using memory store");
        }
    }

    /// Validate profile URLs, fetch metadata for each valid platform, and
    /// compute the weighted social score. At least one valid URL is
    /// required; invalid ones are reported back, not silently dropped.
    pub async fn connect(&self, profile_urls: &[String]) -> Result<SocialScoreResult, ApiError> {
        if profile_urls.is_empty() {
            return Err(ApiError::Validation(
                "at least one profile URL is required".to_string(),
            ));
        }

        let mut valid = Vec::new();
        let mut invalid_urls = Vec::new();
        for url in profile_urls {
            match validate_profile_url(url) {
                Some(target) => valid.push(target),
                None => invalid_urls.push(url.clone()),
            }
        }
        if valid.is_empty() {
            return Err(ApiError::Validation(format!(
                "no valid profile URLs among: {}",
                invalid_urls.join(", ")
            )));
        }

        let mut metrics = Vec::new();
        for (platform, identifier) in &valid {
            match self.fetcher.fetch(*platform, identifier).await {
                Ok(m) => metrics.push(m),
                Err(e) => {
                    tracing::warn!(platform = platform.as_str(), error = %e,
                        "platform metadata fetch failed, platform skipped");
                }
            }
        }
        if metrics.is_empty() {
            return Err(ApiError::UpstreamUnreachable(
                "no platform metadata could be fetched".to_string(),
            ));
        }

        let now = Utc::now();
        let network: u32 = metrics.iter().map(|m| m.network).sum();
        let total_posts: u32 = metrics.iter().map(|m| m.posts_last_6_months).sum();
        let post_frequency = f64::from(total_posts) / 6.0;
        // Age comes from the oldest connected account.
        let account_age_days = metrics
            .iter()
            .filter_map(|m| m.account_created_at)
            .map(|created| (now - created).num_days())
            .max()
            .unwrap_or(0);
        let interaction_rate = metrics.iter().map(|m| m.interaction_rate).sum::<f64>()
            / metrics.len() as f64;

        let social_score = round4(
            0.25 * normalise(f64::from(network), NETWORK_MAX)
                + 0.25 * normalise(post_frequency, POST_FREQUENCY_MAX)
                + 0.25 * normalise(account_age_days as f64, ACCOUNT_AGE_DAYS_MAX)
                + 0.25 * normalise(interaction_rate, INTERACTION_RATE_MAX),
        );

        let platforms_used: Vec<String> = metrics
            .iter()
            .map(|m| m.platform.as_str().to_string())
            .collect();

        let session_id = Uuid::new_v4();
        self.persist(SocialSessionRecord {
            session_id,
            social_score,
            platforms_used: platforms_used.clone(),
            created_at: now,
        })
        .await;

        Ok(SocialScoreResult {
            session_id,
            social_score,
            platforms_used,
            breakdown: SocialBreakdown {
                network,
                post_frequency: round4(post_frequency),
                account_age_days,
                interaction_rate: round4(interaction_rate),
            },
            invalid_urls,
            created_at: now,
        })
    }

    async fn persist(&self, record: SocialSessionRecord) {
        if let Some(pool) = &self.pool {
            let result = sqlx::query(
                r#"
                INSERT INTO social_sessions (session_id, social_score, platforms_used, created_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(record.session_id)
            .bind(record.social_score)
            .bind(serde_json::to_value(&record.platforms_used).unwrap_or_default())
            .bind(record.created_at)
            .execute(pool)
            .await;
            if result.is_ok() {
                return;
            }
            tracing::warn!("social session write failed, keeping record in memory");
        }
        self.memory.write().await.push(record);
    }
}

fn normalise(value: f64, max: f64) -> f64 {
    (value / max).clamp(0.0, 1.0)
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
