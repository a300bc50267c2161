//! Consent artefact schema and validation
//!
//! The artefact JSON mirrors what is actually transmitted to the Account
//! Aggregator; the surrounding record carries the lifecycle fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::encoding::utc_timestamp_millis;
use crate::error::ApiError;

/// Consent lifecycle states. REVOKED is terminal.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentStatus {
    Active,
    Revoked,
    Paused,
    Expired,
}

impl ConsentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentStatus::Active => "ACTIVE",
            ConsentStatus::Revoked => "REVOKED",
            ConsentStatus::Paused => "PAUSED",
            ConsentStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(ConsentStatus::Active),
            "REVOKED" => Some(ConsentStatus::Revoked),
            "PAUSED" => Some(ConsentStatus::Paused),
            "EXPIRED" => Some(ConsentStatus::Expired),
            _ => None,
        }
    }
}

/// Financial information types a consent may cover
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FiType {
    Deposit,
    Upi,
    Gst,
    Utility,
    Social,
    TermDeposit,
    RecurringDeposit,
    MutualFunds,
    Sip,
}

impl FiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FiType::Deposit => "DEPOSIT",
            FiType::Upi => "UPI",
            FiType::Gst => "GST",
            FiType::Utility => "UTILITY",
            FiType::Social => "SOCIAL",
            FiType::TermDeposit => "TERM_DEPOSIT",
            FiType::RecurringDeposit => "RECURRING_DEPOSIT",
            FiType::MutualFunds => "MUTUAL_FUNDS",
            FiType::Sip => "SIP",
        }
    }
}

/// Inclusive window of data the consent covers
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct DataRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// How long fetched data may be retained
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataLifeUnit {
    Day,
    Month,
    Year,
    Inf,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct DataLife {
    pub unit: DataLifeUnit,
    pub value: u32,
}

/// Why the data is being collected; defaulted when the caller omits it
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Purpose {
    pub code: String,
    pub ref_uri: String,
    pub text: String,
    pub category: String,
}

impl Default for Purpose {
    fn default() -> Self {
        Self {
            code: "101".to_string(),
            ref_uri: "https://api.rebit.org.in/aa/purpose/101.xml".to_string(),
            text: "Small business credit assessment".to_string(),
            category: "Personal Finance".to_string(),
        }
    }
}

/// How often the FIU may fetch under this consent
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Frequency {
    pub unit: String,
    pub value: u32,
}

impl Default for Frequency {
    fn default() -> Self {
        Self {
            unit: "MONTH".to_string(),
            value: 1,
        }
    }
}

/// Payload for `consent.create`
#[derive(Debug, Deserialize, Clone)]
pub struct CreateConsentRequest {
    pub user_reference_id: String,
    pub fi_types: Vec<FiType>,
    pub data_range: DataRange,
    pub data_life: DataLife,
    #[serde(default)]
    pub purpose: Option<Purpose>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
}

impl CreateConsentRequest {
    /// Reject malformed input before anything is persisted. All field
    /// problems are reported together.
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut problems = Vec::new();

        if self.user_reference_id.trim().is_empty() {
            problems.push("user_reference_id must be a non-empty string".to_string());
        }
        if self.fi_types.is_empty() {
            problems.push("fi_types must contain at least one entry".to_string());
        }
        if self.data_range.from >= self.data_range.to {
            problems.push("data_range.from must be earlier than data_range.to".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(problems.join("; ")))
        }
    }
}

/// A stored consent with its lifecycle fields
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConsentRecord {
    pub consent_id: Uuid,
    pub user_reference_id: String,
    pub status: ConsentStatus,
    pub fi_types: Vec<FiType>,
    pub data_range: DataRange,
    pub data_life: DataLife,
    pub purpose: Purpose,
    pub frequency: Frequency,
    /// The signed JSON blob actually transmitted to the AA
    pub consent_artefact: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ConsentRecord {
    /// Build a fresh ACTIVE record (and its artefact) from a validated
    /// request.
    pub fn from_request(request: CreateConsentRequest, now: DateTime<Utc>) -> Self {
        let consent_id = Uuid::new_v4();
        let purpose = request.purpose.unwrap_or_default();
        let frequency = request.frequency.unwrap_or_default();

        let artefact = build_artefact(
            consent_id,
            &request.user_reference_id,
            &request.fi_types,
            &request.data_range,
            &request.data_life,
            &purpose,
            &frequency,
            now,
        );

        Self {
            consent_id,
            user_reference_id: request.user_reference_id,
            status: ConsentStatus::Active,
            fi_types: request.fi_types,
            data_range: request.data_range,
            data_life: request.data_life,
            purpose,
            frequency,
            consent_artefact: artefact,
            created_at: now,
            updated_at: now,
            revoked_at: None,
        }
    }
}

/// The transmitted consent artefact, in the AA's camelCase dialect.
#[allow(clippy::too_many_arguments)]
fn build_artefact(
    consent_id: Uuid,
    user_reference_id: &str,
    fi_types: &[FiType],
    data_range: &DataRange,
    data_life: &DataLife,
    purpose: &Purpose,
    frequency: &Frequency,
    now: DateTime<Utc>,
) -> serde_json::Value {
    serde_json::json!({
        "ver": "2.0.0",
        "consentId": consent_id,
        "timestamp": utc_timestamp_millis(now),
        "consentMode": "STORE",
        "fetchType": "PERIODIC",
        "consentTypes": ["TRANSACTIONS", "PROFILE", "SUMMARY"],
        "fiTypes": fi_types,
        "Customer": { "id": user_reference_id },
        "Purpose": purpose,
        "FIDataRange": {
            "from": utc_timestamp_millis(data_range.from),
            "to": utc_timestamp_millis(data_range.to),
        },
        "DataLife": data_life,
        "Frequency": frequency,
        "DataConsumer": { "id": "CREDENCE-FIU" },
    })
}
