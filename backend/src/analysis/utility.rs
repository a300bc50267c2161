//! Utility bill payment reliability
//!
//! Severity-weighted scoring over a bill history: on-time, minor delay,
//! major delay, unpaid. Carries a consistency score, a 3-bill trend, and a
//! per-category rollup. The BBPS fetch wrapper degrades to a deterministic
//! per-category sample when the biller gateway is unreachable.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::sha256_bytes;
use crate::error::ApiError;
use crate::transport::{HttpTransport, BILLER_TIMEOUT};

/// Weight each bill contributes to the denominator
const BILL_WEIGHT: f64 = 10.0;

/// Bills needed before a trend is read
const TREND_MIN_BILLS: usize = 4;

/// Trend window: mean of the last N bills vs the overall mean
const TREND_WINDOW: usize = 3;

fn mobile_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{10}$").expect("valid regex"))
}

/// A raw utility bill as the biller gateway returns it
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UtilityBill {
    pub bill_id: String,
    pub category: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub payment_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Payment behaviour classification for one bill
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentClass {
    OnTime,
    MinorDelay,
    MajorDelay,
    Unpaid,
}

impl PaymentClass {
    /// Points earned toward the weighted score
    pub fn earned_points(&self) -> f64 {
        match self {
            PaymentClass::OnTime => 10.0,
            PaymentClass::MinorDelay => 6.0,
            PaymentClass::MajorDelay => 2.0,
            PaymentClass::Unpaid => 0.0,
        }
    }
}

/// Payment trend over the recent bills
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

/// Per-category rollup
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CategoryRollup {
    pub total: u32,
    pub on_time: u32,
    pub minor_delay: u32,
    pub major_delay: u32,
    pub unpaid: u32,
    pub total_amount: f64,
    pub weighted_score: f64,
}

/// Full reliability report
#[derive(Debug, Serialize, Clone)]
pub struct ReliabilityReport {
    pub total_bills: u32,
    pub on_time: u32,
    pub minor_delays: u32,
    pub major_delays: u32,
    pub unpaid: u32,
    /// earned/total weight, percent, 2 dp
    pub reliability_score: f64,
    /// on-time share, percent, integer
    pub consistency_score: u32,
    pub trend: Trend,
    pub by_category: HashMap<String, CategoryRollup>,
    pub degraded: bool,
}

/// Parse a bill date: RFC 3339 or bare `YYYY-MM-DD` (midnight UTC).
fn parse_bill_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Classify one bill's payment behaviour.
pub fn classify_bill(bill: &UtilityBill) -> PaymentClass {
    let status_unpaid = bill
        .status
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("UNPAID"))
        .unwrap_or(false);
    let Some(payment_raw) = bill.payment_date.as_deref().filter(|_| !status_unpaid) else {
        return PaymentClass::Unpaid;
    };

    let (Some(due), Some(paid)) = (
        bill.due_date.as_deref().and_then(parse_bill_date),
        parse_bill_date(payment_raw),
    ) else {
        return PaymentClass::MajorDelay;
    };

    if paid <= due {
        return PaymentClass::OnTime;
    }
    let late_seconds = (paid - due).num_seconds();
    let delay_days = (late_seconds + 86_399) / 86_400;
    if delay_days <= 5 {
        PaymentClass::MinorDelay
    } else {
        PaymentClass::MajorDelay
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Build the reliability report over a bill history.
pub fn build_report(bills: &[UtilityBill], degraded: bool) -> ReliabilityReport {
    let mut classified: Vec<(&UtilityBill, PaymentClass)> =
        bills.iter().map(|b| (b, classify_bill(b))).collect();

    let total = classified.len() as u32;
    let count = |class: PaymentClass| {
        classified.iter().filter(|(_, c)| *c == class).count() as u32
    };
    let on_time = count(PaymentClass::OnTime);
    let minor_delays = count(PaymentClass::MinorDelay);
    let major_delays = count(PaymentClass::MajorDelay);
    let unpaid = count(PaymentClass::Unpaid);

    let earned: f64 = classified.iter().map(|(_, c)| c.earned_points()).sum();
    let reliability_score = if total > 0 {
        round2(earned / (f64::from(total) * BILL_WEIGHT) * 100.0)
    } else {
        0.0
    };
    let consistency_score = if total > 0 {
        (f64::from(on_time) / f64::from(total) * 100.0) as u32
    } else {
        0
    };

    // Trend wants chronological order; bills with unparseable due dates sort
    // to the end.
    classified.sort_by_key(|(bill, _)| {
        bill.due_date
            .as_deref()
            .and_then(parse_bill_date)
            .map(|d| d.timestamp())
            .unwrap_or(i64::MAX)
    });
    let trend = read_trend(&classified);

    let mut by_category: HashMap<String, CategoryRollup> = HashMap::new();
    for (bill, class) in &classified {
        let rollup = by_category.entry(bill.category.clone()).or_default();
        rollup.total += 1;
        match class {
            PaymentClass::OnTime => rollup.on_time += 1,
            PaymentClass::MinorDelay => rollup.minor_delay += 1,
            PaymentClass::MajorDelay => rollup.major_delay += 1,
            PaymentClass::Unpaid => rollup.unpaid += 1,
        }
        rollup.total_amount = round2(rollup.total_amount + bill.amount);
    }
    for rollup in by_category.values_mut() {
        let earned = f64::from(rollup.on_time) * 10.0
            + f64::from(rollup.minor_delay) * 6.0
            + f64::from(rollup.major_delay) * 2.0;
        rollup.weighted_score =
            round2(earned / (f64::from(rollup.total) * BILL_WEIGHT) * 100.0);
    }

    ReliabilityReport {
        total_bills: total,
        on_time,
        minor_delays,
        major_delays,
        unpaid,
        reliability_score,
        consistency_score,
        trend,
        by_category,
        degraded,
    }
}

/// Compare the mean earned points of the last three bills against the
/// overall mean. Fewer than four bills reads STABLE.
fn read_trend(chronological: &[(&UtilityBill, PaymentClass)]) -> Trend {
    if chronological.len() < TREND_MIN_BILLS {
        return Trend::Stable;
    }
    let overall: f64 = chronological
        .iter()
        .map(|(_, c)| c.earned_points())
        .sum::<f64>()
        / chronological.len() as f64;
    let recent_slice = &chronological[chronological.len() - TREND_WINDOW..];
    let recent: f64 = recent_slice
        .iter()
        .map(|(_, c)| c.earned_points())
        .sum::<f64>()
        / TREND_WINDOW as f64;

    let diff = recent - overall;
    if diff > 1.0 {
        Trend::Improving
    } else if diff < -1.0 {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Identifier for a BBPS lookup
#[derive(Debug, Deserialize)]
pub struct UtilityFetchInput {
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

/// BBPS-facing fetch service
pub struct UtilityService {
    http: Arc<dyn HttpTransport>,
    base_url: String,
    allow_degraded: bool,
}

impl UtilityService {
    pub fn new(http: Arc<dyn HttpTransport>, base_url: String, allow_degraded: bool) -> Self {
        Self {
            http,
            base_url,
            allow_degraded,
        }
    }

    /// Fetch the bill history for a customer and score it. Requires a
    /// 10-digit mobile number or a customer id.
    pub async fn fetch_reliability(
        &self,
        input: &UtilityFetchInput,
    ) -> Result<ReliabilityReport, ApiError> {
        let identifier = match (&input.mobile, &input.customer_id) {
            (Some(mobile), _) => {
                if !mobile_pattern().is_match(mobile) {
                    return Err(ApiError::Validation(
                        "mobile must be a 10-digit number".to_string(),
                    ));
                }
                mobile.clone()
            }
            (None, Some(customer_id)) if !customer_id.trim().is_empty() => customer_id.clone(),
            _ => {
                return Err(ApiError::Validation(
                    "either mobile or customer_id is required".to_string(),
                ))
            }
        };

        let url = format!("{}/bills/{}", self.base_url, identifier);
        let (bills, degraded) = match self.http.get(&url, &[], BILLER_TIMEOUT).await {
            Ok(response) => {
                let body: Value = serde_json::from_str(&response.body).unwrap_or(Value::Null);
                let bills: Vec<UtilityBill> = body
                    .get("bills")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()?
                    .unwrap_or_default();
                (bills, false)
            }
            Err(e) => {
                if !self.allow_degraded {
                    return Err(e.into());
                }
                tracing::warn!(error = %e, "BBPS unreachable, generating sample bills");
                (sample_bills(&identifier, input.categories.as_deref()), true)
            }
        };

        let filtered: Vec<UtilityBill> = match &input.categories {
            Some(categories) if !categories.is_empty() => bills
                .into_iter()
                .filter(|b| categories.iter().any(|c| c.eq_ignore_ascii_case(&b.category)))
                .collect(),
            _ => bills,
        };

        Ok(build_report(&filtered, degraded))
    }
}

/// Six months of bills per category, seeded from the identifier hash.
fn sample_bills(identifier: &str, categories: Option<&[String]>) -> Vec<UtilityBill> {
    let default_categories = ["electricity", "water", "gas", "broadband"];
    let selected: Vec<String> = match categories {
        Some(wanted) if !wanted.is_empty() => wanted.to_vec(),
        _ => default_categories.iter().map(|s| s.to_string()).collect(),
    };

    let digest = sha256_bytes(identifier.as_bytes());
    let mut bills = Vec::new();
    for (cat_idx, category) in selected.iter().enumerate() {
        for month in 1..=6u32 {
            let byte = digest[(cat_idx * 6 + month as usize) % 32];
            let due = format!("2025-{:02}-10", month);
            // Mostly on time, occasionally late, rarely unpaid.
            let (payment_date, status) = match byte % 8 {
                0 => (Some(format!("2025-{:02}-13", month)), Some("PAID".into())),
                1 => (Some(format!("2025-{:02}-25", month)), Some("PAID".into())),
                2 if month == 6 => (None, Some("UNPAID".into())),
                _ => (Some(format!("2025-{:02}-08", month)), Some("PAID".into())),
            };
            bills.push(UtilityBill {
                bill_id: format!("{}-{}", category, month),
                category: category.clone(),
                amount: 400.0 + f64::from(byte) * 5.0,
                due_date: Some(due),
                payment_date,
                status,
            });
        }
    }
    bills
}
