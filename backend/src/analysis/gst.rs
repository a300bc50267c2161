//! GST filing compliance
//!
//! Due-date rules per return type (non-QRMP), on-time/delayed
//! classification, weighted compliance score, and per-return-type
//! breakdown. The GSP fetch wrapper degrades to a deterministic sample
//! history when the gateway is unreachable.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::sha256_bytes;
use crate::error::ApiError;
use crate::transport::{HttpTransport, BILLER_TIMEOUT};

fn gstin_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{2}[A-Z]{5}\d{4}[A-Z][1-9A-Z]Z[0-9A-Z]$").expect("valid regex")
    })
}

/// A raw GST filing record as the GSP returns it
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GstFiling {
    pub return_type: String,
    /// `MMYYYY` (portal dialect) or `YYYY-MM`
    pub return_period: String,
    pub filing_date: DateTime<Utc>,
    #[serde(default)]
    pub turnover: f64,
    #[serde(default)]
    pub tax_paid: f64,
}

/// On-time / delayed classification of one filing
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "status")]
pub enum FilingClass {
    OnTime,
    Delayed { delay_days: i64 },
}

/// A filing together with its classification
#[derive(Debug, Serialize, Clone)]
pub struct ClassifiedFiling {
    #[serde(flatten)]
    pub filing: GstFiling,
    pub due_date: DateTime<Utc>,
    pub classification: FilingClass,
}

/// Per-return-type rollup
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ReturnTypeStat {
    pub total: u32,
    pub on_time: u32,
    pub delayed: u32,
    pub total_turnover: f64,
    pub total_tax_paid: f64,
    pub compliance_rate: f64,
}

/// Full compliance report for a GSTIN
#[derive(Debug, Serialize, Clone)]
pub struct ComplianceReport {
    pub gstin: String,
    pub total_filings: u32,
    pub on_time: u32,
    pub delayed: u32,
    /// on-time share, 4 dp
    pub compliance_score: f64,
    pub avg_turnover: f64,
    pub total_tax_paid: f64,
    pub by_return_type: HashMap<String, ReturnTypeStat>,
    pub filings: Vec<ClassifiedFiling>,
    pub degraded: bool,
}

/// Check a GSTIN against the portal format.
pub fn validate_gstin(gstin: &str) -> Result<(), ApiError> {
    if gstin_pattern().is_match(gstin) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "'{}' is not a valid GSTIN",
            gstin
        )))
    }
}

/// Parse a return period into (year, month). Accepts the portal's `MMYYYY`
/// and ISO-ish `YYYY-MM`.
pub fn parse_period(period: &str) -> Option<(i32, u32)> {
    if let Some((year, month)) = period.split_once('-') {
        let year: i32 = year.parse().ok()?;
        let month: u32 = month.parse().ok()?;
        if (1..=12).contains(&month) {
            return Some((year, month));
        }
        return None;
    }
    if period.len() == 6 && period.chars().all(|c| c.is_ascii_digit()) {
        let month: u32 = period[..2].parse().ok()?;
        let year: i32 = period[2..].parse().ok()?;
        if (1..=12).contains(&month) {
            return Some((year, month));
        }
    }
    None
}

/// Filing due date: GSTR-1 on the 11th, GSTR-3B on the 20th of the month
/// after the period, at 23:59:59.
pub fn due_date(return_type: &str, period_year: i32, period_month: u32) -> DateTime<Utc> {
    let (year, month) = if period_month == 12 {
        (period_year + 1, 1)
    } else {
        (period_year, period_month + 1)
    };
    let day = match return_type.to_uppercase().as_str() {
        "GSTR-1" | "GSTR1" => 11,
        _ => 20,
    };
    Utc.with_ymd_and_hms(year, month, day, 23, 59, 59)
        .single()
        .expect("due date is a valid instant")
}

/// Classify a filing against its due date.
pub fn classify_filing(filing: &GstFiling) -> Option<ClassifiedFiling> {
    let (year, month) = parse_period(&filing.return_period)?;
    let due = due_date(&filing.return_type, year, month);

    let classification = if filing.filing_date <= due {
        FilingClass::OnTime
    } else {
        let late_seconds = (filing.filing_date - due).num_seconds();
        FilingClass::Delayed {
            delay_days: (late_seconds + 86_399) / 86_400,
        }
    };

    Some(ClassifiedFiling {
        filing: filing.clone(),
        due_date: due,
        classification,
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Aggregate a filing history into the compliance report.
pub fn build_report(gstin: &str, filings: &[GstFiling], degraded: bool) -> ComplianceReport {
    let classified: Vec<ClassifiedFiling> = filings
        .iter()
        .filter_map(|filing| {
            let result = classify_filing(filing);
            if result.is_none() {
                tracing::warn!(period = %filing.return_period, "skipping filing with bad period");
            }
            result
        })
        .collect();

    let total = classified.len() as u32;
    let on_time = classified
        .iter()
        .filter(|c| c.classification == FilingClass::OnTime)
        .count() as u32;
    let delayed = total - on_time;

    let compliance_score = if total > 0 {
        round4(f64::from(on_time) / f64::from(total))
    } else {
        0.0
    };
    let avg_turnover = if total > 0 {
        round2(classified.iter().map(|c| c.filing.turnover).sum::<f64>() / f64::from(total))
    } else {
        0.0
    };
    let total_tax_paid = round2(classified.iter().map(|c| c.filing.tax_paid).sum());

    let mut by_return_type: HashMap<String, ReturnTypeStat> = HashMap::new();
    for item in &classified {
        let stat = by_return_type
            .entry(item.filing.return_type.clone())
            .or_default();
        stat.total += 1;
        match item.classification {
            FilingClass::OnTime => stat.on_time += 1,
            FilingClass::Delayed { .. } => stat.delayed += 1,
        }
        stat.total_turnover = round2(stat.total_turnover + item.filing.turnover);
        stat.total_tax_paid = round2(stat.total_tax_paid + item.filing.tax_paid);
    }
    for stat in by_return_type.values_mut() {
        stat.compliance_rate = round4(f64::from(stat.on_time) / f64::from(stat.total));
    }

    ComplianceReport {
        gstin: gstin.to_string(),
        total_filings: total,
        on_time,
        delayed,
        compliance_score,
        avg_turnover,
        total_tax_paid,
        by_return_type,
        filings: classified,
        degraded,
    }
}

/// GSP-facing fetch service
pub struct GstService {
    http: Arc<dyn HttpTransport>,
    base_url: String,
    allow_degraded: bool,
}

impl GstService {
    pub fn new(http: Arc<dyn HttpTransport>, base_url: String, allow_degraded: bool) -> Self {
        Self {
            http,
            base_url,
            allow_degraded,
        }
    }

    /// Fetch the filing history for a GSTIN and classify it. Degrades to a
    /// deterministic sample history when the GSP is unreachable.
    pub async fn fetch_compliance(
        &self,
        gstin: &str,
        return_types: Option<&[String]>,
    ) -> Result<ComplianceReport, ApiError> {
        validate_gstin(gstin)?;

        let url = format!("{}/returns/{}", self.base_url, gstin);
        let (filings, degraded) = match self.http.get(&url, &[], BILLER_TIMEOUT).await {
            Ok(response) => {
                let body: Value = serde_json::from_str(&response.body).unwrap_or(Value::Null);
                let filings: Vec<GstFiling> = body
                    .get("filings")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()?
                    .unwrap_or_default();
                (filings, false)
            }
            Err(e) => {
                if !self.allow_degraded {
                    return Err(e.into());
                }
                tracing::warn!(%gstin, error = %e, "GSP unreachable, generating sample history");
                (sample_filings(gstin), true)
            }
        };

        let filtered: Vec<GstFiling> = match return_types {
            Some(types) if !types.is_empty() => filings
                .into_iter()
                .filter(|f| types.iter().any(|t| t.eq_ignore_ascii_case(&f.return_type)))
                .collect(),
            _ => filings,
        };

        Ok(build_report(gstin, &filtered, degraded))
    }
}

/// Twelve months of GSTR-1 + GSTR-3B filings seeded from the GSTIN hash, so
/// repeated degraded fetches agree.
fn sample_filings(gstin: &str) -> Vec<GstFiling> {
    let digest = sha256_bytes(gstin.as_bytes());
    let base_turnover = 400_000.0 + f64::from(digest[0]) * 2_000.0;

    let mut filings = Vec::new();
    for i in 0..12u32 {
        // FY 2024-25: April 2024 through March 2025
        let (year, month) = if i < 9 { (2024, 4 + i) } else { (2025, i - 8) };
        let idx = i as usize;
        let turnover = round2(base_turnover + f64::from(digest[idx + 1]) * 1_000.0);
        let tax_paid = round2(turnover * 0.18);

        for return_type in ["GSTR-1", "GSTR-3B"] {
            let due = due_date(return_type, year, month);
            // Roughly one filing in four lands late, between 1 and 5 days.
            let byte = digest[(idx + return_type.len()) % 32];
            let filing_date = if byte % 4 == 0 {
                due + chrono::Duration::days(i64::from(byte % 5) + 1)
            } else {
                due - chrono::Duration::days(2)
            };
            filings.push(GstFiling {
                return_type: return_type.to_string(),
                return_period: format!("{:02}{}", month, year),
                filing_date,
                turnover,
                tax_paid,
            });
        }
    }
    filings
}
