//! NovaScore aggregation
//!
//! Combines the per-source analyser outputs into a single credit score in
//! [300, 900] with per-feature attributions and an audit hash over the
//! canonical output. Scoring is deterministic from published weights; no
//! model runs here.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::crypto::sha256_hex;
use crate::error::ApiError;

/// Score floor and ceiling
pub const SCORE_MIN: i32 = 300;
pub const SCORE_MAX: i32 = 900;

/// Starting point before adjustments
const BASE_SCORE: i32 = 750;

/// Cashflow ratio adjustment: healthy inflow/outflow earns the larger step
const CASHFLOW_RATIO_THRESHOLD: f64 = 1.2;
const CASHFLOW_STRONG_IMPACT: i32 = 40;
const CASHFLOW_WEAK_IMPACT: i32 = 10;

/// Network-strength bonus
const NETWORK_STRENGTH_THRESHOLD: f64 = 0.8;
const NETWORK_IMPACT: i32 = 30;

/// Turnover-variance penalty
const TURNOVER_VARIANCE_THRESHOLD: f64 = 0.15;
const TURNOVER_VARIANCE_IMPACT: i32 = -50;

/// Bank cashflow signal from the transaction analyser
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CashflowSignal {
    pub total_inflow: f64,
    pub total_outflow: f64,
    /// Months the cashflow window covers; defaults to 1
    #[serde(default)]
    pub period_months: Option<u32>,
}

/// GST signal from the compliance analyser
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GstSignal {
    pub compliance_score: f64,
    pub avg_monthly_turnover: f64,
}

/// Social signal from the aggregator
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SocialSignal {
    pub social_score: f64,
    /// Normalised network strength in [0, 1]
    pub network_strength: f64,
}

/// Everything the façade may combine. Absent sources simply contribute no
/// adjustment; confidence reflects how much was present.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ScoreInputs {
    #[serde(default)]
    pub cashflow: Option<CashflowSignal>,
    #[serde(default)]
    pub gst: Option<GstSignal>,
    #[serde(default)]
    pub utility_reliability: Option<f64>,
    #[serde(default)]
    pub upi_diversity: Option<f64>,
    #[serde(default)]
    pub behaviour_score: Option<f64>,
    #[serde(default)]
    pub social: Option<SocialSignal>,
    #[serde(default)]
    pub identity_verified: Option<bool>,
}

/// Score tier
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Prime,
    Good,
    #[serde(rename = "Sub-Prime")]
    SubPrime,
}

impl Tier {
    pub fn from_score(score: i32) -> Self {
        if score >= 750 {
            Tier::Prime
        } else if score >= 650 {
            Tier::Good
        } else {
            Tier::SubPrime
        }
    }
}

/// One per-feature attribution
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Explanation {
    pub feature: String,
    pub impact: i32,
    pub reasoning: String,
}

/// The aggregated score
#[derive(Debug, Serialize, Clone)]
pub struct NovaScoreResult {
    pub score: i32,
    pub tier: Tier,
    pub confidence: f64,
    pub explanations: Vec<Explanation>,
    pub inputs_digest: String,
    pub timestamp_ms: i64,
    pub audit_hash: String,
}

/// Canonical rendering hashed into the audit trail
#[derive(Serialize)]
struct AuditEnvelope<'a> {
    score: i32,
    inputs_digest: &'a str,
    timestamp_ms: i64,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Combine the per-source signals into a NovaScore.
pub fn compute_nova_score(inputs: &ScoreInputs) -> Result<NovaScoreResult, ApiError> {
    let mut score = BASE_SCORE;
    let mut explanations = Vec::new();

    if let Some(cashflow) = &inputs.cashflow {
        if cashflow.total_inflow < 0.0 || cashflow.total_outflow < 0.0 {
            return Err(ApiError::Validation(
                "cashflow totals must be non-negative".to_string(),
            ));
        }
        let (impact, reasoning) = if cashflow.total_outflow > 0.0 {
            let ratio = cashflow.total_inflow / cashflow.total_outflow;
            if ratio >= CASHFLOW_RATIO_THRESHOLD {
                (
                    CASHFLOW_STRONG_IMPACT,
                    format!(
                        "inflow covers outflow {:.2}x, at or above the {:.1}x threshold",
                        ratio, CASHFLOW_RATIO_THRESHOLD
                    ),
                )
            } else {
                (
                    CASHFLOW_WEAK_IMPACT,
                    format!(
                        "inflow covers outflow only {:.2}x, below the {:.1}x threshold",
                        ratio, CASHFLOW_RATIO_THRESHOLD
                    ),
                )
            }
        } else {
            (
                CASHFLOW_STRONG_IMPACT,
                "no recorded outflow against positive inflow".to_string(),
            )
        };
        score += impact;
        explanations.push(Explanation {
            feature: "cashflow_ratio".to_string(),
            impact,
            reasoning,
        });
    }

    if let Some(social) = &inputs.social {
        if social.network_strength > NETWORK_STRENGTH_THRESHOLD {
            score += NETWORK_IMPACT;
            explanations.push(Explanation {
                feature: "network_strength".to_string(),
                impact: NETWORK_IMPACT,
                reasoning: format!(
                    "validated network strength {:.2} exceeds {:.1}",
                    social.network_strength, NETWORK_STRENGTH_THRESHOLD
                ),
            });
        } else {
            explanations.push(Explanation {
                feature: "network_strength".to_string(),
                impact: 0,
                reasoning: format!(
                    "network strength {:.2} below the {:.1} bonus threshold",
                    social.network_strength, NETWORK_STRENGTH_THRESHOLD
                ),
            });
        }
    }

    match (&inputs.gst, &inputs.cashflow) {
        (Some(gst), Some(cashflow)) if gst.avg_monthly_turnover > 0.0 => {
            let months = f64::from(cashflow.period_months.unwrap_or(1).max(1));
            let monthly_inflow = cashflow.total_inflow / months;
            let variance =
                (monthly_inflow - gst.avg_monthly_turnover).abs() / gst.avg_monthly_turnover;
            if variance > TURNOVER_VARIANCE_THRESHOLD {
                score += TURNOVER_VARIANCE_IMPACT;
                explanations.push(Explanation {
                    feature: "turnover_variance".to_string(),
                    impact: TURNOVER_VARIANCE_IMPACT,
                    reasoning: format!(
                        "declared GST turnover and bank inflow diverge by {:.0}%, above the {:.0}% tolerance",
                        variance * 100.0,
                        TURNOVER_VARIANCE_THRESHOLD * 100.0
                    ),
                });
            } else {
                explanations.push(Explanation {
                    feature: "turnover_variance".to_string(),
                    impact: 0,
                    reasoning: format!(
                        "declared GST turnover and bank inflow agree within {:.0}%",
                        variance * 100.0
                    ),
                });
            }
        }
        _ => {
            // Variance needs both sides; without them no penalty applies.
        }
    }

    // Informational attributions for the remaining present signals.
    if let Some(reliability) = inputs.utility_reliability {
        explanations.push(Explanation {
            feature: "utility_reliability".to_string(),
            impact: 0,
            reasoning: format!("utility payment reliability {:.1}/100", reliability),
        });
    }
    if let Some(diversity) = inputs.upi_diversity {
        explanations.push(Explanation {
            feature: "upi_diversity".to_string(),
            impact: 0,
            reasoning: format!("merchant diversity {:.3} across UPI spend", diversity),
        });
    }
    if let Some(behaviour) = inputs.behaviour_score {
        explanations.push(Explanation {
            feature: "behaviour".to_string(),
            impact: 0,
            reasoning: format!("questionnaire score {:.2}", behaviour),
        });
    }

    let score = score.clamp(SCORE_MIN, SCORE_MAX);
    explanations.sort_by_key(|e| -e.impact.abs());

    let present = [
        inputs.cashflow.is_some(),
        inputs.gst.is_some(),
        inputs.utility_reliability.is_some(),
        inputs.upi_diversity.is_some(),
        inputs.behaviour_score.is_some(),
        inputs.social.is_some(),
    ]
    .iter()
    .filter(|p| **p)
    .count();
    let confidence = round2(0.2 + 0.8 * present as f64 / 6.0);

    let inputs_digest = sha256_hex(serde_json::to_string(inputs)?.as_bytes());
    let timestamp_ms = Utc::now().timestamp_millis();
    let audit_hash = sha256_hex(
        serde_json::to_string(&AuditEnvelope {
            score,
            inputs_digest: &inputs_digest,
            timestamp_ms,
        })?
        .as_bytes(),
    );

    Ok(NovaScoreResult {
        score,
        tier: Tier::from_score(score),
        confidence,
        explanations,
        inputs_digest,
        timestamp_ms,
        audit_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_inputs() -> ScoreInputs {
        ScoreInputs {
            cashflow: Some(CashflowSignal {
                total_inflow: 120_000.0,
                total_outflow: 90_000.0,
                period_months: Some(1),
            }),
            gst: Some(GstSignal {
                compliance_score: 0.9,
                avg_monthly_turnover: 118_000.0,
            }),
            utility_reliability: Some(85.0),
            upi_diversity: Some(0.7),
            behaviour_score: Some(0.8),
            social: Some(SocialSignal {
                social_score: 0.6,
                network_strength: 0.9,
            }),
            identity_verified: Some(true),
        }
    }

    #[test]
    fn test_strong_profile_scores_high() {
        // 750 + 40 (ratio 1.33) + 30 (network) + 0 (variance ~2%)
        let result = compute_nova_score(&full_inputs()).unwrap();
        assert_eq!(result.score, 820);
        assert_eq!(result.tier, Tier::Prime);
        assert!(result.confidence > 0.9);
    }

    #[test]
    fn test_weak_ratio_gets_small_bonus() {
        let mut inputs = full_inputs();
        inputs.cashflow = Some(CashflowSignal {
            total_inflow: 90_000.0,
            total_outflow: 100_000.0,
            period_months: Some(1),
        });
        inputs.gst = None;
        inputs.social = None;
        let result = compute_nova_score(&inputs).unwrap();
        assert_eq!(result.score, 760);
    }

    #[test]
    fn test_turnover_divergence_penalised() {
        let mut inputs = full_inputs();
        inputs.gst = Some(GstSignal {
            compliance_score: 0.9,
            avg_monthly_turnover: 200_000.0,
        });
        // 750 + 40 + 30 - 50
        let result = compute_nova_score(&inputs).unwrap();
        assert_eq!(result.score, 770);
        assert!(result
            .explanations
            .iter()
            .any(|e| e.feature == "turnover_variance" && e.impact == -50));
    }

    #[test]
    fn test_empty_inputs_score_base() {
        let result = compute_nova_score(&ScoreInputs::default()).unwrap();
        assert_eq!(result.score, 750);
        assert_eq!(result.tier, Tier::Prime);
        assert_eq!(result.confidence, 0.2);
    }

    #[test]
    fn test_score_stays_in_bounds() {
        let result = compute_nova_score(&full_inputs()).unwrap();
        assert!(result.score >= SCORE_MIN && result.score <= SCORE_MAX);
    }

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(Tier::from_score(900), Tier::Prime);
        assert_eq!(Tier::from_score(750), Tier::Prime);
        assert_eq!(Tier::from_score(749), Tier::Good);
        assert_eq!(Tier::from_score(650), Tier::Good);
        assert_eq!(Tier::from_score(649), Tier::SubPrime);
        assert_eq!(Tier::from_score(300), Tier::SubPrime);
    }

    #[test]
    fn test_tier_wire_name() {
        assert_eq!(
            serde_json::to_string(&Tier::SubPrime).unwrap(),
            "\"Sub-Prime\""
        );
    }

    #[test]
    fn test_audit_hash_shape_and_sensitivity() {
        let result = compute_nova_score(&full_inputs()).unwrap();
        assert_eq!(result.audit_hash.len(), 64);
        assert_eq!(result.inputs_digest.len(), 64);
        assert!(result.audit_hash.chars().all(|c| c.is_ascii_hexdigit()));

        // Same inputs, different timestamp → different audit hash, same digest
        let again = compute_nova_score(&full_inputs()).unwrap();
        assert_eq!(result.inputs_digest, again.inputs_digest);
    }

    #[test]
    fn test_explanations_sorted_by_magnitude() {
        let mut inputs = full_inputs();
        inputs.gst = Some(GstSignal {
            compliance_score: 0.9,
            avg_monthly_turnover: 500_000.0,
        });
        let result = compute_nova_score(&inputs).unwrap();
        let impacts: Vec<i32> = result.explanations.iter().map(|e| e.impact.abs()).collect();
        let mut sorted = impacts.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(impacts, sorted);
    }
}
