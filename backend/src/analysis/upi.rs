//! UPI transaction analytics
//!
//! Filters the UPI slice of a transaction set and computes volume, monthly
//! frequency, merchant-category (MCC) rollups, a normalised Shannon-entropy
//! diversity score, and the top merchants by volume.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::analysis::transactions::Transaction;

/// Top merchants returned are capped
const TOP_MERCHANT_CAP: usize = 10;

/// Narration pattern → MCC table. First match wins; unknown narrations get
/// the catch-all 0000.
const MCC_PATTERNS: &[(&str, &str, &str)] = &[
    ("salary", "6012", "Financial Institutions"),
    ("rent", "6513", "Real Estate"),
    ("utility", "4900", "Utilities"),
    ("electricity", "4900", "Utilities"),
    ("grocer", "5411", "Grocery Stores"),
    ("fuel", "5541", "Service Stations"),
    ("petrol", "5541", "Service Stations"),
    ("telecom", "4812", "Telecom Equipment"),
    ("recharge", "4812", "Telecom Equipment"),
    ("insurance", "6300", "Insurance"),
    ("healthcare", "8062", "Hospitals"),
    ("hospital", "8062", "Hospitals"),
    ("pharmacy", "8062", "Hospitals"),
    ("shopping", "5311", "Department Stores"),
    ("amazon", "5311", "Department Stores"),
    ("flipkart", "5311", "Department Stores"),
    ("food", "5812", "Eating Places"),
    ("swiggy", "5812", "Eating Places"),
    ("zomato", "5812", "Eating Places"),
    ("restaurant", "5812", "Eating Places"),
    ("transport", "4121", "Taxis and Rideshare"),
    ("uber", "4121", "Taxis and Rideshare"),
    ("ola", "4121", "Taxis and Rideshare"),
    ("professional", "7392", "Consulting Services"),
    ("loan", "6010", "Financial Institutions"),
    ("emi", "6010", "Financial Institutions"),
    ("investment", "6211", "Securities Brokers"),
    ("mutual fund", "6211", "Securities Brokers"),
    ("sip", "6211", "Securities Brokers"),
];

/// Per-MCC rollup
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MccStat {
    pub mcc: String,
    pub category: String,
    pub count: u32,
    pub volume: f64,
}

/// Per-merchant rollup (grouped by narration)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MerchantStat {
    pub narration: String,
    pub count: u32,
    pub volume: f64,
}

/// Full UPI analytics result
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UpiAnalytics {
    pub transaction_count: u32,
    pub total_volume: f64,
    pub avg_transaction_amt: f64,
    /// `YYYY-MM` → transaction count, in month order
    pub monthly_frequency: BTreeMap<String, u32>,
    pub mcc_breakdown: Vec<MccStat>,
    /// Normalised Shannon entropy over MCC categories, 3 dp
    pub merchant_diversity_score: f64,
    pub top_merchants: Vec<MerchantStat>,
}

/// Resolve the MCC for a transaction: an explicit code wins, otherwise the
/// narration pattern table decides.
pub fn infer_mcc(explicit: Option<&str>, narration: &str) -> (String, String) {
    if let Some(code) = explicit {
        if !code.is_empty() {
            let category = MCC_PATTERNS
                .iter()
                .find(|(_, mcc, _)| *mcc == code)
                .map(|(_, _, name)| (*name).to_string())
                .unwrap_or_else(|| "Other".to_string());
            return (code.to_string(), category);
        }
    }
    let lowered = narration.to_lowercase();
    for (pattern, mcc, category) in MCC_PATTERNS {
        if lowered.contains(pattern) {
            return ((*mcc).to_string(), (*category).to_string());
        }
    }
    ("0000".to_string(), "Uncategorised".to_string())
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1_000.0).round() / 1_000.0
}

/// Analyse the UPI slice of a transaction set.
pub fn analyze_upi(transactions: &[Transaction]) -> UpiAnalytics {
    let upi: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.mode.eq_ignore_ascii_case("UPI"))
        .collect();

    let transaction_count = upi.len() as u32;
    let total_volume = round2(upi.iter().map(|t| t.amount).sum());
    let avg_transaction_amt = if upi.is_empty() {
        0.0
    } else {
        round2(total_volume / upi.len() as f64)
    };

    let mut monthly_frequency: BTreeMap<String, u32> = BTreeMap::new();
    for txn in &upi {
        if txn.date.len() >= 7 {
            *monthly_frequency
                .entry(txn.date[..7].to_string())
                .or_insert(0) += 1;
        }
    }

    let mut mcc_groups: HashMap<String, MccStat> = HashMap::new();
    for txn in &upi {
        let (mcc, category) = infer_mcc(None, &txn.narration);
        let entry = mcc_groups.entry(mcc.clone()).or_insert(MccStat {
            mcc,
            category,
            count: 0,
            volume: 0.0,
        });
        entry.count += 1;
        entry.volume = round2(entry.volume + txn.amount);
    }
    let mut mcc_breakdown: Vec<MccStat> = mcc_groups.into_values().collect();
    mcc_breakdown.sort_by(|a, b| b.volume.partial_cmp(&a.volume).unwrap_or(std::cmp::Ordering::Equal));

    let merchant_diversity_score = diversity_score(&mcc_breakdown, transaction_count);

    let mut merchant_groups: HashMap<String, MerchantStat> = HashMap::new();
    for txn in &upi {
        let entry = merchant_groups
            .entry(txn.narration.clone())
            .or_insert(MerchantStat {
                narration: txn.narration.clone(),
                count: 0,
                volume: 0.0,
            });
        entry.count += 1;
        entry.volume = round2(entry.volume + txn.amount);
    }
    let mut top_merchants: Vec<MerchantStat> = merchant_groups.into_values().collect();
    top_merchants.sort_by(|a, b| b.volume.partial_cmp(&a.volume).unwrap_or(std::cmp::Ordering::Equal));
    top_merchants.truncate(TOP_MERCHANT_CAP);

    UpiAnalytics {
        transaction_count,
        total_volume,
        avg_transaction_amt,
        monthly_frequency,
        mcc_breakdown,
        merchant_diversity_score,
        top_merchants,
    }
}

/// Normalised Shannon entropy over MCC categories: `H = -Σ p·ln(p)` scaled
/// by `ln(n)`. A single category scores 0; a perfectly even spread scores 1.
fn diversity_score(mcc_breakdown: &[MccStat], total_count: u32) -> f64 {
    let n = mcc_breakdown.len();
    if n <= 1 || total_count == 0 {
        return 0.0;
    }
    let total = f64::from(total_count);
    let entropy: f64 = mcc_breakdown
        .iter()
        .filter(|stat| stat.count > 0)
        .map(|stat| {
            let p = f64::from(stat.count) / total;
            -p * p.ln()
        })
        .sum();
    round3(entropy / (n as f64).ln())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::transactions::TxnType;

    fn upi_txn(amount: f64, narration: &str, date: &str) -> Transaction {
        Transaction {
            txn_id: format!("t-{}", narration),
            date: date.to_string(),
            txn_type: TxnType::Debit,
            mode: "UPI".to_string(),
            amount,
            balance: 0.0,
            narration: narration.to_string(),
            reference: String::new(),
            category: "Misc".to_string(),
        }
    }

    fn neft_txn(amount: f64, narration: &str) -> Transaction {
        Transaction {
            mode: "NEFT".to_string(),
            ..upi_txn(amount, narration, "2025-05-01")
        }
    }

    #[test]
    fn test_non_upi_modes_filtered_out() {
        let txns = vec![
            upi_txn(10_000.0, "rent to landlord", "2025-05-01"),
            upi_txn(1_200.0, "grocery store", "2025-05-02"),
            upi_txn(50_000.0, "salary credit", "2025-05-03"),
            neft_txn(20_000.0, "rent to landlord"),
        ];
        let analytics = analyze_upi(&txns);
        assert_eq!(analytics.transaction_count, 3);
        assert_eq!(analytics.total_volume, 61_200.0);
    }

    #[test]
    fn test_mode_match_is_case_insensitive() {
        let mut txn = upi_txn(100.0, "grocery run", "2025-05-01");
        txn.mode = "upi".to_string();
        assert_eq!(analyze_upi(&[txn]).transaction_count, 1);
    }

    #[test]
    fn test_mcc_inference_from_narration() {
        assert_eq!(infer_mcc(None, "salary credit").0, "6012");
        assert_eq!(infer_mcc(None, "rent may").0, "6513");
        assert_eq!(infer_mcc(None, "grocery store").0, "5411");
        assert_eq!(infer_mcc(None, "HP petrol pump").0, "5541");
        assert_eq!(infer_mcc(None, "jio recharge").0, "4812");
        assert_eq!(infer_mcc(None, "swiggy order").0, "5812");
        assert_eq!(infer_mcc(None, "EMI payment").0, "6010");
        assert_eq!(infer_mcc(None, "mystery merchant").0, "0000");
    }

    #[test]
    fn test_explicit_mcc_wins() {
        let (mcc, _) = infer_mcc(Some("5999"), "grocery store");
        assert_eq!(mcc, "5999");
    }

    #[test]
    fn test_single_category_diversity_is_zero() {
        let txns = vec![
            upi_txn(100.0, "grocery a", "2025-05-01"),
            upi_txn(200.0, "grocery b", "2025-05-02"),
        ];
        let analytics = analyze_upi(&txns);
        assert_eq!(analytics.mcc_breakdown.len(), 1);
        assert_eq!(analytics.merchant_diversity_score, 0.0);
    }

    #[test]
    fn test_even_spread_diversity_is_one() {
        let txns = vec![
            upi_txn(10_000.0, "rent to landlord", "2025-05-01"),
            upi_txn(1_200.0, "grocery store", "2025-05-02"),
            upi_txn(50_000.0, "salary credit", "2025-05-03"),
        ];
        let analytics = analyze_upi(&txns);
        let mccs: Vec<&str> = analytics
            .mcc_breakdown
            .iter()
            .map(|s| s.mcc.as_str())
            .collect();
        assert!(mccs.contains(&"6513"));
        assert!(mccs.contains(&"5411"));
        assert!(mccs.contains(&"6012"));
        // Three equally-represented categories: entropy ln 3, normalised 1.000
        assert_eq!(analytics.merchant_diversity_score, 1.0);
    }

    #[test]
    fn test_uneven_spread_lies_between() {
        let mut txns = vec![upi_txn(100.0, "rent", "2025-05-01")];
        for i in 0..9 {
            txns.push(upi_txn(50.0, "grocery store", &format!("2025-05-0{}", (i % 9) + 1)));
        }
        let score = analyze_upi(&txns).merchant_diversity_score;
        assert!(score > 0.0 && score < 1.0, "score was {}", score);
    }

    #[test]
    fn test_empty_set() {
        let analytics = analyze_upi(&[]);
        assert_eq!(analytics.transaction_count, 0);
        assert_eq!(analytics.total_volume, 0.0);
        assert_eq!(analytics.avg_transaction_amt, 0.0);
        assert_eq!(analytics.merchant_diversity_score, 0.0);
    }

    #[test]
    fn test_monthly_frequency_buckets() {
        let txns = vec![
            upi_txn(10.0, "a", "2025-04-28"),
            upi_txn(10.0, "b", "2025-05-01"),
            upi_txn(10.0, "c", "2025-05-15"),
        ];
        let analytics = analyze_upi(&txns);
        assert_eq!(analytics.monthly_frequency.get("2025-04"), Some(&1));
        assert_eq!(analytics.monthly_frequency.get("2025-05"), Some(&2));
    }

    #[test]
    fn test_top_merchants_sorted_by_volume() {
        let txns = vec![
            upi_txn(100.0, "small shop", "2025-05-01"),
            upi_txn(5_000.0, "big shop", "2025-05-02"),
            upi_txn(5_000.0, "big shop", "2025-05-09"),
        ];
        let analytics = analyze_upi(&txns);
        assert_eq!(analytics.top_merchants[0].narration, "big shop");
        assert_eq!(analytics.top_merchants[0].count, 2);
        assert_eq!(analytics.top_merchants[0].volume, 10_000.0);
    }
}
