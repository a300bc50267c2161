//! Bank transaction normalisation and cashflow analytics
//!
//! FIPs return transaction lists in several shapes; a single dispatching
//! extractor flattens them all into raw records, and one normaliser maps
//! each record onto the canonical schema. Everything downstream is pure
//! computation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Sample slices of credits/debits returned to callers are capped
const SAMPLE_CAP: usize = 50;

/// Recurring-payment groups returned to callers are capped
const RECURRING_CAP: usize = 5;

/// Transaction direction
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxnType {
    Credit,
    Debit,
}

/// A normalised bank transaction
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Transaction {
    pub txn_id: String,
    pub date: String,
    #[serde(rename = "type")]
    pub txn_type: TxnType,
    pub mode: String,
    pub amount: f64,
    pub balance: f64,
    pub narration: String,
    pub reference: String,
    pub category: String,
}

/// Per-category rollup
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CategoryStat {
    pub count: u32,
    pub amount: f64,
}

/// A detected recurring debit group
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecurringPayment {
    pub narration: String,
    pub amount: f64,
    pub count: u32,
    pub frequency: String,
}

/// Cashflow analysis over a normalised transaction set
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransactionAnalysis {
    pub total_inflow: f64,
    pub total_outflow: f64,
    pub net_flow: f64,
    pub savings_rate: f64,
    pub credit_count: u32,
    pub debit_count: u32,
    pub category_breakdown: HashMap<String, CategoryStat>,
    pub recurring_payments: Vec<RecurringPayment>,
    pub credits: Vec<Transaction>,
    pub debits: Vec<Transaction>,
}

/// Narration keyword table for category inference. First match wins.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("Salary", &["salary", "payroll", "sal credit", "stipend"]),
    ("Rent", &["rent", "lease"]),
    (
        "Utilities",
        &[
            "electricity",
            "power bill",
            "water bill",
            "gas bill",
            "broadband",
            "recharge",
            "dth",
        ],
    ),
    ("EMI", &["emi", "loan repay", "instalment", "installment"]),
    (
        "Investment",
        &["mutual fund", "sip", "invest", "zerodha", "groww"],
    ),
    (
        "Shopping",
        &["amazon", "flipkart", "myntra", "shopping", "mall"],
    ),
    (
        "Food",
        &["swiggy", "zomato", "restaurant", "food", "cafe", "grocer"],
    ),
    (
        "Travel",
        &["uber", "ola", "irctc", "flight", "travel", "petrol", "fuel"],
    ),
    ("UPI_Transfer", &["upi"]),
];

/// Flatten any accepted input shape into raw records.
///
/// Accepted shapes: a top-level array; `Account.Transactions.Transaction`
/// (array or single); `Transactions`; `transactions`; `data`; or a single
/// object that itself looks like a transaction.
pub fn extract_records(value: &Value) -> Vec<Value> {
    fn as_records(node: &Value) -> Option<Vec<Value>> {
        match node {
            Value::Array(items) => Some(items.clone()),
            Value::Object(_) => Some(vec![node.clone()]),
            _ => None,
        }
    }

    if let Value::Array(items) = value {
        return items.clone();
    }

    let nested = value
        .get("Account")
        .and_then(|a| a.get("Transactions"))
        .and_then(|t| t.get("Transaction"));
    if let Some(records) = nested.and_then(as_records) {
        return records;
    }

    for key in ["Transactions", "transactions", "data"] {
        if let Some(records) = value.get(key).and_then(as_records) {
            return records;
        }
    }

    // A lone object carrying transaction-like fields counts as one record.
    if value.is_object()
        && ["amount", "narration", "type", "txnId"]
            .iter()
            .any(|k| value.get(k).is_some())
    {
        return vec![value.clone()];
    }

    Vec::new()
}

fn string_field(raw: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match raw.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn number_field(raw: &Value, keys: &[&str]) -> f64 {
    for key in keys {
        match raw.get(key) {
            Some(Value::Number(n)) => {
                let v = n.as_f64().unwrap_or(0.0);
                return if v.is_nan() { 0.0 } else { v.abs() };
            }
            Some(Value::String(s)) => {
                if let Ok(v) = s.trim().parse::<f64>() {
                    return if v.is_nan() { 0.0 } else { v.abs() };
                }
            }
            _ => {}
        }
    }
    0.0
}

fn detect_type(raw: &Value, narration: &str) -> TxnType {
    if let Some(explicit) = string_field(raw, &["type", "txnType", "transactionType"]) {
        match explicit.to_uppercase().as_str() {
            "CREDIT" | "CR" | "C" => return TxnType::Credit,
            "DEBIT" | "DR" | "D" => return TxnType::Debit,
            _ => {}
        }
    }
    let lowered = narration.to_lowercase();
    if ["credit", "received", "deposit"]
        .iter()
        .any(|k| lowered.contains(k))
    {
        TxnType::Credit
    } else {
        TxnType::Debit
    }
}

/// Infer a spend category from the narration keyword table.
pub fn infer_category(narration: &str) -> String {
    let lowered = narration.to_lowercase();
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|k| lowered.contains(k)) {
            return (*category).to_string();
        }
    }
    "Misc".to_string()
}

/// Map a raw record onto the canonical transaction schema.
pub fn normalize_record(raw: &Value) -> Option<Transaction> {
    if !raw.is_object() {
        return None;
    }

    let narration = string_field(raw, &["narration", "description", "remarks"])
        .unwrap_or_default();
    let txn_type = detect_type(raw, &narration);

    Some(Transaction {
        txn_id: string_field(raw, &["txnId", "txnid", "transactionId", "id", "_id"])
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        date: string_field(
            raw,
            &["transactionTimestamp", "valueDate", "date", "txnDate"],
        )
        .unwrap_or_default(),
        txn_type,
        mode: string_field(raw, &["mode", "txnMode", "channel"])
            .unwrap_or_else(|| "OTHER".to_string())
            .to_uppercase(),
        amount: number_field(raw, &["amount", "txnAmount", "value"]),
        balance: number_field(raw, &["currentBalance", "balance", "closingBalance"]),
        category: infer_category(&narration),
        reference: string_field(raw, &["reference", "refNo", "utr"]).unwrap_or_default(),
        narration,
    })
}

/// Normalise every record an input shape yields.
pub fn normalize_value(value: &Value) -> Vec<Transaction> {
    extract_records(value)
        .iter()
        .filter_map(normalize_record)
        .collect()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Run the cashflow analysis over a normalised transaction set.
pub fn analyze(transactions: &[Transaction]) -> TransactionAnalysis {
    let (credits, debits): (Vec<_>, Vec<_>) = transactions
        .iter()
        .cloned()
        .partition(|t| t.txn_type == TxnType::Credit);

    let total_inflow = round2(credits.iter().map(|t| t.amount).sum());
    let total_outflow = round2(debits.iter().map(|t| t.amount).sum());
    let net_flow = round2(total_inflow - total_outflow);
    let savings_rate = if total_inflow > 0.0 {
        round4(net_flow / total_inflow)
    } else {
        0.0
    };

    let mut category_breakdown: HashMap<String, CategoryStat> = HashMap::new();
    for txn in transactions {
        let stat = category_breakdown.entry(txn.category.clone()).or_default();
        stat.count += 1;
        stat.amount = round2(stat.amount + txn.amount);
    }

    let recurring_payments = detect_recurring(&debits);

    TransactionAnalysis {
        total_inflow,
        total_outflow,
        net_flow,
        savings_rate,
        credit_count: credits.len() as u32,
        debit_count: debits.len() as u32,
        category_breakdown,
        recurring_payments,
        credits: credits.into_iter().take(SAMPLE_CAP).collect(),
        debits: debits.into_iter().take(SAMPLE_CAP).collect(),
    }
}

/// Extract, normalise, and analyse in one step.
pub fn analyze_value(value: &Value) -> TransactionAnalysis {
    analyze(&normalize_value(value))
}

/// Group debits by amount and narration prefix; groups seen at least twice
/// are treated as recurring.
fn detect_recurring(debits: &[Transaction]) -> Vec<RecurringPayment> {
    let mut groups: HashMap<String, RecurringPayment> = HashMap::new();
    for txn in debits {
        let prefix: String = txn.narration.to_lowercase().chars().take(10).collect();
        let key = format!("{:.2}|{}", txn.amount, prefix);
        groups
            .entry(key)
            .and_modify(|g| g.count += 1)
            .or_insert(RecurringPayment {
                narration: txn.narration.clone(),
                amount: txn.amount,
                count: 1,
                frequency: String::new(),
            });
    }

    let mut recurring: Vec<RecurringPayment> = groups
        .into_values()
        .filter(|g| g.count >= 2)
        .map(|mut g| {
            g.frequency = if g.count > 5 {
                "Weekly/Biweekly".to_string()
            } else {
                "Monthly".to_string()
            };
            g
        })
        .collect();
    recurring.sort_by(|a, b| b.count.cmp(&a.count));
    recurring.truncate(RECURRING_CAP);
    recurring
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_txn(txn_type: &str, amount: f64, narration: &str) -> Value {
        json!({
            "txnId": format!("t-{}", narration),
            "type": txn_type,
            "mode": "UPI",
            "amount": amount,
            "currentBalance": 1000.0,
            "narration": narration,
            "valueDate": "2025-05-01",
        })
    }

    #[test]
    fn test_all_shapes_agree() {
        let records = vec![
            raw_txn("CREDIT", 50000.0, "salary may"),
            raw_txn("DEBIT", 10000.0, "rent may"),
            raw_txn("DEBIT", 1200.0, "swiggy"),
        ];

        let shapes = vec![
            json!(records),
            json!({"Account": {"Transactions": {"Transaction": records}}}),
            json!({"Transactions": records}),
            json!({"transactions": records}),
            json!({"data": records}),
        ];

        let analyses: Vec<TransactionAnalysis> =
            shapes.iter().map(analyze_value).collect();
        for analysis in &analyses {
            assert_eq!(analysis.total_inflow, 50000.0);
            assert_eq!(analysis.total_outflow, 11200.0);
            assert_eq!(analysis.net_flow, 38800.0);
            assert_eq!(analysis.credit_count, 1);
            assert_eq!(analysis.debit_count, 2);
        }
    }

    #[test]
    fn test_single_nested_transaction_object() {
        let shape = json!({
            "Account": {"Transactions": {"Transaction": raw_txn("DEBIT", 500.0, "fuel")}}
        });
        let analysis = analyze_value(&shape);
        assert_eq!(analysis.debit_count, 1);
        assert_eq!(analysis.total_outflow, 500.0);
    }

    #[test]
    fn test_bare_transaction_object() {
        let analysis = analyze_value(&raw_txn("CREDIT", 100.0, "deposit"));
        assert_eq!(analysis.credit_count, 1);
    }

    #[test]
    fn test_type_detection_fallbacks() {
        // Explicit short codes
        assert_eq!(
            normalize_record(&json!({"type": "CR", "amount": 1, "narration": "x"}))
                .unwrap()
                .txn_type,
            TxnType::Credit
        );
        assert_eq!(
            normalize_record(&json!({"type": "DR", "amount": 1, "narration": "x"}))
                .unwrap()
                .txn_type,
            TxnType::Debit
        );
        // Narration keyword
        assert_eq!(
            normalize_record(&json!({"amount": 1, "narration": "NEFT received from ACME"}))
                .unwrap()
                .txn_type,
            TxnType::Credit
        );
        // Default is debit
        assert_eq!(
            normalize_record(&json!({"amount": 1, "narration": "POS purchase"}))
                .unwrap()
                .txn_type,
            TxnType::Debit
        );
    }

    #[test]
    fn test_amount_parsing_tolerance() {
        let txn = normalize_record(&json!({"amount": "2500.75", "narration": "x"})).unwrap();
        assert_eq!(txn.amount, 2500.75);

        let txn = normalize_record(&json!({"amount": "garbage", "narration": "x"})).unwrap();
        assert_eq!(txn.amount, 0.0);

        let txn = normalize_record(&json!({"amount": -300.0, "narration": "x"})).unwrap();
        assert_eq!(txn.amount, 300.0);
    }

    #[test]
    fn test_category_inference() {
        assert_eq!(infer_category("ACME PAYROLL MAY"), "Salary");
        assert_eq!(infer_category("House rent transfer"), "Rent");
        assert_eq!(infer_category("BESCOM electricity"), "Utilities");
        assert_eq!(infer_category("HDFC EMI 44211"), "EMI");
        assert_eq!(infer_category("Swiggy order"), "Food");
        assert_eq!(infer_category("UPI/12345/transfer"), "UPI_Transfer");
        assert_eq!(infer_category("something else entirely"), "Misc");
    }

    #[test]
    fn test_savings_rate_zero_when_no_inflow() {
        let txns = normalize_value(&json!([raw_txn("DEBIT", 100.0, "misc spend")]));
        let analysis = analyze(&txns);
        assert_eq!(analysis.savings_rate, 0.0);
        assert_eq!(analysis.net_flow, -100.0);
    }

    #[test]
    fn test_recurring_detection() {
        let mut records = Vec::new();
        for month in 1..=3 {
            records.push(json!({
                "type": "DEBIT", "amount": 10000.0,
                "narration": "rent to landlord", "date": format!("2025-0{}-01", month)
            }));
        }
        records.push(json!({
            "type": "DEBIT", "amount": 999.0, "narration": "one-off purchase"
        }));

        let analysis = analyze_value(&json!(records));
        assert_eq!(analysis.recurring_payments.len(), 1);
        let recurring = &analysis.recurring_payments[0];
        assert_eq!(recurring.count, 3);
        assert_eq!(recurring.frequency, "Monthly");
        assert_eq!(recurring.amount, 10000.0);
    }

    #[test]
    fn test_frequent_group_labelled_weekly() {
        let records: Vec<Value> = (0..6)
            .map(|i| {
                json!({"type": "DEBIT", "amount": 250.0,
                       "narration": "metro recharge", "date": format!("2025-05-{:02}", i + 1)})
            })
            .collect();
        let analysis = analyze_value(&json!(records));
        assert_eq!(analysis.recurring_payments[0].frequency, "Weekly/Biweekly");
    }

    #[test]
    fn test_sample_slices_capped() {
        let records: Vec<Value> = (0..120)
            .map(|i| json!({"type": "CREDIT", "amount": 10.0, "narration": format!("c{}", i)}))
            .collect();
        let analysis = analyze_value(&json!(records));
        assert_eq!(analysis.credit_count, 120);
        assert_eq!(analysis.credits.len(), 50);
    }

    #[test]
    fn test_unrecognised_shape_yields_empty() {
        let analysis = analyze_value(&json!({"unrelated": true}));
        assert_eq!(analysis.credit_count + analysis.debit_count, 0);
        assert_eq!(analysis.total_inflow, 0.0);
    }
}
