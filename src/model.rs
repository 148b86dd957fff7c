use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{FinanceError, Result};

// ============================================================================
// TRANSACTION TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    /// Human label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            TransactionType::Income => "Income",
            TransactionType::Expense => "Expense",
        }
    }
}

impl FromStr for TransactionType {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(FinanceError::validation(format!(
                "type must be 'income' or 'expense', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

/// Stored transaction record
///
/// `amount` may carry a sign from legacy data; consumers pair `amount.abs()`
/// with `tx_type` and never read meaning into the sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub owner_id: String,
    pub amount: Decimal,
    pub description: String,
    pub category: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,

    /// Optimistic-concurrency token, starts at 1
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn magnitude(&self) -> Decimal {
        self.amount.abs()
    }

    pub fn is_expense(&self) -> bool {
        self.tx_type == TransactionType::Expense
    }

    pub fn is_income(&self) -> bool {
        self.tx_type == TransactionType::Income
    }

    /// Two decimals, sign by type: "+3500.00" / "-45.99"
    pub fn signed_display(&self) -> String {
        let sign = match self.tx_type {
            TransactionType::Income => '+',
            TransactionType::Expense => '-',
        };
        format!("{}{}", sign, format_money(self.magnitude()))
    }
}

/// Round half away from zero to cents and always print two decimals
pub fn format_money(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

// ============================================================================
// RAW INPUT
// ============================================================================

/// Amount as the client sent it: a JSON number or a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    pub fn parse(&self) -> Result<Decimal> {
        let text = match self {
            RawAmount::Number(n) if n.is_finite() => n.to_string(),
            RawAmount::Number(n) => {
                return Err(FinanceError::validation(format!("amount is not numeric: {}", n)))
            }
            RawAmount::Text(s) => s.trim().to_string(),
        };

        Decimal::from_str(&text)
            .map_err(|_| FinanceError::validation(format!("amount is not numeric: '{}'", text)))
    }
}

impl From<&str> for RawAmount {
    fn from(s: &str) -> Self {
        RawAmount::Text(s.to_string())
    }
}

impl From<f64> for RawAmount {
    fn from(n: f64) -> Self {
        RawAmount::Number(n)
    }
}

impl From<Decimal> for RawAmount {
    fn from(d: Decimal) -> Self {
        RawAmount::Text(d.to_string())
    }
}

/// Fields submitted for a new transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: RawAmount,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub date: String,
    #[serde(rename = "type")]
    pub tx_type: String,
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionPatch {
    #[serde(default)]
    pub amount: Option<RawAmount>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, rename = "type")]
    pub tx_type: Option<String>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.date.is_none()
            && self.tx_type.is_none()
    }
}

// ============================================================================
// FIELD VALIDATION
// ============================================================================

pub fn validate_description(description: &str) -> Result<String> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(FinanceError::validation("description must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// ISO dates first, then the US format found in bank CSV exports
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .map_err(|_| FinanceError::validation(format!("date is not parseable: '{}'", raw)))
}

/// Largest magnitude accepted for an amount or a budget limit (one trillion).
/// Sums over any realistic ledger stay far below `Decimal::MAX`.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Reject magnitudes above MAX_AMOUNT
pub fn check_magnitude(field: &str, value: Decimal) -> Result<Decimal> {
    if value.abs() > Decimal::from(MAX_AMOUNT) {
        return Err(FinanceError::validation(format!(
            "{} exceeds the maximum of {}: {}",
            field, MAX_AMOUNT, value
        )));
    }
    Ok(value)
}

/// Canonical stored amount: unsigned magnitude, the type carries direction
pub fn canonical_amount(raw: &RawAmount) -> Result<Decimal> {
    check_magnitude("amount", raw.parse()?.abs())
}

/// Fingerprint for create deduplication, scoped to the owner
pub fn idempotency_fingerprint(owner_id: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}
