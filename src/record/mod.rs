//! Canonical record model shared by the web and API extraction paths.
//!
//! Adapters return [`RawRecord`]s, untyped key/value data tagged with the
//! source and kind they came from. The normalizer turns those into
//! [`NormalizedRecord`]s, which carry a stable identity key used for
//! cross-source matching and for ordering report output.

pub mod normalize;

pub use normalize::{normalize, normalize_batch, MalformedPolicy};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Web,
    Api,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Web => write!(f, "web"),
            Source::Api => write!(f, "api"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Account,
    Transaction,
    Card,
    AuthResult,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Account => write!(f, "account"),
            RecordKind::Transaction => write!(f, "transaction"),
            RecordKind::Card => write!(f, "card"),
            RecordKind::AuthResult => write!(f, "auth_result"),
        }
    }
}

/// Source-specific key/value data as returned by an adapter. Ephemeral:
/// consumed by the normalizer immediately after extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub source: Source,
    pub kind: RecordKind,
    pub fields: HashMap<String, String>,
}

impl RawRecord {
    pub fn new(source: Source, kind: RecordKind) -> Self {
        Self {
            source,
            kind,
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthOutcome {
    Success,
    Failure,
}

/// Validated, canonically-shaped record used for comparison and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedRecord {
    Account {
        source: Source,
        account_id: String,
        account_type: String,
        balance: f64,
        owner: String,
    },
    Transaction {
        source: Source,
        account_id: String,
        date: NaiveDate,
        description: String,
        amount: f64,
        transaction_id: String,
    },
    Card {
        source: Source,
        card_name: String,
        annual_fee: f64,
        interest_rate: f64,
        features: BTreeSet<String>,
    },
    AuthResult {
        source: Source,
        attempted_username: String,
        outcome: AuthOutcome,
        error_message: Option<String>,
    },
}

impl NormalizedRecord {
    pub fn source(&self) -> Source {
        match self {
            Self::Account { source, .. }
            | Self::Transaction { source, .. }
            | Self::Card { source, .. }
            | Self::AuthResult { source, .. } => *source,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Account { .. } => RecordKind::Account,
            Self::Transaction { .. } => RecordKind::Transaction,
            Self::Card { .. } => RecordKind::Card,
            Self::AuthResult { .. } => RecordKind::AuthResult,
        }
    }

    /// Stable identity key for cross-source matching.
    ///
    /// Accounts match on account id; transactions on the
    /// `(account_id, date, amount, description)` composite; cards on name.
    /// Auth results are report-only and keyed by attempted username.
    pub fn identity_key(&self) -> String {
        match self {
            Self::Account { account_id, .. } => format!("account:{account_id}"),
            Self::Transaction {
                account_id,
                date,
                amount,
                description,
                ..
            } => format!("transaction:{account_id}:{date}:{amount:.2}:{description}"),
            Self::Card { card_name, .. } => format!("card:{card_name}"),
            Self::AuthResult {
                attempted_username, ..
            } => format!("auth:{attempted_username}"),
        }
    }

    /// Canonical field values for discrepancy reporting, in a stable order.
    pub fn comparable_fields(&self) -> Vec<(&'static str, FieldValue)> {
        match self {
            Self::Account {
                account_type,
                balance,
                owner,
                ..
            } => vec![
                ("account_type", FieldValue::Text(account_type.clone())),
                ("balance", FieldValue::Number(*balance)),
                ("owner", FieldValue::Text(owner.clone())),
            ],
            Self::Transaction {
                transaction_id, ..
            } => vec![("transaction_id", FieldValue::Text(transaction_id.clone()))],
            Self::Card {
                annual_fee,
                interest_rate,
                features,
                ..
            } => vec![
                ("annual_fee", FieldValue::Number(*annual_fee)),
                ("interest_rate", FieldValue::Number(*interest_rate)),
                (
                    "features",
                    FieldValue::Text(
                        features.iter().cloned().collect::<Vec<_>>().join(", "),
                    ),
                ),
            ],
            Self::AuthResult { .. } => Vec::new(),
        }
    }
}

/// A single comparable field value; numbers compare under the configured
/// tolerance, text compares exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n:.2}"),
            FieldValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl FieldValue {
    pub fn matches(&self, other: &FieldValue, tolerance: f64) -> bool {
        match (self, other) {
            (FieldValue::Number(a), FieldValue::Number(b)) => (a - b).abs() <= tolerance,
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            _ => false,
        }
    }
}
