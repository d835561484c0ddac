//! Raw-to-canonical record normalization.
//!
//! Pure functions: no I/O, no ambient configuration. Field-name and unit
//! mappings differ per source (web table headers vs API JSON keys); a
//! missing required field or a value that fails coercion is a
//! normalization error, never a silent drop. The caller chooses per step
//! whether one malformed record fails the batch or is skipped and logged.

use super::{AuthOutcome, NormalizedRecord, RawRecord, RecordKind, Source};
use crate::error::{AutomationError, Result};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::warn;

/// How a batch treats a malformed record.
///
/// Accounts and transactions are scraped in bulk and tolerate a bad row;
/// auth and transfer records are single assertions and must fail fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedPolicy {
    SkipAndLog,
    FailFast,
}

/// Normalize one raw record into the canonical schema, preserving its
/// originating source.
pub fn normalize(raw: &RawRecord) -> Result<NormalizedRecord> {
    match raw.kind {
        RecordKind::Account => normalize_account(raw),
        RecordKind::Transaction => normalize_transaction(raw),
        RecordKind::Card => normalize_card(raw),
        RecordKind::AuthResult => normalize_auth_result(raw),
    }
}

/// Normalize a batch under the given malformed-record policy.
pub fn normalize_batch(
    raws: &[RawRecord],
    policy: MalformedPolicy,
) -> Result<Vec<NormalizedRecord>> {
    let mut out = Vec::with_capacity(raws.len());
    for raw in raws {
        match normalize(raw) {
            Ok(record) => out.push(record),
            Err(e) if policy == MalformedPolicy::SkipAndLog => {
                warn!(kind = %raw.kind, source = %raw.source, "skipping malformed record: {e}");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}

fn normalize_account(raw: &RawRecord) -> Result<NormalizedRecord> {
    let (id_keys, type_keys, balance_keys): (&[&str], &[&str], &[&str]) = match raw.source {
        Source::Web => (
            &["Account Number", "Account"],
            &["Account Type"],
            &["Balance"],
        ),
        Source::Api => (&["id", "account_id"], &["account_type"], &["balance"]),
    };
    Ok(NormalizedRecord::Account {
        source: raw.source,
        account_id: required_any(raw, id_keys)?,
        account_type: required_any(raw, type_keys)?,
        balance: parse_amount(raw, &required_any(raw, balance_keys)?, "balance")?,
        owner: required_any(raw, &["Owner", "owner"])?,
    })
}

fn normalize_transaction(raw: &RawRecord) -> Result<NormalizedRecord> {
    let (id_keys, account_keys, date_keys, desc_keys, amount_keys): (
        &[&str],
        &[&str],
        &[&str],
        &[&str],
        &[&str],
    ) = match raw.source {
        Source::Web => (
            &["Transaction ID", "ID"],
            &["Account Number", "Account"],
            &["Date"],
            &["Description"],
            &["Amount"],
        ),
        Source::Api => (
            &["transaction_id", "id"],
            &["account_id"],
            &["date"],
            &["description"],
            &["amount"],
        ),
    };
    Ok(NormalizedRecord::Transaction {
        source: raw.source,
        transaction_id: required_any(raw, id_keys)?,
        account_id: required_any(raw, account_keys)?,
        date: parse_date(raw, &required_any(raw, date_keys)?)?,
        description: required_any(raw, desc_keys)?,
        amount: parse_amount(raw, &required_any(raw, amount_keys)?, "amount")?,
    })
}

fn normalize_card(raw: &RawRecord) -> Result<NormalizedRecord> {
    let name = required_any(raw, &["Card Name", "Name", "card_name"])?;
    let fee = required_any(raw, &["Annual Fee", "annual_fee"])?;
    let rate = required_any(raw, &["APR", "Interest Rate", "interest_rate"])?;
    let features = raw
        .get("Features")
        .or_else(|| raw.get("features"))
        .unwrap_or("")
        .split(',')
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect::<BTreeSet<_>>();
    Ok(NormalizedRecord::Card {
        source: raw.source,
        card_name: name,
        annual_fee: parse_amount(raw, &fee, "annual_fee")?,
        interest_rate: parse_rate(raw, &rate)?,
        features,
    })
}

fn normalize_auth_result(raw: &RawRecord) -> Result<NormalizedRecord> {
    let outcome = match required_any(raw, &["outcome"])?.as_str() {
        "success" => AuthOutcome::Success,
        "failure" => AuthOutcome::Failure,
        other => {
            return Err(AutomationError::normalization(
                raw.kind.to_string(),
                "outcome",
                format!("expected success or failure, got '{other}'"),
            ))
        }
    };
    Ok(NormalizedRecord::AuthResult {
        source: raw.source,
        attempted_username: required_any(raw, &["username", "attempted_username"])?,
        outcome,
        error_message: raw
            .get("error_message")
            .filter(|m| !m.is_empty())
            .map(String::from),
    })
}

fn required_any(raw: &RawRecord, keys: &[&str]) -> Result<String> {
    keys.iter()
        .find_map(|k| raw.get(k))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AutomationError::normalization(
                raw.kind.to_string(),
                keys[0].to_string(),
                format!("required field absent in {} record", raw.source),
            )
        })
}

/// Parse a currency or plain-decimal string: `$1,234.56`, `-$25.00`,
/// `(25.00)` for negatives, or a bare number.
fn parse_amount(raw: &RawRecord, value: &str, field: &str) -> Result<f64> {
    let trimmed = value.trim();
    let (negative, inner) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        (true, &trimmed[1..trimmed.len() - 1])
    } else {
        (false, trimmed)
    };
    let cleaned: String = inner
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    let parsed: f64 = cleaned.parse().map_err(|_| {
        AutomationError::normalization(
            raw.kind.to_string(),
            field.to_string(),
            format!("'{value}' is not a decimal amount"),
        )
    })?;
    Ok(if negative { -parsed } else { parsed })
}

/// Parse an interest rate, tolerating a trailing percent sign.
fn parse_rate(raw: &RawRecord, value: &str) -> Result<f64> {
    let cleaned = value.trim().trim_end_matches('%');
    cleaned.parse().map_err(|_| {
        AutomationError::normalization(
            raw.kind.to_string(),
            "interest_rate".to_string(),
            format!("'{value}' is not a rate"),
        )
    })
}

/// Parse a calendar date in the site's ISO format, falling back to the
/// US-style format some table variants use.
fn parse_date(raw: &RawRecord, value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%m/%d/%Y"))
        .map_err(|_| {
            AutomationError::normalization(
                raw.kind.to_string(),
                "date".to_string(),
                format!("'{value}' is not a recognized date"),
            )
        })
}
