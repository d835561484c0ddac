//! Cross-source reconciliation.
//!
//! Compares web-scraped records against API records for the same logical
//! entities. Accounts and transactions participate (they carry
//! cross-source identity keys); cards and auth results are report-only.
//! Output ordering is deterministic: sorted by entity key, then field.

use crate::record::{FieldValue, NormalizedRecord, RecordKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    MissingInWeb,
    MissingInApi,
    ValueMismatch,
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscrepancyKind::MissingInWeb => write!(f, "missing_in_web"),
            DiscrepancyKind::MissingInApi => write!(f, "missing_in_api"),
            DiscrepancyKind::ValueMismatch => write!(f, "value_mismatch"),
        }
    }
}

/// One detected difference between sources. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discrepancy {
    pub entity_key: String,
    pub field: String,
    pub web_value: Option<FieldValue>,
    pub api_value: Option<FieldValue>,
    pub kind: DiscrepancyKind,
}

/// Reconciliation output. `api_available` is false when the API step
/// yielded nothing because the endpoint was absent; the report surfaces
/// that flag so blanket `missing_in_api` rows are not mistaken for a real
/// data-integrity problem.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub discrepancies: Vec<Discrepancy>,
    pub api_available: bool,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

fn key_map(records: &[NormalizedRecord]) -> BTreeMap<String, &NormalizedRecord> {
    records
        .iter()
        .filter(|r| matches!(r.kind(), RecordKind::Account | RecordKind::Transaction))
        .map(|r| (r.identity_key(), r))
        .collect()
}

fn presence(record: &NormalizedRecord) -> FieldValue {
    FieldValue::Text(format!("{} present", record.kind()))
}

/// Compare the two normalized sets and produce the ordered discrepancy
/// list. Numeric fields compare under `tolerance`; text fields exactly.
pub fn reconcile(
    web: &[NormalizedRecord],
    api: &[NormalizedRecord],
    tolerance: f64,
    api_available: bool,
) -> ReconciliationReport {
    let web_map = key_map(web);
    let api_map = key_map(api);

    let mut discrepancies = Vec::new();
    // BTreeMap iteration gives key-sorted order; fields within one record
    // are sorted explicitly below.
    let mut keys: Vec<&String> = web_map.keys().chain(api_map.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        match (web_map.get(key), api_map.get(key)) {
            (Some(web_record), None) => discrepancies.push(Discrepancy {
                entity_key: key.clone(),
                field: "record".to_string(),
                web_value: Some(presence(web_record)),
                api_value: None,
                kind: DiscrepancyKind::MissingInApi,
            }),
            (None, Some(api_record)) => discrepancies.push(Discrepancy {
                entity_key: key.clone(),
                field: "record".to_string(),
                web_value: None,
                api_value: Some(presence(api_record)),
                kind: DiscrepancyKind::MissingInWeb,
            }),
            (Some(web_record), Some(api_record)) => {
                let web_fields = web_record.comparable_fields();
                let api_fields: BTreeMap<&str, FieldValue> =
                    api_record.comparable_fields().into_iter().collect();
                let mut mismatches: Vec<Discrepancy> = web_fields
                    .into_iter()
                    .filter_map(|(field, web_value)| {
                        let api_value = api_fields.get(field)?;
                        if web_value.matches(api_value, tolerance) {
                            None
                        } else {
                            Some(Discrepancy {
                                entity_key: key.clone(),
                                field: field.to_string(),
                                web_value: Some(web_value),
                                api_value: Some(api_value.clone()),
                                kind: DiscrepancyKind::ValueMismatch,
                            })
                        }
                    })
                    .collect();
                mismatches.sort_by(|a, b| a.field.cmp(&b.field));
                discrepancies.extend(mismatches);
            }
            (None, None) => unreachable!("key taken from the union of both maps"),
        }
    }

    info!(
        count = discrepancies.len(),
        api_available, "reconciliation complete"
    );
    ReconciliationReport {
        discrepancies,
        api_available,
    }
}
