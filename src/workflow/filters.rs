//! Transaction filtering: a pure step with no page interaction.
//!
//! Operates on the transactions the accounts step already scraped.
//! Produces two tables: the inclusive date-range filter, and the
//! high-value deposits filter with documented "over the threshold"
//! (strictly greater) semantics. Input order is preserved.

use super::{RunState, Section, Step, StepOutput};
use crate::error::Result;
use crate::record::NormalizedRecord;
use crate::report::sheets;
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::info;

pub struct FiltersStep {
    range: (NaiveDate, NaiveDate),
    min_deposit: f64,
}

impl FiltersStep {
    pub fn new(range: (NaiveDate, NaiveDate), min_deposit: f64) -> Self {
        Self { range, min_deposit }
    }
}

/// Transactions with a date inside the inclusive `[start, end]` bound.
pub fn filter_date_range(
    transactions: &[NormalizedRecord],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<NormalizedRecord> {
    transactions
        .iter()
        .filter(|t| {
            matches!(t, NormalizedRecord::Transaction { date, .. } if *date >= start && *date <= end)
        })
        .cloned()
        .collect()
}

/// Deposits strictly over `threshold`.
pub fn filter_high_value(
    transactions: &[NormalizedRecord],
    threshold: f64,
) -> Vec<NormalizedRecord> {
    transactions
        .iter()
        .filter(|t| matches!(t, NormalizedRecord::Transaction { amount, .. } if *amount > threshold))
        .cloned()
        .collect()
}

#[async_trait]
impl Step for FiltersStep {
    fn name(&self) -> &'static str {
        "filters"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["accounts"]
    }

    async fn run(&self, state: &mut RunState) -> Result<StepOutput> {
        let (start, end) = self.range;
        let in_range = filter_date_range(&state.web_transactions, start, end);
        let high_value = filter_high_value(&state.web_transactions, self.min_deposit);
        info!(
            in_range = in_range.len(),
            high_value = high_value.len(),
            "transaction filters applied"
        );
        Ok(StepOutput {
            sections: vec![
                Section::new(sheets::TRANSACTIONS_DATE_RANGE, in_range),
                Section::new(sheets::HIGH_VALUE_DEPOSITS, high_value),
            ],
            artifacts: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Source;

    fn tx(id: &str, date: (i32, u32, u32), amount: f64) -> NormalizedRecord {
        NormalizedRecord::Transaction {
            source: Source::Web,
            account_id: "800000".to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            description: "Deposit".to_string(),
            amount,
            transaction_id: id.to_string(),
        }
    }

    fn ids(records: &[NormalizedRecord]) -> Vec<&str> {
        records
            .iter()
            .map(|r| match r {
                NormalizedRecord::Transaction { transaction_id, .. } => transaction_id.as_str(),
                _ => "",
            })
            .collect()
    }

    #[test]
    fn date_range_bound_is_inclusive_and_order_preserving() {
        let input = vec![
            tx("TX1", (2025, 2, 28), 10.0),
            tx("TX2", (2025, 3, 1), 10.0),
            tx("TX3", (2025, 3, 8), 10.0),
            tx("TX4", (2025, 3, 9), 10.0),
            tx("TX5", (2025, 3, 4), 10.0),
        ];
        let out = filter_date_range(
            &input,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 8).unwrap(),
        );
        assert_eq!(ids(&out), vec!["TX2", "TX3", "TX5"]);
    }

    #[test]
    fn high_value_is_strictly_greater_than_threshold() {
        let input = vec![
            tx("TX1", (2025, 3, 1), 50.0),
            tx("TX2", (2025, 3, 2), 150.0),
            tx("TX3", (2025, 3, 3), 100.0),
        ];
        let out = filter_high_value(&input, 100.0);
        assert_eq!(ids(&out), vec!["TX2"]);
    }

    #[tokio::test]
    async fn step_reads_scraped_transactions_from_state() {
        let mut state = RunState::new();
        state.web_transactions = vec![tx("TX1", (2025, 3, 4), 150.0), tx("TX2", (2025, 4, 1), 50.0)];
        let step = FiltersStep::new(
            (
                NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 8).unwrap(),
            ),
            100.0,
        );
        let output = step.run(&mut state).await.unwrap();
        assert_eq!(output.sections[0].records.len(), 1);
        assert_eq!(output.sections[1].records.len(), 1);
    }
}
