//! Report assembly.
//!
//! The assembler accumulates every step's output plus the reconciliation
//! result into named tables in a fixed, documented sheet order, then
//! finalizes exactly once into an immutable [`RunReport`]. Recording after
//! finalization, or finalizing twice, is a programming error surfaced as
//! an assembly error.

pub mod export;

pub use export::{CsvExporter, ReportExporter};

use crate::error::{AutomationError, Result};
use crate::reconcile::ReconciliationReport;
use crate::record::NormalizedRecord;
use crate::workflow::StepResult;
use serde::Serialize;
use uuid::Uuid;

/// Fixed sheet names, in report order. Per-account history sheets are
/// generated dynamically and slot in after the account list.
pub mod sheets {
    pub const AUTHENTICATION: &str = "Authentication";
    pub const USER_ACCOUNTS: &str = "User_Accounts";
    pub const TRANSACTIONS_DATE_RANGE: &str = "Transactions_DateRange";
    pub const HIGH_VALUE_DEPOSITS: &str = "High_Value_Deposits";
    pub const TRANSFER_CONFIRMATION: &str = "Transfer_Confirmation";
    pub const AVAILABLE_CARDS: &str = "Available_Cards";
    pub const API_ACCOUNTS: &str = "API_Accounts";
    pub const API_TRANSACTIONS: &str = "API_Transactions";
    pub const API_TRANSACTIONS_FILTERED: &str = "API_Transactions_DateFiltered";
    pub const DISCREPANCIES: &str = "Discrepancies";
    pub const RUN_SUMMARY: &str = "Run_Summary";

    /// Spreadsheet tab-name limit.
    pub const MAX_SHEET_NAME: usize = 31;

    /// Sheet name for one account's transaction history.
    pub fn account_history(account_id: &str) -> String {
        let name = format!("Account_{account_id}_History");
        if name.chars().count() <= MAX_SHEET_NAME {
            name
        } else {
            let keep: String = account_id.chars().take(20).collect();
            format!("Acc_{keep}_Hist")
        }
    }
}

const SHEET_ORDER: &[&str] = &[
    sheets::AUTHENTICATION,
    sheets::USER_ACCOUNTS,
    // account history sheets interleave here
    sheets::TRANSACTIONS_DATE_RANGE,
    sheets::HIGH_VALUE_DEPOSITS,
    sheets::TRANSFER_CONFIRMATION,
    sheets::AVAILABLE_CARDS,
    sheets::API_ACCOUNTS,
    sheets::API_TRANSACTIONS,
    sheets::API_TRANSACTIONS_FILTERED,
    sheets::DISCREPANCIES,
    sheets::RUN_SUMMARY,
];

fn sheet_rank(name: &str) -> usize {
    if let Some(rank) = SHEET_ORDER.iter().position(|s| *s == name) {
        rank * 2
    } else {
        // Dynamic sheets (Account_*_History) follow the account list.
        SHEET_ORDER
            .iter()
            .position(|s| *s == sheets::USER_ACCOUNTS)
            .expect("user accounts sheet in order table")
            * 2
            + 1
    }
}

/// One rendered table.
#[derive(Debug, Clone, Serialize)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// The finalized, ordered collection of tables from a complete run.
/// Immutable by construction: no method mutates it after finalize.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub tables: Vec<Table>,
}

impl RunReport {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// Incremental report builder. Owned exclusively by the run controller.
pub struct ReportAssembler {
    run_id: Uuid,
    step_results: Vec<StepResult>,
    reconciliation: Option<ReconciliationReport>,
    finalized: bool,
}

impl ReportAssembler {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            step_results: Vec::new(),
            reconciliation: None,
            finalized: false,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.finalized {
            return Err(AutomationError::assembly(format!(
                "{operation} after finalize"
            )));
        }
        Ok(())
    }

    pub fn record_step(&mut self, result: StepResult) -> Result<()> {
        self.ensure_open("record_step")?;
        self.step_results.push(result);
        Ok(())
    }

    pub fn record_reconciliation(&mut self, report: ReconciliationReport) -> Result<()> {
        self.ensure_open("record_reconciliation")?;
        self.reconciliation = Some(report);
        Ok(())
    }

    /// Build the final report. Callable exactly once.
    pub fn finalize(&mut self) -> Result<RunReport> {
        self.ensure_open("finalize")?;
        self.finalized = true;

        // (rank, insertion index) keeps the documented order while
        // preserving arrival order for dynamic sheets.
        let mut tables: Vec<(usize, usize, Table)> = Vec::new();
        let mut insertion = 0usize;

        for result in &self.step_results {
            for section in &result.sections {
                let table = render_records(&section.sheet, &section.records);
                tables.push((sheet_rank(&section.sheet), insertion, table));
                insertion += 1;
            }
        }

        if let Some(reconciliation) = &self.reconciliation {
            tables.push((
                sheet_rank(sheets::DISCREPANCIES),
                insertion,
                render_discrepancies(reconciliation),
            ));
            insertion += 1;
        }

        tables.push((
            sheet_rank(sheets::RUN_SUMMARY),
            insertion,
            self.render_summary(),
        ));

        tables.sort_by_key(|(rank, idx, _)| (*rank, *idx));
        Ok(RunReport {
            run_id: self.run_id,
            tables: tables.into_iter().map(|(_, _, t)| t).collect(),
        })
    }

    fn render_summary(&self) -> Table {
        let mut rows: Vec<Vec<String>> = self
            .step_results
            .iter()
            .map(|r| {
                vec![
                    r.step_name.clone(),
                    r.status.to_string(),
                    r.error.clone().unwrap_or_default(),
                    r.artifacts
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join("; "),
                ]
            })
            .collect();
        rows.push(vec![
            "run_id".to_string(),
            self.run_id.to_string(),
            String::new(),
            String::new(),
        ]);
        if let Some(reconciliation) = &self.reconciliation {
            rows.push(vec![
                "api_available".to_string(),
                reconciliation.api_available.to_string(),
                String::new(),
                String::new(),
            ]);
        }
        Table {
            name: sheets::RUN_SUMMARY.to_string(),
            headers: ["Step", "Status", "Error", "Artifacts"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows,
        }
    }
}

impl Default for ReportAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn render_records(sheet: &str, records: &[NormalizedRecord]) -> Table {
    let headers: Vec<&str> = match records.first() {
        Some(NormalizedRecord::Account { .. }) => {
            vec!["Account ID", "Account Type", "Balance", "Owner", "Source"]
        }
        Some(NormalizedRecord::Transaction { .. }) => vec![
            "Account ID",
            "Date",
            "Description",
            "Amount",
            "Transaction ID",
            "Source",
        ],
        Some(NormalizedRecord::Card { .. }) => vec![
            "Card Name",
            "Annual Fee",
            "Interest Rate",
            "Features",
            "Source",
        ],
        Some(NormalizedRecord::AuthResult { .. }) => {
            vec!["Username", "Outcome", "Error Message", "Source"]
        }
        None => vec![],
    };
    let rows = records.iter().map(record_row).collect();
    Table {
        name: sheet.to_string(),
        headers: headers.into_iter().map(String::from).collect(),
        rows,
    }
}

fn record_row(record: &NormalizedRecord) -> Vec<String> {
    match record {
        NormalizedRecord::Account {
            source,
            account_id,
            account_type,
            balance,
            owner,
        } => vec![
            account_id.clone(),
            account_type.clone(),
            format!("{balance:.2}"),
            owner.clone(),
            source.to_string(),
        ],
        NormalizedRecord::Transaction {
            source,
            account_id,
            date,
            description,
            amount,
            transaction_id,
        } => vec![
            account_id.clone(),
            date.format("%Y-%m-%d").to_string(),
            description.clone(),
            format!("{amount:.2}"),
            transaction_id.clone(),
            source.to_string(),
        ],
        NormalizedRecord::Card {
            source,
            card_name,
            annual_fee,
            interest_rate,
            features,
        } => vec![
            card_name.clone(),
            format!("{annual_fee:.2}"),
            format!("{interest_rate:.2}"),
            features.iter().cloned().collect::<Vec<_>>().join(", "),
            source.to_string(),
        ],
        NormalizedRecord::AuthResult {
            source,
            attempted_username,
            outcome,
            error_message,
        } => vec![
            attempted_username.clone(),
            match outcome {
                crate::record::AuthOutcome::Success => "success".to_string(),
                crate::record::AuthOutcome::Failure => "failure".to_string(),
            },
            error_message.clone().unwrap_or_default(),
            source.to_string(),
        ],
    }
}

fn render_discrepancies(reconciliation: &ReconciliationReport) -> Table {
    let mut rows: Vec<Vec<String>> = reconciliation
        .discrepancies
        .iter()
        .map(|d| {
            vec![
                d.entity_key.clone(),
                d.field.clone(),
                d.web_value
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "(absent)".to_string()),
                d.api_value
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "(absent)".to_string()),
                d.kind.to_string(),
            ]
        })
        .collect();
    if !reconciliation.api_available {
        rows.insert(
            0,
            vec![
                "(summary)".to_string(),
                String::new(),
                String::new(),
                String::new(),
                "API unavailable: missing_in_api rows reflect an absent endpoint".to_string(),
            ],
        );
    }
    Table {
        name: sheets::DISCREPANCIES.to_string(),
        headers: ["Entity Key", "Field", "Web Value", "API Value", "Kind"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{NormalizedRecord, Source};
    use crate::workflow::{Section, StepOutput, StepResult};

    fn account(id: &str) -> NormalizedRecord {
        NormalizedRecord::Account {
            source: Source::Web,
            account_id: id.to_string(),
            account_type: "Checking".to_string(),
            balance: 100.0,
            owner: "admin".to_string(),
        }
    }

    fn step_with_sheet(step: &str, sheet: &str) -> StepResult {
        StepResult::succeeded(
            step,
            StepOutput {
                sections: vec![Section::new(sheet, vec![account("800000")])],
                artifacts: Vec::new(),
            },
        )
    }

    #[test]
    fn sheets_come_out_in_documented_order() {
        let mut assembler = ReportAssembler::new();
        // Arrival order deliberately scrambled.
        assembler
            .record_step(step_with_sheet("api", sheets::API_ACCOUNTS))
            .unwrap();
        assembler
            .record_step(step_with_sheet("accounts", sheets::USER_ACCOUNTS))
            .unwrap();
        assembler
            .record_step(step_with_sheet("auth", sheets::AUTHENTICATION))
            .unwrap();
        let report = assembler.finalize().unwrap();
        let names: Vec<&str> = report.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                sheets::AUTHENTICATION,
                sheets::USER_ACCOUNTS,
                sheets::API_ACCOUNTS,
                sheets::RUN_SUMMARY,
            ]
        );
    }

    #[test]
    fn history_sheets_follow_the_account_list() {
        let mut assembler = ReportAssembler::new();
        assembler
            .record_step(step_with_sheet("cards", sheets::AVAILABLE_CARDS))
            .unwrap();
        assembler
            .record_step(step_with_sheet("accounts", sheets::USER_ACCOUNTS))
            .unwrap();
        assembler
            .record_step(step_with_sheet("accounts", &sheets::account_history("800000")))
            .unwrap();
        let report = assembler.finalize().unwrap();
        let names: Vec<&str> = report.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                sheets::USER_ACCOUNTS,
                "Account_800000_History",
                sheets::AVAILABLE_CARDS,
                sheets::RUN_SUMMARY,
            ]
        );
    }

    #[test]
    fn finalize_twice_is_an_assembly_error() {
        let mut assembler = ReportAssembler::new();
        assembler.finalize().unwrap();
        let err = assembler.finalize().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn record_after_finalize_is_an_assembly_error() {
        let mut assembler = ReportAssembler::new();
        assembler.finalize().unwrap();
        assert!(assembler
            .record_step(step_with_sheet("auth", sheets::AUTHENTICATION))
            .is_err());
    }

    #[test]
    fn api_unavailable_adds_summary_row_to_discrepancies() {
        let mut assembler = ReportAssembler::new();
        assembler
            .record_reconciliation(crate::reconcile::reconcile(
                &[account("800000")],
                &[],
                0.01,
                false,
            ))
            .unwrap();
        let report = assembler.finalize().unwrap();
        let table = report.table(sheets::DISCREPANCIES).unwrap();
        assert!(table.rows[0][4].contains("API unavailable"));
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn long_account_ids_truncate_history_sheet_name() {
        let name = sheets::account_history("12345678901234567890123456789");
        assert!(name.len() <= sheets::MAX_SHEET_NAME);
        assert!(name.starts_with("Acc_"));
    }

    #[test]
    fn non_ascii_account_ids_truncate_without_panicking() {
        let id = "compte-épargne-numéro-800001-très-long";
        let name = sheets::account_history(id);
        assert!(name.chars().count() <= sheets::MAX_SHEET_NAME);
        assert!(name.starts_with("Acc_compte-épargne"));
    }

    #[test]
    fn summary_lists_every_step_and_run_id() {
        let mut assembler = ReportAssembler::new();
        let run_id = assembler.run_id().to_string();
        assembler
            .record_step(StepResult::skipped("transfer", "dependency auth failed"))
            .unwrap();
        let report = assembler.finalize().unwrap();
        let summary = report.table(sheets::RUN_SUMMARY).unwrap();
        assert!(summary
            .rows
            .iter()
            .any(|r| r[0] == "transfer" && r[1] == "skipped"));
        assert!(summary.rows.iter().any(|r| r[1] == run_id));
    }
}
