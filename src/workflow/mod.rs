//! Workflow steps.
//!
//! Each step is a pure orchestration: acquire adapter, extract, normalize,
//! emit. Steps declare hard dependencies by name; the run controller
//! evaluates those declarations, so no skip logic lives inside step
//! bodies. A step never retries itself and never writes to the report
//! directly.

pub mod accounts;
pub mod api;
pub mod auth;
pub mod cards;
pub mod filters;
pub mod transfer;

pub use accounts::AccountsStep;
pub use api::ApiStep;
pub use auth::AuthStep;
pub use cards::CardsStep;
pub use filters::FiltersStep;
pub use transfer::TransferStep;

use crate::error::Result;
use crate::record::NormalizedRecord;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Succeeded => write!(f, "succeeded"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// A named group of records destined for one report sheet.
#[derive(Debug, Clone)]
pub struct Section {
    pub sheet: String,
    pub records: Vec<NormalizedRecord>,
}

impl Section {
    pub fn new(sheet: impl Into<String>, records: Vec<NormalizedRecord>) -> Self {
        Self {
            sheet: sheet.into(),
            records,
        }
    }
}

/// Successful output of one step: sheet-bound record groups plus any
/// evidence artifacts (screenshot paths).
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    pub sections: Vec<Section>,
    pub artifacts: Vec<PathBuf>,
}

impl StepOutput {
    pub fn records(&self) -> impl Iterator<Item = &NormalizedRecord> {
        self.sections.iter().flat_map(|s| s.records.iter())
    }
}

/// Outcome of one workflow unit, as recorded by the run controller.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step_name: String,
    pub status: StepStatus,
    pub sections: Vec<Section>,
    pub artifacts: Vec<PathBuf>,
    pub error: Option<String>,
    /// True when the failure is a tolerated case (absent API endpoint)
    /// that must not affect the process exit code.
    pub expected_failure: bool,
}

impl StepResult {
    pub fn succeeded(step_name: &str, output: StepOutput) -> Self {
        Self {
            step_name: step_name.to_string(),
            status: StepStatus::Succeeded,
            sections: output.sections,
            artifacts: output.artifacts,
            error: None,
            expected_failure: false,
        }
    }

    pub fn failed(step_name: &str, error: &crate::error::AutomationError) -> Self {
        let mut artifacts = Vec::new();
        if let crate::error::AutomationError::Extraction {
            screenshot: Some(path),
            ..
        } = error
        {
            artifacts.push(path.clone());
        }
        Self {
            step_name: step_name.to_string(),
            status: StepStatus::Failed,
            sections: Vec::new(),
            artifacts,
            error: Some(error.to_string()),
            expected_failure: error.is_expected(),
        }
    }

    pub fn skipped(step_name: &str, reason: &str) -> Self {
        Self {
            step_name: step_name.to_string(),
            status: StepStatus::Skipped,
            sections: Vec::new(),
            artifacts: Vec::new(),
            error: Some(reason.to_string()),
            expected_failure: false,
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &NormalizedRecord> {
        self.sections.iter().flat_map(|s| s.records.iter())
    }
}

/// Data shared across steps within one run. Later steps read what earlier
/// steps stashed; the controller owns the state and hands it to one step
/// at a time.
#[derive(Debug, Default)]
pub struct RunState {
    pub web_accounts: Vec<NormalizedRecord>,
    pub web_transactions: Vec<NormalizedRecord>,
    pub api_accounts: Vec<NormalizedRecord>,
    pub api_transactions: Vec<NormalizedRecord>,
    /// Cleared when the API reported the endpoint as not implemented.
    pub api_endpoint_present: bool,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            api_endpoint_present: true,
            ..Self::default()
        }
    }

    /// All web-sourced records that participate in reconciliation.
    pub fn web_records(&self) -> Vec<NormalizedRecord> {
        self.web_accounts
            .iter()
            .chain(self.web_transactions.iter())
            .cloned()
            .collect()
    }

    /// All api-sourced records that participate in reconciliation.
    pub fn api_records(&self) -> Vec<NormalizedRecord> {
        self.api_accounts
            .iter()
            .chain(self.api_transactions.iter())
            .cloned()
            .collect()
    }
}

/// One ordered unit of work.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &'static str;

    /// Names of steps that must have succeeded for this step to run.
    fn depends_on(&self) -> &'static [&'static str] {
        &[]
    }

    async fn run(&self, state: &mut RunState) -> Result<StepOutput>;
}
