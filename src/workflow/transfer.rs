//! Fund transfer step.
//!
//! Performs the one configured transfer. On success the confirmation is
//! captured as both a record and a screenshot; on failure the adapter
//! attaches an error screenshot to the extraction error and the run
//! controller marks the step failed without aborting the run.

use super::{RunState, Section, Step, StepOutput};
use crate::adapter::{ExtractionAdapter, TransferAdapter};
use crate::error::Result;
use crate::record::{normalize_batch, MalformedPolicy};
use crate::report::sheets;
use async_trait::async_trait;
use tracing::info;

pub struct TransferStep {
    adapter: TransferAdapter,
}

impl TransferStep {
    pub fn new(adapter: TransferAdapter) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl Step for TransferStep {
    fn name(&self) -> &'static str {
        "transfer"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["auth"]
    }

    async fn run(&self, _state: &mut RunState) -> Result<StepOutput> {
        let raw = self.adapter.extract().await?;
        let confirmation = normalize_batch(&raw, MalformedPolicy::FailFast)?;
        let screenshot = self.adapter.capture_screenshot("transfer_confirmation").await?;
        info!("transfer confirmation recorded");
        Ok(StepOutput {
            sections: vec![Section::new(sheets::TRANSFER_CONFIRMATION, confirmation)],
            artifacts: vec![screenshot],
        })
    }
}
