//! Card-catalog scrape. The catalog page is public, so this step has no
//! dependency on authentication.

use super::{RunState, Section, Step, StepOutput};
use crate::adapter::{CardsAdapter, ExtractionAdapter};
use crate::error::Result;
use crate::record::{normalize_batch, MalformedPolicy};
use crate::report::sheets;
use async_trait::async_trait;
use tracing::info;

pub struct CardsStep {
    adapter: CardsAdapter,
}

impl CardsStep {
    pub fn new(adapter: CardsAdapter) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl Step for CardsStep {
    fn name(&self) -> &'static str {
        "cards"
    }

    async fn run(&self, _state: &mut RunState) -> Result<StepOutput> {
        let raw = self.adapter.extract().await?;
        let cards = normalize_batch(&raw, MalformedPolicy::SkipAndLog)?;
        info!(count = cards.len(), "card catalog scraped");
        Ok(StepOutput {
            sections: vec![Section::new(sheets::AVAILABLE_CARDS, cards)],
            artifacts: Vec::new(),
        })
    }
}
