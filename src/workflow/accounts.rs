//! Account and transaction-history scrape.
//!
//! Depends on a successful authentication; the adapter logs back in when
//! the login checks left the shared session signed out. Accounts and
//! their histories are bulk scrapes, so malformed rows are skipped and
//! logged rather than failing the step.

use super::{RunState, Section, Step, StepOutput};
use crate::adapter::{AccountsAdapter, ExtractionAdapter};
use crate::error::Result;
use crate::record::{normalize_batch, MalformedPolicy, NormalizedRecord, RecordKind};
use crate::report::sheets;
use async_trait::async_trait;
use tracing::info;

pub struct AccountsStep {
    adapter: AccountsAdapter,
}

impl AccountsStep {
    pub fn new(adapter: AccountsAdapter) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl Step for AccountsStep {
    fn name(&self) -> &'static str {
        "accounts"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["auth"]
    }

    async fn run(&self, state: &mut RunState) -> Result<StepOutput> {
        let raw = self.adapter.extract().await?;
        let normalized = normalize_batch(&raw, MalformedPolicy::SkipAndLog)?;

        let (accounts, transactions): (Vec<NormalizedRecord>, Vec<NormalizedRecord>) = normalized
            .into_iter()
            .partition(|r| r.kind() == RecordKind::Account);
        info!(
            accounts = accounts.len(),
            transactions = transactions.len(),
            "account data scraped"
        );

        state.web_accounts = accounts.clone();
        state.web_transactions = transactions.clone();

        let mut sections = vec![Section::new(sheets::USER_ACCOUNTS, accounts.clone())];
        for account in &accounts {
            if let NormalizedRecord::Account { account_id, .. } = account {
                let history: Vec<NormalizedRecord> = transactions
                    .iter()
                    .filter(|t| {
                        matches!(t, NormalizedRecord::Transaction { account_id: tid, .. } if tid == account_id)
                    })
                    .cloned()
                    .collect();
                sections.push(Section::new(sheets::account_history(account_id), history));
            }
        }

        Ok(StepOutput {
            sections,
            artifacts: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MockPageDriver;
    use crate::config;
    use std::path::PathBuf;
    use std::sync::Arc;

    const DASHBOARD: &str = r#"
        <a href="/logout.jsp">Sign Off</a>
        <table id="accounts">
          <tr><th>Account</th><th>Account Type</th><th>Balance</th></tr>
          <tr><td><a href="/bank/account.jsp?id=800000">800000</a></td><td>Checking</td><td>$15,000.00</td></tr>
          <tr><td><a href="/bank/account.jsp?id=800001">800001</a></td><td>Savings</td><td>$25,000.00</td></tr>
        </table>"#;

    const HISTORY_800000: &str = r#"
        <table id="transactions">
          <tr><th>Date</th><th>ID</th><th>Description</th><th>Amount</th></tr>
          <tr><td>2025-03-04</td><td>TX1</td><td>Deposit</td><td>$150.00</td></tr>
        </table>"#;

    const HISTORY_EMPTY: &str = r#"<table id="transactions"><tr><th>Date</th></tr></table>"#;

    fn step() -> AccountsStep {
        let driver = Arc::new(
            MockPageDriver::new(PathBuf::from("shots"))
                .with_page("/bank/main.jsp", DASHBOARD)
                .with_page("/bank/account.jsp?id=800000", HISTORY_800000)
                .with_page("/bank/account.jsp?id=800001", HISTORY_EMPTY),
        );
        AccountsStep::new(AccountsAdapter::new(driver, &config::test_settings()))
    }

    #[tokio::test]
    async fn scrape_populates_state_and_history_sections() {
        let mut state = RunState::new();
        let output = step().run(&mut state).await.unwrap();

        assert_eq!(state.web_accounts.len(), 2);
        assert_eq!(state.web_transactions.len(), 1);

        let sheet_names: Vec<&str> = output.sections.iter().map(|s| s.sheet.as_str()).collect();
        assert_eq!(
            sheet_names,
            vec![
                sheets::USER_ACCOUNTS,
                "Account_800000_History",
                "Account_800001_History",
            ]
        );
        assert_eq!(output.sections[1].records.len(), 1);
        assert!(output.sections[2].records.is_empty());
    }

    #[tokio::test]
    async fn declares_auth_dependency() {
        assert_eq!(step().depends_on(), &["auth"]);
    }
}
