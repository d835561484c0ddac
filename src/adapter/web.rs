//! Web-UI extraction adapters, one per page.
//!
//! Each adapter drives the shared [`PageDriver`] through one page's flow
//! and returns raw records tagged with `Source::Web`. Adapters never retry
//! internally; failures bubble up as extraction or timeout errors for the
//! run controller to classify.

use super::driver::PageDriver;
use crate::config::{CredentialSet, Settings, TransferParams, Urls};
use crate::error::{AutomationError, Result};
use crate::record::{RawRecord, RecordKind, Source};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

const LOGIN_ERROR_PATTERN: &str =
    r#"(?is)<span[^>]*id\s*=\s*["']?_ctl0__ctl0_Content_Main_message["']?[^>]*>(.*?)</span>"#;
const TRANSFER_CONFIRMATION_PATTERN: &str =
    r#"(?is)<span[^>]*id\s*=\s*["']?_ctl0__ctl0_Content_Main_postResp["']?[^>]*>(.*?)</span>"#;

/// Re-establish the authenticated session when it has lapsed. The site
/// drops the session cookie on sign-off, and the login assertions leave
/// the browser signed out, so session-bound flows log back in with the
/// valid credentials before touching their page.
async fn ensure_logged_in(
    driver: &Arc<dyn PageDriver>,
    urls: &Urls,
    credentials: &CredentialSet,
) -> Result<()> {
    driver.goto(&urls.dashboard).await?;
    if driver.page_text().await.contains("Sign Off") {
        return Ok(());
    }
    debug!(username = %credentials.username, "no active session; logging back in");
    driver.goto(&urls.login).await?;
    driver
        .submit_form(
            "/doLogin",
            &[
                ("uid", &credentials.username),
                ("passw", &credentials.password),
                ("btnSubmit", "Login"),
            ],
        )
        .await?;
    let landed = driver.current_url().await;
    if landed.contains(&urls.dashboard) || driver.page_text().await.contains("Sign Off") {
        Ok(())
    } else {
        Err(AutomationError::extraction(
            "login",
            "could not re-establish an authenticated session",
        ))
    }
}

/// One web page or API resource worth of extraction.
#[async_trait]
pub trait ExtractionAdapter: Send + Sync {
    /// Name used in logs and failure screenshots.
    fn name(&self) -> &'static str;

    /// Drive the page and return raw records.
    async fn extract(&self) -> Result<Vec<RawRecord>>;

    /// Persist failure or confirmation evidence.
    async fn capture_screenshot(&self, label: &str) -> Result<PathBuf>;
}

/// Performs one login attempt and reports the outcome as an auth_result
/// record. Does not decide whether failure is "wrong": the auth step owns
/// that assertion.
pub struct LoginAdapter {
    driver: Arc<dyn PageDriver>,
    urls: Urls,
    credentials: CredentialSet,
}

impl LoginAdapter {
    pub fn new(driver: Arc<dyn PageDriver>, settings: &Settings, credentials: CredentialSet) -> Self {
        Self {
            driver,
            urls: settings.urls.clone(),
            credentials,
        }
    }

    /// Log the current session out via the sign-off link, ignoring failure
    /// when no session exists.
    pub async fn sign_off(&self) {
        if self.driver.goto("/logout.jsp").await.is_err() {
            debug!("sign-off navigation failed; continuing");
        }
    }
}

#[async_trait]
impl ExtractionAdapter for LoginAdapter {
    fn name(&self) -> &'static str {
        "login"
    }

    async fn extract(&self) -> Result<Vec<RawRecord>> {
        self.driver.goto(&self.urls.login).await?;
        self.driver
            .submit_form(
                "/doLogin",
                &[
                    ("uid", &self.credentials.username),
                    ("passw", &self.credentials.password),
                    ("btnSubmit", "Login"),
                ],
            )
            .await?;

        let landed = self.driver.current_url().await;
        let on_dashboard =
            landed.contains(&self.urls.dashboard) || self.driver.page_text().await.contains("Sign Off");

        let mut raw = RawRecord::new(Source::Web, RecordKind::AuthResult)
            .with_field("username", &self.credentials.username);
        if on_dashboard {
            info!(username = %self.credentials.username, "login succeeded");
            raw = raw.with_field("outcome", "success");
        } else {
            let error = self.driver.find(LOGIN_ERROR_PATTERN).await.unwrap_or_default();
            info!(username = %self.credentials.username, %error, "login rejected");
            raw = raw
                .with_field("outcome", "failure")
                .with_field("error_message", &error);
        }
        Ok(vec![raw])
    }

    async fn capture_screenshot(&self, label: &str) -> Result<PathBuf> {
        self.driver.capture(label).await
    }
}

/// Enumerates all visible accounts from the dashboard table, then walks
/// each account link for its transaction history. Returns account records
/// followed by that account's transaction records; callers partition by
/// kind. Never assumes a fixed account count.
pub struct AccountsAdapter {
    driver: Arc<dyn PageDriver>,
    urls: Urls,
    credentials: CredentialSet,
}

impl AccountsAdapter {
    pub fn new(driver: Arc<dyn PageDriver>, settings: &Settings) -> Self {
        Self {
            driver,
            urls: settings.urls.clone(),
            credentials: settings.credentials.valid.clone(),
        }
    }

    fn account_record(&self, cells: &[String]) -> Option<RawRecord> {
        let number = cells.first()?.trim();
        if number.is_empty() || number.eq_ignore_ascii_case("account") {
            return None;
        }
        Some(
            RawRecord::new(Source::Web, RecordKind::Account)
                .with_field("Account Number", number)
                .with_field(
                    "Account Type",
                    cells.get(1).map(String::as_str).unwrap_or(""),
                )
                .with_field("Balance", cells.get(2).map(String::as_str).unwrap_or(""))
                .with_field("Owner", &self.credentials.username),
        )
    }

    async fn history_for(&self, account_id: &str, href: &str) -> Result<Vec<RawRecord>> {
        self.driver.goto(href).await?;
        let rows = self.driver.table_rows("transactions").await?;
        let mut records = Vec::new();
        for cells in rows.iter().skip(1) {
            let date = cells.first().map(String::as_str).unwrap_or("");
            if date.is_empty() || date.eq_ignore_ascii_case("date") {
                continue;
            }
            records.push(
                RawRecord::new(Source::Web, RecordKind::Transaction)
                    .with_field("Account Number", account_id)
                    .with_field("Date", date)
                    .with_field("ID", cells.get(1).map(String::as_str).unwrap_or(""))
                    .with_field(
                        "Description",
                        cells.get(2).map(String::as_str).unwrap_or(""),
                    )
                    .with_field("Amount", cells.get(3).map(String::as_str).unwrap_or("")),
            );
        }
        debug!(account_id, count = records.len(), "account history scraped");
        Ok(records)
    }
}

#[async_trait]
impl ExtractionAdapter for AccountsAdapter {
    fn name(&self) -> &'static str {
        "accounts"
    }

    async fn extract(&self) -> Result<Vec<RawRecord>> {
        ensure_logged_in(&self.driver, &self.urls, &self.credentials).await?;
        self.driver.goto(&self.urls.dashboard).await?;
        let rows = self.driver.table_rows("accounts").await?;
        let links = self.driver.links_matching(r"account\.jsp").await;

        let mut records = Vec::new();
        let mut account_links = Vec::new();
        for cells in rows.iter().skip(1) {
            if let Some(record) = self.account_record(cells) {
                let id = record.get("Account Number").unwrap_or_default().to_string();
                if let Some((_, href)) = links.iter().find(|(text, _)| text.trim() == id) {
                    account_links.push((id.clone(), href.clone()));
                }
                records.push(record);
            }
        }
        if records.is_empty() {
            return Err(AutomationError::extraction(
                "dashboard",
                "no accounts visible",
            ));
        }

        for (id, href) in account_links {
            records.extend(self.history_for(&id, &href).await?);
        }
        Ok(records)
    }

    async fn capture_screenshot(&self, label: &str) -> Result<PathBuf> {
        self.driver.capture(label).await
    }
}

/// Performs the one configured transfer and returns the confirmation as a
/// transaction record on the source account.
pub struct TransferAdapter {
    driver: Arc<dyn PageDriver>,
    urls: Urls,
    params: TransferParams,
    credentials: CredentialSet,
}

impl TransferAdapter {
    pub fn new(driver: Arc<dyn PageDriver>, settings: &Settings) -> Self {
        Self {
            driver,
            urls: settings.urls.clone(),
            params: settings.transfer.clone(),
            credentials: settings.credentials.valid.clone(),
        }
    }

    fn account_value(account: &str) -> &str {
        // "800000 Checking" -> option value "800000"
        account.split_whitespace().next().unwrap_or(account)
    }
}

#[async_trait]
impl ExtractionAdapter for TransferAdapter {
    fn name(&self) -> &'static str {
        "transfer"
    }

    async fn extract(&self) -> Result<Vec<RawRecord>> {
        ensure_logged_in(&self.driver, &self.urls, &self.credentials).await?;
        self.driver.goto(&self.urls.transfer).await?;
        self.driver
            .submit_form(
                &self.urls.transfer,
                &[
                    ("fromAccount", Self::account_value(&self.params.from_account)),
                    ("toAccount", Self::account_value(&self.params.to_account)),
                    ("transferAmount", &self.params.amount),
                    ("transfer", "Transfer"),
                ],
            )
            .await?;

        let confirmation = self
            .driver
            .find(TRANSFER_CONFIRMATION_PATTERN)
            .await
            .unwrap_or_default();
        let succeeded = confirmation.to_lowercase().contains("successfully");
        if !succeeded {
            let shot = self.driver.capture("transfer_failed").await?;
            return Err(AutomationError::extraction(
                "transfer",
                format!("no success confirmation: '{confirmation}'"),
            )
            .with_screenshot(shot));
        }

        info!(%confirmation, "transfer confirmed");
        let today = chrono::Local::now().date_naive().format("%Y-%m-%d");
        Ok(vec![RawRecord::new(Source::Web, RecordKind::Transaction)
            .with_field("Account Number", Self::account_value(&self.params.from_account))
            .with_field("ID", "transfer-confirmation")
            .with_field("Date", today.to_string())
            .with_field(
                "Description",
                format!(
                    "Transfer from {} to {}: {}",
                    self.params.from_account, self.params.to_account, confirmation
                ),
            )
            .with_field("Amount", &self.params.amount)])
    }

    async fn capture_screenshot(&self, label: &str) -> Result<PathBuf> {
        self.driver.capture(label).await
    }
}

/// Scrapes the public card-product catalog. No authenticated session is
/// required for this page.
pub struct CardsAdapter {
    driver: Arc<dyn PageDriver>,
    urls: Urls,
}

impl CardsAdapter {
    pub fn new(driver: Arc<dyn PageDriver>, settings: &Settings) -> Self {
        Self {
            driver,
            urls: settings.urls.clone(),
        }
    }
}

#[async_trait]
impl ExtractionAdapter for CardsAdapter {
    fn name(&self) -> &'static str {
        "cards"
    }

    async fn extract(&self) -> Result<Vec<RawRecord>> {
        self.driver.goto(&self.urls.cards).await?;
        let rows = self.driver.table_rows("cards").await?;
        if rows.len() < 2 {
            return Err(AutomationError::extraction(
                "cards",
                "card catalog table absent or empty",
            ));
        }
        let headers: Vec<String> = rows[0].clone();
        let mut records = Vec::new();
        for cells in rows.iter().skip(1) {
            let mut raw = RawRecord::new(Source::Web, RecordKind::Card);
            for (header, cell) in headers.iter().zip(cells) {
                raw = raw.with_field(header.clone(), cell.clone());
            }
            records.push(raw);
        }
        Ok(records)
    }

    async fn capture_screenshot(&self, label: &str) -> Result<PathBuf> {
        self.driver.capture(label).await
    }
}
