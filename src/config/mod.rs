//! Run configuration.
//!
//! Settings load once from a YAML file, take overrides from the
//! environment, and are validated before any step executes. Steps receive
//! the validated structure by reference; there is no ambient lookup.

use crate::error::{AutomationError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Date format used in the settings file and env overrides.
const CONFIG_DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSet {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub valid: CredentialSet,
    pub invalid: CredentialSet,
    pub api: CredentialSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Urls {
    #[serde(default = "default_base_url")]
    pub base: String,
    #[serde(default = "default_api_url")]
    pub api_base: String,
    #[serde(default = "default_login_path")]
    pub login: String,
    #[serde(default = "default_dashboard_path")]
    pub dashboard: String,
    #[serde(default = "default_transfer_path")]
    pub transfer: String,
    #[serde(default = "default_cards_path")]
    pub cards: String,
}

fn default_base_url() -> String {
    "https://demo.testfire.net".to_string()
}
fn default_api_url() -> String {
    "https://demo.testfire.net/api".to_string()
}
fn default_login_path() -> String {
    "/login.jsp".to_string()
}
fn default_dashboard_path() -> String {
    "/bank/main.jsp".to_string()
}
fn default_transfer_path() -> String {
    "/bank/transfer.jsp".to_string()
}
fn default_cards_path() -> String {
    "/bank/customize.jsp".to_string()
}

impl Default for Urls {
    fn default() -> Self {
        Self {
            base: default_base_url(),
            api_base: default_api_url(),
            login: default_login_path(),
            dashboard: default_dashboard_path(),
            transfer: default_transfer_path(),
            cards: default_cards_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferParams {
    pub from_account: String,
    pub to_account: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn parse(&self) -> Result<(NaiveDate, NaiveDate)> {
        let start = parse_config_date("filters.start", &self.start)?;
        let end = parse_config_date("filters.end", &self.end)?;
        if start > end {
            return Err(AutomationError::config_field(
                "filters",
                format!("start {start} is after end {end}"),
            ));
        }
        Ok((start, end))
    }
}

fn parse_config_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, CONFIG_DATE_FORMAT)
        .map_err(|e| AutomationError::config_field(field, format!("bad date '{value}': {e}")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filters {
    pub date_range: DateRange,
    pub api_dates: DateRange,
    pub min_deposit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_timeout_ms")]
    pub default_ms: u64,
    #[serde(default = "default_navigation_ms")]
    pub navigation_ms: u64,
    #[serde(default = "default_run_deadline_secs")]
    pub run_deadline_secs: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}
fn default_navigation_ms() -> u64 {
    30_000
}
fn default_run_deadline_secs() -> u64 {
    600
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default_ms: default_timeout_ms(),
            navigation_ms: default_navigation_ms(),
            run_deadline_secs: default_run_deadline_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retry {
    /// Bounded re-attempts for transient extraction failures. Capped at 1;
    /// assertion-style failures are never retried.
    #[serde(default = "default_max_retries")]
    pub max_attempts: u32,
}

fn default_max_retries() -> u32 {
    1
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_attempts: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reconcile {
    /// Absolute tolerance for numeric field comparison between sources.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_tolerance() -> f64 {
    0.01
}

impl Default for Reconcile {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    #[serde(default = "default_output_dir")]
    pub base_dir: PathBuf,
    #[serde(default = "default_screenshots_dir")]
    pub screenshots_dir: PathBuf,
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_screenshots_dir() -> PathBuf {
    PathBuf::from("output/screenshots")
}
fn default_report_dir() -> PathBuf {
    PathBuf::from("output/report")
}

impl Default for Output {
    fn default() -> Self {
        Self {
            base_dir: default_output_dir(),
            screenshots_dir: default_screenshots_dir(),
            report_dir: default_report_dir(),
        }
    }
}

/// Validated, immutable run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub credentials: Credentials,
    #[serde(default)]
    pub urls: Urls,
    pub transfer: TransferParams,
    pub filters: Filters,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub retry: Retry,
    #[serde(default)]
    pub reconcile: Reconcile,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub headless: bool,
}

impl Settings {
    /// Load settings from a YAML file, apply environment overrides, and
    /// validate. Fails before any step executes.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AutomationError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut settings: Settings = serde_yaml::from_str(&content)
            .map_err(|e| AutomationError::config(format!("invalid settings file: {e}")))?;
        settings.merge_env_vars();
        settings.validate()?;
        Ok(settings)
    }

    /// Apply environment-variable overrides on top of the file values.
    pub fn merge_env_vars(&mut self) {
        if let Ok(url) = env::var("BASE_URL") {
            self.urls.base = url;
        }
        if let Ok(url) = env::var("API_BASE_URL") {
            self.urls.api_base = url;
        }
        if let Ok(v) = env::var("HEADLESS") {
            self.headless = matches!(v.as_str(), "1" | "true" | "yes");
        }
        for (var, slot) in [
            ("VALID_USERNAME", &mut self.credentials.valid.username),
            ("VALID_PASSWORD", &mut self.credentials.valid.password),
            ("INVALID_USERNAME", &mut self.credentials.invalid.username),
            ("INVALID_PASSWORD", &mut self.credentials.invalid.password),
            ("API_USERNAME", &mut self.credentials.api.username),
            ("API_PASSWORD", &mut self.credentials.api.password),
            ("TRANSFER_FROM_ACCOUNT", &mut self.transfer.from_account),
            ("TRANSFER_TO_ACCOUNT", &mut self.transfer.to_account),
            ("TRANSFER_AMOUNT", &mut self.transfer.amount),
            ("FILTER_DATE_START", &mut self.filters.date_range.start),
            ("FILTER_DATE_END", &mut self.filters.date_range.end),
        ] {
            if let Ok(value) = env::var(var) {
                *slot = value;
            }
        }
        if let Ok(v) = env::var("DEPOSIT_MIN_AMOUNT") {
            if let Ok(amount) = v.parse() {
                self.filters.min_deposit = amount;
            }
        }
    }

    /// Check every required key once, before the run starts.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("credentials.valid.username", &self.credentials.valid.username),
            ("credentials.valid.password", &self.credentials.valid.password),
            (
                "credentials.invalid.username",
                &self.credentials.invalid.username,
            ),
            (
                "credentials.invalid.password",
                &self.credentials.invalid.password,
            ),
            ("credentials.api.username", &self.credentials.api.username),
            ("credentials.api.password", &self.credentials.api.password),
            ("transfer.from_account", &self.transfer.from_account),
            ("transfer.to_account", &self.transfer.to_account),
        ] {
            if value.trim().is_empty() {
                return Err(AutomationError::config_field(field, "must not be empty"));
            }
        }

        self.transfer.amount.parse::<f64>().map_err(|_| {
            AutomationError::config_field(
                "transfer.amount",
                format!("'{}' is not a number", self.transfer.amount),
            )
        })?;

        self.filters.date_range.parse()?;
        self.filters.api_dates.parse()?;

        if self.filters.min_deposit < 0.0 {
            return Err(AutomationError::config_field(
                "filters.min_deposit",
                "must be non-negative",
            ));
        }
        if self.reconcile.tolerance < 0.0 {
            return Err(AutomationError::config_field(
                "reconcile.tolerance",
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> Settings {
    Settings {
        credentials: Credentials {
            valid: CredentialSet {
                username: "admin".into(),
                password: "admin".into(),
            },
            invalid: CredentialSet {
                username: "admin".into(),
                password: "wrongpassword".into(),
            },
            api: CredentialSet {
                username: "jsmith".into(),
                password: "demo1234".into(),
            },
        },
        urls: Urls::default(),
        transfer: TransferParams {
            from_account: "800000 Checking".into(),
            to_account: "800000 Corporate".into(),
            amount: "100000.00".into(),
        },
        filters: Filters {
            date_range: DateRange {
                start: "01/03/2025".into(),
                end: "08/03/2025".into(),
            },
            api_dates: DateRange {
                start: "01/01/2025".into(),
                end: "31/03/2025".into(),
            },
            min_deposit: 100.0,
        },
        timeouts: Timeouts::default(),
        retry: Retry::default(),
        reconcile: Reconcile::default(),
        output: Output::default(),
        headless: true,
    }
}
