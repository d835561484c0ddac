//! API client for the bank's REST endpoints.
//!
//! The API side is independent of the browser session: separate
//! credentials, its own HTTP client, and JSON payloads. An HTTP 404 is
//! surfaced as `ApiError { status: 404 }` so the API step can treat the
//! endpoint-not-implemented case as zero records instead of a failure.

use crate::config::{CredentialSet, Settings};
use crate::error::{AutomationError, Result};
use crate::record::{RawRecord, RecordKind, Source};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// The consumed API surface. [`HttpApiClient`] talks to the real backend;
/// [`MockBankApi`] scripts responses for tests.
#[async_trait]
pub trait BankApi: Send + Sync {
    /// Exchange credentials for a bearer token used by later calls.
    async fn authenticate(&self, credentials: &CredentialSet) -> Result<()>;

    /// Fetch all accounts visible to the authenticated user.
    async fn fetch_accounts(&self) -> Result<Vec<RawRecord>>;

    /// Fetch transactions, optionally bounded to an inclusive date range.
    async fn fetch_transactions(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<RawRecord>>;
}

pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    token: Mutex<Option<String>>,
}

impl HttpApiClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AutomationError::extraction("api client", e.to_string()))?;
        Ok(Self {
            client,
            base_url: settings.urls.api_base.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(settings.timeouts.default_ms),
            token: Mutex::new(None),
        })
    }

    async fn get(&self, resource: &str, query: &[(String, String)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, resource.trim_start_matches('/'));
        let mut request = self.client.get(&url).query(query);
        if let Some(token) = self.token.lock().await.as_deref() {
            request = request.bearer_auth(token);
        }
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| AutomationError::timeout(resource, self.timeout.as_millis() as u64))?
            .map_err(|e| AutomationError::api_with_source(resource, 0, e))?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(AutomationError::api(resource, status));
        }
        response
            .json()
            .await
            .map_err(|e| AutomationError::api_with_source(resource, status, e))
    }
}

#[async_trait]
impl BankApi for HttpApiClient {
    async fn authenticate(&self, credentials: &CredentialSet) -> Result<()> {
        let url = format!("{}/login", self.base_url);
        let body = serde_json::json!({
            "username": credentials.username,
            "password": credentials.password,
        });
        let response = tokio::time::timeout(self.timeout, self.client.post(&url).json(&body).send())
            .await
            .map_err(|_| AutomationError::timeout("login", self.timeout.as_millis() as u64))?
            .map_err(|e| AutomationError::api_with_source("login", 0, e))?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(AutomationError::api("login", status));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|e| AutomationError::api_with_source("login", status, e))?;
        let token = payload
            .get("Authorization")
            .or_else(|| payload.get("token"))
            .and_then(Value::as_str)
            .ok_or_else(|| AutomationError::api("login", status))?;
        *self.token.lock().await = Some(token.to_string());
        info!(username = %credentials.username, "API authenticated");
        Ok(())
    }

    async fn fetch_accounts(&self) -> Result<Vec<RawRecord>> {
        let payload = self.get("account", &[]).await?;
        let records = json_records(&payload, "Accounts", RecordKind::Account);
        debug!(count = records.len(), "API accounts fetched");
        Ok(records)
    }

    async fn fetch_transactions(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<RawRecord>> {
        let mut query = Vec::new();
        if let Some((start, end)) = range {
            query.push(("start_date".to_string(), start.format("%Y-%m-%d").to_string()));
            query.push(("end_date".to_string(), end.format("%Y-%m-%d").to_string()));
        }
        let payload = self.get("transactions", &query).await?;
        let records = json_records(&payload, "transactions", RecordKind::Transaction);
        debug!(count = records.len(), "API transactions fetched");
        Ok(records)
    }
}

/// Flatten a JSON array (either under `key`, case-insensitively, or the
/// payload itself) into api-tagged raw records; every primitive field
/// becomes a string for the normalizer to coerce.
fn json_records(payload: &Value, key: &str, kind: RecordKind) -> Vec<RawRecord> {
    let array = payload
        .as_object()
        .and_then(|map| {
            map.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
        .or(Some(payload))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    array
        .iter()
        .filter_map(Value::as_object)
        .map(|object| {
            let mut raw = RawRecord::new(Source::Api, kind);
            for (field, value) in object {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                raw = raw.with_field(field.clone(), rendered);
            }
            raw
        })
        .collect()
}

/// Scripted API for tests: responses are queued per resource, and an
/// HTTP-status script simulates unavailable endpoints.
#[derive(Default)]
pub struct MockBankApi {
    pub accounts: Vec<RawRecord>,
    pub transactions: Vec<RawRecord>,
    pub auth_should_fail: bool,
    pub status_override: Option<u16>,
}

impl MockBankApi {
    pub fn unavailable() -> Self {
        Self {
            status_override: Some(404),
            ..Self::default()
        }
    }
}

#[async_trait]
impl BankApi for MockBankApi {
    async fn authenticate(&self, _credentials: &CredentialSet) -> Result<()> {
        if self.auth_should_fail {
            return Err(AutomationError::api("login", 401));
        }
        Ok(())
    }

    async fn fetch_accounts(&self) -> Result<Vec<RawRecord>> {
        if let Some(status) = self.status_override {
            return Err(AutomationError::api("account", status));
        }
        Ok(self.accounts.clone())
    }

    async fn fetch_transactions(
        &self,
        _range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<RawRecord>> {
        if let Some(status) = self.status_override {
            return Err(AutomationError::api("transactions", status));
        }
        Ok(self.transactions.clone())
    }
}
