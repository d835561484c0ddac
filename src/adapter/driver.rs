//! Page driver abstraction.
//!
//! The browser is an external collaborator behind the [`PageDriver`] trait.
//! The shipped [`HttpPageDriver`] drives the site over a cookie-backed HTTP
//! session and parses markup with regexes, which is enough for the fixed
//! AltoroMutual page structure; a real browser driver plugs in behind the
//! same trait. [`MockPageDriver`] serves scripted pages for tests.

use crate::error::{AutomationError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Driver-level view of the site: navigation, form submission, content
/// queries, and failure-evidence capture.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a path (relative to the configured base) or absolute URL.
    async fn goto(&self, path: &str) -> Result<()>;

    /// Submit a form to the given action path with the given fields.
    async fn submit_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<()>;

    /// URL of the page currently loaded.
    async fn current_url(&self) -> String;

    /// Full text of the current page with markup stripped.
    async fn page_text(&self) -> String;

    /// First match of `pattern` in the current page, markup stripped.
    /// Returns capture group 1 when the pattern has one.
    async fn find(&self, pattern: &str) -> Option<String>;

    /// Rows of the table whose id matches `table_id`, one Vec of cell
    /// texts per row, header row included.
    async fn table_rows(&self, table_id: &str) -> Result<Vec<Vec<String>>>;

    /// `(text, href)` pairs of links whose href matches `href_pattern`.
    async fn links_matching(&self, href_pattern: &str) -> Vec<(String, String)>;

    /// Persist evidence of the current page under the given label and
    /// return the artifact path.
    async fn capture(&self, label: &str) -> Result<PathBuf>;
}

/// Cookie-session HTTP implementation of [`PageDriver`].
pub struct HttpPageDriver {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    screenshots_dir: PathBuf,
    state: Mutex<PageState>,
}

#[derive(Default)]
struct PageState {
    url: String,
    body: String,
}

impl HttpPageDriver {
    pub fn new(base_url: &str, timeout_ms: u64, screenshots_dir: PathBuf) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| AutomationError::extraction("http client", e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(timeout_ms),
            screenshots_dir,
            state: Mutex::new(PageState::default()),
        })
    }

    fn absolute(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    async fn load(&self, url: String, request: reqwest::RequestBuilder) -> Result<()> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| AutomationError::timeout(url.clone(), self.timeout.as_millis() as u64))?
            .map_err(|e| AutomationError::extraction(url.clone(), e.to_string()))?;
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| AutomationError::extraction(url, e.to_string()))?;
        let mut state = self.state.lock().await;
        state.url = final_url;
        state.body = body;
        Ok(())
    }
}

#[async_trait]
impl PageDriver for HttpPageDriver {
    async fn goto(&self, path: &str) -> Result<()> {
        let url = self.absolute(path);
        debug!(%url, "goto");
        self.load(url.clone(), self.client.get(&url)).await
    }

    async fn submit_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<()> {
        let url = self.absolute(path);
        debug!(%url, "submit form");
        let form: Vec<(String, String)> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.load(url.clone(), self.client.post(&url).form(&form))
            .await
    }

    async fn current_url(&self) -> String {
        self.state.lock().await.url.clone()
    }

    async fn page_text(&self) -> String {
        strip_tags(&self.state.lock().await.body)
    }

    async fn find(&self, pattern: &str) -> Option<String> {
        let body = self.state.lock().await.body.clone();
        let re = Regex::new(pattern).ok()?;
        let caps = re.captures(&body)?;
        let m = caps.get(1).or_else(|| caps.get(0))?;
        Some(strip_tags(m.as_str()).trim().to_string())
    }

    async fn table_rows(&self, table_id: &str) -> Result<Vec<Vec<String>>> {
        let body = self.state.lock().await.body.clone();
        Ok(parse_table(&body, table_id))
    }

    async fn links_matching(&self, href_pattern: &str) -> Vec<(String, String)> {
        let body = self.state.lock().await.body.clone();
        parse_links(&body, href_pattern)
    }

    async fn capture(&self, label: &str) -> Result<PathBuf> {
        let state = self.state.lock().await;
        std::fs::create_dir_all(&self.screenshots_dir).map_err(|e| {
            AutomationError::extraction("screenshot dir", e.to_string())
        })?;
        let path = self.screenshots_dir.join(format!("{label}.html"));
        std::fs::write(&path, &state.body)
            .map_err(|e| AutomationError::extraction("screenshot write", e.to_string()))?;
        debug!(path = %path.display(), "captured page snapshot");
        Ok(path)
    }
}

fn strip_tags(html: &str) -> String {
    let re = Regex::new(r"<[^>]*>").expect("static regex");
    let text = re.replace_all(html, " ");
    let ws = Regex::new(r"\s+").expect("static regex");
    ws.replace_all(text.trim(), " ").to_string()
}

fn parse_table(body: &str, table_id: &str) -> Vec<Vec<String>> {
    let table_re = Regex::new(&format!(
        r#"(?is)<table[^>]*id\s*=\s*["']?{}["']?[^>]*>(.*?)</table>"#,
        regex::escape(table_id)
    ))
    .expect("table regex");
    let Some(table) = table_re.captures(body).and_then(|c| c.get(1)) else {
        return Vec::new();
    };
    let row_re = Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("row regex");
    let cell_re = Regex::new(r"(?is)<t[dh][^>]*>(.*?)</t[dh]>").expect("cell regex");
    row_re
        .captures_iter(table.as_str())
        .map(|row| {
            cell_re
                .captures_iter(row.get(1).map_or("", |m| m.as_str()))
                .map(|cell| strip_tags(cell.get(1).map_or("", |m| m.as_str())))
                .collect::<Vec<_>>()
        })
        .filter(|cells: &Vec<String>| !cells.is_empty())
        .collect()
}

fn parse_links(body: &str, href_pattern: &str) -> Vec<(String, String)> {
    let Ok(href_re) = Regex::new(href_pattern) else {
        return Vec::new();
    };
    let link_re =
        Regex::new(r#"(?is)<a[^>]*href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#).expect("link regex");
    link_re
        .captures_iter(body)
        .filter_map(|caps| {
            let href = caps.get(1)?.as_str().to_string();
            if !href_re.is_match(&href) {
                return None;
            }
            Some((strip_tags(caps.get(2)?.as_str()), href))
        })
        .collect()
}

/// Scripted driver for tests. Pages are registered per path; form
/// submissions and navigations record into an action log.
pub struct MockPageDriver {
    pages: HashMap<String, String>,
    failures: Mutex<HashMap<String, AutomationErrorScript>>,
    state: Mutex<PageState>,
    pub actions: Arc<Mutex<Vec<String>>>,
    pub captures: Arc<Mutex<Vec<String>>>,
    screenshots_dir: PathBuf,
}

enum AutomationErrorScript {
    Timeout,
    Extraction(String),
}

impl MockPageDriver {
    pub fn new(screenshots_dir: PathBuf) -> Self {
        Self {
            pages: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
            state: Mutex::new(PageState::default()),
            actions: Arc::new(Mutex::new(Vec::new())),
            captures: Arc::new(Mutex::new(Vec::new())),
            screenshots_dir,
        }
    }

    /// Register the page body served at `path`.
    pub fn with_page(mut self, path: &str, body: &str) -> Self {
        self.pages.insert(path.to_string(), body.to_string());
        self
    }

    /// Script the next visit to `path` to time out. One-shot.
    pub async fn fail_once_with_timeout(&self, path: &str) {
        self.failures
            .lock()
            .await
            .insert(path.to_string(), AutomationErrorScript::Timeout);
    }

    /// Script the next visit to `path` to fail extraction. One-shot.
    pub async fn fail_once(&self, path: &str, message: &str) {
        self.failures.lock().await.insert(
            path.to_string(),
            AutomationErrorScript::Extraction(message.to_string()),
        );
    }

    async fn visit(&self, path: &str, action: String) -> Result<()> {
        self.actions.lock().await.push(action);
        if let Some(script) = self.failures.lock().await.remove(path) {
            return Err(match script {
                AutomationErrorScript::Timeout => AutomationError::timeout(path, 1),
                AutomationErrorScript::Extraction(m) => AutomationError::extraction(path, m),
            });
        }
        let body = self
            .pages
            .get(path)
            .cloned()
            .ok_or_else(|| AutomationError::extraction(path, "page not scripted"))?;
        let mut state = self.state.lock().await;
        state.url = format!("mock:{path}");
        state.body = body;
        Ok(())
    }
}

#[async_trait]
impl PageDriver for MockPageDriver {
    async fn goto(&self, path: &str) -> Result<()> {
        self.visit(path, format!("goto {path}")).await
    }

    async fn submit_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<()> {
        let rendered = fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        self.visit(path, format!("submit {path} {rendered}")).await
    }

    async fn current_url(&self) -> String {
        self.state.lock().await.url.clone()
    }

    async fn page_text(&self) -> String {
        strip_tags(&self.state.lock().await.body)
    }

    async fn find(&self, pattern: &str) -> Option<String> {
        let body = self.state.lock().await.body.clone();
        let re = Regex::new(pattern).ok()?;
        let caps = re.captures(&body)?;
        let m = caps.get(1).or_else(|| caps.get(0))?;
        Some(strip_tags(m.as_str()).trim().to_string())
    }

    async fn table_rows(&self, table_id: &str) -> Result<Vec<Vec<String>>> {
        let body = self.state.lock().await.body.clone();
        Ok(parse_table(&body, table_id))
    }

    async fn links_matching(&self, href_pattern: &str) -> Vec<(String, String)> {
        let body = self.state.lock().await.body.clone();
        parse_links(&body, href_pattern)
    }

    async fn capture(&self, label: &str) -> Result<PathBuf> {
        self.captures.lock().await.push(label.to_string());
        Ok(self.screenshots_dir.join(format!("{label}.html")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNTS_TABLE: &str = r#"
        <html><body>
        <table id="accounts">
          <tr><th>Account</th><th>Account Type</th><th>Balance</th></tr>
          <tr><td><a href="/bank/account.jsp?id=800000">800000</a></td><td>Checking</td><td>$15,000.00</td></tr>
          <tr><td><a href="/bank/account.jsp?id=800001">800001</a></td><td>Savings</td><td>$25,000.00</td></tr>
        </table>
        </body></html>"#;

    #[test]
    fn parse_table_extracts_rows_and_strips_markup() {
        let rows = parse_table(ACCOUNTS_TABLE, "accounts");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["Account", "Account Type", "Balance"]);
        assert_eq!(rows[1], vec!["800000", "Checking", "$15,000.00"]);
    }

    #[test]
    fn parse_table_missing_id_yields_empty() {
        assert!(parse_table(ACCOUNTS_TABLE, "transactions").is_empty());
    }

    #[test]
    fn parse_links_filters_by_href() {
        let links = parse_links(ACCOUNTS_TABLE, r"account\.jsp");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].0, "800000");
        assert_eq!(links[0].1, "/bank/account.jsp?id=800000");
    }

    #[test]
    fn strip_tags_collapses_whitespace() {
        assert_eq!(strip_tags("<b>Hello</b>\n  <i>world</i>"), "Hello world");
    }

    #[tokio::test]
    async fn mock_serves_scripted_pages() {
        let driver = MockPageDriver::new(PathBuf::from("shots"))
            .with_page("/bank/main.jsp", "<h1>Hello Admin User</h1>");
        driver.goto("/bank/main.jsp").await.unwrap();
        assert_eq!(driver.page_text().await, "Hello Admin User");
        assert!(driver.goto("/nowhere.jsp").await.is_err());
    }

    #[tokio::test]
    async fn mock_one_shot_timeout() {
        let driver = MockPageDriver::new(PathBuf::from("shots")).with_page("/p", "ok");
        driver.fail_once_with_timeout("/p").await;
        assert!(driver.goto("/p").await.unwrap_err().is_transient());
        assert!(driver.goto("/p").await.is_ok());
    }
}
