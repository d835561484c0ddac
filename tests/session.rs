//! Session-lifecycle coverage against a stateful page mock.
//!
//! The site drops the session cookie on sign-off, and the auth step ends
//! with a deliberate sign-off followed by a rejected login. These tests
//! drive every adapter through one driver that actually tracks the
//! session, so a flow that forgets to log back in fails here.

use altoro::adapter::{AccountsAdapter, LoginAdapter, PageDriver, TransferAdapter};
use altoro::config::Settings;
use altoro::error::{AutomationError, Result};
use altoro::workflow::{AccountsStep, AuthStep, RunState, Step, TransferStep};
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const SETTINGS_YAML: &str = r#"
credentials:
  valid: { username: admin, password: admin }
  invalid: { username: admin, password: wrongpassword }
  api: { username: jsmith, password: demo1234 }
transfer:
  from_account: 800000 Checking
  to_account: 800000 Corporate
  amount: "100000.00"
filters:
  date_range: { start: 01/03/2025, end: 08/03/2025 }
  api_dates: { start: 01/01/2025, end: 31/03/2025 }
  min_deposit: 100.0
headless: true
"#;

const LOGIN_PAGE: &str = r#"<form id="login"><input id="uid"/><input id="passw"/></form>"#;
const DASHBOARD: &str = r#"<h1>Hello Admin User</h1><a href="/logout.jsp">Sign Off</a>"#;
const REJECTED: &str = r#"<span id="_ctl0__ctl0_Content_Main_message">Login Failed: We're sorry, but this username or password was not found in our system.</span>"#;
const HISTORY: &str = "<h1>Account History</h1>";
const TRANSFER_FORM: &str = r#"<form id="transfer"></form>"#;
const TRANSFER_RESULT: &str = r#"<span id="_ctl0__ctl0_Content_Main_postResp">100000.00 was successfully transferred from Account 800000 into Account 800000 at 2025-03-04.</span>"#;

#[derive(Clone, Copy, PartialEq, Default)]
enum Page {
    #[default]
    Login,
    Dashboard,
    Rejected,
    History,
    TransferForm,
    TransferResult,
}

impl Page {
    fn url(self) -> &'static str {
        match self {
            Page::Login | Page::Rejected => "/login.jsp",
            Page::Dashboard => "/bank/main.jsp",
            Page::History => "/bank/account.jsp?id=800000",
            Page::TransferForm | Page::TransferResult => "/bank/transfer.jsp",
        }
    }

    fn body(self) -> &'static str {
        match self {
            Page::Login => LOGIN_PAGE,
            Page::Dashboard => DASHBOARD,
            Page::Rejected => REJECTED,
            Page::History => HISTORY,
            Page::TransferForm => TRANSFER_FORM,
            Page::TransferResult => TRANSFER_RESULT,
        }
    }
}

/// Page driver that tracks authentication the way the real site does:
/// session-bound pages bounce to the login form unless a valid login
/// happened since the last sign-off.
#[derive(Default)]
struct SessionBank {
    state: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    logged_in: bool,
    page: Page,
}

impl SessionBank {
    async fn logged_in(&self) -> bool {
        self.state.lock().await.logged_in
    }
}

#[async_trait]
impl PageDriver for SessionBank {
    async fn goto(&self, path: &str) -> Result<()> {
        let mut inner = self.state.lock().await;
        inner.page = match path {
            "/login.jsp" => Page::Login,
            "/logout.jsp" => {
                inner.logged_in = false;
                Page::Login
            }
            "/bank/main.jsp" if inner.logged_in => Page::Dashboard,
            "/bank/transfer.jsp" if inner.logged_in => Page::TransferForm,
            p if p.starts_with("/bank/account.jsp") && inner.logged_in => Page::History,
            p if p.starts_with("/bank/") => Page::Login,
            other => return Err(AutomationError::extraction(other, "unknown path")),
        };
        Ok(())
    }

    async fn submit_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<()> {
        let mut inner = self.state.lock().await;
        inner.page = match path {
            "/doLogin" => {
                inner.logged_in = fields.iter().any(|(k, v)| *k == "passw" && *v == "admin");
                if inner.logged_in {
                    Page::Dashboard
                } else {
                    Page::Rejected
                }
            }
            "/bank/transfer.jsp" if inner.logged_in => Page::TransferResult,
            "/bank/transfer.jsp" => Page::Login,
            other => return Err(AutomationError::extraction(other, "unknown form action")),
        };
        Ok(())
    }

    async fn current_url(&self) -> String {
        self.state.lock().await.page.url().to_string()
    }

    async fn page_text(&self) -> String {
        self.state.lock().await.page.body().to_string()
    }

    async fn find(&self, pattern: &str) -> Option<String> {
        let body = self.state.lock().await.page.body();
        let re = Regex::new(pattern).ok()?;
        let caps = re.captures(body)?;
        Some(caps.get(1).or_else(|| caps.get(0))?.as_str().trim().to_string())
    }

    async fn table_rows(&self, table_id: &str) -> Result<Vec<Vec<String>>> {
        let page = self.state.lock().await.page;
        Ok(match (table_id, page) {
            ("accounts", Page::Dashboard) => vec![
                row(&["Account", "Account Type", "Balance"]),
                row(&["800000", "Checking", "$15,000.00"]),
            ],
            ("transactions", Page::History) => vec![
                row(&["Date", "ID", "Description", "Amount"]),
                row(&["2025-03-04", "TX1", "Deposit", "$150.00"]),
            ],
            _ => Vec::new(),
        })
    }

    async fn links_matching(&self, _href_pattern: &str) -> Vec<(String, String)> {
        if self.state.lock().await.page == Page::Dashboard {
            vec![(
                "800000".to_string(),
                "/bank/account.jsp?id=800000".to_string(),
            )]
        } else {
            Vec::new()
        }
    }

    async fn capture(&self, label: &str) -> Result<PathBuf> {
        Ok(PathBuf::from(format!("shots/{label}.html")))
    }
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

fn settings() -> Settings {
    let settings: Settings = serde_yaml::from_str(SETTINGS_YAML).unwrap();
    settings.validate().unwrap();
    settings
}

#[tokio::test]
async fn account_scrape_relogs_in_after_the_login_checks() {
    let settings = settings();
    let driver = Arc::new(SessionBank::default());
    let auth = AuthStep::new(
        LoginAdapter::new(driver.clone(), &settings, settings.credentials.valid.clone()),
        LoginAdapter::new(driver.clone(), &settings, settings.credentials.invalid.clone()),
    );

    let mut state = RunState::new();
    auth.run(&mut state).await.unwrap();
    // The checks end with a sign-off and a rejected login attempt.
    assert!(!driver.logged_in().await);

    let accounts = AccountsStep::new(AccountsAdapter::new(driver.clone(), &settings));
    accounts.run(&mut state).await.unwrap();
    assert_eq!(state.web_accounts.len(), 1);
    assert_eq!(state.web_transactions.len(), 1);
    assert!(driver.logged_in().await);
}

#[tokio::test]
async fn transfer_relogs_in_when_the_session_lapsed() {
    let settings = settings();
    let driver = Arc::new(SessionBank::default());

    let step = TransferStep::new(TransferAdapter::new(driver.clone(), &settings));
    let output = step.run(&mut RunState::new()).await.unwrap();
    assert_eq!(output.records().count(), 1);
    assert!(driver.logged_in().await);
}

#[tokio::test]
async fn login_checks_behave_identically_on_one_shared_session() {
    let settings = settings();
    let driver = Arc::new(SessionBank::default());
    let auth = AuthStep::new(
        LoginAdapter::new(driver.clone(), &settings, settings.credentials.valid.clone()),
        LoginAdapter::new(driver.clone(), &settings, settings.credentials.invalid.clone()),
    );

    let output = auth.run(&mut RunState::new()).await.unwrap();
    assert_eq!(output.records().count(), 2);
}
