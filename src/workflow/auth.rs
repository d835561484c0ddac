//! Authentication step: one positive and one negative login attempt.
//!
//! The step succeeds when both assertions hold: valid credentials reach
//! the dashboard, and invalid credentials are rejected with a visible
//! error message. Detecting the rejection is a success for the step even
//! though the login itself fails.

use super::{RunState, Section, Step, StepOutput};
use crate::adapter::{ExtractionAdapter, LoginAdapter};
use crate::error::{AutomationError, Result};
use crate::record::{normalize_batch, AuthOutcome, MalformedPolicy, NormalizedRecord};
use crate::report::sheets;
use async_trait::async_trait;
use tracing::info;

pub struct AuthStep {
    positive: LoginAdapter,
    negative: LoginAdapter,
}

impl AuthStep {
    pub fn new(positive: LoginAdapter, negative: LoginAdapter) -> Self {
        Self { positive, negative }
    }

    fn single_auth_record(records: Vec<NormalizedRecord>) -> Result<NormalizedRecord> {
        let mut iter = records.into_iter();
        match (iter.next(), iter.next()) {
            (Some(record @ NormalizedRecord::AuthResult { .. }), None) => Ok(record),
            _ => Err(AutomationError::extraction(
                "auth",
                "login attempt produced no auth record",
            )),
        }
    }
}

#[async_trait]
impl Step for AuthStep {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn run(&self, _state: &mut RunState) -> Result<StepOutput> {
        // Positive case: valid credentials must land on the dashboard.
        let raw = self.positive.extract().await?;
        let positive = Self::single_auth_record(normalize_batch(&raw, MalformedPolicy::FailFast)?)?;
        if !matches!(
            positive,
            NormalizedRecord::AuthResult {
                outcome: AuthOutcome::Success,
                ..
            }
        ) {
            return Err(AutomationError::extraction(
                "auth",
                "valid credentials were rejected",
            ));
        }
        info!("positive login verified");
        self.positive.sign_off().await;

        // Negative case: invalid credentials must be rejected with an
        // error message; capture the evidence.
        let raw = self.negative.extract().await?;
        let negative = Self::single_auth_record(normalize_batch(&raw, MalformedPolicy::FailFast)?)?;
        let rejected_with_message = matches!(
            &negative,
            NormalizedRecord::AuthResult {
                outcome: AuthOutcome::Failure,
                error_message: Some(message),
                ..
            } if !message.is_empty()
        );
        if !rejected_with_message {
            return Err(AutomationError::extraction(
                "auth",
                "invalid credentials were not rejected with an error message",
            ));
        }
        let screenshot = self.negative.capture_screenshot("negative_login_error").await?;
        info!("negative login rejection verified");

        Ok(StepOutput {
            sections: vec![Section::new(sheets::AUTHENTICATION, vec![positive, negative])],
            artifacts: vec![screenshot],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MockPageDriver;
    use crate::config;
    use crate::workflow::RunState;
    use std::path::PathBuf;
    use std::sync::Arc;

    const LOGIN_PAGE: &str = r#"<form id="login"></form>"#;
    const DASHBOARD: &str = r#"<h1>Hello Admin User</h1><a href="/logout.jsp">Sign Off</a>"#;
    const REJECTED: &str = r#"<span id="_ctl0__ctl0_Content_Main_message">Login Failed: We're sorry, but this username or password was not found in our system.</span>"#;

    fn step_with(positive_result: &str, negative_result: &str) -> (AuthStep, Arc<MockPageDriver>) {
        let driver = Arc::new(
            MockPageDriver::new(PathBuf::from("shots"))
                .with_page("/login.jsp", LOGIN_PAGE)
                .with_page("/doLogin", positive_result)
                .with_page("/logout.jsp", LOGIN_PAGE),
        );
        let settings = config::test_settings();
        let positive = LoginAdapter::new(driver.clone(), &settings, settings.credentials.valid.clone());
        // The mock serves one body per path, so the negative driver is
        // scripted separately.
        let negative_driver = Arc::new(
            MockPageDriver::new(PathBuf::from("shots"))
                .with_page("/login.jsp", LOGIN_PAGE)
                .with_page("/doLogin", negative_result),
        );
        let negative =
            LoginAdapter::new(negative_driver, &settings, settings.credentials.invalid.clone());
        (AuthStep::new(positive, negative), driver)
    }

    #[tokio::test]
    async fn both_assertions_pass() {
        let (step, _) = step_with(DASHBOARD, REJECTED);
        let output = step.run(&mut RunState::new()).await.unwrap();
        assert_eq!(output.sections.len(), 1);
        let records: Vec<_> = output.records().collect();
        assert_eq!(records.len(), 2);
        assert!(matches!(
            records[0],
            NormalizedRecord::AuthResult {
                outcome: AuthOutcome::Success,
                ..
            }
        ));
        assert!(matches!(
            records[1],
            NormalizedRecord::AuthResult {
                outcome: AuthOutcome::Failure,
                error_message: Some(_),
                ..
            }
        ));
        assert_eq!(output.artifacts.len(), 1);
    }

    #[tokio::test]
    async fn rejected_valid_credentials_fail_the_step() {
        let (step, _) = step_with(REJECTED, REJECTED);
        let err = step.run(&mut RunState::new()).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn accepted_invalid_credentials_fail_the_step() {
        let (step, _) = step_with(DASHBOARD, DASHBOARD);
        assert!(step.run(&mut RunState::new()).await.is_err());
    }
}
