//! Unified error type for the automation run.
//!
//! Every failure in the crate flows through [`AutomationError`]. Steps catch
//! these at the workflow boundary and convert them into failed step results;
//! only configuration and report-assembly errors are allowed to abort a run.

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for the entire automation crate.
#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Configuration error{}: {message}", .field.as_deref().map(|f| format!(" in {f}")).unwrap_or_default())]
    Config {
        message: String,
        field: Option<String>,
    },

    #[error("Extraction failed in {context}: {message}")]
    Extraction {
        message: String,
        context: String,
        screenshot: Option<PathBuf>,
    },

    #[error("Timed out after {millis}ms waiting on {context}")]
    Timeout { context: String, millis: u64 },

    #[error("Normalization failed for {kind} field '{field}': {message}")]
    Normalization {
        kind: String,
        field: String,
        message: String,
    },

    #[error("API request to {resource} failed with status {status}")]
    Api {
        resource: String,
        status: u16,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Report assembly invariant violated: {message}")]
    Assembly { message: String },
}

impl AutomationError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a configuration error pointing at a specific field.
    pub fn config_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an extraction error for the given page or element context.
    pub fn extraction(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            message: message.into(),
            context: context.into(),
            screenshot: None,
        }
    }

    /// Attach a screenshot path captured at failure time.
    pub fn with_screenshot(self, path: PathBuf) -> Self {
        match self {
            Self::Extraction {
                message, context, ..
            } => Self::Extraction {
                message,
                context,
                screenshot: Some(path),
            },
            other => other,
        }
    }

    pub fn timeout(context: impl Into<String>, millis: u64) -> Self {
        Self::Timeout {
            context: context.into(),
            millis,
        }
    }

    pub fn normalization(
        kind: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Normalization {
            kind: kind.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn api(resource: impl Into<String>, status: u16) -> Self {
        Self::Api {
            resource: resource.into(),
            status,
            source: None,
        }
    }

    pub fn api_with_source(
        resource: impl Into<String>,
        status: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Api {
            resource: resource.into(),
            status,
            source: Some(Box::new(source)),
        }
    }

    pub fn assembly(message: impl Into<String>) -> Self {
        Self::Assembly {
            message: message.into(),
        }
    }

    /// Whether the run controller may retry the operation once.
    ///
    /// Only timeouts and transport-level API failures qualify; assertion
    /// failures (wrong credentials, missing confirmation text) never do.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Api { status, .. } => matches!(status, 0 | 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Whether the error must abort the run rather than fail a single step.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Assembly { .. })
    }

    /// Expected failures are logged at a lower severity and do not affect
    /// the process exit code: an absent API endpoint reports 404.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}

pub type Result<T> = std::result::Result<T, AutomationError>;
