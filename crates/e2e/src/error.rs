//! Error types for the translator harness

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("No {region} element matched '{selector}'")]
    ElementNotFound { region: String, selector: String },

    #[error("Output did not converge within {timeout:?} (waited {elapsed:?}, last seen: {last_seen:?})")]
    ConvergenceTimeout {
        timeout: Duration,
        elapsed: Duration,
        last_seen: String,
    },

    #[error("Output mismatch: expected {expected:?}, got {actual:?}")]
    AssertionMismatch { expected: String, actual: String },

    #[error("No live output {waited:?} after typing {partial_input:?}")]
    LivenessViolation { partial_input: String, waited: Duration },

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Browser bridge error: {0}")]
    Bridge(String),

    #[error("Test case parse error: {0}")]
    CaseParse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Stable tag written into result reports
    pub fn kind(&self) -> &'static str {
        match self {
            E2eError::Navigation { .. } => "navigation",
            E2eError::ElementNotFound { .. } => "element_not_found",
            E2eError::ConvergenceTimeout { .. } => "convergence_timeout",
            E2eError::AssertionMismatch { .. } => "assertion_mismatch",
            E2eError::LivenessViolation { .. } => "liveness_violation",
            E2eError::PlaywrightNotFound => "playwright_not_found",
            E2eError::Bridge(_) => "bridge",
            E2eError::CaseParse(_) => "case_parse",
            E2eError::InvalidConfig(_) => "invalid_config",
            E2eError::Io(_) => "io",
            E2eError::Json(_) => "json",
            E2eError::Yaml(_) => "yaml",
            E2eError::Toml(_) => "toml",
            E2eError::Walk(_) => "walk",
            E2eError::Http(_) => "http",
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
