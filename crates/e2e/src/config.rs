//! Harness configuration
//!
//! One immutable record built before the suite starts and shared behind an
//! `Arc` by every component. Timings are kept as named millisecond values
//! because they encode the widget's debounce behaviour.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{E2eError, E2eResult};

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Page hosting the widget under test
    pub url: String,

    /// Number of cases allowed to run at once, each in its own browser context
    pub concurrency: usize,

    /// Named wait durations
    pub timeouts: Timeouts,

    /// Locator signatures for the input and output regions
    pub selectors: Selectors,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            url: "https://www.swifttranslator.com/".to_string(),
            concurrency: 1,
            timeouts: Timeouts::default(),
            selectors: Selectors::default(),
        }
    }
}

/// Wait durations, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Fixed settle after the page reports network idle
    pub page_load_settle_ms: u64,

    /// Upper bound for the page to reach a loaded state
    pub navigation_ms: u64,

    /// Settle after clearing the input (clearing triggers its own re-render)
    pub after_clear_ms: u64,

    /// Interval between output polls
    pub poll_interval_ms: u64,

    /// Upper bound for a qualifying output to appear
    pub convergence_ms: u64,

    /// Settle after the first qualifying output, absorbs late debounced renders
    pub post_convergence_settle_ms: u64,

    /// Cooldown after each case before the next one may start
    pub between_cases_ms: u64,

    /// Delay after each simulated keystroke
    pub keystroke_delay_ms: u64,

    /// Observation window after typing a partial input
    pub partial_observation_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_load_settle_ms: 2000,
            navigation_ms: 30_000,
            after_clear_ms: 1000,
            poll_interval_ms: 100,
            convergence_ms: 10_000,
            post_convergence_settle_ms: 3000,
            between_cases_ms: 2000,
            keystroke_delay_ms: 150,
            partial_observation_ms: 1500,
        }
    }
}

impl Timeouts {
    pub fn page_load_settle(&self) -> Duration {
        Duration::from_millis(self.page_load_settle_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn after_clear(&self) -> Duration {
        Duration::from_millis(self.after_clear_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn convergence(&self) -> Duration {
        Duration::from_millis(self.convergence_ms)
    }

    pub fn post_convergence_settle(&self) -> Duration {
        Duration::from_millis(self.post_convergence_settle_ms)
    }

    pub fn between_cases(&self) -> Duration {
        Duration::from_millis(self.between_cases_ms)
    }

    pub fn keystroke_delay(&self) -> Duration {
        Duration::from_millis(self.keystroke_delay_ms)
    }

    pub fn partial_observation(&self) -> Duration {
        Duration::from_millis(self.partial_observation_ms)
    }
}

/// Structural signatures used to find the two regions of the widget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Accessible name of the input textbox
    pub input_label: String,

    /// CSS signature of the output container. The input may match it too.
    pub output_container: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            input_label: "Input Your Singlish Text Here.".to_string(),
            output_container:
                "div.w-full.h-80.p-3.rounded-lg.ring-1.ring-slate-300.whitespace-pre-wrap"
                    .to_string(),
        }
    }
}

impl HarnessConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> E2eResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Check the invariants every component relies on
    pub fn validate(&self) -> E2eResult<()> {
        if self.url.trim().is_empty() {
            return Err(E2eError::InvalidConfig("url must not be empty".to_string()));
        }
        if self.concurrency == 0 {
            return Err(E2eError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.timeouts.poll_interval_ms == 0 {
            return Err(E2eError::InvalidConfig(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.timeouts.poll_interval_ms >= self.timeouts.convergence_ms {
            return Err(E2eError::InvalidConfig(format!(
                "poll_interval_ms ({}) must be shorter than convergence_ms ({})",
                self.timeouts.poll_interval_ms, self.timeouts.convergence_ms
            )));
        }
        if self.selectors.input_label.trim().is_empty()
            || self.selectors.output_container.trim().is_empty()
        {
            return Err(E2eError::InvalidConfig(
                "selectors must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
