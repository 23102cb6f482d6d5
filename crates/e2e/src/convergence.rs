//! Output convergence detection
//!
//! The widget re-renders asynchronously behind a debounce, so output is only
//! read once a qualifying node has been seen and a settle window has passed.
//!
//! ```text
//! WAITING ──first poll──▶ POLLING ──qualifying output + settle──▶ CONVERGED
//!                            │
//!                            └──────────deadline passed─────────▶ TIMED_OUT
//! ```
//!
//! A qualifying node matches the output signature, is not the editable input,
//! and has non-empty trimmed text. There are no retries after `TIMED_OUT`.
//!
//! Each poll is bounded by the deadline. A driver whose request is dropped at
//! the deadline must stay usable for the next command on the same page.

use std::time::Duration;

use serde::Serialize;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, trace, warn};

use crate::config::HarnessConfig;
use crate::driver::{OutputCandidate, PageDriver};
use crate::error::{E2eError, E2eResult};

/// Marks `last_seen` text that only the input echo showed
pub const INPUT_ECHO_TAG: &str = "[input] ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceState {
    Waiting,
    Polling,
    Converged,
    TimedOut,
}

impl ConvergenceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConvergenceState::Converged | ConvergenceState::TimedOut)
    }

    fn advance(&mut self, to: ConvergenceState) {
        debug!("Convergence {:?} -> {:?}", self, to);
        *self = to;
    }
}

/// Successful detection
#[derive(Debug, Clone)]
pub struct Convergence {
    /// Trimmed text of the first qualifying node
    pub first_seen: String,

    /// Time until the first qualifying node, settle excluded
    pub detected_after: Duration,

    /// Number of polls issued
    pub polls: u32,
}

#[derive(Debug, Clone)]
pub struct ConvergenceDetector {
    poll_interval: Duration,
    timeout: Duration,
    settle: Duration,
}

impl ConvergenceDetector {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            poll_interval: config.timeouts.poll_interval(),
            timeout: config.timeouts.convergence(),
            settle: config.timeouts.post_convergence_settle(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for convergence with the configured timeout
    pub async fn await_convergence<D>(&self, driver: &mut D) -> E2eResult<Convergence>
    where
        D: PageDriver + ?Sized,
    {
        self.await_convergence_within(driver, self.timeout).await
    }

    /// Poll until a qualifying output appears, then settle.
    ///
    /// Fails with `ConvergenceTimeout` when nothing qualifies before
    /// `timeout`. The error carries the last non-empty text any candidate
    /// showed, prefixed with [`INPUT_ECHO_TAG`] when it came from the input,
    /// or an empty string when every poll was blank.
    pub async fn await_convergence_within<D>(
        &self,
        driver: &mut D,
        timeout: Duration,
    ) -> E2eResult<Convergence>
    where
        D: PageDriver + ?Sized,
    {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut state = ConvergenceState::Waiting;
        let mut last_seen = String::new();
        let mut polls = 0u32;

        loop {
            if state == ConvergenceState::Waiting {
                state.advance(ConvergenceState::Polling);
            }
            polls += 1;

            let candidates = match timeout_at(deadline, driver.output_candidates()).await {
                Ok(result) => result?,
                Err(_) => Vec::new(),
            };
            trace!("Poll {}: {} candidate(s)", polls, candidates.len());

            if let Some(found) = candidates.iter().find(|c| c.qualifies()) {
                let first_seen = found.text.trim().to_string();
                let detected_after = start.elapsed();
                state.advance(ConvergenceState::Converged);
                debug!(
                    "Qualifying output after {:?} ({} polls), settling {:?}",
                    detected_after, polls, self.settle
                );
                sleep(self.settle).await;
                return Ok(Convergence {
                    first_seen,
                    detected_after,
                    polls,
                });
            }

            if let Some(text) = visible_text(&candidates) {
                last_seen = text;
            }

            let now = Instant::now();
            if now >= deadline {
                state.advance(ConvergenceState::TimedOut);
                let elapsed = now - start;
                warn!(
                    "No qualifying output within {:?} (last seen: {:?})",
                    timeout, last_seen
                );
                return Err(E2eError::ConvergenceTimeout {
                    timeout,
                    elapsed,
                    last_seen,
                });
            }

            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

/// Non-empty text on screen during a poll that did not qualify
fn visible_text(candidates: &[OutputCandidate]) -> Option<String> {
    let mut echo = None;
    for candidate in candidates {
        let text = candidate.text.trim();
        if text.is_empty() {
            continue;
        }
        if !candidate.is_input {
            return Some(text.to_string());
        }
        echo.get_or_insert_with(|| format!("{}{}", INPUT_ECHO_TAG, text));
    }
    echo
}
