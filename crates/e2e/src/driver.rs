//! Page interaction seam
//!
//! A `PageDriver` owns one browser session for the duration of one case.
//! Backends: [`crate::playwright`] for a real browser and
//! [`crate::simulated`] for an in-process model of the widget.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

/// Which part of the widget a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Input,
    Output,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Input => f.write_str("input"),
            Region::Output => f.write_str("output"),
        }
    }
}

/// A located region. Locators are re-resolved on every interaction, so a
/// handle records what matched rather than holding a live node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub region: Region,
    pub selector: String,
    pub matches: usize,
}

/// A node matching the output signature at the moment of a poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputCandidate {
    /// The node is the editable input itself
    pub is_input: bool,

    /// Raw, untrimmed text content
    pub text: String,
}

impl OutputCandidate {
    /// Non-input node with non-empty trimmed text
    pub fn qualifies(&self) -> bool {
        !self.is_input && !self.text.trim().is_empty()
    }
}

/// Output text as a reader sees it in one snapshot: the trimmed text of the
/// first qualifying node, or empty when every non-input match is blank.
/// `None` when nothing but the input matched the output signature.
pub fn rendered_text(candidates: &[OutputCandidate]) -> Option<String> {
    if candidates.iter().all(|c| c.is_input) {
        return None;
    }
    Some(
        candidates
            .iter()
            .find(|c| c.qualifies())
            .map(|c| c.text.trim().to_string())
            .unwrap_or_default(),
    )
}

/// Interaction with one browser page
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to the configured URL, wait for network idle, then settle
    async fn open(&mut self) -> E2eResult<()>;

    /// Find the input textbox by its accessible label
    async fn locate_input(&mut self) -> E2eResult<ElementHandle>;

    /// Find the output region, excluding the input
    async fn locate_output(&mut self) -> E2eResult<ElementHandle>;

    /// Empty the input. Callers wait a settle duration afterwards.
    async fn clear_input(&mut self) -> E2eResult<()>;

    /// Replace the input content in one edit
    async fn set_input_text(&mut self, text: &str) -> E2eResult<()>;

    /// Append `text` one character at a time, pausing `per_char_delay` after each
    async fn simulate_keystrokes(&mut self, text: &str, per_char_delay: Duration) -> E2eResult<()>;

    /// Current trimmed text of the output region
    async fn read_output_text(&mut self) -> E2eResult<String>;

    /// Every node matching the output signature, input included.
    ///
    /// Polled under a deadline, so dropping the future mid-request must leave
    /// the session usable.
    async fn output_candidates(&mut self) -> E2eResult<Vec<OutputCandidate>>;

    /// Release the session
    async fn close(&mut self) -> E2eResult<()> {
        Ok(())
    }
}

/// Creates one isolated driver per case
#[async_trait]
pub trait DriverFactory: Send + Sync {
    type Driver: PageDriver;

    async fn new_session(&self) -> E2eResult<Self::Driver>;
}
