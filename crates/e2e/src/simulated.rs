//! In-process model of the translator widget
//!
//! Renders the transliteration of the current input only once a debounce
//! delay has passed since the last edit, and exposes the editable input as an
//! extra node matching the output signature, like the real page does. Used by
//! `swift-e2e --dry-run` and by the harness tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::cases::{CaseRepository, NO_TRANSLATION_SENTINEL};
use crate::config::HarnessConfig;
use crate::driver::{
    rendered_text, DriverFactory, ElementHandle, OutputCandidate, PageDriver, Region,
};
use crate::error::{E2eError, E2eResult};

/// Behaviour of the simulated widget, shared by every page
#[derive(Debug, Clone)]
pub struct SimulatedWidget {
    translations: HashMap<String, String>,
    debounce: Duration,
    responsive: bool,
    reachable: bool,
    has_input: bool,
    has_output: bool,
}

impl Default for SimulatedWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedWidget {
    pub fn new() -> Self {
        Self {
            translations: HashMap::new(),
            debounce: Duration::from_millis(400),
            responsive: true,
            reachable: true,
            has_input: true,
            has_output: true,
        }
    }

    /// Widget that answers every case of a repository with its oracle
    pub fn from_repository(repo: &CaseRepository) -> Self {
        repo.all_cases().fold(Self::new(), |widget, case| {
            widget.with_translation(&case.input, &case.expected)
        })
    }

    pub fn with_translation(mut self, input: &str, output: &str) -> Self {
        self.translations
            .insert(input.trim().to_string(), output.to_string());
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Never renders any output
    pub fn unresponsive(mut self) -> Self {
        self.responsive = false;
        self
    }

    /// Navigation never reaches a loaded state
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// Page has no textbox with the configured label
    pub fn without_input(mut self) -> Self {
        self.has_input = false;
        self
    }

    /// Page has no output region at all
    pub fn without_output(mut self) -> Self {
        self.has_output = false;
        self
    }

    /// What the widget renders once the debounce window has passed.
    ///
    /// Known inputs map to their table entry; input without any Latin letters
    /// yields the sentinel; anything else is passed through, as the real
    /// widget does with words it cannot transliterate.
    pub fn render(&self, input: &str) -> String {
        let input = input.trim();
        if input.is_empty() {
            return String::new();
        }
        if let Some(output) = self.translations.get(input) {
            return output.clone();
        }
        if !input.chars().any(|c| c.is_ascii_alphabetic()) {
            return NO_TRANSLATION_SENTINEL.to_string();
        }
        input.to_string()
    }
}

#[derive(Debug, Default)]
struct PageState {
    loaded: bool,
    input: String,
    last_edit: Option<Instant>,
    rendered: String,
}

/// One simulated browser page
pub struct SimulatedPage {
    widget: Arc<SimulatedWidget>,
    config: Arc<HarnessConfig>,
    state: PageState,
}

impl SimulatedPage {
    pub fn new(widget: Arc<SimulatedWidget>, config: Arc<HarnessConfig>) -> Self {
        Self {
            widget,
            config,
            state: PageState::default(),
        }
    }

    /// Current raw input content
    pub fn input_text(&self) -> &str {
        &self.state.input
    }

    fn ensure_loaded(&self) -> E2eResult<()> {
        if self.state.loaded {
            Ok(())
        } else {
            Err(E2eError::Bridge("page is not open".to_string()))
        }
    }

    fn edit(&mut self, input: String) {
        self.state.input = input;
        self.state.last_edit = Some(Instant::now());
    }

    /// Apply the debounced render if its window has elapsed
    fn refresh(&mut self) {
        if !self.widget.responsive {
            return;
        }
        if let Some(at) = self.state.last_edit {
            if at.elapsed() >= self.widget.debounce {
                self.state.rendered = self.widget.render(&self.state.input);
                self.state.last_edit = None;
            }
        }
    }

    fn missing(&self, region: Region) -> E2eError {
        let selector = match region {
            Region::Input => &self.config.selectors.input_label,
            Region::Output => &self.config.selectors.output_container,
        };
        E2eError::ElementNotFound {
            region: region.to_string(),
            selector: selector.clone(),
        }
    }
}

#[async_trait]
impl PageDriver for SimulatedPage {
    async fn open(&mut self) -> E2eResult<()> {
        if !self.widget.reachable {
            sleep(self.config.timeouts.navigation()).await;
            return Err(E2eError::Navigation {
                url: self.config.url.clone(),
                reason: format!(
                    "page did not load within {:?}",
                    self.config.timeouts.navigation()
                ),
            });
        }
        debug!("Simulated page opened at {}", self.config.url);
        self.state = PageState {
            loaded: true,
            ..Default::default()
        };
        sleep(self.config.timeouts.page_load_settle()).await;
        Ok(())
    }

    async fn locate_input(&mut self) -> E2eResult<ElementHandle> {
        self.ensure_loaded()?;
        if !self.widget.has_input {
            return Err(self.missing(Region::Input));
        }
        Ok(ElementHandle {
            region: Region::Input,
            selector: self.config.selectors.input_label.clone(),
            matches: 1,
        })
    }

    async fn locate_output(&mut self) -> E2eResult<ElementHandle> {
        self.ensure_loaded()?;
        if !self.widget.has_output {
            return Err(self.missing(Region::Output));
        }
        Ok(ElementHandle {
            region: Region::Output,
            selector: self.config.selectors.output_container.clone(),
            matches: 1,
        })
    }

    async fn clear_input(&mut self) -> E2eResult<()> {
        self.ensure_loaded()?;
        self.edit(String::new());
        Ok(())
    }

    async fn set_input_text(&mut self, text: &str) -> E2eResult<()> {
        self.ensure_loaded()?;
        self.edit(text.to_string());
        Ok(())
    }

    async fn simulate_keystrokes(&mut self, text: &str, per_char_delay: Duration) -> E2eResult<()> {
        self.ensure_loaded()?;
        for ch in text.chars() {
            let mut next = std::mem::take(&mut self.state.input);
            next.push(ch);
            self.edit(next);
            sleep(per_char_delay).await;
        }
        Ok(())
    }

    async fn read_output_text(&mut self) -> E2eResult<String> {
        let candidates = self.output_candidates().await?;
        rendered_text(&candidates).ok_or_else(|| self.missing(Region::Output))
    }

    async fn output_candidates(&mut self) -> E2eResult<Vec<OutputCandidate>> {
        self.ensure_loaded()?;
        self.refresh();
        let mut candidates = Vec::with_capacity(2);
        if self.widget.has_input {
            candidates.push(OutputCandidate {
                is_input: true,
                text: self.state.input.clone(),
            });
        }
        if self.widget.has_output {
            candidates.push(OutputCandidate {
                is_input: false,
                text: self.state.rendered.clone(),
            });
        }
        Ok(candidates)
    }

    async fn close(&mut self) -> E2eResult<()> {
        self.state = PageState::default();
        Ok(())
    }
}

/// Hands out a fresh simulated page per case
#[derive(Clone)]
pub struct SimulatedFactory {
    widget: Arc<SimulatedWidget>,
    config: Arc<HarnessConfig>,
}

impl SimulatedFactory {
    pub fn new(widget: SimulatedWidget, config: Arc<HarnessConfig>) -> Self {
        Self {
            widget: Arc::new(widget),
            config,
        }
    }
}

#[async_trait]
impl DriverFactory for SimulatedFactory {
    type Driver = SimulatedPage;

    async fn new_session(&self) -> E2eResult<SimulatedPage> {
        Ok(SimulatedPage::new(self.widget.clone(), self.config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_rules() {
        let widget = SimulatedWidget::new().with_translation("api", "අපි");
        assert_eq!(widget.render("  api "), "අපි");
        assert_eq!(widget.render("202520262027"), NO_TRANSLATION_SENTINEL);
        assert_eq!(widget.render("mama gedhara "), "mama gedhara");
        assert_eq!(widget.render("   "), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_lags_input_by_debounce() {
        let widget = SimulatedWidget::new()
            .with_translation("api", "අපි")
            .with_debounce(Duration::from_millis(200));
        let mut page = SimulatedPage::new(Arc::new(widget), Arc::new(HarnessConfig::default()));
        page.open().await.unwrap();

        page.set_input_text("api").await.unwrap();
        assert_eq!(page.read_output_text().await.unwrap(), "");

        sleep(Duration::from_millis(200)).await;
        assert_eq!(page.read_output_text().await.unwrap(), "අපි");

        page.clear_input().await.unwrap();
        assert_eq!(page.read_output_text().await.unwrap(), "අපි");
        sleep(Duration::from_millis(200)).await;
        assert_eq!(page.read_output_text().await.unwrap(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_keystrokes_append_and_reset_debounce() {
        let widget = SimulatedWidget::new().with_debounce(Duration::from_millis(300));
        let mut page = SimulatedPage::new(Arc::new(widget), Arc::new(HarnessConfig::default()));
        page.open().await.unwrap();

        page.set_input_text("ma").await.unwrap();
        page.simulate_keystrokes("ma", Duration::from_millis(100)).await.unwrap();
        assert_eq!(page.input_text(), "mama");
        assert_eq!(page.read_output_text().await.unwrap(), "");

        sleep(Duration::from_millis(200)).await;
        assert_eq!(page.read_output_text().await.unwrap(), "mama");
    }

    #[tokio::test]
    async fn test_interaction_before_open_fails() {
        let mut page = SimulatedPage::new(
            Arc::new(SimulatedWidget::new()),
            Arc::new(HarnessConfig::default()),
        );
        assert!(page.set_input_text("api").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_output_region() {
        let mut page = SimulatedPage::new(
            Arc::new(SimulatedWidget::new().without_output()),
            Arc::new(HarnessConfig::default()),
        );
        page.open().await.unwrap();
        assert!(page.locate_input().await.is_ok());
        assert!(matches!(
            page.locate_output().await,
            Err(E2eError::ElementNotFound { .. })
        ));
        assert!(matches!(
            page.read_output_text().await,
            Err(E2eError::ElementNotFound { ref region, .. }) if region == "output"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_input_region() {
        let config = Arc::new(HarnessConfig::default());
        let mut page = SimulatedPage::new(
            Arc::new(SimulatedWidget::new().without_input()),
            config.clone(),
        );
        page.open().await.unwrap();

        match page.locate_input().await {
            Err(E2eError::ElementNotFound { region, selector }) => {
                assert_eq!(region, "input");
                assert_eq!(selector, config.selectors.input_label);
            }
            other => panic!("expected missing input, got {other:?}"),
        }
        assert!(page.locate_output().await.is_ok());
    }
}
