//! Single-case orchestration
//!
//! clear → settle → set input → converge → read → compare → cooldown

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::cases::TestCase;
use crate::config::HarnessConfig;
use crate::convergence::{Convergence, ConvergenceDetector};
use crate::driver::PageDriver;
use crate::error::E2eResult;
use crate::oracle;

/// What a passing case observed
#[derive(Debug, Clone)]
pub struct Observation {
    /// Trimmed output read after convergence
    pub actual: String,

    /// Output seen during the partial-input window, incremental cases only
    pub partial: Option<String>,

    pub detected_after: Duration,
}

/// Runs exact-match cases against an open page
pub struct Orchestrator {
    config: Arc<HarnessConfig>,
    detector: ConvergenceDetector,
}

impl Orchestrator {
    pub fn new(config: Arc<HarnessConfig>) -> Self {
        let detector = ConvergenceDetector::new(&config);
        Self { config, detector }
    }

    /// Drive one case to a verdict.
    ///
    /// The inter-case cooldown is applied whatever the outcome, so the next
    /// case never lands inside this case's debounce window.
    pub async fn run_case<D>(&self, driver: &mut D, case: &TestCase) -> E2eResult<Observation>
    where
        D: PageDriver + ?Sized,
    {
        debug!("Running {} ({})", case.id, case.name);

        let result = self.translate(driver, &case.input).await;

        sleep(self.config.timeouts.between_cases()).await;

        let (actual, convergence) = result?;
        oracle::assert_exact(&actual, &case.expected)?;
        info!("{}: output matched after {:?}", case.id, convergence.detected_after);

        Ok(Observation {
            actual,
            partial: None,
            detected_after: convergence.detected_after,
        })
    }

    /// Enter `input` into a cleared widget and read the converged output
    pub async fn translate<D>(&self, driver: &mut D, input: &str) -> E2eResult<(String, Convergence)>
    where
        D: PageDriver + ?Sized,
    {
        driver.locate_input().await?;
        driver.clear_input().await?;
        sleep(self.config.timeouts.after_clear()).await;

        driver.set_input_text(input).await?;
        let convergence = self.detector.await_convergence(driver).await?;

        let actual = driver.read_output_text().await?;
        Ok((actual, convergence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::E2eError;
    use crate::simulated::{SimulatedPage, SimulatedWidget};
    use tokio::time::Instant;

    fn case(input: &str, expected: &str) -> TestCase {
        TestCase {
            id: "T_001".to_string(),
            name: "test".to_string(),
            input: input.to_string(),
            expected: expected.to_string(),
            category: String::new(),
            grammar: String::new(),
            length: Default::default(),
        }
    }

    async fn open_page(widget: SimulatedWidget, config: &Arc<HarnessConfig>) -> SimulatedPage {
        let mut page = SimulatedPage::new(Arc::new(widget), config.clone());
        page.open().await.unwrap();
        page
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_and_cooldown() {
        let config = Arc::new(HarnessConfig::default());
        let widget = SimulatedWidget::new().with_translation("api dhaen vaeda karanavaa.", "අපි දැන් වැඩ කරනවා.");
        let mut page = open_page(widget, &config).await;

        let orchestrator = Orchestrator::new(config.clone());
        let start = Instant::now();
        let observation = orchestrator
            .run_case(&mut page, &case("api dhaen vaeda karanavaa.", "අපි දැන් වැඩ කරනවා."))
            .await
            .unwrap();

        assert_eq!(observation.actual, "අපි දැන් වැඩ කරනවා.");
        let t = &config.timeouts;
        assert!(start.elapsed() >= t.after_clear() + t.post_convergence_settle() + t.between_cases());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatch_reports_actual_and_expected() {
        let config = Arc::new(HarnessConfig::default());
        let widget = SimulatedWidget::new().with_translation("mama", "මම");
        let mut page = open_page(widget, &config).await;

        let err = Orchestrator::new(config)
            .run_case(&mut page, &case("mama", "මම."))
            .await
            .unwrap_err();
        match err {
            E2eError::AssertionMismatch { expected, actual } => {
                assert_eq!(expected, "මම.");
                assert_eq!(actual, "මම");
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_applies_on_failure() {
        let config = Arc::new(HarnessConfig::default());
        let mut page = open_page(SimulatedWidget::new().unresponsive(), &config).await;

        let start = Instant::now();
        let err = Orchestrator::new(config.clone())
            .run_case(&mut page, &case("mama", "මම"))
            .await
            .unwrap_err();

        assert!(matches!(err, E2eError::ConvergenceTimeout { .. }));
        let t = &config.timeouts;
        assert!(start.elapsed() >= t.after_clear() + t.convergence() + t.between_cases());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sentinel_expected_output() {
        let config = Arc::new(HarnessConfig::default());
        let mut page = open_page(SimulatedWidget::new(), &config).await;

        let observation = Orchestrator::new(config)
            .run_case(
                &mut page,
                &case("202520262027", crate::cases::NO_TRANSLATION_SENTINEL),
            )
            .await
            .unwrap();
        assert_eq!(observation.actual, crate::cases::NO_TRANSLATION_SENTINEL);
    }
}
