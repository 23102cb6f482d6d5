//! Incremental-typing scenario
//!
//! Two phases: a loose liveness check while the input is still a prefix, then
//! the usual exact match once the rest has been typed and output converged.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::cases::IncrementalCase;
use crate::config::HarnessConfig;
use crate::convergence::ConvergenceDetector;
use crate::driver::PageDriver;
use crate::error::E2eResult;
use crate::oracle;
use crate::orchestrator::Observation;

pub struct IncrementalTypingScenario {
    config: Arc<HarnessConfig>,
    detector: ConvergenceDetector,
}

impl IncrementalTypingScenario {
    pub fn new(config: Arc<HarnessConfig>) -> Self {
        let detector = ConvergenceDetector::new(&config);
        Self { config, detector }
    }

    pub async fn run<D>(&self, driver: &mut D, case: &IncrementalCase) -> E2eResult<Observation>
    where
        D: PageDriver + ?Sized,
    {
        let result = self.type_in_two_phases(driver, case).await;
        sleep(self.config.timeouts.between_cases()).await;
        result
    }

    async fn type_in_two_phases<D>(&self, driver: &mut D, case: &IncrementalCase) -> E2eResult<Observation>
    where
        D: PageDriver + ?Sized,
    {
        let timeouts = &self.config.timeouts;
        let id = &case.case.id;

        driver.locate_input().await?;
        driver.locate_output().await?;
        driver.clear_input().await?;
        sleep(timeouts.after_clear()).await;

        debug!("{}: typing prefix {:?}", id, case.partial_input);
        driver
            .simulate_keystrokes(&case.partial_input, timeouts.keystroke_delay())
            .await?;
        sleep(timeouts.partial_observation()).await;

        let partial = driver.read_output_text().await?;
        oracle::assert_live(&partial, &case.partial_input, timeouts.partial_observation())?;
        debug!("{}: live output on prefix {:?}", id, partial);

        driver
            .simulate_keystrokes(case.remaining_input(), timeouts.keystroke_delay())
            .await?;
        let convergence = self.detector.await_convergence(driver).await?;

        let actual = driver.read_output_text().await?;
        oracle::assert_exact(&actual, &case.case.expected)?;
        info!("{}: live on prefix, exact on full input", id);

        Ok(Observation {
            actual,
            partial: Some(partial),
            detected_after: convergence.detected_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::TestCase;
    use crate::error::E2eError;
    use crate::simulated::{SimulatedPage, SimulatedWidget};
    use std::time::Duration;

    fn ui_case() -> IncrementalCase {
        IncrementalCase {
            case: TestCase {
                id: "Pos_UI_001".to_string(),
                name: "Real-time translation updates as typing".to_string(),
                input: "mama gedhara yanavaa.".to_string(),
                expected: "මම ගෙදර යනවා.".to_string(),
                category: "Usability flow".to_string(),
                grammar: "Present tense".to_string(),
                length: Default::default(),
            },
            partial_input: "mama gedhara ".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_then_exact() {
        let config = Arc::new(HarnessConfig::default());
        let widget = SimulatedWidget::new()
            .with_translation("mama gedhara", "මම ගෙදර")
            .with_translation("mama gedhara yanavaa.", "මම ගෙදර යනවා.");
        let mut page = SimulatedPage::new(Arc::new(widget), config.clone());
        page.open().await.unwrap();

        let observation = IncrementalTypingScenario::new(config)
            .run(&mut page, &ui_case())
            .await
            .unwrap();

        assert_eq!(observation.partial.as_deref(), Some("මම ගෙදර"));
        assert_eq!(observation.actual, "මම ගෙදර යනවා.");
        assert_eq!(page.input_text(), "mama gedhara yanavaa.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_widget_violates_liveness() {
        let config = Arc::new(HarnessConfig::default());
        let widget = SimulatedWidget::new().with_debounce(Duration::from_millis(5000));
        let mut page = SimulatedPage::new(Arc::new(widget), config.clone());
        page.open().await.unwrap();

        let err = IncrementalTypingScenario::new(config)
            .run(&mut page, &ui_case())
            .await
            .unwrap_err();
        match err {
            E2eError::LivenessViolation {
                partial_input,
                waited,
            } => {
                assert_eq!(partial_input, "mama gedhara ");
                assert_eq!(waited, Duration::from_millis(1500));
            }
            other => panic!("expected liveness violation, got {other:?}"),
        }
    }
}
