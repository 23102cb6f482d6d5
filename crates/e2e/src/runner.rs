//! Suite runner: one fresh page per case, failures isolated per case

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::cases::{Partition, PlannedCase};
use crate::config::HarnessConfig;
use crate::driver::{DriverFactory, PageDriver};
use crate::error::{E2eError, E2eResult};
use crate::incremental::IncrementalTypingScenario;
use crate::orchestrator::{Observation, Orchestrator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

/// Diagnostic payload of a failed case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDetail {
    pub kind: String,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

impl From<&E2eError> for FailureDetail {
    fn from(err: &E2eError) -> Self {
        let mut detail = FailureDetail {
            kind: err.kind().to_string(),
            message: err.to_string(),
            expected: None,
            actual: None,
            last_seen: None,
        };
        match err {
            E2eError::AssertionMismatch { expected, actual } => {
                detail.expected = Some(expected.clone());
                detail.actual = Some(actual.clone());
            }
            E2eError::ConvergenceTimeout { last_seen, .. } => {
                detail.last_seen = Some(last_seen.clone());
            }
            _ => {}
        }
        detail
    }
}

/// Result of running a single case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub id: String,
    pub name: String,
    pub partition: Partition,
    pub verdict: Verdict,
    pub duration_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,
}

impl CaseResult {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

/// Result of running a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseResult>,
}

impl SuiteReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    /// Write the report as `test-results.json` under `output_dir`
    pub fn write_json(&self, output_dir: &Path) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        let path = output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Runs planned cases, each against its own driver
pub struct SuiteRunner<F: DriverFactory> {
    factory: F,
    config: Arc<HarnessConfig>,
    orchestrator: Orchestrator,
    scenario: IncrementalTypingScenario,
}

impl<F: DriverFactory> SuiteRunner<F> {
    pub fn new(factory: F, config: Arc<HarnessConfig>) -> Self {
        Self {
            orchestrator: Orchestrator::new(config.clone()),
            scenario: IncrementalTypingScenario::new(config.clone()),
            factory,
            config,
        }
    }

    /// Run every case; up to `concurrency` cases run at once, results keep plan order
    pub async fn run(&self, plan: &[PlannedCase]) -> SuiteReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let concurrency = self.config.concurrency.max(1);

        info!("Running {} case(s) against {} ({} at a time)", plan.len(), self.config.url, concurrency);

        let results: Vec<CaseResult> = stream::iter(plan)
            .map(|planned| self.run_case(planned))
            .buffered(concurrency)
            .collect()
            .await;

        let passed = results.iter().filter(|r| r.passed()).count();
        let failed = results.len() - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("Results: {} passed, {} failed ({} ms)", passed, failed, duration_ms);

        SuiteReport {
            started_at,
            total: results.len(),
            passed,
            failed,
            duration_ms,
            results,
        }
    }

    /// Run one case to a result. Never fails: errors become a failed verdict.
    pub async fn run_case(&self, planned: &PlannedCase) -> CaseResult {
        let case = planned.case();
        let start = Instant::now();

        let outcome = self.execute(planned).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut result = CaseResult {
            id: case.id.clone(),
            name: case.name.clone(),
            partition: planned.partition(),
            verdict: Verdict::Pass,
            duration_ms,
            actual: None,
            partial: None,
            failure: None,
        };

        match outcome {
            Ok(observation) => {
                info!("✓ {} - {} ({} ms)", case.id, case.name, duration_ms);
                result.actual = Some(observation.actual);
                result.partial = observation.partial;
            }
            Err(e) => {
                error!("✗ {} - {}", case.id, e);
                if let E2eError::AssertionMismatch { actual, .. } = &e {
                    result.actual = Some(actual.clone());
                }
                result.verdict = Verdict::Fail;
                result.failure = Some(FailureDetail::from(&e));
            }
        }
        result
    }

    async fn execute(&self, planned: &PlannedCase) -> E2eResult<Observation> {
        let mut driver = self.factory.new_session().await?;

        let outcome = match driver.open().await {
            Ok(()) => match planned {
                PlannedCase::Exact { case, .. } => self.orchestrator.run_case(&mut driver, case).await,
                PlannedCase::Incremental(case) => self.scenario.run(&mut driver, case).await,
            },
            Err(e) => Err(e),
        };

        if let Err(e) = driver.close().await {
            warn!("Failed to close page after {}: {}", planned.case().id, e);
        }
        outcome
    }
}

/// Probe the target URL until it answers or `limit` elapses
pub async fn probe_target(url: &str, limit: Duration) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;
    let mut last_error = String::from("no attempt made");

    while start.elapsed() < limit {
        attempts += 1;

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("{} reachable after {} attempt(s)", url, attempts);
                return Ok(());
            }
            Ok(resp) => {
                last_error = format!("HTTP {}", resp.status());
                warn!("Probe of {} returned {}", url, resp.status());
            }
            Err(e) => {
                last_error = e.to_string();
                if attempts == 1 {
                    info!("Waiting for {} to become reachable...", url);
                }
            }
        }

        sleep(Duration::from_millis(500)).await;
    }

    Err(E2eError::Navigation {
        url: url.to_string(),
        reason: format!("unreachable after {} attempt(s): {}", attempts, last_error),
    })
}
