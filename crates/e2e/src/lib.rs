//! SwiftTranslator E2E harness
//!
//! Verifies a real-time Singlish-to-Sinhala widget whose output re-renders
//! asynchronously behind a debounce. The widget itself is opaque; this crate
//! decides when its output is safe to read and compares it to a fixed oracle.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  SuiteRunner                                                │
//! │    ├── CaseRepository (YAML table, immutable)               │
//! │    ├── DriverFactory -> PageDriver (one per case)           │
//! │    │     ├── PlaywrightPage (node bridge, JSON lines)       │
//! │    │     └── SimulatedPage (in-process debounced widget)    │
//! │    ├── Orchestrator                                         │
//! │    │     clear → settle → set → converge → read → compare   │
//! │    ├── IncrementalTypingScenario                            │
//! │    │     type prefix → liveness → type rest → exact match   │
//! │    └── ConvergenceDetector                                  │
//! │          WAITING → POLLING → CONVERGED | TIMED_OUT          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod cases;
pub mod config;
pub mod convergence;
pub mod driver;
pub mod error;
pub mod incremental;
pub mod oracle;
pub mod orchestrator;
pub mod playwright;
pub mod runner;
pub mod simulated;

pub use cases::{CaseFilter, CaseRepository, IncrementalCase, Partition, PlannedCase, TestCase};
pub use config::HarnessConfig;
pub use convergence::{Convergence, ConvergenceDetector, ConvergenceState};
pub use driver::{DriverFactory, PageDriver};
pub use error::{E2eError, E2eResult};
pub use incremental::IncrementalTypingScenario;
pub use orchestrator::Orchestrator;
pub use runner::{SuiteReport, SuiteRunner};
