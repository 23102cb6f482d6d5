//! swift-e2e - run the SwiftTranslator case table against the live widget
//!
//! Exit codes: 0 all cases passed, 1 at least one case failed, 2 harness error.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use swifttranslator_e2e::cases::{CaseFilter, CaseRepository, Partition};
use swifttranslator_e2e::playwright::{Browser, PlaywrightConfig, PlaywrightFactory};
use swifttranslator_e2e::runner::{probe_target, SuiteReport, SuiteRunner};
use swifttranslator_e2e::simulated::{SimulatedFactory, SimulatedWidget};
use swifttranslator_e2e::HarnessConfig;

#[derive(Parser, Debug)]
#[command(name = "swift-e2e")]
#[command(about = "Convergence-aware E2E tests for the SwiftTranslator widget")]
#[command(version)]
struct Args {
    /// Harness configuration file (TOML)
    #[arg(short, long, default_value = "swift-e2e.toml", env = "SWIFT_E2E_CONFIG")]
    config: PathBuf,

    /// Case table file or directory (defaults to the built-in table)
    #[arg(long, env = "SWIFT_E2E_CASES")]
    cases: Option<PathBuf>,

    /// Override the target URL
    #[arg(long, env = "SWIFT_E2E_URL")]
    url: Option<String>,

    /// Run only one partition (positive, negative, incremental)
    #[arg(short, long)]
    partition: Option<Partition>,

    /// Run only the case with this id
    #[arg(long)]
    id: Option<String>,

    /// Cases run at once, each in its own browser
    #[arg(long)]
    concurrency: Option<usize>,

    /// Override the convergence timeout (ms)
    #[arg(long)]
    convergence_timeout_ms: Option<u64>,

    /// Override the inter-case cooldown (ms)
    #[arg(long)]
    between_cases_ms: Option<u64>,

    /// Override the per-keystroke delay (ms)
    #[arg(long)]
    keystroke_delay_ms: Option<u64>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    browser: Browser,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Node.js executable running the Playwright bridge
    #[arg(long, default_value = "node")]
    node: PathBuf,

    /// NODE_PATH for resolving the playwright package
    #[arg(long, env = "NODE_PATH")]
    node_path: Option<PathBuf>,

    /// Run against the in-process simulated widget instead of a browser
    #[arg(long)]
    dry_run: bool,

    /// Skip the reachability probe of the target URL
    #[arg(long)]
    skip_preflight: bool,

    /// Output directory for results
    #[arg(short, long, default_value = "test-results")]
    output: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match run(args).await {
        Ok(report) if report.success() => std::process::exit(0),
        Ok(_) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(2);
        }
    }
}

async fn run(args: Args) -> anyhow::Result<SuiteReport> {
    let mut config = HarnessConfig::load(&args.config)?;
    if let Some(url) = args.url {
        config.url = url;
    }
    if let Some(n) = args.concurrency {
        config.concurrency = n;
    }
    if let Some(ms) = args.convergence_timeout_ms {
        config.timeouts.convergence_ms = ms;
    }
    if let Some(ms) = args.between_cases_ms {
        config.timeouts.between_cases_ms = ms;
    }
    if let Some(ms) = args.keystroke_delay_ms {
        config.timeouts.keystroke_delay_ms = ms;
    }
    config.validate()?;
    let config = Arc::new(config);

    let repo = match &args.cases {
        Some(path) => CaseRepository::load(path)?,
        None => CaseRepository::builtin()?,
    };
    let plan = repo.plan(&CaseFilter {
        partition: args.partition,
        id: args.id,
    });
    if plan.is_empty() {
        anyhow::bail!("no cases selected");
    }
    info!("Loaded {} case(s), {} selected", repo.len(), plan.len());

    let report = if args.dry_run {
        let factory = SimulatedFactory::new(SimulatedWidget::from_repository(&repo), config.clone());
        SuiteRunner::new(factory, config.clone()).run(&plan).await
    } else {
        if !args.skip_preflight {
            probe_target(&config.url, config.timeouts.navigation()).await?;
        }
        let playwright = PlaywrightConfig {
            browser: args.browser,
            headless: !args.headed,
            node_binary: args.node,
            node_path: args.node_path,
            ..Default::default()
        };
        let factory = PlaywrightFactory::new(config.clone(), playwright)?;
        SuiteRunner::new(factory, config.clone()).run(&plan).await
    };

    report.write_json(&args.output)?;
    Ok(report)
}
