use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};

use refactor_swarm::agents::Collaborators;
use refactor_swarm::analyzer::PylintAnalyzer;
use refactor_swarm::config::SwarmConfig;
use refactor_swarm::orchestrator::Orchestrator;
use refactor_swarm::provider::OpenRouterProvider;
use refactor_swarm::run_log::RunLog;
use refactor_swarm::state::StopReason;
use refactor_swarm::test_runner::PytestRunner;
use refactor_swarm::testgen::PyCompileValidator;
use refactor_swarm::workspace::Workspace;

/// Repair a Python file or directory until its tests pass.
#[derive(Parser, Debug)]
#[command(name = "refactor-swarm", version, about)]
struct Cli {
    /// Python file or directory to repair.
    target: PathBuf,

    /// Iteration ceiling for the orchestration loop.
    #[arg(long)]
    max_iterations: Option<u32>,

    /// JSONL run log path; omit to disable persistence.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// How many files the auditor samples per cycle.
    #[arg(long)]
    audit_sample: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(StopReason::TestsPassing) => ExitCode::SUCCESS,
        Ok(StopReason::RateLimited) => ExitCode::from(2),
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<StopReason> {
    let mut config = SwarmConfig::from_env()?;
    if let Some(n) = cli.max_iterations {
        config.max_iterations = n;
    }
    if let Some(n) = cli.audit_sample {
        config.audit_sample = n;
    }

    if !cli.target.exists() {
        bail!("target {} does not exist", cli.target.display());
    }
    let sandbox_root = if cli.target.is_dir() {
        cli.target.clone()
    } else {
        cli.target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    };
    let workspace = Workspace::new(&sandbox_root)
        .with_context(|| format!("opening sandbox {}", sandbox_root.display()))?;

    let provider = OpenRouterProvider::new(
        &config.base_url,
        &config.api_key,
        &config.model,
        config.request_timeout_secs,
    )
    .map_err(|e| anyhow::anyhow!("building model provider: {e}"))?;

    info!(
        model = %config.model,
        target = %cli.target.display(),
        max_iterations = config.max_iterations,
        "refactor swarm starting"
    );

    let collab = Collaborators {
        provider: Box::new(provider),
        analyzer: Box::new(PylintAnalyzer),
        runner: Box::new(PytestRunner),
        validator: Box::new(PyCompileValidator),
        workspace,
        retry: config.retry,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        audit_sample: config.audit_sample,
    };

    let orchestrator = Orchestrator::new(collab, RunLog::new(cli.log_file));
    let report = orchestrator
        .run(&cli.target, config.max_iterations)
        .await?;

    info!(
        stop_reason = %report.stop_reason,
        iterations = report.iterations,
        trace_entries = report.trace.len(),
        "refactor swarm finished"
    );
    Ok(report.stop_reason)
}
