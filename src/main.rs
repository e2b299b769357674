// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use strategy_commander::{
    Config, PipelineRun, PipelineRunner, ProcessMonitor, RemotePublisher, ReportAggregator,
    RunStatus, StageKind, StageRegistry, StatusDisplay,
    utils::logging::{format_error, format_step, format_success, format_warning},
};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "strategy_commander")]
#[command(version = "0.1.0")]
#[command(about = "Campaign intelligence pipeline orchestrator", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the full pipeline in this process, emitting progress lines
    Run,

    /// Spawn the pipeline as a child process and drive the live display
    Watch {
        /// Override the pipeline invocation (defaults to this executable's `run`)
        #[arg(trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// Aggregate stage artifacts into the strategy report without a full run
    Report,

    /// Publish local artifacts to the dashboard remote without a full run
    Publish,

    /// List the configured stage registry
    Stages,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    strategy_commander::utils::logging::init_logger(cli.color, cli.verbose);

    info!("Strategy Commander");
    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to built-in defaults: {}", e);
            Config::default_config()
        })
    };

    match &cli.command {
        Commands::Run => {
            cmd_run(&config).await?;
        }
        Commands::Watch { command } => {
            cmd_watch(&cli, &config, command.clone()).await?;
        }
        Commands::Report => {
            cmd_report(&config).await?;
        }
        Commands::Publish => {
            cmd_publish(&config).await?;
        }
        Commands::Stages => {
            cmd_stages(&config)?;
        }
    }

    Ok(())
}

async fn cmd_run(config: &Config) -> Result<()> {
    info!("Analysis started at {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));

    let runner = PipelineRunner::new(config).context("Failed to build pipeline runner")?;
    let run = runner.execute().await.context("Pipeline execution failed")?;

    if run.status == RunStatus::Aborted {
        std::process::exit(run.status.exit_code());
    }

    Ok(())
}

async fn cmd_watch(cli: &Cli, config: &Config, command: Vec<String>) -> Result<()> {
    if config.service.api_key.is_none() {
        warn!("ANTHROPIC_API_KEY is not set; AI report sections will be degraded");
    }

    let command = if command.is_empty() {
        let exe = std::env::current_exe().context("Failed to resolve current executable")?;
        vec![
            exe.display().to_string(),
            "--config".to_string(),
            cli.config.display().to_string(),
            "--color".to_string(),
            "false".to_string(),
            "run".to_string(),
        ]
    } else {
        command
    };

    let watch_started = Utc::now();
    let mut monitor = ProcessMonitor::new(command);
    monitor.start().context("Failed to start pipeline")?;

    let display = StatusDisplay::with_color(cli.color);

    loop {
        tokio::select! {
            event = monitor.next_event() => {
                match event {
                    Some(event) => display.apply(&event),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupt received, cancelling pipeline run");
                if let Err(e) = monitor.abort().await {
                    warn!("Cancel failed: {}", e);
                }
            }
        }
    }

    notify_stage_outcomes(config, watch_started);
    Ok(())
}

/// Per-stage notifications after the child exits, distinguishing
/// best-effort failures from an aborted run. Reads the run summary the
/// pipeline writes; a missing or stale summary (for example after a kill
/// before the first stage finished) is skipped quietly.
fn notify_stage_outcomes(config: &Config, watch_started: chrono::DateTime<Utc>) {
    let path = config.pipeline.workdir.join(&config.pipeline.summary_file);
    let run: PipelineRun = match std::fs::read_to_string(&path)
        .map_err(anyhow::Error::from)
        .and_then(|raw| serde_json::from_str(&raw).map_err(anyhow::Error::from))
    {
        Ok(run) => run,
        Err(e) => {
            debug!("No readable run summary at {}: {}", path.display(), e);
            return;
        }
    };

    if run.completed_at < watch_started {
        debug!("Run summary predates this watch session, ignoring");
        return;
    }

    match run.status {
        RunStatus::Success => {
            println!("{}", format_success("all stages completed"));
        }
        RunStatus::PartialFailure => {
            for failed in run.failed_stages() {
                println!(
                    "{}",
                    format_warning(&format!(
                        "stage '{}' failed, run continued",
                        failed.stage_id
                    ))
                );
            }
        }
        RunStatus::Aborted => {
            if let Some(failed) = run.failed_stages().last() {
                println!(
                    "{}",
                    format_error(&format!(
                        "required stage '{}' failed, run aborted",
                        failed.stage_id
                    ))
                );
            }
        }
    }
}

async fn cmd_report(config: &Config) -> Result<()> {
    info!("Building strategy report from existing artifacts");

    let aggregator = ReportAggregator::new(
        config.report.clone(),
        config.service.clone(),
        config.pipeline.workdir.clone(),
    );

    let (report, path) = aggregator
        .aggregate_and_write()
        .await
        .context("Report aggregation failed")?;

    let unavailable = report.sections.iter().filter(|s| !s.available).count();
    if unavailable > 0 {
        warn!("{} section(s) were unavailable", unavailable);
    }
    info!("Report written to {}", path.display());

    Ok(())
}

async fn cmd_publish(config: &Config) -> Result<()> {
    info!("Publishing artifacts to the dashboard remote");

    let publish_config = config.publish.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let publisher = RemotePublisher::new(publish_config);
        publisher.publish()
    })
    .await
    .context("Publish task failed")?
    .context("Publish failed")?;

    info!("{}", outcome);
    Ok(())
}

fn cmd_stages(config: &Config) -> Result<()> {
    let registry = StageRegistry::new(config.stages.clone())?;
    let total = registry.len();

    println!("Configured pipeline ({} stages):", total);
    for (index, stage) in registry.stages().iter().enumerate() {
        let kind = match stage.kind {
            StageKind::External => stage.command.join(" "),
            StageKind::Report => "(built-in report aggregation)".to_string(),
            StageKind::Publish => "(built-in artifact publish)".to_string(),
        };
        let requirement = if stage.required { "required" } else { "best-effort" };
        println!(
            "{}",
            format_step(
                index + 1,
                total,
                &format!(
                    "{} [{}] ~{}s {}: {}",
                    stage.name, stage.id, stage.eta_seconds, requirement, kind
                )
            )
        );
    }
    println!("Estimated total: ~{}s", registry.total_eta());

    Ok(())
}
