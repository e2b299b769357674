// file: src/pipeline/runner.rs
// description: sequential stage execution with continue-on-failure policy
// reference: orchestrates the end-to-end analysis and publish workflow

use crate::config::{Config, PublishConfig};
use crate::error::{PipelineError, Result};
use crate::models::{
    PipelineRun, RunStatus, StageDescriptor, StageKind, StageRegistry, StageResult,
};
use crate::pipeline::protocol::{self, ProgressEvent};
use crate::publish::RemotePublisher;
use crate::report::ReportAggregator;
use crate::utils::logging::{format_error, format_success};
use chrono::Utc;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Upper bound on captured child output kept per stage result.
const MAX_TAIL_CHARS: usize = 2000;

/// Upper bound on the failure detail echoed into a progress line.
const MAX_DETAIL_CHARS: usize = 120;

struct StageOutcome {
    success: bool,
    tail: String,
    detail: Option<String>,
}

pub struct PipelineRunner {
    registry: StageRegistry,
    workdir: PathBuf,
    summary_file: String,
    aggregator: ReportAggregator,
    publish: PublishConfig,
}

impl PipelineRunner {
    pub fn new(config: &Config) -> Result<Self> {
        let registry = StageRegistry::new(config.stages.clone())?;
        let aggregator = ReportAggregator::new(
            config.report.clone(),
            config.service.clone(),
            config.pipeline.workdir.clone(),
        );

        Ok(Self {
            registry,
            workdir: config.pipeline.workdir.clone(),
            summary_file: config.pipeline.summary_file.clone(),
            aggregator,
            publish: config.publish.clone(),
        })
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    pub async fn execute(&self) -> Result<PipelineRun> {
        let mut out = std::io::stdout();
        self.execute_with_output(&mut out).await
    }

    /// Runs every stage in registry order, writing progress lines to `out`.
    /// Stage failures are converted into results; only a failure to write
    /// the progress stream itself aborts with an error, since without it
    /// the run is unobservable.
    pub async fn execute_with_output<W: Write + Send>(&self, out: &mut W) -> Result<PipelineRun> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = self.registry.len();

        info!(
            "Starting pipeline run {} ({} stages, ~{}s estimated)",
            run_id,
            total,
            self.registry.total_eta()
        );

        let mut results: Vec<StageResult> = Vec::with_capacity(total);
        let mut aborted = false;

        for (index, stage) in self.registry.stages().iter().enumerate() {
            let current = index + 1;
            let remaining = self.registry.remaining_eta(index);

            self.emit(
                out,
                current,
                total,
                format!("{} (~{}s remaining)", stage.name, remaining),
            )?;

            let result = self.run_stage(stage).await;

            if result.success {
                self.emit(
                    out,
                    current,
                    total,
                    format!("{} done in {:.1}s", stage.name, result.elapsed_secs()),
                )?;
            } else {
                let detail = result.error_detail.as_deref().unwrap_or("unknown error");
                self.emit(
                    out,
                    current,
                    total,
                    format!("{} failed: {}", stage.name, truncate(detail, MAX_DETAIL_CHARS)),
                )?;
            }

            let failed = !result.success;
            results.push(result);

            if failed && stage.required {
                warn!(
                    "Required stage '{}' failed, aborting remaining stages",
                    stage.id
                );
                aborted = true;
                break;
            }
        }

        let status = if aborted {
            RunStatus::Aborted
        } else if results.iter().any(|r| !r.success) {
            RunStatus::PartialFailure
        } else {
            RunStatus::Success
        };

        let run = PipelineRun {
            run_id,
            started_at,
            completed_at: Utc::now(),
            results,
            status,
        };

        // The summary artifact is best-effort; losing it does not void
        // the run the way losing the progress stream would.
        if let Err(e) = self.write_summary(&run) {
            warn!("Failed to write run summary: {}", e);
        }
        self.log_summary(&run);

        Ok(run)
    }

    fn emit<W: Write>(&self, out: &mut W, current: usize, total: usize, message: String) -> Result<()> {
        let event = ProgressEvent::new(current, total, message);
        writeln!(out, "{}", protocol::encode(&event))?;
        out.flush()?;
        Ok(())
    }

    async fn run_stage(&self, stage: &StageDescriptor) -> StageResult {
        let started_at = Utc::now();
        let timer = Instant::now();
        info!("Running stage '{}' ({})", stage.id, stage.name);

        let outcome = match stage.kind {
            StageKind::External => self.run_external(stage).await,
            StageKind::Report => self.run_report().await,
            StageKind::Publish => self.run_publish().await,
        };

        // Single catch point: every stage-level error becomes a result,
        // never an unhandled fault of the orchestrator.
        let outcome = outcome.unwrap_or_else(|e| StageOutcome {
            success: false,
            tail: String::new(),
            detail: Some(e.to_string()),
        });

        let elapsed_ms = timer.elapsed().as_millis() as u64;

        if let Some(detail) = &outcome.detail {
            warn!("Stage '{}' failed: {}", stage.id, detail);
        }

        StageResult {
            stage_id: stage.id.clone(),
            stage_name: stage.name.clone(),
            success: outcome.success,
            started_at,
            elapsed_ms,
            tail_output: outcome.tail,
            error_detail: outcome.detail,
        }
    }

    async fn run_external(&self, stage: &StageDescriptor) -> Result<StageOutcome> {
        let Some((program, args)) = stage.command.split_first() else {
            // Registry validation rejects empty commands; kept as an error
            // so a bad descriptor still cannot crash the runner.
            return Err(PipelineError::stage(&stage.id, "empty command"));
        };

        let output = tokio::process::Command::new(program)
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .await
            // A missing executable is a stage failure, not a runner crash.
            .map_err(|e| {
                PipelineError::stage(&stage.id, format!("failed to spawn '{}': {}", program, e))
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let tail = tail_of(&combined, MAX_TAIL_CHARS);

        if output.status.success() {
            Ok(StageOutcome {
                success: true,
                tail,
                detail: None,
            })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                output.status.to_string()
            } else {
                format!("{}: {}", output.status, stderr.trim())
            };
            Ok(StageOutcome {
                success: false,
                tail,
                detail: Some(tail_of(&detail, MAX_TAIL_CHARS)),
            })
        }
    }

    async fn run_report(&self) -> Result<StageOutcome> {
        let (report, path) = self.aggregator.aggregate_and_write().await?;
        let unavailable = report.sections.iter().filter(|s| !s.available).count();

        Ok(StageOutcome {
            success: true,
            tail: format!(
                "report written to {} ({} sections, {} unavailable)",
                path.display(),
                report.sections.len(),
                unavailable
            ),
            detail: None,
        })
    }

    async fn run_publish(&self) -> Result<StageOutcome> {
        let publish_config = self.publish.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let publisher = RemotePublisher::new(publish_config);
            publisher.publish()
        })
        .await
        .map_err(|e| {
            PipelineError::sync_step("publish", format!("task failed: {}", e))
        })??;

        Ok(StageOutcome {
            success: true,
            tail: outcome.to_string(),
            detail: None,
        })
    }

    fn write_summary(&self, run: &PipelineRun) -> Result<()> {
        let path = self.workdir.join(&self.summary_file);
        let serialized = serde_json::to_string_pretty(run)?;
        std::fs::write(&path, serialized)?;
        info!("Run summary written to {}", path.display());
        Ok(())
    }

    fn log_summary(&self, run: &PipelineRun) {
        info!("=== Pipeline Run Summary ===");
        info!("Run id: {}", run.run_id);

        for result in &run.results {
            let line = if result.success {
                format_success(&format!(
                    "{} ({:.1}s)",
                    result.stage_name,
                    result.elapsed_secs()
                ))
            } else {
                format_error(&format!(
                    "{} failed after {:.1}s: {}",
                    result.stage_name,
                    result.elapsed_secs(),
                    result.error_detail.as_deref().unwrap_or("unknown error")
                ))
            };
            info!("{}", line);
        }

        match run.status {
            RunStatus::Success => info!("All {} stages completed", run.results.len()),
            RunStatus::PartialFailure => warn!(
                "Run completed with {} failed stage(s); data already produced was kept",
                run.failed_stages().count()
            ),
            RunStatus::Aborted => warn!(
                "Run aborted after {} of {} stages: a required stage failed",
                run.results.len(),
                self.registry.len()
            ),
        }

        info!(
            "Total stage time: {:.1}s",
            run.total_stage_time().as_secs_f64()
        );
        info!("============================");
    }
}

/// Last `limit` characters of `text`, trimmed of trailing whitespace.
fn tail_of(text: &str, limit: usize) -> String {
    let trimmed = text.trim_end();
    let count = trimmed.chars().count();
    if count <= limit {
        trimmed.to_string()
    } else {
        trimmed.chars().skip(count - limit).collect()
    }
}

/// First `limit` characters of `text`.
fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}
