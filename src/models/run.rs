// file: src/models/run.rs
// description: per-stage results and the aggregate pipeline run record
// reference: internal data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every stage ran and succeeded.
    Success,
    /// At least one non-required stage failed; the run completed anyway.
    PartialFailure,
    /// A required stage failed and the remainder of the run was skipped.
    Aborted,
}

impl RunStatus {
    /// Process exit code contract: only an aborted run is non-zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success | Self::PartialFailure => 0,
            Self::Aborted => 1,
        }
    }
}

/// Outcome of a single stage. Appended to the run when the stage finishes
/// and never mutated afterwards.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StageResult {
    pub stage_id: String,
    pub stage_name: String,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub tail_output: String,
    pub error_detail: Option<String>,
}

impl StageResult {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_ms as f64 / 1000.0
    }
}

/// One end-to-end execution of the registry, in registry order.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub results: Vec<StageResult>,
    pub status: RunStatus,
}

impl PipelineRun {
    pub fn failed_stages(&self) -> impl Iterator<Item = &StageResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn total_stage_time(&self) -> Duration {
        self.results.iter().map(StageResult::elapsed).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, success: bool, elapsed_ms: u64) -> StageResult {
        StageResult {
            stage_id: id.to_string(),
            stage_name: id.to_string(),
            success,
            started_at: Utc::now(),
            elapsed_ms,
            tail_output: String::new(),
            error_detail: if success { None } else { Some("boom".to_string()) },
        }
    }

    #[test]
    fn test_exit_code_contract() {
        assert_eq!(RunStatus::Success.exit_code(), 0);
        assert_eq!(RunStatus::PartialFailure.exit_code(), 0);
        assert_eq!(RunStatus::Aborted.exit_code(), 1);
    }

    #[test]
    fn test_failed_stage_iteration() {
        let run = PipelineRun {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
            results: vec![result("a", true, 10), result("b", false, 20), result("c", true, 5)],
            status: RunStatus::PartialFailure,
        };

        let failed: Vec<&str> = run.failed_stages().map(|r| r.stage_id.as_str()).collect();
        assert_eq!(failed, vec!["b"]);
        assert_eq!(run.total_stage_time(), Duration::from_millis(35));
    }

    #[test]
    fn test_run_serialization_round_trip() {
        let run = PipelineRun {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
            results: vec![result("a", true, 10)],
            status: RunStatus::Success,
        };

        let json = serde_json::to_string(&run).unwrap();
        let back: PipelineRun = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, run.run_id);
        assert_eq!(back.status, RunStatus::Success);
        assert_eq!(back.results.len(), 1);
    }
}
