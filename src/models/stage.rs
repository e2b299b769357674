// file: src/models/stage.rs
// description: stage descriptors and the ordered, validated stage registry
// reference: internal data structures

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Opaque external command, run as a child process.
    External,
    /// Built-in terminal stage: artifact aggregation and report synthesis.
    Report,
    /// Built-in terminal stage: git stage/commit/push of local artifacts.
    Publish,
}

impl Default for StageKind {
    fn default() -> Self {
        Self::External
    }
}

/// One entry in the pipeline. Immutable once the registry is built;
/// list position is execution order.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StageDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: StageKind,
    #[serde(default)]
    pub command: Vec<String>,
    pub eta_seconds: u64,
    #[serde(default)]
    pub required: bool,
}

impl StageDescriptor {
    pub fn external(
        id: impl Into<String>,
        name: impl Into<String>,
        command: Vec<String>,
        eta_seconds: u64,
        required: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: StageKind::External,
            command,
            eta_seconds,
            required,
        }
    }

    pub fn builtin(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: StageKind,
        eta_seconds: u64,
        required: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            command: Vec::new(),
            eta_seconds,
            required,
        }
    }
}

/// Ordered snapshot of the configured stages. Validated at construction,
/// never mutated afterwards; every run reads the same snapshot.
#[derive(Debug, Clone)]
pub struct StageRegistry {
    stages: Vec<StageDescriptor>,
}

impl StageRegistry {
    pub fn new(stages: Vec<StageDescriptor>) -> Result<Self> {
        if stages.is_empty() {
            return Err(PipelineError::Config(
                "stage registry must contain at least one stage".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for stage in &stages {
            if stage.id.trim().is_empty() {
                return Err(PipelineError::Config(
                    "stage id must not be empty".to_string(),
                ));
            }
            if !seen.insert(stage.id.as_str()) {
                return Err(PipelineError::Config(format!(
                    "duplicate stage id: {}",
                    stage.id
                )));
            }
            if stage.kind == StageKind::External && stage.command.is_empty() {
                return Err(PipelineError::Config(format!(
                    "stage '{}' has an empty command",
                    stage.id
                )));
            }
        }

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn total_eta(&self) -> u64 {
        self.stages.iter().map(|s| s.eta_seconds).sum()
    }

    /// Sum of ETA weights of the stages not yet started, counting `index`
    /// itself as not started.
    pub fn remaining_eta(&self, index: usize) -> u64 {
        self.stages
            .iter()
            .skip(index)
            .map(|s| s.eta_seconds)
            .sum()
    }
}
