// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{PipelineError, Result};
use crate::models::{StageDescriptor, StageKind, StageRegistry};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub stages: Vec<StageDescriptor>,
    pub report: ReportConfig,
    pub service: ServiceConfig,
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub workdir: PathBuf,
    pub summary_file: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub report_prefix: String,
    pub latest_name: String,
    pub artifacts: Vec<ArtifactConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub api_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishConfig {
    pub repo_path: PathBuf,
    pub remote: String,
    pub branch: String,
    pub message_prefix: String,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("STRATEGY_COMMANDER")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        // The credential may also arrive through the conventional variable.
        // Absence is not an error: AI-backed sections degrade instead.
        if config.service.api_key.is_none() {
            config.service.api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            pipeline: PipelineConfig {
                workdir: PathBuf::from("."),
                summary_file: "run_summary.json".to_string(),
            },
            stages: vec![
                StageDescriptor::external(
                    "event-analysis",
                    "Virtual event analysis",
                    vec!["python".into(), "political_event_agent.py".into()],
                    45,
                    false,
                ),
                StageDescriptor::external(
                    "network-analysis",
                    "Multilayer network analysis",
                    vec!["Rscript".into(), "network_analysis_premium.R".into()],
                    120,
                    true,
                ),
                StageDescriptor::external(
                    "regional-gis",
                    "Regional GIS analysis",
                    vec!["Rscript".into(), "regional_gis_analysis.R".into()],
                    60,
                    false,
                ),
                StageDescriptor::external(
                    "stress-test",
                    "Risk stress test",
                    vec!["Rscript".into(), "stress_test_engine.R".into()],
                    90,
                    false,
                ),
                StageDescriptor::external(
                    "sd-simulation",
                    "Support trend simulation",
                    vec!["Rscript".into(), "sd_model_deSolve.R".into()],
                    75,
                    false,
                ),
                StageDescriptor::builtin(
                    "strategy-report",
                    "Strategy report synthesis",
                    StageKind::Report,
                    30,
                    false,
                ),
                StageDescriptor::builtin(
                    "cloud-publish",
                    "Dashboard publish",
                    StageKind::Publish,
                    20,
                    false,
                ),
            ],
            report: ReportConfig {
                output_dir: PathBuf::from("./reports"),
                report_prefix: "strategy_report".to_string(),
                latest_name: "strategy_report_latest.md".to_string(),
                artifacts: vec![
                    ArtifactConfig {
                        name: "Multilayer network influence".to_string(),
                        path: PathBuf::from("centrality_scores_multilayer.csv"),
                        optional: false,
                    },
                    ArtifactConfig {
                        name: "Regional dominance".to_string(),
                        path: PathBuf::from("regional_dominance_data.csv"),
                        optional: false,
                    },
                    ArtifactConfig {
                        name: "Stress test summary".to_string(),
                        path: PathBuf::from("stress_test_summary.csv"),
                        optional: false,
                    },
                    ArtifactConfig {
                        name: "Recent event impact".to_string(),
                        path: PathBuf::from("event_impact_result.json"),
                        optional: true,
                    },
                ],
            },
            service: ServiceConfig {
                api_key: None,
                model: "claude-3-5-sonnet-20241022".to_string(),
                max_tokens: 4000,
                api_url: "https://api.anthropic.com/v1/messages".to_string(),
            },
            publish: PublishConfig {
                repo_path: PathBuf::from("."),
                remote: "origin".to_string(),
                branch: "main".to_string(),
                message_prefix: "Update campaign artifacts".to_string(),
            },
        }
    }

    fn validate(&self) -> Result<()> {
        // Registry construction enforces ordering invariants: unique ids,
        // non-empty external commands.
        StageRegistry::new(self.stages.clone())?;

        if self.service.max_tokens == 0 {
            return Err(PipelineError::Config(
                "service.max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.report.artifacts.is_empty() {
            return Err(PipelineError::Config(
                "report.artifacts must list at least one artifact".to_string(),
            ));
        }

        Ok(())
    }
}
