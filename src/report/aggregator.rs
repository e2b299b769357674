// file: src/report/aggregator.rs
// description: cross-stage artifact aggregation into the composite strategy report
// reference: reads artifacts owned by upstream stages, read-only

use crate::config::{ReportConfig, ServiceConfig};
use crate::error::{PipelineError, Result};
use crate::models::{Report, ReportSection};
use crate::report::summarizer::{self, SummaryClient};
use chrono::Utc;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const REPORT_TITLE: &str = "Realtime Campaign Strategy Report";
const SYNTHESIS_SECTION: &str = "Strategic synthesis";

pub struct ReportAggregator {
    config: ReportConfig,
    service: ServiceConfig,
    workdir: PathBuf,
}

impl ReportAggregator {
    pub fn new(config: ReportConfig, service: ServiceConfig, workdir: PathBuf) -> Self {
        Self {
            config,
            service,
            workdir,
        }
    }

    /// Builds the report from the configured artifact set. Missing
    /// artifacts are substituted with an explicit placeholder section,
    /// never an error; a failing or unconfigured summarization service
    /// degrades the synthesis section instead of voiding the report.
    pub async fn aggregate(&self) -> Result<Report> {
        let mut sections = Vec::with_capacity(self.config.artifacts.len() + 1);
        let mut sources = BTreeSet::new();

        for artifact in &self.config.artifacts {
            let path = self.workdir.join(&artifact.path);
            match read_artifact(&path) {
                Ok(content) => {
                    sources.insert(artifact.path.display().to_string());
                    sections.push(ReportSection::available(&artifact.name, content));
                }
                Err(e) => {
                    if artifact.optional {
                        info!("{}, substituting placeholder", e);
                    } else {
                        warn!("{}, substituting placeholder", e);
                    }
                    sections.push(ReportSection::unavailable(&artifact.name));
                }
            }
        }

        let (synthesis, synthesized) = self.synthesize(&sections).await;
        sections.push(ReportSection {
            name: SYNTHESIS_SECTION.to_string(),
            body: synthesis,
            available: synthesized,
        });

        Ok(Report::new(sections, sources))
    }

    /// Aggregates and writes the report to a timestamped file, refreshing
    /// the fixed-name latest copy for consumers that do not track
    /// timestamps.
    pub async fn aggregate_and_write(&self) -> Result<(Report, PathBuf)> {
        let report = self.aggregate().await?;

        fs::create_dir_all(&self.config.output_dir)?;

        let filename = format!(
            "{}_{}.md",
            self.config.report_prefix,
            Utc::now().format("%Y%m%d_%H%M")
        );
        let path = self.config.output_dir.join(filename);
        let markdown = report.to_markdown(REPORT_TITLE);

        fs::write(&path, &markdown)?;
        fs::write(self.config.output_dir.join(&self.config.latest_name), &markdown)?;

        info!("Strategy report written to {}", path.display());
        Ok((report, path))
    }

    async fn synthesize(&self, sections: &[ReportSection]) -> (String, bool) {
        let Some(api_key) = self.service.api_key.clone() else {
            warn!("No API credential configured, report synthesis degraded");
            return (
                summarizer::degraded_notice("no API credential configured"),
                false,
            );
        };

        let prompt = build_prompt(sections);
        let client = SummaryClient::new(&self.service, api_key);

        match client.summarize(&prompt).await {
            Ok(text) => (text, true),
            Err(e) => {
                warn!("Report synthesis failed: {}", e);
                (summarizer::degraded_notice(&e.to_string()), false)
            }
        }
    }
}

fn read_artifact(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(PipelineError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }
    Ok(fs::read_to_string(path)?)
}

fn build_prompt(sections: &[ReportSection]) -> String {
    let mut prompt = String::from(
        "You are the lead consultant of a campaign strategy command center. \
         Below are the latest collected data analyses and risk test results. \
         Write a precise, actionable strategy report based on them.\n\n\
         [Data summary]\n",
    );

    for (index, section) in sections.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {}:\n{}\n\n",
            index + 1,
            section.name,
            section.body
        ));
    }

    prompt.push_str(
        "[Report requirements]\n\
         1. Current balance of power: who holds effective control right now?\n\
         2. Per-candidate risk: whose position is most fragile if a key asset is lost?\n\
         3. Target region strategy: concrete actions to win the decisive districts.\n\
         4. Resilience: how to limit damage when a risk event lands.\n\
         5. Scenario outlook: who benefits long-term from the current events?\n\n\
         Cite concrete figures and place names from the data throughout.",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArtifactConfig, Config};
    use crate::models::UNAVAILABLE_MARKER;
    use tempfile::TempDir;

    fn aggregator_for(dir: &TempDir, artifacts: Vec<ArtifactConfig>) -> ReportAggregator {
        let mut config = Config::default_config();
        config.report.artifacts = artifacts;
        config.report.output_dir = dir.path().join("reports");
        // No credential: synthesis degrades deterministically in tests.
        config.service.api_key = None;
        ReportAggregator::new(config.report, config.service, dir.path().to_path_buf())
    }

    fn artifact(name: &str, path: &str, optional: bool) -> ArtifactConfig {
        ArtifactConfig {
            name: name.to_string(),
            path: PathBuf::from(path),
            optional,
        }
    }

    #[tokio::test]
    async fn test_present_artifacts_become_sections() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("scores.csv"), "node,score\nkim,0.9\n").unwrap();

        let aggregator = aggregator_for(&dir, vec![artifact("Influence", "scores.csv", false)]);
        let report = aggregator.aggregate().await.unwrap();

        let section = report.section("Influence").unwrap();
        assert!(section.available);
        assert!(section.body.contains("kim,0.9"));
        assert!(report.source_artifacts.contains("scores.csv"));
    }

    #[tokio::test]
    async fn test_missing_optional_artifact_gets_placeholder() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("scores.csv"), "node,score\n").unwrap();

        let aggregator = aggregator_for(
            &dir,
            vec![
                artifact("Influence", "scores.csv", false),
                artifact("Recent event impact", "event_impact_result.json", true),
            ],
        );
        let report = aggregator.aggregate().await.unwrap();

        let missing = report.section("Recent event impact").unwrap();
        assert!(!missing.available);
        assert_eq!(missing.body, UNAVAILABLE_MARKER);
        assert!(!report.source_artifacts.contains("event_impact_result.json"));
    }

    #[tokio::test]
    async fn test_all_artifacts_missing_still_produces_report() {
        let dir = TempDir::new().unwrap();
        let aggregator = aggregator_for(
            &dir,
            vec![
                artifact("Influence", "scores.csv", false),
                artifact("Regions", "regions.csv", false),
            ],
        );

        let report = aggregator.aggregate().await.unwrap();
        assert_eq!(report.sections.len(), 3);
        assert!(report.sections[..2].iter().all(|s| !s.available));
        assert!(report.source_artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_degrades_synthesis() {
        let dir = TempDir::new().unwrap();
        let aggregator = aggregator_for(&dir, vec![artifact("Influence", "scores.csv", true)]);

        let report = aggregator.aggregate().await.unwrap();
        let synthesis = report.section(SYNTHESIS_SECTION).unwrap();
        assert!(!synthesis.available);
        assert!(synthesis.body.contains("AI synthesis unavailable"));
    }

    #[tokio::test]
    async fn test_write_maintains_latest_copy() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("scores.csv"), "node,score\n").unwrap();

        let aggregator = aggregator_for(&dir, vec![artifact("Influence", "scores.csv", false)]);
        let (_, path) = aggregator.aggregate_and_write().await.unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let latest =
            fs::read_to_string(dir.path().join("reports").join("strategy_report_latest.md"))
                .unwrap();
        assert_eq!(written, latest);
        assert!(written.contains("# Realtime Campaign Strategy Report"));
    }

    #[test]
    fn test_prompt_numbers_sections() {
        let sections = vec![
            ReportSection::available("Influence", "scores"),
            ReportSection::unavailable("Events"),
        ];
        let prompt = build_prompt(&sections);
        assert!(prompt.contains("1. Influence:\nscores"));
        assert!(prompt.contains("2. Events:\n(data not available)"));
        assert!(prompt.contains("[Report requirements]"));
    }
}
