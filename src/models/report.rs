// file: src/models/report.rs
// description: composite strategy report assembled from stage artifacts
// reference: internal data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Marker substituted for artifacts that were expected but not found.
pub const UNAVAILABLE_MARKER: &str = "(data not available)";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportSection {
    pub name: String,
    pub body: String,
    pub available: bool,
}

impl ReportSection {
    pub fn available(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            available: true,
        }
    }

    pub fn unavailable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: UNAVAILABLE_MARKER.to_string(),
            available: false,
        }
    }
}

/// Built once per run from artifacts owned by upstream stages.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<ReportSection>,
    pub source_artifacts: BTreeSet<String>,
}

impl Report {
    pub fn new(sections: Vec<ReportSection>, source_artifacts: BTreeSet<String>) -> Self {
        Self {
            generated_at: Utc::now(),
            sections,
            source_artifacts,
        }
    }

    pub fn section(&self, name: &str) -> Option<&ReportSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Renders the report as the markdown document written to disk.
    pub fn to_markdown(&self, title: &str) -> String {
        let mut out = format!("# {}\n\n", title);
        out.push_str(&format!(
            "**Generated**: {}\n\n---\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M")
        ));

        for section in &self.sections {
            out.push_str(&format!("## {}\n\n{}\n\n", section.name, section.body));
        }

        if !self.source_artifacts.is_empty() {
            out.push_str("---\n\nSource artifacts:\n");
            for path in &self.source_artifacts {
                out.push_str(&format!("- `{}`\n", path));
            }
        }

        out
    }
}
