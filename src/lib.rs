// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod pipeline;
pub mod publish;
pub mod report;
pub mod utils;

pub use config::{
    ArtifactConfig, Config, PipelineConfig, PublishConfig, ReportConfig, ServiceConfig,
};
pub use error::{PipelineError, Result};
pub use models::{
    PipelineRun, Report, ReportSection, RunStatus, StageDescriptor, StageKind, StageRegistry,
    StageResult, UNAVAILABLE_MARKER,
};
pub use monitor::{MonitorEvent, MonitorState, ProcessMonitor, StatusDisplay};
pub use pipeline::{DecodedLine, PipelineRunner, ProgressEvent, protocol};
pub use publish::{PublishOutcome, RemotePublisher};
pub use report::{ReportAggregator, SummaryClient};
