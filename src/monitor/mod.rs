// file: src/monitor/mod.rs
// description: monitor module exports
// reference: internal module structure

pub mod display;
pub mod supervisor;

pub use display::StatusDisplay;
pub use supervisor::{MonitorEvent, MonitorState, ProcessMonitor};
