// file: src/pipeline/protocol.rs
// description: line-oriented progress protocol shared by runner and monitor
// reference: https://docs.rs/regex

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Anchored so "see [2/5] below" in a log line is not a progress update.
    static ref PROGRESS_LINE: Regex =
        Regex::new(r"^\[(\d+)/(\d+)\]\s*(.*)$").expect("PROGRESS_LINE regex is valid");
}

/// One step of the pipeline as seen over the wire. Ephemeral: produced by
/// the runner, consumed once by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub current: usize,
    pub total: usize,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(current: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            current,
            total,
            message: message.into(),
        }
    }

    pub fn percent(&self) -> u64 {
        if self.total == 0 {
            return 0;
        }
        (self.current as u64 * 100) / self.total as u64
    }
}

/// Classification of a single line of child output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedLine {
    Progress(ProgressEvent),
    /// Anything that is not a well-formed progress line, passed through
    /// verbatim for display.
    Log(String),
}

pub fn encode(event: &ProgressEvent) -> String {
    format!("[{}/{}] {}", event.current, event.total, event.message)
}

/// Decoding never fails: a malformed bracket token, an unparsable integer,
/// a zero index, or an index beyond the total all degrade to `Log`.
pub fn decode(line: &str) -> DecodedLine {
    let Some(captures) = PROGRESS_LINE.captures(line) else {
        return DecodedLine::Log(line.to_string());
    };

    let current = captures[1].parse::<usize>();
    let total = captures[2].parse::<usize>();

    match (current, total) {
        (Ok(current), Ok(total)) if current >= 1 && current <= total => {
            DecodedLine::Progress(ProgressEvent::new(current, total, &captures[3]))
        }
        _ => DecodedLine::Log(line.to_string()),
    }
}
