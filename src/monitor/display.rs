// file: src/monitor/display.rs
// description: live status rendering for a monitored pipeline run
// reference: uses indicatif for the percentage bar and single-line log

use crate::monitor::supervisor::MonitorEvent;
use crate::utils::logging::{format_error, format_success};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Raw log lines are shown on a single status line, bounded to keep the
/// display stable.
const STATUS_LINE_LIMIT: usize = 60;

pub struct StatusDisplay {
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
}

impl StatusDisplay {
    pub fn new() -> Self {
        Self::with_color(true)
    }

    pub fn with_color(colored: bool) -> Self {
        let multi_progress = MultiProgress::new();

        let main_bar = multi_progress.add(ProgressBar::new(100));
        if colored {
            main_bar.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}",
                    )
                    .expect("Failed to create progress bar template")
                    .progress_chars("█▓▒░"),
            );
        } else {
            main_bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner} [{elapsed_precise}] [{bar:40}] {percent:>3}% {msg}")
                    .expect("Failed to create progress bar template")
                    .progress_chars("=>-"),
            );
        }

        let detail_bar = multi_progress.add(ProgressBar::new(0));
        detail_bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg}")
                .expect("Failed to create detail bar template"),
        );

        Self {
            main_bar,
            detail_bar,
        }
    }

    /// Applies one monitor event. Only the UI loop calls this; the reader
    /// task communicates exclusively through the event channel.
    pub fn apply(&self, event: &MonitorEvent) {
        match event {
            MonitorEvent::Progress(progress) => {
                self.main_bar.set_position(progress.percent());
                self.main_bar
                    .set_message(truncate_status(&progress.message));
            }
            MonitorEvent::Log(line) => {
                self.detail_bar.set_message(truncate_status(line));
            }
            MonitorEvent::Exited { success, code } => self.finish(*success, *code),
        }
    }

    fn finish(&self, success: bool, code: Option<i32>) {
        self.detail_bar.finish_and_clear();
        if success {
            self.main_bar.set_position(100);
            self.main_bar
                .finish_with_message(format_success("pipeline completed"));
        } else {
            let detail = match code {
                Some(code) => format!("pipeline failed (exit code {})", code),
                None => "pipeline terminated by signal".to_string(),
            };
            self.main_bar.abandon_with_message(format_error(&detail));
        }
    }
}

impl Default for StatusDisplay {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_status(text: &str) -> String {
    if text.chars().count() <= STATUS_LINE_LIMIT {
        text.to_string()
    } else {
        text.chars().take(STATUS_LINE_LIMIT).collect()
    }
}
