// file: src/monitor/supervisor.rs
// description: pipeline child process lifecycle and progress stream consumption
// reference: spawns the pipeline, drains merged output on one background task

use crate::error::{PipelineError, Result};
use crate::pipeline::protocol::{self, DecodedLine, ProgressEvent};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Display updates handed from the reader task to the UI loop. The
/// channel is the only crossing point; the reader never touches display
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    Progress(ProgressEvent),
    Log(String),
    Exited { success: bool, code: Option<i32> },
}

/// Owns a single pipeline run from the operator's perspective:
/// `Idle -> Running -> {Completed, Failed}`. Killing the child is the
/// only cancellation and reads as `Failed`.
pub struct ProcessMonitor {
    command: Vec<String>,
    state: MonitorState,
    child: Option<Child>,
    events: Option<mpsc::Receiver<MonitorEvent>>,
}

impl ProcessMonitor {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            state: MonitorState::Idle,
            child: None,
            events: None,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Spawns the pipeline child with piped stdout and stderr and starts
    /// the background reader. Rejects while a run is in progress.
    pub fn start(&mut self) -> Result<()> {
        if self.state == MonitorState::Running {
            return Err(PipelineError::Monitor(
                "a pipeline run is already in progress".to_string(),
            ));
        }

        let Some((program, args)) = self.command.split_first() else {
            return Err(PipelineError::Monitor("empty pipeline command".to_string()));
        };

        debug!("Spawning pipeline: {:?}", self.command);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PipelineError::Monitor(format!("failed to spawn pipeline: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::Monitor("pipeline stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| PipelineError::Monitor("pipeline stderr unavailable".to_string()))?;

        let (tx, rx) = mpsc::channel(256);

        // One task drains both streams, merged line by line. Dropping the
        // sender at end-of-stream is the completion signal.
        tokio::spawn(async move {
            let mut stdout = BufReader::new(stdout).lines();
            let mut stderr = BufReader::new(stderr).lines();
            let mut stdout_open = true;
            let mut stderr_open = true;

            while stdout_open || stderr_open {
                let line = tokio::select! {
                    line = stdout.next_line(), if stdout_open => match line {
                        Ok(Some(line)) => Some(line),
                        Ok(None) => {
                            stdout_open = false;
                            None
                        }
                        Err(e) => {
                            warn!("Error reading pipeline stdout: {}", e);
                            stdout_open = false;
                            None
                        }
                    },
                    line = stderr.next_line(), if stderr_open => match line {
                        Ok(Some(line)) => Some(line),
                        Ok(None) => {
                            stderr_open = false;
                            None
                        }
                        Err(e) => {
                            warn!("Error reading pipeline stderr: {}", e);
                            stderr_open = false;
                            None
                        }
                    },
                };

                let Some(line) = line else { continue };

                let event = match protocol::decode(&line) {
                    DecodedLine::Progress(progress) => MonitorEvent::Progress(progress),
                    DecodedLine::Log(log) => MonitorEvent::Log(log),
                };

                if tx.send(event).await.is_err() {
                    // Consumer is gone; keep draining so the child never
                    // blocks on a full pipe.
                    continue;
                }
            }
        });

        self.child = Some(child);
        self.events = Some(rx);
        self.state = MonitorState::Running;
        Ok(())
    }

    /// Next display update, in emission order. After the output stream
    /// ends the child is reaped, the state settles, and a final `Exited`
    /// event is yielded; thereafter `None`.
    pub async fn next_event(&mut self) -> Option<MonitorEvent> {
        let rx = self.events.as_mut()?;
        if let Some(event) = rx.recv().await {
            return Some(event);
        }
        self.events = None;

        let mut child = self.child.take()?;
        let (success, code) = match child.wait().await {
            Ok(status) => (status.success(), status.code()),
            Err(e) => {
                warn!("Failed to reap pipeline process: {}", e);
                (false, None)
            }
        };

        self.state = if success {
            MonitorState::Completed
        } else {
            MonitorState::Failed
        };

        Some(MonitorEvent::Exited { success, code })
    }

    /// Kills the entire pipeline process. There is no per-stage
    /// cancellation; the run is then observed as failed.
    pub async fn abort(&mut self) -> Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Err(PipelineError::Monitor(
                "no pipeline run in progress".to_string(),
            ));
        };

        child
            .kill()
            .await
            .map_err(|e| PipelineError::Monitor(format!("failed to kill pipeline: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    async fn drain(monitor: &mut ProcessMonitor) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        while let Some(event) = monitor.next_event().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_progress_and_log_lines_are_classified() {
        let mut monitor = ProcessMonitor::new(sh(
            "echo '[1/2] collecting'; echo plain output; echo '[2/2] publishing'",
        ));
        assert_eq!(monitor.state(), MonitorState::Idle);

        monitor.start().unwrap();
        assert_eq!(monitor.state(), MonitorState::Running);

        let events = drain(&mut monitor).await;
        assert_eq!(
            events[0],
            MonitorEvent::Progress(ProgressEvent::new(1, 2, "collecting"))
        );
        assert_eq!(events[1], MonitorEvent::Log("plain output".to_string()));
        assert_eq!(
            events[2],
            MonitorEvent::Progress(ProgressEvent::new(2, 2, "publishing"))
        );
        assert_eq!(
            events[3],
            MonitorEvent::Exited {
                success: true,
                code: Some(0)
            }
        );
        assert_eq!(monitor.state(), MonitorState::Completed);
    }

    #[tokio::test]
    async fn test_stderr_is_merged_into_the_stream() {
        let mut monitor = ProcessMonitor::new(sh("echo oops >&2"));
        monitor.start().unwrap();

        let events = drain(&mut monitor).await;
        assert!(events.contains(&MonitorEvent::Log("oops".to_string())));
    }

    #[tokio::test]
    async fn test_nonzero_exit_reads_as_failed() {
        let mut monitor = ProcessMonitor::new(sh("exit 3"));
        monitor.start().unwrap();

        let events = drain(&mut monitor).await;
        assert_eq!(
            events.last().unwrap(),
            &MonitorEvent::Exited {
                success: false,
                code: Some(3)
            }
        );
        assert_eq!(monitor.state(), MonitorState::Failed);
    }

    #[tokio::test]
    async fn test_start_rejected_while_running() {
        let mut monitor = ProcessMonitor::new(sh("sleep 2"));
        monitor.start().unwrap();

        assert!(matches!(
            monitor.start(),
            Err(PipelineError::Monitor(_))
        ));

        monitor.abort().await.unwrap();
        drain(&mut monitor).await;
        assert_eq!(monitor.state(), MonitorState::Failed);
    }

    #[tokio::test]
    async fn test_abort_kills_the_run() {
        let mut monitor = ProcessMonitor::new(sh("echo '[1/1] long stage'; sleep 30"));
        monitor.start().unwrap();

        // First event proves the child is up, then kill it.
        let first = monitor.next_event().await.unwrap();
        assert!(matches!(first, MonitorEvent::Progress(_)));

        monitor.abort().await.unwrap();
        let events = drain(&mut monitor).await;
        assert!(matches!(
            events.last().unwrap(),
            MonitorEvent::Exited { success: false, .. }
        ));
        assert_eq!(monitor.state(), MonitorState::Failed);
    }

    #[tokio::test]
    async fn test_abort_without_run_is_an_error() {
        let mut monitor = ProcessMonitor::new(sh("true"));
        assert!(monitor.abort().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_start() {
        let mut monitor =
            ProcessMonitor::new(vec!["definitely-not-a-real-binary-7a1d".to_string()]);
        assert!(matches!(
            monitor.start(),
            Err(PipelineError::Monitor(_))
        ));
        assert_eq!(monitor.state(), MonitorState::Idle);
    }

    #[tokio::test]
    async fn test_restart_allowed_after_completion() {
        let mut monitor = ProcessMonitor::new(sh("true"));
        monitor.start().unwrap();
        drain(&mut monitor).await;
        assert_eq!(monitor.state(), MonitorState::Completed);

        monitor.start().unwrap();
        drain(&mut monitor).await;
        assert_eq!(monitor.state(), MonitorState::Completed);
    }
}
