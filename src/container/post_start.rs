//! Post-start commands
//!
//! A post-start command runs as a detached task: the lifecycle call that
//! schedules it returns without waiting. Output goes to the log as it
//! arrives and the outcome is reported on an optional channel.

use crate::engine::{ContainerEngine, ExecSession};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Default wait before running a post-start command
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Final outcome of one post-start command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostStartReport {
    pub service: String,
    pub container_id: String,
    pub command: Vec<String>,
    /// Number of output chunks received, or the failure message
    pub outcome: Result<usize, String>,
}

/// How post-start commands are scheduled
#[derive(Debug, Clone)]
pub struct PostStartOptions {
    /// Wait between container start and command execution
    pub settle_delay: Duration,
    /// Where finished commands are reported
    pub reports: Option<mpsc::UnboundedSender<PostStartReport>>,
}

impl Default for PostStartOptions {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            reports: None,
        }
    }
}

impl PostStartOptions {
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_reports(mut self, sender: mpsc::UnboundedSender<PostStartReport>) -> Self {
        self.reports = Some(sender);
        self
    }
}

/// Schedule `command` inside `container_id` and return immediately
pub fn spawn(
    engine: Arc<dyn ContainerEngine>,
    service: String,
    container_id: String,
    command: Vec<String>,
    options: &PostStartOptions,
) -> JoinHandle<()> {
    let settle_delay = options.settle_delay;
    let reports = options.reports.clone();

    tokio::spawn(async move {
        tokio::time::sleep(settle_delay).await;

        let outcome = run(engine.as_ref(), &service, &container_id, &command).await;
        match &outcome {
            Ok(chunks) => info!(service = %service, chunks, "Post-start command finished"),
            Err(e) => warn!(service = %service, error = %e, "Post-start command failed"),
        }

        if let Some(reports) = reports {
            // The receiver may be gone; nobody is waiting for this report then
            let _ = reports.send(PostStartReport {
                service,
                container_id,
                command,
                outcome,
            });
        }
    })
}

/// Wait for every scheduled command to report.
///
/// Returns once all senders are gone, so the controller holding the
/// original sender must be dropped first.
pub async fn collect_reports(
    mut reports: mpsc::UnboundedReceiver<PostStartReport>,
) -> Vec<PostStartReport> {
    let mut collected = Vec::new();
    while let Some(report) = reports.recv().await {
        collected.push(report);
    }
    collected
}

async fn run(
    engine: &dyn ContainerEngine,
    service: &str,
    container_id: &str,
    command: &[String],
) -> Result<usize, String> {
    info!(service = %service, command = ?command, "Running post-start command");

    let ExecSession { id, mut output } = engine
        .exec(container_id, command)
        .await
        .map_err(|e| e.to_string())?;

    let mut chunks = 0;
    while let Some(chunk) = output.next().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        chunks += 1;
        info!(service = %service, stream = %chunk.kind, "{}", chunk.text.trim_end());
    }

    match engine.exec_exit_code(&id).await.map_err(|e| e.to_string())? {
        Some(code) if code != 0 => Err(format!("command exited with code {}", code)),
        _ => Ok(chunks),
    }
}
