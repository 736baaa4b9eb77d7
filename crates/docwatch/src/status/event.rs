//! Status messages posted by the watcher and consumer threads.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::worker::job::{JobKind, JobStatus};

/// Phase of job processing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    Renaming,
    ConvertingHwpx,
    ConvertingPdf,
    Done,
    Failed,
}

impl JobPhase {
    pub fn status(self) -> JobStatus {
        match self {
            JobPhase::Queued => JobStatus::Queued,
            JobPhase::Renaming | JobPhase::ConvertingHwpx | JobPhase::ConvertingPdf => {
                JobStatus::Running
            }
            JobPhase::Done => JobStatus::Done,
            JobPhase::Failed => JobStatus::Failed,
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobPhase::Queued => write!(f, "Queued"),
            JobPhase::Renaming => write!(f, "Renaming"),
            JobPhase::ConvertingHwpx => write!(f, "Converting to HWPX"),
            JobPhase::ConvertingPdf => write!(f, "Converting to PDF"),
            JobPhase::Done => write!(f, "Done"),
            JobPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Severity shown next to a status line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLevel::Info => write!(f, "INFO"),
            StatusLevel::Success => write!(f, "SUCCESS"),
            StatusLevel::Warning => write!(f, "WARNING"),
            StatusLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Progress event for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: String,
    /// Source file name at submission.
    pub filename: String,
    pub kind: JobKind,
    pub phase: JobPhase,
    pub status: JobStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// Final document path (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_path: Option<String>,
    /// Converted files (set on completion).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
    /// Phase the job failed in (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_phase: Option<JobPhase>,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl JobProgressEvent {
    pub fn new(job_id: &str, filename: &str, kind: JobKind, phase: JobPhase, message: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            filename: filename.to_string(),
            kind,
            phase,
            status: phase.status(),
            message: message.to_string(),
            timestamp: Utc::now(),
            batch_id: None,
            final_path: None,
            outputs: vec![],
            failed_phase: None,
            error: None,
            warnings: vec![],
        }
    }

    pub fn completed(
        job_id: &str,
        filename: &str,
        kind: JobKind,
        final_path: Option<&Path>,
        outputs: &[std::path::PathBuf],
        warnings: &[String],
    ) -> Self {
        let mut event = Self::new(job_id, filename, kind, JobPhase::Done, "Processing completed");
        event.final_path = final_path.map(|p| p.display().to_string());
        event.outputs = outputs.iter().map(|p| p.display().to_string()).collect();
        event.warnings = warnings.to_vec();
        event
    }

    pub fn failed(
        job_id: &str,
        filename: &str,
        kind: JobKind,
        failed_phase: JobPhase,
        error: &str,
    ) -> Self {
        let mut event = Self::new(job_id, filename, kind, JobPhase::Failed, "Processing failed");
        event.failed_phase = Some(failed_phase);
        event.error = Some(error.to_string());
        event
    }

    pub fn with_batch(mut self, batch_id: Option<&str>) -> Self {
        self.batch_id = batch_id.map(|s| s.to_string());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatcherEvent {
    Started { path: String },
    Stopped { path: String },
    /// The watcher has stopped and will not retry.
    Fatal { path: String, error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    Started {
        batch_id: String,
        label: String,
        total: usize,
    },
    Finished {
        batch_id: String,
        label: String,
        total: usize,
        done: usize,
        failed: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum StatusEvent {
    Job(JobProgressEvent),
    Watcher(WatcherEvent),
    Batch(BatchEvent),
}

impl StatusEvent {
    pub fn level(&self) -> StatusLevel {
        match self {
            StatusEvent::Job(event) => match event.phase {
                JobPhase::Done if event.warnings.is_empty() => StatusLevel::Success,
                JobPhase::Done => StatusLevel::Warning,
                JobPhase::Failed => StatusLevel::Error,
                _ => StatusLevel::Info,
            },
            StatusEvent::Watcher(WatcherEvent::Fatal { .. }) => StatusLevel::Error,
            StatusEvent::Watcher(_) => StatusLevel::Info,
            StatusEvent::Batch(BatchEvent::Finished { failed, .. }) if *failed > 0 => {
                StatusLevel::Warning
            }
            StatusEvent::Batch(BatchEvent::Finished { .. }) => StatusLevel::Success,
            StatusEvent::Batch(_) => StatusLevel::Info,
        }
    }

    /// One human-readable line describing the event.
    pub fn message(&self) -> String {
        match self {
            StatusEvent::Job(event) => match event.phase {
                JobPhase::Done => {
                    let mut line = format!("{}: done", event.filename);
                    if let Some(path) = &event.final_path {
                        line.push_str(&format!(" -> {}", file_name(path)));
                    }
                    for output in &event.outputs {
                        line.push_str(&format!(" [{}]", file_name(output)));
                    }
                    for warning in &event.warnings {
                        line.push_str(&format!(" (warning: {})", warning));
                    }
                    line
                }
                JobPhase::Failed => format!(
                    "{}: failed while {}: {}",
                    event.filename,
                    event
                        .failed_phase
                        .map(|p| p.to_string().to_lowercase())
                        .unwrap_or_else(|| "processing".to_string()),
                    event.error.as_deref().unwrap_or("unknown error")
                ),
                phase => format!("{}: {} ({})", event.filename, phase, event.kind),
            },
            StatusEvent::Watcher(WatcherEvent::Started { path }) => {
                format!("Monitoring started: {}", path)
            }
            StatusEvent::Watcher(WatcherEvent::Stopped { path }) => {
                format!("Monitoring stopped: {}", path)
            }
            StatusEvent::Watcher(WatcherEvent::Fatal { path, error }) => {
                format!("Monitoring of {} stopped: {}", path, error)
            }
            StatusEvent::Batch(BatchEvent::Started { label, total, .. }) => {
                format!("{}: {} job(s) queued", label, total)
            }
            StatusEvent::Batch(BatchEvent::Finished {
                label,
                total,
                done,
                failed,
                ..
            }) => format!(
                "{} finished: {} of {} done, {} failed",
                label, done, total, failed
            ),
        }
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}
