use std::path::PathBuf;

use crate::status::{JobPhase, JobProgressEvent, StatusSender};
use crate::worker::job::JobKind;

/// Events emitted by the pipeline during processing.
pub enum ProgressEvent {
    Phase {
        phase: JobPhase,
        message: String,
    },
    Completed {
        final_path: Option<PathBuf>,
        outputs: Vec<PathBuf>,
        warnings: Vec<String>,
    },
    Failed {
        phase: JobPhase,
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bridges pipeline events to the status channel.
pub struct ChannelProgress {
    job_id: String,
    filename: String,
    kind: JobKind,
    batch_id: Option<String>,
    sender: StatusSender,
}

impl ChannelProgress {
    pub fn new(
        job_id: &str,
        filename: &str,
        kind: JobKind,
        batch_id: Option<&str>,
        sender: StatusSender,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            filename: filename.to_string(),
            kind,
            batch_id: batch_id.map(|s| s.to_string()),
            sender,
        }
    }

    fn send(&self, event: JobProgressEvent) {
        self.sender
            .job(event.with_batch(self.batch_id.as_deref()));
    }
}

impl ProgressReporter for ChannelProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase { phase, message } => {
                self.send(JobProgressEvent::new(
                    &self.job_id,
                    &self.filename,
                    self.kind,
                    phase,
                    &message,
                ));
            }
            ProgressEvent::Completed {
                final_path,
                outputs,
                warnings,
            } => {
                self.send(JobProgressEvent::completed(
                    &self.job_id,
                    &self.filename,
                    self.kind,
                    final_path.as_deref(),
                    &outputs,
                    &warnings,
                ));
            }
            ProgressEvent::Failed { phase, error } => {
                self.send(JobProgressEvent::failed(
                    &self.job_id,
                    &self.filename,
                    self.kind,
                    phase,
                    &error,
                ));
            }
        }
    }
}
