use std::collections::{HashMap, VecDeque};

use chrono::Local;

use crate::status::event::{
    BatchEvent, JobProgressEvent, StatusEvent, StatusLevel, WatcherEvent,
};
use crate::worker::job::JobStatus;

/// Lines kept for display; older lines are dropped first.
pub const MAX_STATUS_LINES: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// Local `HH:MM:SS`.
    pub time: String,
    pub level: StatusLevel,
    pub message: String,
}

/// Aggregated view of the status stream for a presentation layer.
#[derive(Debug, Default)]
pub struct StatusBoard {
    lines: VecDeque<StatusLine>,
    active: HashMap<String, JobProgressEvent>,
    succeeded: u64,
    failed: u64,
    watching: Option<String>,
    last_fatal: Option<String>,
    open_batches: HashMap<String, usize>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &StatusEvent) {
        match event {
            StatusEvent::Job(job) => {
                if job.is_terminal() {
                    self.active.remove(&job.job_id);
                    if job.status == JobStatus::Done {
                        self.succeeded += 1;
                    } else {
                        self.failed += 1;
                    }
                } else {
                    self.active.insert(job.job_id.clone(), job.clone());
                }
            }
            StatusEvent::Watcher(WatcherEvent::Started { path }) => {
                self.watching = Some(path.clone());
                self.last_fatal = None;
            }
            StatusEvent::Watcher(WatcherEvent::Stopped { .. }) => {
                self.watching = None;
            }
            StatusEvent::Watcher(WatcherEvent::Fatal { error, .. }) => {
                self.watching = None;
                self.last_fatal = Some(error.clone());
            }
            StatusEvent::Batch(BatchEvent::Started { batch_id, total, .. }) => {
                self.open_batches.insert(batch_id.clone(), *total);
            }
            StatusEvent::Batch(BatchEvent::Finished { batch_id, .. }) => {
                self.open_batches.remove(batch_id);
            }
        }

        self.push_line(event.level(), event.message());
    }

    /// Adds a line that did not come from the status channel.
    pub fn push_line(&mut self, level: StatusLevel, message: String) {
        self.lines.push_back(StatusLine {
            time: Local::now().format("%H:%M:%S").to_string(),
            level,
            message,
        });
        while self.lines.len() > MAX_STATUS_LINES {
            self.lines.pop_front();
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &StatusLine> {
        self.lines.iter()
    }

    pub fn clear_lines(&mut self) {
        self.lines.clear();
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Jobs that are queued or running.
    pub fn active_jobs(&self) -> impl Iterator<Item = &JobProgressEvent> {
        self.active.values()
    }

    pub fn watching(&self) -> Option<&str> {
        self.watching.as_deref()
    }

    pub fn last_fatal(&self) -> Option<&str> {
        self.last_fatal.as_deref()
    }

    pub fn open_batches(&self) -> usize {
        self.open_batches.len()
    }

    /// Compact counter text, e.g. `done 3 / failed 1`.
    pub fn summary(&self) -> String {
        format!("done {} / failed {}", self.succeeded, self.failed)
    }
}
