//! Test harness for isolated monitor runs.
//!
//! The `TestHarness` struct provides:
//! - A temporary watched folder, created with `assert_fs`
//! - Watch configurations with short watcher timings
//! - Helpers collecting status events until jobs reach a terminal state

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_fs::prelude::*;
use assert_fs::TempDir;

use docwatch::config::WatcherTimings;
use docwatch::converter::ConverterBackend;
use docwatch::status::{JobProgressEvent, WatcherEvent};
use docwatch::{status_channel, Monitor, StatusEvent, StatusReceiver, WatchConfig};

/// Every status event seen, in arrival order.
#[derive(Debug, Default)]
pub struct JobTrace {
    pub events: Vec<StatusEvent>,
}

impl JobTrace {
    pub fn jobs(&self) -> impl Iterator<Item = &JobProgressEvent> {
        self.events.iter().filter_map(|event| match event {
            StatusEvent::Job(job) => Some(job),
            _ => None,
        })
    }

    /// Terminal job events in the order they were reported.
    pub fn terminal(&self) -> Vec<&JobProgressEvent> {
        self.jobs().filter(|job| job.is_terminal()).collect()
    }

    /// Index in `events` of the first event for `filename` matching `pred`.
    pub fn position<F>(&self, filename: &str, pred: F) -> Option<usize>
    where
        F: Fn(&JobProgressEvent) -> bool,
    {
        self.events.iter().position(|event| match event {
            StatusEvent::Job(job) => job.filename == filename && pred(job),
            _ => false,
        })
    }
}

/// Isolated environment around one watched folder.
pub struct TestHarness {
    temp_dir: TempDir,
    /// The monitored folder.
    pub watch_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let inbox = temp_dir.child("inbox");
        inbox.create_dir_all().expect("Failed to create watch dir");
        let watch_dir = inbox.path().to_path_buf();

        Self {
            temp_dir,
            watch_dir,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Snapshot for the watched folder with fast watcher timings.
    pub fn config(&self, extensions: &[&str]) -> WatchConfig {
        let extensions: Vec<String> = extensions.iter().map(|e| e.to_string()).collect();
        let mut config =
            WatchConfig::new(&self.watch_dir, &extensions).expect("Failed to build config");
        config.watcher = WatcherTimings {
            debounce: Duration::from_millis(200),
            probe_interval: Duration::from_millis(50),
            stable_probes: 2,
            settle_timeout: Duration::from_secs(2),
            dedupe_ttl: Duration::from_secs(30),
        };
        config
    }

    pub fn monitor(
        &self,
        extensions: &[&str],
        backend: Arc<dyn ConverterBackend>,
    ) -> (Monitor, StatusReceiver) {
        let (tx, rx) = status_channel();
        let monitor =
            Monitor::new(self.config(extensions), backend, tx).expect("Failed to start monitor");
        (monitor, rx)
    }

    /// Writes a document into the watched folder.
    pub fn write(&self, filename: &str, content: &str) -> PathBuf {
        let child = self.temp_dir.child("inbox").child(filename);
        child.write_str(content).expect("Failed to write document");
        child.path().to_path_buf()
    }

    /// Names of the regular files currently in the watched folder, sorted.
    pub fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.watch_dir)
            .expect("Failed to list watch dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Blocks until the watcher reports that it started.
pub fn wait_for_watcher(rx: &StatusReceiver) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Some(StatusEvent::Watcher(WatcherEvent::Started { .. })) =
            rx.recv_timeout(Duration::from_millis(50))
        {
            return true;
        }
    }
    false
}

/// Collects events until `count` jobs reached a terminal state or the
/// timeout passed.
pub fn collect_until_terminal(rx: &StatusReceiver, count: usize, timeout: Duration) -> JobTrace {
    let mut trace = JobTrace::default();
    let deadline = Instant::now() + timeout;
    while trace.terminal().len() < count && Instant::now() < deadline {
        if let Some(event) = rx.recv_timeout(Duration::from_millis(50)) {
            trace.events.push(event);
        }
    }
    trace
}

/// Collects whatever arrives during `window`.
pub fn collect_for(rx: &StatusReceiver, window: Duration) -> JobTrace {
    let mut trace = JobTrace::default();
    let deadline = Instant::now() + window;
    while Instant::now() < deadline {
        if let Some(event) = rx.recv_timeout(Duration::from_millis(50)) {
            trace.events.push(event);
        }
    }
    trace
}
