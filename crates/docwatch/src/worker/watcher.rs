use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use moka::sync::Cache;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};

use crate::config::WatchConfig;
use crate::error::{QueueError, WatchError};
use crate::status::{StatusSender, WatcherEvent};
use crate::worker::job::JobOrigin;
use crate::worker::queue::JobSubmitter;
use crate::worker::scanner::DocumentFilter;
use crate::worker::stability::StabilityTracker;

const TICK: Duration = Duration::from_millis(100);
const DEDUPE_CAPACITY: u64 = 10_000;

/// Watches the monitored folder (non-recursively) and submits a job for
/// every new document once it has finished being written.
pub struct FolderWatcher {
    config: Arc<WatchConfig>,
    submitter: JobSubmitter,
    status: StatusSender,
}

impl FolderWatcher {
    pub fn new(config: Arc<WatchConfig>, submitter: JobSubmitter, status: StatusSender) -> Self {
        Self {
            config,
            submitter,
            status,
        }
    }

    /// Subscribes to the folder and starts the watcher thread.
    pub fn start(self) -> Result<WatcherHandle, WatchError> {
        let directory = self.config.monitor_dir.clone();
        let start_error = |reason: String| WatchError::Start {
            path: directory.clone(),
            reason,
        };

        let (tx, rx) = mpsc::channel();
        let mut debouncer: Debouncer<RecommendedWatcher> =
            new_debouncer(self.config.watcher.debounce, tx).map_err(|e| start_error(e.to_string()))?;
        debouncer
            .watcher()
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| start_error(e.to_string()))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let status = self.status.clone();

        let worker = WatchLoop {
            directory: directory.clone(),
            filter: DocumentFilter::new(&self.config),
            tracker: StabilityTracker::new(self.config.watcher),
            recent: Cache::builder()
                .max_capacity(DEDUPE_CAPACITY)
                .time_to_live(self.config.watcher.dedupe_ttl)
                .build(),
            submitter: self.submitter,
            status: self.status,
        };
        let shutdown_flag = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name("docwatch-watcher".to_string())
            .spawn(move || worker.run(debouncer, rx, shutdown_flag))
            .map_err(|e| start_error(e.to_string()))?;

        info!("Watching directory: {}", directory.display());

        Ok(WatcherHandle {
            directory,
            shutdown,
            thread: Some(thread),
            status,
        })
    }
}

/// Owner of a running watcher thread.
pub struct WatcherHandle {
    directory: PathBuf,
    shutdown: Arc<AtomicBool>,
    /// Yields false when the thread already reported a fatal error.
    thread: Option<JoinHandle<bool>>,
    status: StatusSender,
}

impl WatcherHandle {
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// False once the thread has exited, including after a fatal error.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops event emission and joins the watcher thread. Jobs already
    /// submitted are unaffected.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        self.shutdown.store(true, Ordering::Relaxed);
        let exited_cleanly = match thread.join() {
            Ok(clean) => clean,
            Err(e) => {
                error!("Watcher thread panicked: {:?}", e);
                false
            }
        };

        info!("Stopped watching {}", self.directory.display());
        if exited_cleanly {
            self.status.watcher(WatcherEvent::Stopped {
                path: self.directory.display().to_string(),
            });
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct WatchLoop {
    directory: PathBuf,
    filter: DocumentFilter,
    tracker: StabilityTracker,
    /// Paths submitted recently; editors fire several events per save.
    recent: Cache<PathBuf, ()>,
    submitter: JobSubmitter,
    status: StatusSender,
}

impl WatchLoop {
    /// Returns true when stopped on request, false after a fatal error.
    fn run(
        mut self,
        debouncer: Debouncer<RecommendedWatcher>,
        events: mpsc::Receiver<DebounceEventResult>,
        shutdown: Arc<AtomicBool>,
    ) -> bool {
        self.status.watcher(WatcherEvent::Started {
            path: self.directory.display().to_string(),
        });

        let outcome = loop {
            if shutdown.load(Ordering::Relaxed) {
                debug!("Watcher received shutdown signal");
                break Ok(());
            }

            match events.recv_timeout(TICK) {
                Ok(Ok(batch)) => {
                    let now = Instant::now();
                    for event in batch {
                        self.observe(event.path, now);
                    }
                }
                Ok(Err(e)) => {
                    warn!("Watch error: {:?}", e);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(WatchError::ChannelClosed);
                }
            }

            if !self.directory.is_dir() {
                break Err(WatchError::DirectoryLost(self.directory.clone()));
            }

            if let Err(e) = self.submit_ready() {
                break Err(e);
            }
        };

        drop(debouncer);

        match outcome {
            Ok(()) => true,
            Err(e) => {
                error!("Watcher stopped: {}", e);
                self.status.watcher(WatcherEvent::Fatal {
                    path: self.directory.display().to_string(),
                    error: e.to_string(),
                });
                false
            }
        }
    }

    fn observe(&mut self, path: PathBuf, now: Instant) {
        if self.recent.contains_key(&path) {
            return;
        }
        if self.filter.classify(&path).is_some() {
            debug!("Candidate: {}", path.display());
            self.tracker.observe(path, now);
        }
    }

    fn submit_ready(&mut self) -> Result<(), WatchError> {
        if self.tracker.is_empty() {
            return Ok(());
        }

        for path in self.tracker.poll(Instant::now()) {
            // The file may have been renamed or replaced while settling
            let Some(kind) = self.filter.classify(&path) else {
                continue;
            };
            if self.recent.contains_key(&path) {
                continue;
            }
            self.recent.insert(path.clone(), ());

            info!("New document detected: {}", path.display());
            match self.submitter.submit(path, kind, JobOrigin::Watcher) {
                Ok(_) => {}
                Err(QueueError::Closed) => {
                    warn!("Job queue closed, dropping detected document");
                    return Err(WatchError::ChannelClosed);
                }
                Err(e) => warn!("Failed to submit job: {}", e),
            }
        }
        Ok(())
    }
}
