//! Facade the presentation layer drives.
//!
//! A [`Monitor`] owns one configuration snapshot, the job queue with its
//! consumer thread, and the folder watcher while monitoring is on.

use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};

use crate::config::WatchConfig;
use crate::converter::{ConverterBackend, ExternalConverter};
use crate::error::{QueueError, Result};
use crate::pipeline::PipelineConfig;
use crate::status::StatusSender;
use crate::worker::job::{is_hwp_family, BatchTicket, JobKind, JobOrigin};
use crate::worker::{DirectoryScanner, FolderWatcher, JobQueue, WatcherHandle};

type BackendFactory = Box<dyn Fn(&WatchConfig) -> Arc<dyn ConverterBackend> + Send>;

/// Result of a bulk submission.
#[derive(Debug, Default)]
pub struct BulkSubmission {
    /// `None` when there was nothing to submit.
    pub ticket: Option<BatchTicket>,
    /// Paths that were not submitted.
    pub skipped: Vec<PathBuf>,
}

pub struct Monitor {
    config: Arc<WatchConfig>,
    backend_for: BackendFactory,
    status: StatusSender,
    queue: JobQueue,
    watcher: Option<WatcherHandle>,
}

impl Monitor {
    /// Starts the job queue with a fixed converter backend.
    pub fn new(
        config: WatchConfig,
        backend: Arc<dyn ConverterBackend>,
        status: StatusSender,
    ) -> Result<Self> {
        Self::with_factory(
            config,
            Box::new(move |_: &WatchConfig| Arc::clone(&backend)),
            status,
        )
    }

    /// Starts the job queue with the external converter executables named in
    /// the configuration. Reconfiguring picks up new executable paths.
    pub fn with_external_converter(config: WatchConfig, status: StatusSender) -> Result<Self> {
        Self::with_factory(config, Box::new(external_backend), status)
    }

    fn with_factory(
        config: WatchConfig,
        backend_for: BackendFactory,
        status: StatusSender,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let queue = start_queue(&config, &backend_for, &status)?;

        Ok(Self {
            config,
            backend_for,
            status,
            queue,
            watcher: None,
        })
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Jobs waiting behind the one in flight.
    pub fn pending_jobs(&self) -> usize {
        self.queue.pending()
    }

    /// Starts watching the monitored folder. A no-op while already watching.
    pub fn start_monitoring(&mut self) -> Result<()> {
        if self.is_monitoring() {
            return Ok(());
        }
        // A watcher that died on a fatal error is replaced
        self.watcher = None;

        let watcher = FolderWatcher::new(
            Arc::clone(&self.config),
            self.queue.submitter(),
            self.status.clone(),
        );
        self.watcher = Some(watcher.start()?);
        Ok(())
    }

    /// Stops the watcher only; queued and in-flight jobs keep running.
    /// Returns whether a watcher was running.
    pub fn stop_monitoring(&mut self) -> bool {
        match self.watcher.take() {
            Some(mut watcher) => {
                let was_running = watcher.is_running();
                watcher.stop();
                was_running
            }
            None => false,
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.watcher.as_ref().is_some_and(WatcherHandle::is_running)
    }

    /// Submits every accepted, not yet dated file in the folder as one
    /// batch. No watcher is started.
    pub fn process_existing_once(&self) -> Result<BulkSubmission> {
        let scanner = DirectoryScanner::new(&self.config);
        let items = scanner.scan_undated()?;
        self.submit_batch(items, JobOrigin::OneShot, "One-shot")
    }

    /// Queues PDF conversion for explicit files. Anything that is not an
    /// existing `.hwp`/`.hwpx` file is skipped.
    pub fn convert_files_to_pdf(&self, paths: &[PathBuf]) -> Result<BulkSubmission> {
        let mut items = Vec::new();
        let mut skipped = Vec::new();

        for path in paths {
            if path.is_file() && is_hwp_family(path) {
                items.push((path.clone(), JobKind::PdfConvert));
            } else {
                warn!("Skipping {}: not an HWP/HWPX file", path.display());
                skipped.push(path.clone());
            }
        }

        let mut submission = self.submit_batch(items, JobOrigin::BulkPdf, "PDF conversion")?;
        submission.skipped = skipped;
        Ok(submission)
    }

    /// Queues PDF conversion for every accepted `.hwp`/`.hwpx` file in the
    /// monitored folder.
    pub fn convert_folder_to_pdf(&self) -> Result<BulkSubmission> {
        let scanner = DirectoryScanner::new(&self.config);
        let items = scanner
            .scan_hwp_family()?
            .into_iter()
            .map(|path| (path, JobKind::PdfConvert))
            .collect();
        self.submit_batch(items, JobOrigin::BulkPdf, "Folder PDF conversion")
    }

    /// Queues a single document picked by the user. Returns the job id.
    pub fn submit(&self, path: PathBuf) -> Result<String> {
        let kind = JobKind::for_document(&path);
        Ok(self.queue.submit(path, kind, JobOrigin::Manual)?)
    }

    /// Swaps in a new configuration: stops the watcher, lets the in-flight
    /// job finish, restarts the consumer and, if it was running, the
    /// watcher. Jobs still waiting are cancelled.
    pub fn reconfigure(&mut self, config: WatchConfig) -> Result<()> {
        let was_monitoring = self.stop_monitoring();
        self.queue.shutdown();

        self.config = Arc::new(config);
        self.queue = start_queue(&self.config, &self.backend_for, &self.status)?;
        info!("Configuration applied for {}", self.config.monitor_dir.display());

        if was_monitoring {
            self.start_monitoring()?;
        }
        Ok(())
    }

    /// Stops the watcher and the queue. Waiting jobs are cancelled.
    pub fn shutdown(mut self) {
        self.stop_monitoring();
        self.queue.shutdown();
    }

    fn submit_batch(
        &self,
        items: Vec<(PathBuf, JobKind)>,
        origin: JobOrigin,
        label: &str,
    ) -> Result<BulkSubmission> {
        match self.queue.submit_batch(items, origin, label) {
            Ok(ticket) => Ok(BulkSubmission {
                ticket: Some(ticket),
                skipped: Vec::new(),
            }),
            Err(QueueError::EmptyBatch) => {
                info!("{}: nothing to do", label);
                Ok(BulkSubmission::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn external_backend(config: &WatchConfig) -> Arc<dyn ConverterBackend> {
    Arc::new(ExternalConverter::new(config.converter.clone()))
}

fn start_queue(
    config: &WatchConfig,
    backend_for: &BackendFactory,
    status: &StatusSender,
) -> Result<JobQueue> {
    let pipeline_config = Arc::new(PipelineConfig::from_config(config));
    Ok(JobQueue::start(
        pipeline_config,
        backend_for(config),
        status.clone(),
    )?)
}
