use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use log::{debug, error, info};

use crate::converter::{ConverterBackend, ConverterLease};
use crate::error::QueueError;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::status::{BatchEvent, JobPhase, JobProgressEvent, StatusSender};
use crate::worker::consumer::Consumer;
use crate::worker::job::{BatchInfo, BatchTicket, Job, JobKind, JobOrigin};

/// FIFO job queue drained by a single consumer thread.
///
/// The consumer is the only thread that talks to the converter, so jobs
/// run strictly one after another in submission order.
pub struct JobQueue {
    submitter: JobSubmitter,
    shutdown: Arc<AtomicBool>,
    consumer: Option<JoinHandle<()>>,
}

impl JobQueue {
    pub fn start(
        config: Arc<PipelineConfig>,
        backend: Arc<dyn ConverterBackend>,
        status: StatusSender,
    ) -> Result<Self, QueueError> {
        let (job_sender, job_receiver) = unbounded::<Job>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let consumer = Consumer::new(
            Pipeline::new(config),
            ConverterLease::new(backend),
            status.clone(),
        );
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("docwatch-consumer".to_string())
            .spawn(move || consumer.run(job_receiver, shutdown_flag))
            .map_err(|e| QueueError::SpawnFailed(e.to_string()))?;

        info!("Job queue started");

        Ok(Self {
            submitter: JobSubmitter {
                sender: job_sender,
                closed: Arc::new(RwLock::new(false)),
                status,
            },
            shutdown,
            consumer: Some(handle),
        })
    }

    /// A handle other threads can submit through.
    pub fn submitter(&self) -> JobSubmitter {
        self.submitter.clone()
    }

    pub fn submit(&self, path: PathBuf, kind: JobKind, origin: JobOrigin) -> Result<String, QueueError> {
        self.submitter.submit(path, kind, origin)
    }

    pub fn submit_batch(
        &self,
        items: Vec<(PathBuf, JobKind)>,
        origin: JobOrigin,
        label: &str,
    ) -> Result<BatchTicket, QueueError> {
        self.submitter.submit_batch(items, origin, label)
    }

    /// Jobs waiting behind the one in flight.
    pub fn pending(&self) -> usize {
        self.submitter.sender.len()
    }

    pub fn is_running(&self) -> bool {
        self.consumer.is_some()
    }

    /// Closes the queue, lets the in-flight job finish and reports every
    /// job still waiting as cancelled. Safe to call twice.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.consumer.take() else {
            return;
        };

        info!("Shutting down job queue...");
        // Under the write lock no submission is half done, so the consumer
        // sees every job that was accepted.
        match self.submitter.closed.write() {
            Ok(mut closed) => *closed = true,
            Err(poisoned) => *poisoned.into_inner() = true,
        }
        self.shutdown.store(true, Ordering::Relaxed);

        if let Err(e) = handle.join() {
            error!("Consumer thread panicked: {:?}", e);
        } else {
            debug!("Consumer thread finished");
        }
        info!("Job queue stopped");
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Cloneable submission handle. Submitting never blocks.
#[derive(Clone)]
pub struct JobSubmitter {
    sender: Sender<Job>,
    closed: Arc<RwLock<bool>>,
    status: StatusSender,
}

impl JobSubmitter {
    /// Queues one job and returns its id.
    pub fn submit(&self, path: PathBuf, kind: JobKind, origin: JobOrigin) -> Result<String, QueueError> {
        let closed = self.closed.read().map_err(|_| QueueError::Closed)?;
        if *closed {
            return Err(QueueError::Closed);
        }

        let job = Job::new(path, kind, origin);
        let id = job.id.clone();
        self.enqueue(job)?;
        Ok(id)
    }

    /// Queues a set of jobs whose completion is reported together as a
    /// `BatchEvent::Finished`.
    pub fn submit_batch(
        &self,
        items: Vec<(PathBuf, JobKind)>,
        origin: JobOrigin,
        label: &str,
    ) -> Result<BatchTicket, QueueError> {
        if items.is_empty() {
            return Err(QueueError::EmptyBatch);
        }

        let closed = self.closed.read().map_err(|_| QueueError::Closed)?;
        if *closed {
            return Err(QueueError::Closed);
        }

        let ticket = BatchTicket {
            id: uuid::Uuid::new_v4().to_string(),
            total: items.len(),
        };
        self.status.batch(BatchEvent::Started {
            batch_id: ticket.id.clone(),
            label: label.to_string(),
            total: ticket.total,
        });

        for (path, kind) in items {
            let mut job = Job::new(path, kind, origin);
            job.batch = Some(BatchInfo {
                id: ticket.id.clone(),
                label: label.to_string(),
                total: ticket.total,
            });
            if let Err(e) = self.enqueue(job) {
                // The consumer is gone along with its tally, so the batch
                // is closed out here
                self.status.batch(BatchEvent::Finished {
                    batch_id: ticket.id.clone(),
                    label: label.to_string(),
                    total: ticket.total,
                    done: 0,
                    failed: ticket.total,
                });
                return Err(e);
            }
        }

        debug!("Queued batch {} ({} jobs)", ticket.id, ticket.total);
        Ok(ticket)
    }

    fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        let filename = job.filename();
        let batch_id = job.batch.as_ref().map(|b| b.id.clone());
        self.status.job(
            JobProgressEvent::new(&job.id, &filename, job.kind, JobPhase::Queued, "Queued")
                .with_batch(batch_id.as_deref()),
        );

        let (id, kind) = (job.id.clone(), job.kind);
        self.sender.send(job).map_err(|_| {
            // The consumer is gone; close out the event we just posted
            self.status.job(
                JobProgressEvent::failed(&id, &filename, kind, JobPhase::Queued, "Job queue is closed")
                    .with_batch(batch_id.as_deref()),
            );
            QueueError::Closed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DateFormat, DateSource, OverwritePolicy, RetryPolicy};
    use crate::converter::{ConvertOutcome, Converter};
    use crate::dater::FilenameDater;
    use crate::error::ConvertError;
    use crate::status::{status_channel, StatusEvent, StatusReceiver};
    use std::path::Path;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    struct NoConverter;

    impl ConverterBackend for NoConverter {
        fn acquire(&self) -> Result<Box<dyn Converter>, ConvertError> {
            Err(ConvertError::NotConfigured("no converter in this test".to_string()))
        }
    }

    /// Sleeps on every HWPX conversion so the queue backs up behind it.
    struct SlowConverter;

    impl Converter for SlowConverter {
        fn convert_to_hwpx(
            &mut self,
            source: &Path,
            _policy: OverwritePolicy,
        ) -> Result<ConvertOutcome, ConvertError> {
            thread::sleep(Duration::from_millis(300));
            Ok(ConvertOutcome::Converted(source.with_extension("hwpx")))
        }

        fn convert_to_pdf(
            &mut self,
            source: &Path,
            output_dir: &Path,
            _policy: OverwritePolicy,
        ) -> Result<ConvertOutcome, ConvertError> {
            Ok(ConvertOutcome::Converted(output_dir.join(source.with_extension("pdf"))))
        }
    }

    struct SlowBackend;

    impl ConverterBackend for SlowBackend {
        fn acquire(&self) -> Result<Box<dyn Converter>, ConvertError> {
            Ok(Box::new(SlowConverter))
        }
    }

    fn test_config() -> Arc<PipelineConfig> {
        Arc::new(PipelineConfig {
            dater: FilenameDater::new(&DateFormat::ALL, "_"),
            date_source: DateSource::Today,
            retry: RetryPolicy::default(),
            on_output_exists: OverwritePolicy::Overwrite,
            auto_convert_pdf: false,
            delete_hwp_after_hwpx: false,
            pdf_output_dir: None,
        })
    }

    fn wait_for_terminal(rx: &StatusReceiver, count: usize) -> Vec<StatusEvent> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut events = Vec::new();
        let mut terminal = 0;
        while terminal < count && Instant::now() < deadline {
            if let Some(event) = rx.recv_timeout(Duration::from_millis(50)) {
                if matches!(&event, StatusEvent::Job(job) if job.is_terminal()) {
                    terminal += 1;
                }
                events.push(event);
            }
        }
        events
    }

    #[test]
    fn test_submit_runs_job_and_reports_once() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("240305_a.docx");
        std::fs::write(&source, "doc").unwrap();

        let (tx, rx) = status_channel();
        let mut queue = JobQueue::start(test_config(), Arc::new(NoConverter), tx).unwrap();
        let id = queue
            .submit(source, JobKind::RenameOnly, JobOrigin::Manual)
            .unwrap();

        let events = wait_for_terminal(&rx, 1);
        queue.shutdown();

        let phases: Vec<JobPhase> = events
            .iter()
            .filter_map(|e| match e {
                StatusEvent::Job(job) if job.job_id == id => Some(job.phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![JobPhase::Queued, JobPhase::Renaming, JobPhase::Done]
        );
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn test_empty_batch_rejected() {
        let (tx, _rx) = status_channel();
        let queue = JobQueue::start(test_config(), Arc::new(NoConverter), tx).unwrap();
        assert!(matches!(
            queue.submit_batch(vec![], JobOrigin::OneShot, "One-shot"),
            Err(QueueError::EmptyBatch)
        ));
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let (tx, _rx) = status_channel();
        let mut queue = JobQueue::start(test_config(), Arc::new(NoConverter), tx).unwrap();
        let submitter = queue.submitter();
        queue.shutdown();

        assert!(!queue.is_running());
        assert!(matches!(
            submitter.submit(PathBuf::from("/x/a.docx"), JobKind::RenameOnly, JobOrigin::Manual),
            Err(QueueError::Closed)
        ));
        // A second shutdown is a no-op
        queue.shutdown();
    }

    #[test]
    fn test_batch_to_dead_consumer_is_closed_out() {
        let (job_tx, job_rx) = unbounded::<Job>();
        drop(job_rx);
        let (tx, rx) = status_channel();
        let submitter = JobSubmitter {
            sender: job_tx,
            closed: Arc::new(RwLock::new(false)),
            status: tx,
        };

        let items = vec![
            (PathBuf::from("/x/a.docx"), JobKind::RenameOnly),
            (PathBuf::from("/x/b.docx"), JobKind::RenameOnly),
        ];
        assert!(matches!(
            submitter.submit_batch(items, JobOrigin::OneShot, "One-shot"),
            Err(QueueError::Closed)
        ));

        let events = rx.drain();
        let started = events
            .iter()
            .any(|e| matches!(e, StatusEvent::Batch(BatchEvent::Started { total: 2, .. })));
        let finished = events.iter().find_map(|e| match e {
            StatusEvent::Batch(BatchEvent::Finished { total, failed, .. }) => Some((*total, *failed)),
            _ => None,
        });
        assert!(started);
        assert_eq!(finished, Some((2, 2)));
    }

    #[test]
    fn test_shutdown_cancels_waiting_jobs() {
        let dir = TempDir::new().unwrap();
        let items: Vec<(PathBuf, JobKind)> = ["a", "b", "c"]
            .iter()
            .map(|name| {
                let path = dir.path().join(format!("240305_{}.hwp", name));
                std::fs::write(&path, "hwp").unwrap();
                (path, JobKind::RenameAndHwpx)
            })
            .collect();

        let (tx, rx) = status_channel();
        let mut queue = JobQueue::start(test_config(), Arc::new(SlowBackend), tx).unwrap();
        let ticket = queue.submit_batch(items, JobOrigin::OneShot, "One-shot").unwrap();
        assert_eq!(ticket.total, 3);

        // Let the first job reach the converter, then shut down
        thread::sleep(Duration::from_millis(100));
        queue.shutdown();

        let events = rx.drain();
        let terminal: Vec<&JobProgressEvent> = events
            .iter()
            .filter_map(|e| match e {
                StatusEvent::Job(job) if job.is_terminal() => Some(job),
                _ => None,
            })
            .collect();
        assert_eq!(terminal.len(), 3);
        assert_eq!(terminal[0].phase, JobPhase::Done);
        assert!(terminal[1..].iter().all(|job| job.phase == JobPhase::Failed
            && job.error.as_deref() == Some("Cancelled before it started")));

        let finished = events.iter().find_map(|e| match e {
            StatusEvent::Batch(BatchEvent::Finished { done, failed, .. }) => Some((*done, *failed)),
            _ => None,
        });
        assert_eq!(finished, Some((1, 2)));
    }
}
