use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info, warn};

use crate::converter::ConverterLease;
use crate::pipeline::{ChannelProgress, Pipeline, PipelineContext, PipelineError};
use crate::status::{BatchEvent, JobPhase, JobProgressEvent, StatusSender};
use crate::worker::job::{BatchInfo, Job};

const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct BatchTally {
    done: usize,
    failed: usize,
}

/// State owned by the consumer thread.
pub(crate) struct Consumer {
    pipeline: Pipeline,
    lease: ConverterLease,
    status: StatusSender,
    batches: HashMap<String, BatchTally>,
}

impl Consumer {
    pub(crate) fn new(pipeline: Pipeline, lease: ConverterLease, status: StatusSender) -> Self {
        Self {
            pipeline,
            lease,
            status,
            batches: HashMap::new(),
        }
    }

    pub(crate) fn run(mut self, jobs: Receiver<Job>, shutdown: Arc<AtomicBool>) {
        debug!("Consumer started");

        loop {
            if shutdown.load(Ordering::Relaxed) {
                debug!("Consumer received shutdown signal");
                break;
            }

            match jobs.recv_timeout(IDLE_POLL) {
                Ok(job) => self.process(job),
                Err(RecvTimeoutError::Timeout) => {
                    // Nothing waiting: let the converter application go
                    self.lease.release();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Job channel disconnected");
                    break;
                }
            }
        }

        self.lease.release();

        let mut cancelled = 0;
        for job in jobs.try_iter() {
            self.cancel(job);
            cancelled += 1;
        }
        if cancelled > 0 {
            info!("Cancelled {} queued job(s)", cancelled);
        }

        debug!("Consumer stopped");
    }

    fn process(&mut self, job: Job) {
        debug!("Processing job {}: {:?}", job.id, job.source_path);

        let batch = job.batch.clone();
        let progress = ChannelProgress::new(
            &job.id,
            &job.filename(),
            job.kind,
            batch.as_ref().map(|b| b.id.as_str()),
            self.status.clone(),
        );

        let ctx = PipelineContext::new(job);
        let (result, _ctx) = self.pipeline.run(ctx, &mut self.lease, &progress);

        if let Some(batch) = batch {
            self.tally(&batch, result.success);
        }
    }

    fn cancel(&mut self, job: Job) {
        warn!("Cancelling queued job {}", job.filename());

        let batch_id = job.batch.as_ref().map(|b| b.id.clone());
        self.status.job(
            JobProgressEvent::failed(
                &job.id,
                &job.filename(),
                job.kind,
                JobPhase::Queued,
                &PipelineError::Cancelled.to_string(),
            )
            .with_batch(batch_id.as_deref()),
        );

        if let Some(batch) = job.batch {
            self.tally(&batch, false);
        }
    }

    fn tally(&mut self, batch: &BatchInfo, success: bool) {
        let tally = self.batches.entry(batch.id.clone()).or_default();
        if success {
            tally.done += 1;
        } else {
            tally.failed += 1;
        }

        if tally.done + tally.failed >= batch.total {
            let (done, failed) = (tally.done, tally.failed);
            self.batches.remove(&batch.id);
            info!(
                "{} finished: {} done, {} failed",
                batch.label, done, failed
            );
            self.status.batch(BatchEvent::Finished {
                batch_id: batch.id.clone(),
                label: batch.label.clone(),
                total: batch.total,
                done,
                failed,
            });
        }
    }
}
