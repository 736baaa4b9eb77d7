//! Converter double for integration tests.
//!
//! Conversions write a small placeholder output. Every call is recorded with
//! its start and end time, and the number of calls running at once is
//! tracked so tests can assert the gateway is never entered concurrently.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use docwatch::config::OverwritePolicy;
use docwatch::converter::{ConvertOutcome, Converter, ConverterBackend};
use docwatch::ConvertError;

#[derive(Debug, Clone)]
pub struct ConverterCall {
    pub source: PathBuf,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<ConverterCall>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

/// Backend handing out sessions that share one call log.
#[derive(Clone)]
pub struct RecordingBackend {
    shared: Arc<Shared>,
    delay: Duration,
    /// Sources whose file name contains this marker fail to convert.
    fail_marker: Option<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            delay: Duration::ZERO,
            fail_marker: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ConverterCall> {
        self.shared.calls.lock().unwrap().clone()
    }

    /// Highest number of conversions observed running at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.shared.max_active.load(Ordering::SeqCst)
    }
}

impl ConverterBackend for RecordingBackend {
    fn acquire(&self) -> Result<Box<dyn Converter>, ConvertError> {
        Ok(Box::new(RecordingConverter {
            backend: self.clone(),
        }))
    }
}

struct RecordingConverter {
    backend: RecordingBackend,
}

impl RecordingConverter {
    fn run(&self, source: &Path, output: PathBuf) -> Result<ConvertOutcome, ConvertError> {
        let shared = &self.backend.shared;
        let now_active = shared.active.fetch_add(1, Ordering::SeqCst) + 1;
        shared.max_active.fetch_max(now_active, Ordering::SeqCst);
        let started = Instant::now();

        thread::sleep(self.backend.delay);
        let fails = self.backend.fail_marker.as_deref().is_some_and(|marker| {
            source
                .file_name()
                .is_some_and(|n| n.to_string_lossy().contains(marker))
        });
        let result = if fails {
            Err(ConvertError::ConversionFailed {
                path: source.to_path_buf(),
                reason: "document is corrupt".to_string(),
            })
        } else {
            std::fs::write(&output, b"converted")
                .map(|_| ConvertOutcome::Converted(output))
                .map_err(|e| ConvertError::Io {
                    path: source.to_path_buf(),
                    source: e,
                })
        };

        shared.calls.lock().unwrap().push(ConverterCall {
            source: source.to_path_buf(),
            started,
            finished: Instant::now(),
        });
        shared.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl Converter for RecordingConverter {
    fn convert_to_hwpx(
        &mut self,
        source: &Path,
        _policy: OverwritePolicy,
    ) -> Result<ConvertOutcome, ConvertError> {
        self.run(source, source.with_extension("hwpx"))
    }

    fn convert_to_pdf(
        &mut self,
        source: &Path,
        output_dir: &Path,
        _policy: OverwritePolicy,
    ) -> Result<ConvertOutcome, ConvertError> {
        let stem = source.file_stem().unwrap_or_default();
        self.run(source, output_dir.join(stem).with_extension("pdf"))
    }
}
