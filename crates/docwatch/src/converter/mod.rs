//! Gateway to the external document-conversion application.
//!
//! A [`ConverterBackend`] hands out owned [`Converter`] sessions. The
//! consumer thread keeps one session in a [`ConverterLease`] while jobs keep
//! coming, drops it when the queue goes idle and replaces it after a
//! timeout, so a wedged application is never reused.

pub mod external;
pub mod process;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};

use crate::config::OverwritePolicy;
use crate::error::ConvertError;

pub use external::ExternalConverter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertOutcome {
    Converted(PathBuf),
    /// The output already existed and the policy said to keep it.
    Skipped(PathBuf),
}

impl ConvertOutcome {
    pub fn path(&self) -> &Path {
        match self {
            ConvertOutcome::Converted(path) | ConvertOutcome::Skipped(path) => path,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            ConvertOutcome::Converted(path) | ConvertOutcome::Skipped(path) => path,
        }
    }

    pub fn was_skipped(&self) -> bool {
        matches!(self, ConvertOutcome::Skipped(_))
    }
}

/// One session with the conversion application. Calls never retry.
pub trait Converter: Send {
    /// Converts an `.hwp` file to `<stem>.hwpx` next to it.
    fn convert_to_hwpx(
        &mut self,
        source: &Path,
        policy: OverwritePolicy,
    ) -> Result<ConvertOutcome, ConvertError>;

    /// Converts an `.hwp`/`.hwpx` file to `<output_dir>/<stem>.pdf`.
    fn convert_to_pdf(
        &mut self,
        source: &Path,
        output_dir: &Path,
        policy: OverwritePolicy,
    ) -> Result<ConvertOutcome, ConvertError>;
}

pub trait ConverterBackend: Send + Sync {
    fn acquire(&self) -> Result<Box<dyn Converter>, ConvertError>;
}

/// Lazily acquired converter session owned by the consumer thread.
pub struct ConverterLease {
    backend: Arc<dyn ConverterBackend>,
    session: Option<Box<dyn Converter>>,
}

impl ConverterLease {
    pub fn new(backend: Arc<dyn ConverterBackend>) -> Self {
        Self {
            backend,
            session: None,
        }
    }

    /// The current session, acquiring one first if none is held.
    pub fn get(&mut self) -> Result<&mut (dyn Converter + 'static), ConvertError> {
        if self.session.is_none() {
            debug!("Acquiring converter session");
            self.session = Some(self.backend.acquire()?);
        }
        self.session
            .as_deref_mut()
            .ok_or_else(|| ConvertError::NotConfigured("no converter session".to_string()))
    }

    /// Drops the session after a failure that may have wedged it.
    pub fn recycle(&mut self) {
        if self.session.take().is_some() {
            warn!("Recycling converter session");
        }
    }

    /// Drops the session because there is no more work.
    pub fn release(&mut self) {
        if self.session.take().is_some() {
            debug!("Released idle converter session");
        }
    }

    pub fn is_held(&self) -> bool {
        self.session.is_some()
    }
}
