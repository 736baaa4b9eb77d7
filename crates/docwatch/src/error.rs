use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rename error: {0}")]
    Rename(#[from] RenameError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write settings file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Monitor folder is not set")]
    MonitorFolderUnset,

    #[error("Monitor folder '{path}' is not accessible: {reason}")]
    MonitorFolderInaccessible { path: PathBuf, reason: String },

    #[error("PDF output folder '{0}' does not exist")]
    PdfOutputFolderMissing(PathBuf),

    #[error("HWPX converter not found at '{0}'")]
    ConverterMissing(PathBuf),

    #[error("Settings validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum RenameError {
    #[error("Source file '{0}' no longer exists")]
    SourceMissing(PathBuf),

    #[error("'{0}' has no usable file name")]
    InvalidName(PathBuf),

    #[error("Failed to rename '{from}' to '{to}' after {attempts} attempts: {source}")]
    Exhausted {
        from: PathBuf,
        to: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("No free target name for '{0}'")]
    NoFreeName(PathBuf),
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Converter application not found at '{path}'")]
    ApplicationNotFound { path: PathBuf },

    #[error("Converter is not configured: {0}")]
    NotConfigured(String),

    #[error("Conversion of '{path}' timed out after {seconds}s")]
    Timeout { path: PathBuf, seconds: u64 },

    #[error("Conversion of '{path}' failed: {reason}")]
    ConversionFailed { path: PathBuf, reason: String },

    #[error("Converter reported success but '{0}' was not produced")]
    OutputMissing(PathBuf),

    #[error("Unsupported source for conversion: '{0}'")]
    UnsupportedSource(PathBuf),

    #[error("I/O error during conversion of '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConvertError {
    /// The external application is considered wedged after these errors.
    pub fn requires_recycle(&self) -> bool {
        matches!(self, ConvertError::Timeout { .. })
    }
}

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to start watching '{path}': {reason}")]
    Start { path: PathBuf, reason: String },

    #[error("Watched directory '{0}' is no longer accessible")]
    DirectoryLost(PathBuf),

    #[error("Watch channel disconnected")]
    ChannelClosed,

    #[error("Directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Job queue is closed")]
    Closed,

    #[error("Failed to spawn consumer thread: {0}")]
    SpawnFailed(String),

    #[error("Nothing to submit")]
    EmptyBatch,
}

pub type Result<T> = std::result::Result<T, DocwatchError>;
