use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Rename(#[from] crate::error::RenameError),

    #[error("{0}")]
    Convert(#[from] crate::error::ConvertError),

    #[error("Cancelled before it started")]
    Cancelled,
}

impl PipelineError {
    /// True when the converter session should not be reused.
    pub fn requires_recycle(&self) -> bool {
        matches!(self, PipelineError::Convert(e) if e.requires_recycle())
    }
}

#[derive(Debug, Clone)]
pub enum PipelineWarning {
    SourceNotDeleted { path: PathBuf, error: String },
    OutputKept { path: PathBuf },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::SourceNotDeleted { path, error } => {
                write!(f, "could not delete {}: {}", path.display(), error)
            }
            PipelineWarning::OutputKept { path } => {
                write!(f, "{} already existed and was kept", path.display())
            }
        }
    }
}
