use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::JobPhase;

/// What the pipeline does with a job's source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    RenameOnly,
    RenameAndHwpx,
    PdfConvert,
}

impl JobKind {
    /// Kind used for a newly detected document with this path.
    pub fn for_document(path: &Path) -> Self {
        if is_hwp(path) {
            JobKind::RenameAndHwpx
        } else {
            JobKind::RenameOnly
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::RenameOnly => write!(f, "rename"),
            JobKind::RenameAndHwpx => write!(f, "rename + HWPX"),
            JobKind::PdfConvert => write!(f, "PDF"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

/// Who asked for the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOrigin {
    Watcher,
    OneShot,
    Manual,
    BulkPdf,
}

/// Membership of a job in a batch submitted together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInfo {
    pub id: String,
    pub label: String,
    pub total: usize,
}

/// Returned by batch submission; completion is reported as a
/// `BatchEvent::Finished` carrying the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTicket {
    pub id: String,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub source_path: PathBuf,
    pub kind: JobKind,
    pub status: JobStatus,
    pub origin: JobOrigin,
    pub batch: Option<BatchInfo>,
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn new(source_path: PathBuf, kind: JobKind, origin: JobOrigin) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_path,
            kind,
            status: JobStatus::Queued,
            origin,
            batch: None,
            submitted_at: Utc::now(),
        }
    }

    /// File name of the source, or `"unknown"`.
    pub fn filename(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug)]
pub struct JobResult {
    pub job_id: String,
    pub source_path: PathBuf,
    pub kind: JobKind,
    pub success: bool,
    /// Where the source document ended up after renaming.
    pub final_path: Option<PathBuf>,
    pub hwpx_path: Option<PathBuf>,
    pub pdf_path: Option<PathBuf>,
    pub failed_phase: Option<JobPhase>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl JobResult {
    pub fn success(
        job: &Job,
        final_path: Option<PathBuf>,
        hwpx_path: Option<PathBuf>,
        pdf_path: Option<PathBuf>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            job_id: job.id.clone(),
            source_path: job.source_path.clone(),
            kind: job.kind,
            success: true,
            final_path,
            hwpx_path,
            pdf_path,
            failed_phase: None,
            error: None,
            warnings,
        }
    }

    pub fn failure(job: &Job, phase: JobPhase, error: String, warnings: Vec<String>) -> Self {
        Self {
            job_id: job.id.clone(),
            source_path: job.source_path.clone(),
            kind: job.kind,
            success: false,
            final_path: None,
            hwpx_path: None,
            pdf_path: None,
            failed_phase: Some(phase),
            error: Some(error),
            warnings,
        }
    }

    /// Every file the job produced, in pipeline order.
    pub fn outputs(&self) -> Vec<PathBuf> {
        [&self.hwpx_path, &self.pdf_path]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}

pub fn is_hwp(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("hwp"))
}

/// `.hwp` or `.hwpx`.
pub fn is_hwp_family(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("hwp") || e.eq_ignore_ascii_case("hwpx"))
}
