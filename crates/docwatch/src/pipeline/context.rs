use std::path::PathBuf;

use crate::worker::job::Job;

use super::error::PipelineWarning;

pub struct PipelineContext {
    // Input
    pub job: Job,

    // Where the document currently lives; follows renames and deletions
    pub current_path: PathBuf,

    // Rename step result, `None` when the name was already dated
    pub renamed_path: Option<PathBuf>,

    // HWPX step result
    pub hwpx_path: Option<PathBuf>,

    // PDF step result
    pub pdf_path: Option<PathBuf>,

    // Non-fatal warnings
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(job: Job) -> Self {
        let current_path = job.source_path.clone();
        Self {
            job,
            current_path,
            renamed_path: None,
            hwpx_path: None,
            pdf_path: None,
            warnings: Vec::new(),
        }
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(|w| w.to_string()).collect()
    }
}
