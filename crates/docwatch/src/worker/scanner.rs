use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::WatchConfig;
use crate::dater::FilenameDater;
use crate::error::WatchError;
use crate::worker::job::{is_hwp_family, JobKind};

/// Partial downloads that browsers rename once finished.
const TEMPORARY_EXTENSIONS: &[&str] = &[".crdownload", ".tmp", ".part", ".download"];

/// Decides which files in the monitored folder become jobs.
#[derive(Debug, Clone)]
pub struct DocumentFilter {
    extensions: BTreeSet<String>,
    dater: FilenameDater,
}

impl DocumentFilter {
    pub fn new(config: &WatchConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            dater: config.dater.dater(),
        }
    }

    /// Job kind for a newly seen file, or `None` when it should be ignored.
    pub fn classify(&self, path: &Path) -> Option<JobKind> {
        if path.is_dir() || !self.is_candidate(path) {
            return None;
        }

        let name = path.file_name()?.to_str()?;
        // Our own renames and conversion outputs already carry a header
        if self.dater.has_canonical_header(name) {
            return None;
        }

        Some(JobKind::for_document(path))
    }

    /// Accepted extension, and neither an Office lock file nor a partial
    /// download.
    pub fn is_candidate(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name.starts_with("~$") {
            return false;
        }

        match WatchConfig::extension_of(path) {
            Some(ext) => {
                !TEMPORARY_EXTENSIONS.contains(&ext.as_str()) && self.extensions.contains(&ext)
            }
            None => false,
        }
    }
}

/// Non-recursive listing of the monitored folder.
pub struct DirectoryScanner {
    directory: PathBuf,
    filter: DocumentFilter,
}

impl DirectoryScanner {
    pub fn new(config: &WatchConfig) -> Self {
        Self {
            directory: config.monitor_dir.clone(),
            filter: DocumentFilter::new(config),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Accepted files that do not carry a date header yet, for one-shot mode.
    pub fn scan_undated(&self) -> Result<Vec<(PathBuf, JobKind)>, WatchError> {
        let found: Vec<(PathBuf, JobKind)> = self
            .list_files()?
            .into_iter()
            .filter_map(|path| self.filter.classify(&path).map(|kind| (path, kind)))
            .collect();

        info!(
            "Found {} undated documents in {}",
            found.len(),
            self.directory.display()
        );
        Ok(found)
    }

    /// Every accepted `.hwp`/`.hwpx` file, dated or not, for bulk PDF mode.
    pub fn scan_hwp_family(&self) -> Result<Vec<PathBuf>, WatchError> {
        let found: Vec<PathBuf> = self
            .list_files()?
            .into_iter()
            .filter(|path| is_hwp_family(path) && self.filter.is_candidate(path))
            .collect();

        info!(
            "Found {} HWP documents in {}",
            found.len(),
            self.directory.display()
        );
        Ok(found)
    }

    fn list_files(&self) -> Result<Vec<PathBuf>, WatchError> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.directory)
            .min_depth(1)
            .max_depth(1) // Only the top level
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(WatchError::ScanFailed {
                        path: self.directory.clone(),
                        source: e,
                    });
                }
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }
            debug!("Found file: {}", entry.path().display());
            files.push(entry.into_path());
        }

        Ok(files)
    }
}
