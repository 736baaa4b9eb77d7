use std::path::{Path, PathBuf};

use crate::config::{DateSource, OverwritePolicy, RetryPolicy, WatchConfig};
use crate::dater::FilenameDater;

pub struct PipelineConfig {
    pub dater: FilenameDater,
    pub date_source: DateSource,
    pub retry: RetryPolicy,
    pub on_output_exists: OverwritePolicy,
    pub auto_convert_pdf: bool,
    pub delete_hwp_after_hwpx: bool,
    /// `None` writes PDFs next to their source.
    pub pdf_output_dir: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            dater: config.dater.dater(),
            date_source: config.dater.source,
            retry: config.retry,
            on_output_exists: config.converter.on_output_exists,
            auto_convert_pdf: config.auto_convert_pdf,
            delete_hwp_after_hwpx: config.delete_hwp_after_hwpx,
            pdf_output_dir: config.pdf_output_dir.clone(),
        }
    }

    pub fn pdf_dir_for(&self, source: &Path) -> PathBuf {
        match &self.pdf_output_dir {
            Some(dir) => dir.clone(),
            None => source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }
}
