use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::loader::normalize_extensions;
use crate::config::schema::{DateFormat, DateSource, OverwritePolicy, Settings};
use crate::dater::FilenameDater;
use crate::error::ConfigError;

/// Immutable configuration snapshot shared by the watcher, queue and
/// pipeline. A new snapshot replaces the old one on reconfiguration.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    pub monitor_dir: PathBuf,
    /// Lowercase, dot-prefixed.
    pub extensions: BTreeSet<String>,
    /// `None` writes PDFs next to their source.
    pub pdf_output_dir: Option<PathBuf>,
    pub converter: ConverterSettings,
    pub dater: DaterSettings,
    pub retry: RetryPolicy,
    pub auto_convert_pdf: bool,
    pub delete_hwp_after_hwpx: bool,
    pub watcher: WatcherTimings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConverterSettings {
    pub hwpx_converter_path: PathBuf,
    pub pdf_converter_path: Option<PathBuf>,
    pub pdf_converter_args: Vec<String>,
    pub pdf_printer: String,
    pub timeout: Duration,
    pub on_output_exists: OverwritePolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DaterSettings {
    pub separator: String,
    pub formats: Vec<DateFormat>,
    pub source: DateSource,
}

impl DaterSettings {
    pub fn dater(&self) -> FilenameDater {
        FilenameDater::new(&self.formats, &self.separator)
    }
}

/// Exponential backoff for renames that hit a locked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherTimings {
    pub debounce: Duration,
    pub probe_interval: Duration,
    pub stable_probes: u32,
    pub settle_timeout: Duration,
    pub dedupe_ttl: Duration,
}

impl Default for WatcherTimings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            probe_interval: Duration::from_millis(100),
            stable_probes: 3,
            settle_timeout: Duration::from_secs(5),
            dedupe_ttl: Duration::from_secs(30),
        }
    }
}

impl WatchConfig {
    /// Builds a snapshot from settings, checking everything a monitoring
    /// session relies on.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let folder = settings.monitor_folder.trim();
        if folder.is_empty() {
            return Err(ConfigError::MonitorFolderUnset);
        }

        settings.validate()?;
        let mut config = Self::new(folder, &settings.extensions)?;

        let pdf_folder = settings.pdf_output_folder.trim();
        if !pdf_folder.is_empty() {
            config.pdf_output_dir = Some(PathBuf::from(pdf_folder));
        }

        let pdf_converter = settings.pdf_converter_path.trim();
        config.converter = ConverterSettings {
            hwpx_converter_path: PathBuf::from(settings.hwpx_converter_path.trim()),
            pdf_converter_path: (!pdf_converter.is_empty()).then(|| PathBuf::from(pdf_converter)),
            pdf_converter_args: settings.pdf_converter_args.clone(),
            pdf_printer: settings.pdf_printer.clone(),
            timeout: Duration::from_secs(settings.converter_timeout_secs),
            on_output_exists: settings.on_output_exists,
        };

        if config.extensions.contains(".hwp") && !config.converter.hwpx_converter_path.is_file() {
            return Err(ConfigError::ConverterMissing(
                config.converter.hwpx_converter_path.clone(),
            ));
        }

        config.dater = DaterSettings {
            separator: settings.date_separator.clone(),
            formats: settings.date_formats.clone(),
            source: settings.date_source,
        };
        config.retry = RetryPolicy {
            max_attempts: settings.rename_max_attempts,
            initial_backoff: Duration::from_millis(settings.rename_backoff_ms),
            ..RetryPolicy::default()
        };
        config.auto_convert_pdf = settings.auto_convert_pdf;
        config.delete_hwp_after_hwpx = settings.delete_hwp_after_hwpx;

        Ok(config)
    }

    /// Snapshot for `monitor_dir` with default settings otherwise.
    ///
    /// Only the directory and extension set are checked; converter paths
    /// are validated by [`WatchConfig::from_settings`].
    pub fn new<P: AsRef<Path>>(monitor_dir: P, extensions: &[String]) -> Result<Self, ConfigError> {
        let monitor_dir = monitor_dir.as_ref().to_path_buf();
        check_directory(&monitor_dir)?;

        let extensions: BTreeSet<String> = normalize_extensions(extensions).into_iter().collect();
        if extensions.is_empty() {
            return Err(ConfigError::Validation {
                message: "no file extensions selected".to_string(),
            });
        }

        let defaults = Settings::default();
        Ok(Self {
            monitor_dir,
            extensions,
            pdf_output_dir: None,
            converter: ConverterSettings {
                hwpx_converter_path: PathBuf::from(&defaults.hwpx_converter_path),
                pdf_converter_path: None,
                pdf_converter_args: defaults.pdf_converter_args,
                pdf_printer: defaults.pdf_printer,
                timeout: Duration::from_secs(defaults.converter_timeout_secs),
                on_output_exists: defaults.on_output_exists,
            },
            dater: DaterSettings {
                separator: defaults.date_separator,
                formats: defaults.date_formats,
                source: defaults.date_source,
            },
            retry: RetryPolicy::default(),
            auto_convert_pdf: defaults.auto_convert_pdf,
            delete_hwp_after_hwpx: defaults.delete_hwp_after_hwpx,
            watcher: WatcherTimings::default(),
        })
    }

    /// Lowercased, dot-prefixed extension of `path`, if any.
    pub fn extension_of(path: &Path) -> Option<String> {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
    }

    pub fn accepts(&self, path: &Path) -> bool {
        Self::extension_of(path).is_some_and(|ext| self.extensions.contains(&ext))
    }
}

fn check_directory(path: &Path) -> Result<(), ConfigError> {
    let inaccessible = |reason: String| ConfigError::MonitorFolderInaccessible {
        path: path.to_path_buf(),
        reason,
    };

    if !path.exists() {
        return Err(inaccessible("folder not found".to_string()));
    }
    if !path.is_dir() {
        return Err(inaccessible("not a directory".to_string()));
    }
    std::fs::read_dir(path).map_err(|e| inaccessible(e.to_string()))?;
    Ok(())
}
