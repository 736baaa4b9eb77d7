use std::path::{Path, PathBuf};

use log::debug;

use crate::config::schema::Settings;
use crate::error::ConfigError;

pub const SETTINGS_FILE_NAME: &str = "config.json";

/// Loads settings from `path`. A missing file yields the defaults.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        debug!("No settings file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

pub fn load_settings_from_str(content: &str) -> Result<Settings, ConfigError> {
    let mut settings: Settings = serde_json::from_str(content)?;
    settings.extensions = normalize_extensions(&settings.extensions);
    Ok(settings)
}

/// Validates and writes `settings` as pretty-printed JSON.
pub fn save_settings<P: AsRef<Path>>(path: P, settings: &Settings) -> Result<(), ConfigError> {
    let path = path.as_ref();
    settings.validate()?;

    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json).map_err(|e| ConfigError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Lowercases, dot-prefixes and dedups extensions, keeping first-seen order.
pub fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(extensions.len());
    for ext in extensions {
        let ext = ext.trim().to_lowercase();
        if ext.is_empty() || ext == "." {
            continue;
        }
        let ext = if ext.starts_with('.') {
            ext
        } else {
            format!(".{}", ext)
        };
        if !normalized.contains(&ext) {
            normalized.push(ext);
        }
    }
    normalized
}

/// Settings file next to the running executable, falling back to the
/// platform config directory.
pub fn default_settings_path() -> Option<PathBuf> {
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(SETTINGS_FILE_NAME)));

    if let Some(path) = &beside_exe {
        if path.exists() {
            return beside_exe;
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join("docwatch").join(SETTINGS_FILE_NAME))
        .or(beside_exe)
}

impl Settings {
    /// Checks the settings the way the settings dialog does before saving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let folder = self.monitor_folder.trim();
        if !folder.is_empty() && !Path::new(folder).exists() {
            return Err(ConfigError::MonitorFolderInaccessible {
                path: PathBuf::from(folder),
                reason: "folder not found".to_string(),
            });
        }

        let pdf_folder = self.pdf_output_folder.trim();
        if !pdf_folder.is_empty() && !Path::new(pdf_folder).is_dir() {
            return Err(ConfigError::PdfOutputFolderMissing(PathBuf::from(pdf_folder)));
        }

        if !matches!(self.date_separator.as_str(), "_" | " " | "-") {
            return Err(ConfigError::Validation {
                message: format!(
                    "illegal date separator '{}' (use '_', ' ' or '-')",
                    self.date_separator
                ),
            });
        }

        if self.date_formats.is_empty() {
            return Err(ConfigError::Validation {
                message: "no date formats enabled".to_string(),
            });
        }

        if self.converter_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                message: "converter_timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.rename_max_attempts == 0 {
            return Err(ConfigError::Validation {
                message: "rename_max_attempts must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Resolves `log_file_path` against the directory holding the settings file.
    pub fn resolved_log_path(&self, settings_dir: &Path) -> PathBuf {
        let path = PathBuf::from(&self.log_file_path);
        if path.is_absolute() {
            path
        } else {
            settings_dir.join(path)
        }
    }
}
