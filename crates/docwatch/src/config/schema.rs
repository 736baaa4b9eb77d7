use serde::{Deserialize, Serialize};

/// Extensions the settings dialog offers and the defaults enable.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".hwp", ".hwpx", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx",
];

pub const DEFAULT_HWPX_CONVERTER_PATH: &str =
    r"C:\Program Files (x86)\Hnc\HwpxConverter\HwpxConverter.exe";

/// Contents of `config.json`.
///
/// Every field has a default so a partial file still loads; keys this
/// version does not know about are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub monitor_folder: String,
    pub extensions: Vec<String>,
    /// Empty means "next to the source file".
    pub pdf_output_folder: String,
    pub hwpx_converter_path: String,
    /// Empty disables PDF conversion.
    pub pdf_converter_path: String,
    pub pdf_converter_args: Vec<String>,
    pub pdf_printer: String,
    pub auto_convert_pdf: bool,
    pub delete_hwp_after_hwpx: bool,
    pub on_output_exists: OverwritePolicy,
    pub converter_timeout_secs: u64,
    pub rename_max_attempts: u32,
    pub rename_backoff_ms: u64,
    pub date_separator: String,
    pub date_formats: Vec<DateFormat>,
    pub date_source: DateSource,
    pub save_logs: bool,
    pub log_file_path: String,
    pub debug_mode: bool,
    pub theme: Theme,
    pub window_geometry: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            monitor_folder: String::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            pdf_output_folder: String::new(),
            hwpx_converter_path: DEFAULT_HWPX_CONVERTER_PATH.to_string(),
            pdf_converter_path: String::new(),
            pdf_converter_args: default_pdf_converter_args(),
            pdf_printer: "Hancom PDF".to_string(),
            auto_convert_pdf: false,
            delete_hwp_after_hwpx: true,
            on_output_exists: OverwritePolicy::Overwrite,
            converter_timeout_secs: 300,
            rename_max_attempts: 10,
            rename_backoff_ms: 200,
            date_separator: "_".to_string(),
            date_formats: DateFormat::ALL.to_vec(),
            date_source: DateSource::Today,
            save_logs: false,
            log_file_path: "monitor_log.txt".to_string(),
            debug_mode: false,
            theme: Theme::Dark,
            window_geometry: "800x600".to_string(),
        }
    }
}

pub fn default_pdf_converter_args() -> Vec<String> {
    vec!["{input}".to_string(), "{output}".to_string()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
}

/// What a conversion does when its output file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    Overwrite,
    Skip,
}

/// Where a freshly added date header comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    Today,
    /// Newest of the file's created and modified timestamps.
    FileTime,
}

/// Date layouts recognized inside existing file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateFormat {
    #[serde(rename = "yyyymmdd")]
    CompactLong,
    #[serde(rename = "yyyy.mm.dd")]
    SeparatedLong,
    #[serde(rename = "yy.mm.dd")]
    SeparatedShort,
    #[serde(rename = "yymmdd")]
    CompactShort,
}

impl DateFormat {
    pub const ALL: [DateFormat; 4] = [
        DateFormat::CompactLong,
        DateFormat::SeparatedLong,
        DateFormat::SeparatedShort,
        DateFormat::CompactShort,
    ];
}
