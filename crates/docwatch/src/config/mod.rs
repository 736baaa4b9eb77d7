pub mod loader;
pub mod schema;
pub mod snapshot;

pub use loader::{
    default_settings_path, load_settings, load_settings_from_str, normalize_extensions,
    save_settings, SETTINGS_FILE_NAME,
};
pub use schema::{
    DateFormat, DateSource, OverwritePolicy, Settings, Theme, DEFAULT_EXTENSIONS,
    DEFAULT_HWPX_CONVERTER_PATH,
};
pub use snapshot::{ConverterSettings, DaterSettings, RetryPolicy, WatchConfig, WatcherTimings};
