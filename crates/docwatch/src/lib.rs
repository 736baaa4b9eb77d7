pub mod config;
pub mod converter;
pub mod dater;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod pipeline;
pub mod sanitize;
pub mod status;
pub mod worker;

pub use config::{load_settings, save_settings, Settings, WatchConfig};
pub use converter::{ConvertOutcome, Converter, ConverterBackend, ExternalConverter};
pub use dater::{add_date_header, DateHeader, FilenameDater};
pub use error::{
    ConfigError, ConvertError, DocwatchError, QueueError, RenameError, Result, WatchError,
};
pub use monitor::{BulkSubmission, Monitor};
pub use pipeline::{Pipeline, PipelineConfig, PipelineContext};
pub use status::{
    status_channel, LogFileSink, StatusBoard, StatusEvent, StatusReceiver, StatusSender,
};
pub use worker::{JobKind, JobOrigin, JobQueue, JobResult};
