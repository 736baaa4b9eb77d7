//! Status reporting from worker threads to the presentation layer.
//!
//! Workers post [`StatusEvent`]s on an unbounded channel; the host drains
//! them into a [`StatusBoard`] and, optionally, a [`LogFileSink`].

pub mod board;
pub mod channel;
pub mod event;
pub mod log_file;

pub use board::{StatusBoard, StatusLine, MAX_STATUS_LINES};
pub use channel::{status_channel, StatusReceiver, StatusSender};
pub use event::{
    BatchEvent, JobPhase, JobProgressEvent, StatusEvent, StatusLevel, WatcherEvent,
};
pub use log_file::LogFileSink;
