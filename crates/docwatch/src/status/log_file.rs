use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::status::event::{StatusEvent, StatusLevel};

/// Appends status lines to a UTF-8 log file.
pub struct LogFileSink {
    path: PathBuf,
    file: File,
}

impl LogFileSink {
    /// Opens `path` for appending, creating it and its parent directory.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_event(&mut self, event: &StatusEvent) -> io::Result<()> {
        self.write_line(event.level(), &event.message())
    }

    pub fn write_line(&mut self, level: StatusLevel, message: &str) -> io::Result<()> {
        let line = format_line(Local::now(), level, message);
        self.file.write_all(line.as_bytes())?;
        self.file.flush()
    }
}

/// `[YYYY-MM-DD HH:MM:SS] [LEVEL] message\n`
pub fn format_line(at: DateTime<Local>, level: StatusLevel, message: &str) -> String {
    format!("[{}] [{}] {}\n", at.format("%Y-%m-%d %H:%M:%S"), level, message)
}
