//! Host state: the settings file, the running monitor and the status sinks.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use docwatch::status::StatusLevel;
use docwatch::{
    load_settings, status_channel, LogFileSink, Monitor, Settings, StatusBoard, StatusEvent,
    StatusReceiver, StatusSender, WatchConfig,
};
use log::{debug, error, info, warn};

pub struct Host {
    settings_path: PathBuf,
    settings: Settings,
    /// Modification time of the settings file when it was last loaded.
    loaded_mtime: Option<SystemTime>,
    monitor: Option<Monitor>,
    board: StatusBoard,
    log_sink: Option<LogFileSink>,
    status_tx: StatusSender,
    status_rx: StatusReceiver,
}

impl Host {
    pub fn new(settings_path: PathBuf, settings: Settings) -> Self {
        let (status_tx, status_rx) = status_channel();
        let loaded_mtime = modified_time(&settings_path);

        let mut host = Self {
            settings_path,
            settings,
            loaded_mtime,
            monitor: None,
            board: StatusBoard::new(),
            log_sink: None,
            status_tx,
            status_rx,
        };
        host.open_log_sink();
        host
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.as_ref().is_some_and(Monitor::is_monitoring)
    }

    /// Builds a snapshot from the current settings and starts watching.
    /// A configuration error is reported and leaves monitoring off.
    pub fn start(&mut self) {
        let config = match WatchConfig::from_settings(&self.settings) {
            Ok(config) => config,
            Err(e) => {
                self.report(StatusLevel::Error, format!("Configuration error: {}", e));
                // The old folder is not watched under settings that no longer apply
                if self.monitor.as_mut().is_some_and(Monitor::stop_monitoring) {
                    self.report(StatusLevel::Warning, "Monitoring stopped".to_string());
                }
                warn!(
                    "Monitoring not started; edit {} to fix",
                    self.settings_path.display()
                );
                return;
            }
        };

        if let Err(e) = self.apply(config) {
            self.report(StatusLevel::Error, format!("Failed to start monitoring: {}", e));
        }
    }

    fn apply(&mut self, config: WatchConfig) -> docwatch::Result<()> {
        match self.monitor.as_mut() {
            Some(monitor) => monitor.reconfigure(config)?,
            None => {
                self.monitor = Some(Monitor::with_external_converter(
                    config,
                    self.status_tx.clone(),
                )?)
            }
        }
        if let Some(monitor) = self.monitor.as_mut() {
            monitor.start_monitoring()?;
        }
        Ok(())
    }

    /// Reloads the settings file when it changed on disk. Returns whether a
    /// reload happened.
    pub fn reload_if_changed(&mut self) -> bool {
        let mtime = modified_time(&self.settings_path);
        if mtime == self.loaded_mtime {
            return false;
        }
        self.loaded_mtime = mtime;

        match load_settings(&self.settings_path) {
            Ok(settings) => {
                info!("Settings changed, reloading {}", self.settings_path.display());
                self.settings = settings;
                self.open_log_sink();
                self.start();
                true
            }
            Err(e) => {
                self.report(StatusLevel::Error, format!("Failed to reload settings: {}", e));
                false
            }
        }
    }

    /// Moves pending status events into the board and the log file.
    /// Waits up to `timeout` for the first one.
    pub fn pump(&mut self, timeout: Duration) {
        let Some(first) = self.status_rx.recv_timeout(timeout) else {
            return;
        };
        self.record(&first);
        for event in self.status_rx.drain() {
            self.record(&event);
        }
    }

    /// Stops the watcher, lets the in-flight job finish and flushes the
    /// final status events.
    pub fn shutdown(mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.shutdown();
        }
        for event in self.status_rx.drain() {
            self.record(&event);
        }
        info!("{}", self.board.summary());
    }

    fn record(&mut self, event: &StatusEvent) {
        let message = event.message();
        match event.level() {
            StatusLevel::Error => error!("{}", message),
            StatusLevel::Warning => warn!("{}", message),
            StatusLevel::Success | StatusLevel::Info => info!("{}", message),
        }

        self.board.apply(event);
        if let Some(sink) = self.log_sink.as_mut() {
            if let Err(e) = sink.write_event(event) {
                warn!("Failed to write log file {}: {}", sink.path().display(), e);
            }
        }
    }

    fn report(&mut self, level: StatusLevel, message: String) {
        match level {
            StatusLevel::Error => error!("{}", message),
            _ => info!("{}", message),
        }
        if let Some(sink) = self.log_sink.as_mut() {
            let _ = sink.write_line(level, &message);
        }
        self.board.push_line(level, message);
    }

    fn open_log_sink(&mut self) {
        if !self.settings.save_logs {
            self.log_sink = None;
            return;
        }

        let settings_dir = self
            .settings_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let log_path = self.settings.resolved_log_path(&settings_dir);
        if self
            .log_sink
            .as_ref()
            .is_some_and(|sink| sink.path() == log_path)
        {
            return;
        }

        match LogFileSink::open(&log_path) {
            Ok(sink) => {
                debug!("Appending status to {}", log_path.display());
                self.log_sink = Some(sink);
            }
            Err(e) => {
                warn!("Failed to open log file {}: {}", log_path.display(), e);
                self.log_sink = None;
            }
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings_for(folder: &Path) -> Settings {
        Settings {
            monitor_folder: folder.display().to_string(),
            extensions: vec![".docx".to_string()],
            ..Settings::default()
        }
    }

    #[test]
    fn test_bad_config_leaves_monitoring_off() {
        let temp = TempDir::new().unwrap();
        let settings = Settings {
            monitor_folder: temp.path().join("missing").display().to_string(),
            ..Settings::default()
        };

        let mut host = Host::new(temp.path().join("config.json"), settings);
        host.start();

        assert!(!host.is_monitoring());
        let last = host.board.lines().last().unwrap();
        assert_eq!(last.level, StatusLevel::Error);
        assert!(last.message.starts_with("Configuration error"));
    }

    #[test]
    fn test_start_watches_folder() {
        let temp = TempDir::new().unwrap();
        let mut host = Host::new(temp.path().join("config.json"), settings_for(temp.path()));

        host.start();
        host.pump(Duration::from_millis(500));

        assert!(host.is_monitoring());
        assert!(host.board.watching().is_some());
        host.shutdown();
    }

    #[test]
    fn test_unchanged_settings_file_is_not_reloaded() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        docwatch::save_settings(&path, &settings_for(temp.path())).unwrap();

        let settings = load_settings(&path).unwrap();
        let mut host = Host::new(path, settings);

        assert!(!host.reload_if_changed());
    }

    #[test]
    fn test_invalid_reload_stops_watching_old_folder() {
        let temp = TempDir::new().unwrap();
        let watched = temp.path().join("watched");
        fs::create_dir(&watched).unwrap();
        let path = temp.path().join("config.json");
        docwatch::save_settings(&path, &settings_for(&watched)).unwrap();

        let mut host = Host::new(path.clone(), load_settings(&path).unwrap());
        host.start();
        assert!(host.is_monitoring());

        let broken = Settings {
            monitor_folder: temp.path().join("moved").display().to_string(),
            ..settings_for(&watched)
        };
        fs::write(&path, serde_json::to_string(&broken).unwrap()).unwrap();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();

        assert!(host.reload_if_changed());
        assert!(!host.is_monitoring());
        assert!(host
            .board
            .lines()
            .any(|line| line.level == StatusLevel::Error
                && line.message.starts_with("Configuration error")));

        host.shutdown();
    }

    #[test]
    fn test_save_logs_appends_to_file_next_to_settings() {
        let temp = TempDir::new().unwrap();
        let settings = Settings {
            save_logs: true,
            log_file_path: "monitor_log.txt".to_string(),
            monitor_folder: temp.path().join("missing").display().to_string(),
            ..Settings::default()
        };

        let mut host = Host::new(temp.path().join("config.json"), settings);
        host.start();
        drop(host);

        let log = fs::read_to_string(temp.path().join("monitor_log.txt")).unwrap();
        assert!(log.contains("[ERROR] Configuration error"));
    }
}
