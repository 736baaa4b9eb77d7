//! Headless docwatch host.
//!
//! Loads `config.json`, watches the configured folder and keeps running
//! until Ctrl+C, reloading the settings whenever the file changes.

mod host;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use docwatch::config::default_settings_path;
use docwatch::logging::init_logging;
use docwatch::load_settings;
use log::{error, info, warn};

use host::Host;

const STATUS_WAIT: Duration = Duration::from_millis(200);
const SETTINGS_POLL: Duration = Duration::from_secs(1);

fn main() {
    let Some(settings_path) = default_settings_path() else {
        eprintln!("Could not determine where config.json lives");
        std::process::exit(1);
    };

    // Logging needs debug_mode, so a broken file falls back to defaults here
    // and the error is reported once logging is up.
    let (settings, load_error) = match load_settings(&settings_path) {
        Ok(settings) => (settings, None),
        Err(e) => (Default::default(), Some(e)),
    };

    if let Err(e) = init_logging(settings.debug_mode) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!("Starting docwatch v{}", env!("CARGO_PKG_VERSION"));
    info!("Settings file: {}", settings_path.display());
    if let Some(e) = load_error {
        error!("Failed to load settings: {}", e);
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_for_handler = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || {
        running_for_handler.store(false, Ordering::Relaxed);
    }) {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }

    let mut host = Host::new(settings_path, settings);
    host.start();
    if host.is_monitoring() {
        info!("Press Ctrl+C to stop");
    }

    let mut last_poll = Instant::now();
    while running.load(Ordering::Relaxed) {
        host.pump(STATUS_WAIT);

        if last_poll.elapsed() >= SETTINGS_POLL {
            last_poll = Instant::now();
            host.reload_if_changed();
        }
    }

    info!("Shutting down");
    host.shutdown();
}
