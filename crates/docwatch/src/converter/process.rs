use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::ConvertError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stderr: String,
}

impl ProcessOutput {
    /// Exit code and trimmed stderr, for error messages.
    pub fn describe_failure(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("converter exited with {}", self.status)
        } else {
            format!("converter exited with {}: {}", self.status, stderr)
        }
    }
}

/// Runs `cmd` to completion, killing it once `timeout` has passed.
///
/// `source` is the document being converted and only appears in errors.
pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    source: &Path,
) -> Result<ProcessOutput, ConvertError> {
    let program = PathBuf::from(cmd.get_program());
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    debug!("Running {:?}", cmd);
    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ConvertError::ApplicationNotFound {
            path: program.clone(),
        },
        _ => ConvertError::Io {
            path: source.to_path_buf(),
            source: e,
        },
    })?;

    // Drain stderr on its own thread so a chatty converter cannot block on a full pipe
    let stderr_reader = child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = pipe.read_to_string(&mut buf);
            buf
        })
    });

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if started.elapsed() >= timeout {
                    warn!(
                        "{} did not finish within {:?}, killing it",
                        program.display(),
                        timeout
                    );
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ConvertError::Timeout {
                        path: source.to_path_buf(),
                        seconds: timeout.as_secs(),
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                let _ = child.kill();
                return Err(ConvertError::Io {
                    path: source.to_path_buf(),
                    source: e,
                });
            }
        }
    };

    let stderr = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    Ok(ProcessOutput { status, stderr })
}

/// Waits for a converter's output file to appear and stop growing.
///
/// Each attempt checks the size twice, `interval` apart. Returns whether the
/// file exists once the attempts are used up.
pub fn wait_for_output(path: &Path, attempts: u32, interval: Duration) -> bool {
    for _ in 0..attempts {
        if let Ok(meta) = std::fs::metadata(path) {
            let size = meta.len();
            thread::sleep(interval);
            if std::fs::metadata(path).is_ok_and(|m| m.len() == size) {
                return true;
            }
        } else {
            thread::sleep(interval);
        }
    }
    path.exists()
}
