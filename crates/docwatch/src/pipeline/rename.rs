use std::io;
use std::path::{Path, PathBuf};
use std::thread;

use log::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::RenameError;

const MAX_NAME_SUFFIX: u32 = 1000;

/// First free path for `filename` in `directory`, appending `_2`, `_3`, ...
/// before the extension on collision.
pub fn free_target_name(directory: &Path, filename: &str) -> Result<PathBuf, RenameError> {
    let path = directory.join(filename);

    // symlink_metadata so broken symlinks count as taken
    if std::fs::symlink_metadata(&path).is_err() {
        return Ok(path);
    }

    let (base, ext) = match filename.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => (&filename[..dot_pos], Some(&filename[dot_pos..])),
        _ => (filename, None),
    };

    for counter in 2..=MAX_NAME_SUFFIX {
        let new_filename = match ext {
            Some(ext) => format!("{}_{}{}", base, counter, ext),
            None => format!("{}_{}", base, counter),
        };

        let new_path = directory.join(&new_filename);
        if std::fs::symlink_metadata(&new_path).is_err() {
            return Ok(new_path);
        }
    }

    Err(RenameError::NoFreeName(path))
}

/// Errors worth waiting out: another process still has the file open.
fn is_transient(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(e.raw_os_error(), Some(32) | Some(33))
}

/// Renames `from` to `to`, retrying locked files with exponential backoff.
///
/// A source that disappears fails immediately.
pub fn rename_with_retry(from: &Path, to: &Path, policy: &RetryPolicy) -> Result<(), RenameError> {
    rename_with(from, to, policy, |from, to| std::fs::rename(from, to))
}

fn rename_with<F>(
    from: &Path,
    to: &Path,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<(), RenameError>
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        if !from.exists() {
            return Err(RenameError::SourceMissing(from.to_path_buf()));
        }

        match op(from, to) {
            Ok(()) => {
                if attempt > 1 {
                    debug!("Renamed {} on attempt {}", from.display(), attempt);
                }
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && !from.exists() => {
                return Err(RenameError::SourceMissing(from.to_path_buf()));
            }
            Err(e) if is_transient(&e) && attempt < max_attempts => {
                let delay = policy.backoff_for(attempt);
                warn!(
                    "Rename of {} failed ({}), retrying in {:?}",
                    from.display(),
                    e,
                    delay
                );
                thread::sleep(delay);
            }
            Err(e) => {
                return Err(RenameError::Exhausted {
                    from: from.to_path_buf(),
                    to: to.to_path_buf(),
                    attempts: attempt,
                    source: e,
                });
            }
        }
    }

    Err(RenameError::SourceMissing(from.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_free_target_name_unused() {
        let dir = TempDir::new().unwrap();
        let path = free_target_name(dir.path(), "240305_a.hwp").unwrap();
        assert_eq!(path, dir.path().join("240305_a.hwp"));
    }

    #[test]
    fn test_free_target_name_numbering_sequence() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("240305_a.hwp"), "").unwrap();
        std::fs::write(dir.path().join("240305_a_2.hwp"), "").unwrap();

        let path = free_target_name(dir.path(), "240305_a.hwp").unwrap();
        assert_eq!(path, dir.path().join("240305_a_3.hwp"));
    }

    #[test]
    fn test_free_target_name_no_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("240305_notes"), "").unwrap();

        let path = free_target_name(dir.path(), "240305_notes").unwrap();
        assert_eq!(path, dir.path().join("240305_notes_2"));
    }

    #[test]
    fn test_rename_moves_file() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a.docx");
        let to = dir.path().join("240305_a.docx");
        std::fs::write(&from, "content").unwrap();

        rename_with_retry(&from, &to, &quick_policy()).unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read_to_string(&to).unwrap(), "content");
    }

    #[test]
    fn test_rename_missing_source_fails_immediately() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("gone.docx");
        let to = dir.path().join("240305_gone.docx");

        let started = std::time::Instant::now();
        let result = rename_with_retry(&from, &to, &RetryPolicy::default());

        assert!(matches!(result, Err(RenameError::SourceMissing(_))));
        assert!(started.elapsed() < Duration::from_millis(150));
    }

    #[test]
    fn test_rename_into_missing_directory_is_not_retried() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a.docx");
        std::fs::write(&from, "content").unwrap();
        let to = dir.path().join("no").join("such").join("a.docx");

        match rename_with_retry(&from, &to, &quick_policy()) {
            Err(RenameError::Exhausted { attempts, .. }) => assert_eq!(attempts, 1),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(from.exists());
    }

    fn locked() -> io::Error {
        io::Error::new(io::ErrorKind::PermissionDenied, "file is in use")
    }

    #[test]
    fn test_rename_retries_locked_file_until_released() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a.hwp");
        let to = dir.path().join("240305_a.hwp");
        std::fs::write(&from, "content").unwrap();

        let mut attempts = 0;
        let started = std::time::Instant::now();
        rename_with(&from, &to, &quick_policy(), |from, to| {
            attempts += 1;
            if attempts < 3 {
                Err(locked())
            } else {
                std::fs::rename(from, to)
            }
        })
        .unwrap();

        assert_eq!(attempts, 3);
        assert!(to.exists());
        // 5ms after the first failure, 10ms after the second
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_rename_gives_up_after_max_attempts() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a.hwp");
        let to = dir.path().join("240305_a.hwp");
        std::fs::write(&from, "content").unwrap();

        let mut calls = 0;
        let result = rename_with(&from, &to, &quick_policy(), |_, _| {
            calls += 1;
            Err(locked())
        });

        match result {
            Err(RenameError::Exhausted { attempts, source, .. }) => {
                assert_eq!(attempts, 3);
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls, 3);
        assert!(from.exists());
        assert!(!to.exists());
    }
}
