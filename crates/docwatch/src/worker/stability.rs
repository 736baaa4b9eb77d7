use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::debug;

use crate::config::WatcherTimings;

#[derive(Debug)]
struct Candidate {
    first_seen: Instant,
    last_probe: Option<Instant>,
    last_size: Option<u64>,
    stable_count: u32,
}

/// Holds back newly detected files until they stop growing.
///
/// A file is ready once its size is unchanged across `stable_probes`
/// consecutive probes and it opens for reading. Files that never settle
/// are released after `settle_timeout` if they still exist; files that
/// vanish are dropped.
#[derive(Debug)]
pub struct StabilityTracker {
    timings: WatcherTimings,
    candidates: HashMap<PathBuf, Candidate>,
}

impl StabilityTracker {
    pub fn new(timings: WatcherTimings) -> Self {
        Self {
            timings,
            candidates: HashMap::new(),
        }
    }

    /// Starts tracking `path`. Repeated events for a tracked path are ignored.
    pub fn observe(&mut self, path: PathBuf, now: Instant) {
        self.candidates.entry(path).or_insert(Candidate {
            first_seen: now,
            last_probe: None,
            last_size: None,
            stable_count: 0,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Probes every candidate that is due and returns the ones now ready.
    /// Never blocks.
    pub fn poll(&mut self, now: Instant) -> Vec<PathBuf> {
        let timings = self.timings;
        let mut ready = Vec::new();
        let mut dropped = Vec::new();

        for (path, candidate) in self.candidates.iter_mut() {
            if candidate
                .last_probe
                .is_some_and(|at| now.duration_since(at) < timings.probe_interval)
            {
                continue;
            }
            candidate.last_probe = Some(now);

            let Ok(meta) = std::fs::metadata(path) else {
                debug!("{} vanished before it settled", path.display());
                dropped.push(path.clone());
                continue;
            };

            let size = meta.len();
            if candidate.last_size == Some(size) {
                candidate.stable_count += 1;
            } else {
                candidate.last_size = Some(size);
                candidate.stable_count = 0;
            }

            if candidate.stable_count >= timings.stable_probes && can_open(path) {
                ready.push(path.clone());
            } else if now.duration_since(candidate.first_seen) >= timings.settle_timeout {
                debug!(
                    "{} did not settle within {:?}, releasing it anyway",
                    path.display(),
                    timings.settle_timeout
                );
                ready.push(path.clone());
            }
        }

        for path in dropped.iter().chain(ready.iter()) {
            self.candidates.remove(path);
        }
        ready.sort();
        ready
    }
}

fn can_open(path: &Path) -> bool {
    File::open(path).is_ok()
}
