use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::status::event::{BatchEvent, JobProgressEvent, StatusEvent, WatcherEvent};

/// Creates the status channel between worker threads and the presentation
/// loop. Sending never blocks.
pub fn status_channel() -> (StatusSender, StatusReceiver) {
    let (tx, rx) = unbounded();
    (StatusSender { tx }, StatusReceiver { rx })
}

#[derive(Clone)]
pub struct StatusSender {
    tx: Sender<StatusEvent>,
}

impl StatusSender {
    pub fn send(&self, event: StatusEvent) {
        // Ignore errors - a dropped receiver just means nobody is listening
        let _ = self.tx.send(event);
    }

    pub fn job(&self, event: JobProgressEvent) {
        self.send(StatusEvent::Job(event));
    }

    pub fn watcher(&self, event: WatcherEvent) {
        self.send(StatusEvent::Watcher(event));
    }

    pub fn batch(&self, event: BatchEvent) {
        self.send(StatusEvent::Batch(event));
    }
}

pub struct StatusReceiver {
    rx: Receiver<StatusEvent>,
}

impl StatusReceiver {
    pub fn try_recv(&self) -> Option<StatusEvent> {
        self.rx.try_recv().ok()
    }

    /// Waits up to `timeout`; `None` on timeout or when every sender is gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<StatusEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything queued right now, oldest first.
    pub fn drain(&self) -> Vec<StatusEvent> {
        self.rx.try_iter().collect()
    }
}
