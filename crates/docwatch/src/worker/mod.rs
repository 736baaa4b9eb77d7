mod consumer;
pub mod job;
pub mod queue;
pub mod scanner;
pub mod stability;
pub mod watcher;

pub use job::{BatchInfo, BatchTicket, Job, JobKind, JobOrigin, JobResult, JobStatus};
pub use queue::{JobQueue, JobSubmitter};
pub use scanner::{DirectoryScanner, DocumentFilter};
pub use stability::StabilityTracker;
pub use watcher::{FolderWatcher, WatcherHandle};
