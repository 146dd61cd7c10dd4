//! Worker Layer - Background Job Processing
//!
//! 实现 RevisionWorker（队列消费）和 JobWatchdog（冻结任务恢复）

mod job_watchdog;
mod revision_worker;

pub use job_watchdog::{JobWatchdog, JobWatchdogConfig};
pub use revision_worker::{RevisionWorker, RevisionWorkerConfig};
