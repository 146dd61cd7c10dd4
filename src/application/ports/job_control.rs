//! Job Control Port - 进程内任务调度与取消
//!
//! 定义任务入队与活跃执行登记的抽象接口，具体实现在 infrastructure/memory 层

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::job::JobId;

/// Job Control 错误
#[derive(Debug, Error)]
pub enum JobControlError {
    #[error("Job queue is full: {0}")]
    QueueFull(JobId),

    #[error("Job queue is closed")]
    QueueClosed,
}

/// Job Control Port
///
/// 所有状态只存在于本进程内存中；持久化的互斥锁由 JobRepositoryPort 负责
pub trait JobControlPort: Send + Sync {
    /// 投递任务到执行队列
    fn submit(&self, job_id: JobId) -> Result<(), JobControlError>;

    /// 登记为活跃执行，已活跃时返回 None
    fn register(&self, job_id: JobId) -> Option<CancellationToken>;

    /// 注销活跃执行
    fn release(&self, job_id: JobId);

    /// 触发取消，任务不活跃时返回 false
    fn cancel(&self, job_id: JobId) -> bool;

    /// 是否有活跃执行
    fn is_active(&self, job_id: JobId) -> bool;

    /// 活跃执行数量
    fn active_count(&self) -> usize;
}
