//! Job Context - Errors

use thiserror::Error;

use super::JobId;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("任务不存在: {0}")]
    NotFound(JobId),

    #[error("任务已有执行者: {0}")]
    AlreadyLocked(JobId),

    #[error("任务已完成: {0}")]
    AlreadyFinished(JobId),

    #[error("任务已取消: {0}")]
    Cancelled(JobId),
}
