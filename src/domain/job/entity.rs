//! Job Context - 长时任务

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{Checkpoint, JobError, JobId, JobKind, JobStatus};
use crate::domain::manuscript::ManuscriptId;

/// 长时任务
///
/// 不变量:
/// - 每完成一个工作单元至少刷新一次心跳
/// - 心跳超过冻结阈值是看门狗唯一的触发条件
/// - 同一任务同一时刻最多一个执行者持有 lock_token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRunningJob {
    pub id: JobId,
    pub manuscript_id: ManuscriptId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub checkpoint: Checkpoint,
    pub heartbeat_at: DateTime<Utc>,
    pub lock_token: Option<String>,
    pub cancel_requested: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LongRunningJob {
    pub fn new(manuscript_id: ManuscriptId, kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            manuscript_id,
            checkpoint: Checkpoint::start(kind.initial_stage()),
            kind,
            status: JobStatus::Running,
            heartbeat_at: now,
            lock_token: None,
            cancel_requested: false,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 心跳是否超过阈值（只对 running 任务有意义）
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.status == JobStatus::Running && now - self.heartbeat_at > threshold
    }

    /// 是否有活跃的执行者持有锁
    pub fn has_active_lock(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.lock_token.is_some() && now - self.heartbeat_at <= threshold
    }

    /// 重新进入 running（恢复）
    pub fn reopen(&mut self) -> Result<(), JobError> {
        match self.status {
            JobStatus::Running | JobStatus::Error | JobStatus::Cancelled => {
                self.status = JobStatus::Running;
                self.cancel_requested = false;
                self.error_message = None;
                self.updated_at = Utc::now();
                Ok(())
            }
            JobStatus::Completed => Err(JobError::AlreadyFinished(self.id)),
        }
    }
}
