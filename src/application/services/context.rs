//! 任务执行上下文
//!
//! 心跳、检查点、取消与进度推送

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::application::error::ApplicationError;
use crate::application::ports::{JobRepositoryPort, ProgressEvent, ProgressSink};
use crate::domain::job::{Checkpoint, JobId, JobStage};
use crate::domain::manuscript::ManuscriptId;

/// 工作单元跟踪
///
/// 每个工作单元（一次生成调用及其持久化）完成后调用 `unit_done`
#[async_trait]
pub trait UnitTracker: Send + Sync {
    fn is_cancelled(&self) -> bool;

    /// 可随并发子任务移动的取消信号
    fn cancel_signal(&self) -> CancellationToken;

    async fn unit_done(
        &self,
        stage: JobStage,
        current: u32,
        total: u32,
        message: &str,
    ) -> Result<(), ApplicationError>;

    /// 持久化检查点（默认不持久化）
    async fn checkpoint(&self, _checkpoint: Checkpoint) -> Result<(), ApplicationError> {
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), ApplicationError> {
        if self.is_cancelled() {
            Err(ApplicationError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// 无持久化的跟踪（只响应取消）
#[async_trait]
impl UnitTracker for CancellationToken {
    fn is_cancelled(&self) -> bool {
        CancellationToken::is_cancelled(self)
    }

    fn cancel_signal(&self) -> CancellationToken {
        self.clone()
    }

    async fn unit_done(
        &self,
        _stage: JobStage,
        _current: u32,
        _total: u32,
        _message: &str,
    ) -> Result<(), ApplicationError> {
        self.ensure_active()
    }
}

/// 任务执行上下文
pub struct JobContext {
    job_id: JobId,
    manuscript_id: ManuscriptId,
    lock_token: String,
    cancel: CancellationToken,
    jobs: Arc<dyn JobRepositoryPort>,
    progress: Arc<dyn ProgressSink>,
}

impl JobContext {
    pub fn new(
        job_id: JobId,
        manuscript_id: ManuscriptId,
        lock_token: String,
        cancel: CancellationToken,
        jobs: Arc<dyn JobRepositoryPort>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            job_id,
            manuscript_id,
            lock_token,
            cancel,
            jobs,
            progress,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn manuscript_id(&self) -> ManuscriptId {
        self.manuscript_id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 刷新心跳；锁被接管时报错
    pub async fn heartbeat(&self) -> Result<(), ApplicationError> {
        if !self.jobs.heartbeat(self.job_id, &self.lock_token).await? {
            tracing::warn!(job_id = %self.job_id, "Job lock taken over, stopping");
            self.cancel.cancel();
            return Err(ApplicationError::LockLost(self.job_id.to_string()));
        }
        Ok(())
    }

    pub fn report(&self, stage: JobStage, current: u32, total: u32, message: impl Into<String>) {
        self.progress.publish_progress(ProgressEvent {
            job_id: self.job_id,
            manuscript_id: self.manuscript_id,
            stage,
            current_chapter: current,
            total_chapters: total,
            message: message.into(),
        });
    }
}

#[async_trait]
impl UnitTracker for JobContext {
    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn cancel_signal(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 持久化检查点（同时刷新心跳）
    async fn checkpoint(&self, checkpoint: Checkpoint) -> Result<(), ApplicationError> {
        let held = self
            .jobs
            .save_checkpoint(self.job_id, &self.lock_token, &checkpoint)
            .await?;
        if !held {
            self.cancel.cancel();
            return Err(ApplicationError::LockLost(self.job_id.to_string()));
        }
        tracing::debug!(
            job_id = %self.job_id,
            stage = checkpoint.stage.as_str(),
            completed = checkpoint.completed_units,
            total = checkpoint.total_units,
            "Checkpoint saved"
        );
        Ok(())
    }

    async fn unit_done(
        &self,
        stage: JobStage,
        current: u32,
        total: u32,
        message: &str,
    ) -> Result<(), ApplicationError> {
        self.heartbeat().await?;
        self.report(stage, current, total, message);
        self.ensure_active()
    }
}
