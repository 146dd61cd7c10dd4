//! 任务执行器
//!
//! 登记 → 抢锁 → 按检查点执行 → 终态写入 → 释放锁
//! worker 与看门狗共用同一入口，保证同一任务最多一个执行者

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::context::{JobContext, UnitTracker};
use super::pipeline::RevisionPipeline;
use super::translation::TranslationExecutor;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    JobControlPort, JobFinishedEvent, JobRepositoryPort, ManuscriptRepositoryPort, ProgressSink,
};
use crate::domain::job::{Checkpoint, JobId, JobKind, JobStage, JobStatus, LongRunningJob};
use crate::domain::manuscript::{Manuscript, ManuscriptStatus};

pub struct JobRunner {
    jobs: Arc<dyn JobRepositoryPort>,
    manuscripts: Arc<dyn ManuscriptRepositoryPort>,
    control: Arc<dyn JobControlPort>,
    progress: Arc<dyn ProgressSink>,
    pipeline: RevisionPipeline,
    translator: TranslationExecutor,
    freeze_threshold: Duration,
}

impl JobRunner {
    pub fn new(
        jobs: Arc<dyn JobRepositoryPort>,
        manuscripts: Arc<dyn ManuscriptRepositoryPort>,
        control: Arc<dyn JobControlPort>,
        progress: Arc<dyn ProgressSink>,
        pipeline: RevisionPipeline,
        translator: TranslationExecutor,
        freeze_threshold: Duration,
    ) -> Self {
        Self {
            jobs,
            manuscripts,
            control,
            progress,
            pipeline,
            translator,
            freeze_threshold,
        }
    }

    pub fn freeze_threshold(&self) -> Duration {
        self.freeze_threshold
    }

    /// 执行任务直到终态；已有执行者或已是终态时返回 None
    pub async fn run(&self, job_id: JobId) -> Result<Option<JobStatus>, ApplicationError> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Job", *job_id.as_uuid()))?;

        if job.status.is_terminal() {
            tracing::debug!(job_id = %job_id, status = job.status.as_str(), "Job already finished, skipping");
            return Ok(None);
        }

        let Some(cancel) = self.control.register(job_id) else {
            tracing::debug!(job_id = %job_id, "Job already active in this process, skipping");
            return Ok(None);
        };

        let token = Uuid::new_v4().to_string();
        let stale_before = Utc::now() - self.freeze_threshold;
        match self.jobs.try_acquire_lock(job_id, &token, stale_before).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(job_id = %job_id, "Job lock held by another executor, skipping");
                self.control.release(job_id);
                return Ok(None);
            }
            Err(e) => {
                self.control.release(job_id);
                return Err(e.into());
            }
        }

        let ctx = JobContext::new(
            job_id,
            job.manuscript_id,
            token.clone(),
            cancel,
            self.jobs.clone(),
            self.progress.clone(),
        );

        tracing::info!(
            job_id = %job_id,
            manuscript_id = %job.manuscript_id,
            kind = job.kind.as_str(),
            stage = job.checkpoint.stage.as_str(),
            "Job started"
        );

        let result = if job.cancel_requested {
            ctx.cancel_token().cancel();
            Err(ApplicationError::Cancelled)
        } else {
            self.execute(&job, &ctx).await
        };

        let status = self.finish(&job, &token, result).await;
        self.control.release(job_id);
        Ok(status)
    }

    async fn execute(&self, job: &LongRunningJob, ctx: &JobContext) -> Result<(), ApplicationError> {
        let mut manuscript = self
            .manuscripts
            .find_by_id(job.manuscript_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Manuscript", *job.manuscript_id.as_uuid()))?;

        match &job.kind {
            JobKind::Revision => {
                if job.checkpoint.is_done() {
                    tracing::info!(job_id = %job.id, "No remaining revision work");
                    return Ok(());
                }
                self.set_manuscript_status(&mut manuscript, ManuscriptStatus::Processing)
                    .await?;

                match self
                    .pipeline
                    .run(&mut manuscript, job.id, job.checkpoint.stage, ctx)
                    .await
                {
                    Ok(outcome) => {
                        tracing::info!(
                            job_id = %job.id,
                            state = outcome.review.state.as_str(),
                            score = ?outcome.review.final_score(),
                            "Revision finished"
                        );
                        self.set_manuscript_status(&mut manuscript, ManuscriptStatus::Completed)
                            .await
                    }
                    Err(e @ ApplicationError::LockLost(_)) => Err(e),
                    Err(e) if e.is_cancelled() => Err(e),
                    Err(e) => {
                        if let Err(status_err) = self
                            .set_manuscript_status(&mut manuscript, ManuscriptStatus::Error)
                            .await
                        {
                            tracing::warn!(job_id = %job.id, error = %status_err, "Failed to mark manuscript error");
                        }
                        Err(e)
                    }
                }
            }
            JobKind::Translation { target_language } => {
                let remaining = self.translator.remaining(&manuscript, target_language).await?;
                if remaining == 0 {
                    tracing::info!(job_id = %job.id, target_language = %target_language, "No remaining chapters to translate");
                    return Ok(());
                }
                self.translator.translate(&manuscript, target_language, ctx).await?;
                ctx.checkpoint(Checkpoint::start(JobStage::Done)).await
            }
        }
    }

    async fn set_manuscript_status(
        &self,
        manuscript: &mut Manuscript,
        status: ManuscriptStatus,
    ) -> Result<(), ApplicationError> {
        if manuscript.status() != status {
            manuscript.transition_to(status)?;
        }
        self.manuscripts.update_status(manuscript.id(), status).await?;
        Ok(())
    }

    async fn cancel_was_requested(&self, job_id: JobId) -> bool {
        match self.jobs.find_by_id(job_id).await {
            Ok(Some(job)) => job.cancel_requested,
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to reload job, treating as cancelled");
                true
            }
        }
    }

    async fn mark_manuscript_error(&self, job: &LongRunningJob) {
        let result = match self.manuscripts.find_by_id(job.manuscript_id).await {
            Ok(Some(mut manuscript)) => {
                self.set_manuscript_status(&mut manuscript, ManuscriptStatus::Error)
                    .await
            }
            Ok(None) => return,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to mark manuscript error");
        }
    }

    /// 写入终态并释放锁；锁被接管时什么都不写
    async fn finish(
        &self,
        job: &LongRunningJob,
        token: &str,
        result: Result<(), ApplicationError>,
    ) -> Option<JobStatus> {
        let (status, message) = match result {
            Ok(()) => (JobStatus::Completed, None),
            Err(ApplicationError::LockLost(_)) => {
                tracing::warn!(job_id = %job.id, "Lock lost, leaving job to its new executor");
                return None;
            }
            Err(e) if e.is_cancelled() => {
                if !self.cancel_was_requested(job.id).await {
                    // 停机打断：保持 running，检查点留给下次恢复
                    tracing::info!(job_id = %job.id, "Job interrupted by shutdown, checkpoint kept");
                    if let Err(e) = self.jobs.release_lock(job.id, token).await {
                        tracing::warn!(job_id = %job.id, error = %e, "Failed to release job lock");
                    }
                    return None;
                }
                if matches!(job.kind, JobKind::Revision) {
                    self.mark_manuscript_error(job).await;
                }
                (JobStatus::Cancelled, None)
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Job failed");
                (JobStatus::Error, Some(e.to_string()))
            }
        };

        if let Err(e) = self.jobs.finish(job.id, status, message.as_deref()).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to record job status");
        }
        if let Err(e) = self.jobs.release_lock(job.id, token).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to release job lock");
        }

        tracing::info!(job_id = %job.id, status = status.as_str(), "Job finished");
        self.progress.publish_finished(JobFinishedEvent {
            job_id: job.id,
            manuscript_id: job.manuscript_id,
            status: status.as_str().to_string(),
            message,
        });
        Some(status)
    }
}
