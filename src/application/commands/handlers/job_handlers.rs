//! Job Command Handlers
//!
//! 启动、取消、恢复；均返回任务快照（含检查点）

use std::sync::Arc;

use crate::application::commands::{CancelJob, ResumeJob, StartRevision, StartTranslation};
use crate::application::error::ApplicationError;
use crate::application::ports::{JobControlPort, JobRepositoryPort, ManuscriptRepositoryPort};
use crate::domain::job::{JobId, JobKind, JobStatus, LongRunningJob};
use crate::domain::manuscript::ManuscriptId;

// ============================================================================
// StartJob
// ============================================================================

/// StartRevision / StartTranslation Handler
pub struct StartJobHandler {
    manuscripts: Arc<dyn ManuscriptRepositoryPort>,
    jobs: Arc<dyn JobRepositoryPort>,
    control: Arc<dyn JobControlPort>,
}

impl StartJobHandler {
    pub fn new(
        manuscripts: Arc<dyn ManuscriptRepositoryPort>,
        jobs: Arc<dyn JobRepositoryPort>,
        control: Arc<dyn JobControlPort>,
    ) -> Self {
        Self {
            manuscripts,
            jobs,
            control,
        }
    }

    pub async fn start_revision(&self, command: StartRevision) -> Result<LongRunningJob, ApplicationError> {
        self.start(ManuscriptId::from_uuid(command.manuscript_id), JobKind::Revision)
            .await
    }

    pub async fn start_translation(&self, command: StartTranslation) -> Result<LongRunningJob, ApplicationError> {
        let target_language = command.target_language.trim().to_string();
        if target_language.is_empty() {
            return Err(ApplicationError::validation("Target language must not be empty"));
        }
        self.start(
            ManuscriptId::from_uuid(command.manuscript_id),
            JobKind::Translation { target_language },
        )
        .await
    }

    async fn start(&self, manuscript_id: ManuscriptId, kind: JobKind) -> Result<LongRunningJob, ApplicationError> {
        let manuscript = self
            .manuscripts
            .find_by_id(manuscript_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Manuscript", *manuscript_id.as_uuid()))?;
        if manuscript.chapter_count() == 0 {
            return Err(ApplicationError::business_rule("Manuscript has no chapters"));
        }

        // 同一稿件同一时刻只允许一条流水线
        let running = self
            .jobs
            .find_by_manuscript(manuscript_id)
            .await?
            .into_iter()
            .find(|j| j.status == JobStatus::Running);
        if let Some(existing) = running {
            return Err(ApplicationError::business_rule(format!(
                "Manuscript already has a running job: {}",
                existing.id
            )));
        }

        let job = LongRunningJob::new(manuscript_id, kind);
        self.jobs.save(&job).await?;

        // 入队失败时任务保持 running，由看门狗接手
        if let Err(e) = self.control.submit(job.id) {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to enqueue job");
        }

        tracing::info!(
            job_id = %job.id,
            manuscript_id = %manuscript_id,
            kind = job.kind.as_str(),
            "Job submitted"
        );
        Ok(job)
    }
}

// ============================================================================
// CancelJob
// ============================================================================

/// CancelJob Handler
pub struct CancelJobHandler {
    jobs: Arc<dyn JobRepositoryPort>,
    control: Arc<dyn JobControlPort>,
}

impl CancelJobHandler {
    pub fn new(jobs: Arc<dyn JobRepositoryPort>, control: Arc<dyn JobControlPort>) -> Self {
        Self { jobs, control }
    }

    /// 活跃任务：置取消标记并触发令牌，执行者在当前工作单元结束后停下
    /// 非活跃任务：直接写入 cancelled
    pub async fn handle(&self, command: CancelJob) -> Result<LongRunningJob, ApplicationError> {
        let job_id = JobId::from_uuid(command.job_id);
        let job = find_job(&self.jobs, job_id).await?;
        if job.status.is_terminal() {
            return Ok(job);
        }

        self.jobs.request_cancel(job_id).await?;
        if self.control.cancel(job_id) {
            tracing::info!(job_id = %job_id, "Cancellation signalled to active job");
        } else {
            self.jobs.finish(job_id, JobStatus::Cancelled, None).await?;
            tracing::info!(job_id = %job_id, "Inactive job cancelled");
        }

        find_job(&self.jobs, job_id).await
    }
}

// ============================================================================
// ResumeJob
// ============================================================================

/// ResumeJob Handler
pub struct ResumeJobHandler {
    jobs: Arc<dyn JobRepositoryPort>,
    control: Arc<dyn JobControlPort>,
}

impl ResumeJobHandler {
    pub fn new(jobs: Arc<dyn JobRepositoryPort>, control: Arc<dyn JobControlPort>) -> Self {
        Self { jobs, control }
    }

    pub async fn handle(&self, command: ResumeJob) -> Result<LongRunningJob, ApplicationError> {
        let job_id = JobId::from_uuid(command.job_id);
        let mut job = find_job(&self.jobs, job_id).await?;

        if self.control.is_active(job_id) {
            tracing::debug!(job_id = %job_id, "Job already active, resume ignored");
            return Ok(job);
        }

        job.reopen()?;
        // 本进程内没有执行者，残留的锁令牌作废
        job.lock_token = None;
        self.jobs.save(&job).await?;
        self.control.submit(job_id)?;

        tracing::info!(
            job_id = %job_id,
            stage = job.checkpoint.stage.as_str(),
            "Job resumed"
        );
        Ok(job)
    }
}

async fn find_job(jobs: &Arc<dyn JobRepositoryPort>, job_id: JobId) -> Result<LongRunningJob, ApplicationError> {
    jobs.find_by_id(job_id)
        .await?
        .ok_or_else(|| ApplicationError::not_found("Job", *job_id.as_uuid()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::{CreateManuscript, NewChapter};
    use crate::application::commands::handlers::CreateManuscriptHandler;
    use crate::domain::job::JobStage;
    use crate::infrastructure::memory::InMemoryJobControl;
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteJobRepository, SqliteManuscriptRepository,
    };
    use tokio::sync::mpsc;
    use uuid::Uuid;

    struct Harness {
        manuscripts: Arc<SqliteManuscriptRepository>,
        jobs: Arc<SqliteJobRepository>,
        control: Arc<InMemoryJobControl>,
        queue: mpsc::Receiver<JobId>,
    }

    async fn harness() -> Harness {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let (tx, rx) = mpsc::channel(8);
        Harness {
            manuscripts: Arc::new(SqliteManuscriptRepository::new(pool.clone())),
            jobs: Arc::new(SqliteJobRepository::new(pool)),
            control: Arc::new(InMemoryJobControl::new(tx)),
            queue: rx,
        }
    }

    async fn create_manuscript(h: &Harness) -> Uuid {
        let handler = CreateManuscriptHandler::new(h.manuscripts.clone());
        let manuscript = handler
            .handle(CreateManuscript {
                title: "The Long Road".to_string(),
                language: "en".to_string(),
                genre: "historical".to_string(),
                chapters: vec![
                    NewChapter {
                        number: 1,
                        title: "Departure".to_string(),
                        content: "She left.".to_string(),
                    },
                    NewChapter {
                        number: 2,
                        title: "Arrival".to_string(),
                        content: "She arrived.".to_string(),
                    },
                ],
            })
            .await
            .unwrap();
        *manuscript.id().as_uuid()
    }

    #[tokio::test]
    async fn test_start_enqueues_job() {
        let mut h = harness().await;
        let manuscript_id = create_manuscript(&h).await;
        let handler = StartJobHandler::new(h.manuscripts.clone(), h.jobs.clone(), h.control.clone());

        let job = handler.start_revision(StartRevision { manuscript_id }).await.unwrap();

        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.checkpoint.stage, JobStage::Structure);
        assert_eq!(h.queue.recv().await, Some(job.id));
    }

    #[tokio::test]
    async fn test_second_running_job_is_rejected() {
        let h = harness().await;
        let manuscript_id = create_manuscript(&h).await;
        let handler = StartJobHandler::new(h.manuscripts.clone(), h.jobs.clone(), h.control.clone());

        handler.start_revision(StartRevision { manuscript_id }).await.unwrap();
        let second = handler
            .start_translation(StartTranslation {
                manuscript_id,
                target_language: "es".to_string(),
            })
            .await;

        assert!(matches!(second, Err(ApplicationError::BusinessRuleViolation(_))));
    }

    #[tokio::test]
    async fn test_start_unknown_manuscript() {
        let h = harness().await;
        let handler = StartJobHandler::new(h.manuscripts.clone(), h.jobs.clone(), h.control.clone());

        let result = handler
            .start_revision(StartRevision {
                manuscript_id: Uuid::new_v4(),
            })
            .await;

        assert!(matches!(result, Err(ApplicationError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_cancel_inactive_job_finishes_it() {
        let h = harness().await;
        let manuscript_id = create_manuscript(&h).await;
        let start = StartJobHandler::new(h.manuscripts.clone(), h.jobs.clone(), h.control.clone());
        let job = start.start_revision(StartRevision { manuscript_id }).await.unwrap();

        let cancel = CancelJobHandler::new(h.jobs.clone(), h.control.clone());
        let snapshot = cancel.handle(CancelJob { job_id: *job.id.as_uuid() }).await.unwrap();

        assert_eq!(snapshot.status, JobStatus::Cancelled);
        assert!(snapshot.cancel_requested);
    }

    #[tokio::test]
    async fn test_cancel_active_job_signals_token() {
        let h = harness().await;
        let manuscript_id = create_manuscript(&h).await;
        let start = StartJobHandler::new(h.manuscripts.clone(), h.jobs.clone(), h.control.clone());
        let job = start.start_revision(StartRevision { manuscript_id }).await.unwrap();
        let token = h.control.register(job.id).unwrap();

        let cancel = CancelJobHandler::new(h.jobs.clone(), h.control.clone());
        let snapshot = cancel.handle(CancelJob { job_id: *job.id.as_uuid() }).await.unwrap();

        assert!(token.is_cancelled());
        // 执行者负责写入终态
        assert_eq!(snapshot.status, JobStatus::Running);
        assert!(snapshot.cancel_requested);
    }

    #[tokio::test]
    async fn test_resume_reopens_and_requeues() {
        let mut h = harness().await;
        let manuscript_id = create_manuscript(&h).await;
        let start = StartJobHandler::new(h.manuscripts.clone(), h.jobs.clone(), h.control.clone());
        let job = start.start_revision(StartRevision { manuscript_id }).await.unwrap();
        h.queue.recv().await.unwrap();
        h.jobs.finish(job.id, JobStatus::Error, Some("upstream timeout")).await.unwrap();

        let resume = ResumeJobHandler::new(h.jobs.clone(), h.control.clone());
        let snapshot = resume.handle(ResumeJob { job_id: *job.id.as_uuid() }).await.unwrap();

        assert_eq!(snapshot.status, JobStatus::Running);
        assert!(snapshot.error_message.is_none());
        assert_eq!(h.queue.recv().await, Some(job.id));
    }

    #[tokio::test]
    async fn test_resume_active_job_does_not_requeue() {
        let mut h = harness().await;
        let manuscript_id = create_manuscript(&h).await;
        let start = StartJobHandler::new(h.manuscripts.clone(), h.jobs.clone(), h.control.clone());
        let job = start.start_revision(StartRevision { manuscript_id }).await.unwrap();
        h.queue.recv().await.unwrap();
        let _token = h.control.register(job.id).unwrap();

        let resume = ResumeJobHandler::new(h.jobs.clone(), h.control.clone());
        resume.handle(ResumeJob { job_id: *job.id.as_uuid() }).await.unwrap();

        assert!(h.queue.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_resume_completed_job_is_rejected() {
        let h = harness().await;
        let manuscript_id = create_manuscript(&h).await;
        let start = StartJobHandler::new(h.manuscripts.clone(), h.jobs.clone(), h.control.clone());
        let job = start.start_revision(StartRevision { manuscript_id }).await.unwrap();
        h.jobs.finish(job.id, JobStatus::Completed, None).await.unwrap();

        let resume = ResumeJobHandler::new(h.jobs.clone(), h.control.clone());
        let result = resume.handle(ResumeJob { job_id: *job.id.as_uuid() }).await;

        assert!(matches!(result, Err(ApplicationError::InvalidState(_))));
    }
}
