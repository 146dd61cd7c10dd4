//! Revision Worker - Background Job Processor

use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::application::services::JobRunner;
use crate::domain::job::JobId;

/// Worker 配置
#[derive(Debug, Clone)]
pub struct RevisionWorkerConfig {
    /// 同时执行的任务数（不同稿件之间）
    pub max_concurrent_jobs: usize,
}

impl Default for RevisionWorkerConfig {
    fn default() -> Self {
        Self { max_concurrent_jobs: 2 }
    }
}

/// 修订 Worker
///
/// 从队列消费 job_id 并交给 JobRunner 执行
pub struct RevisionWorker {
    config: RevisionWorkerConfig,
    queue_receiver: mpsc::Receiver<JobId>,
    runner: Arc<JobRunner>,
    shutdown: CancellationToken,
}

impl RevisionWorker {
    pub fn new(
        config: RevisionWorkerConfig,
        queue_receiver: mpsc::Receiver<JobId>,
        runner: Arc<JobRunner>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            queue_receiver,
            runner,
            shutdown,
        }
    }

    /// 启动 Worker
    pub async fn run(mut self) {
        tracing::info!(
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            "RevisionWorker started"
        );

        // 使用 semaphore 控制并发
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_jobs.max(1)));

        loop {
            let job_id = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                next = self.queue_receiver.recv() => match next {
                    Some(job_id) => job_id,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to acquire semaphore permit");
                        break;
                    }
                },
            };

            let runner = self.runner.clone();
            tokio::spawn(async move {
                let _permit = permit; // 持有 permit 直到任务完成
                Self::process_job(job_id, runner).await;
            });
        }

        tracing::info!("RevisionWorker stopped");
    }

    async fn process_job(job_id: JobId, runner: Arc<JobRunner>) {
        match runner.run(job_id).await {
            Ok(Some(status)) => {
                tracing::debug!(job_id = %job_id, status = status.as_str(), "Job processed");
            }
            Ok(None) => {
                tracing::debug!(job_id = %job_id, "Job skipped");
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to run job");
            }
        }
    }
}
