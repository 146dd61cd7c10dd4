//! Job Watchdog - 冻结任务自动恢复
//!
//! 心跳超过冻结阈值是唯一触发条件；本进程内仍在执行的任务不重复恢复

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::application::error::ApplicationError;
use crate::application::ports::{JobControlPort, JobRepositoryPort};
use crate::domain::job::JobId;

/// 看门狗配置
#[derive(Debug, Clone)]
pub struct JobWatchdogConfig {
    /// 扫描间隔
    pub interval: Duration,
    /// 冻结阈值
    pub freeze_threshold: chrono::Duration,
}

impl Default for JobWatchdogConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(120),
            freeze_threshold: chrono::Duration::seconds(720),
        }
    }
}

pub struct JobWatchdog {
    config: JobWatchdogConfig,
    jobs: Arc<dyn JobRepositoryPort>,
    control: Arc<dyn JobControlPort>,
    shutdown: CancellationToken,
}

impl JobWatchdog {
    pub fn new(
        config: JobWatchdogConfig,
        jobs: Arc<dyn JobRepositoryPort>,
        control: Arc<dyn JobControlPort>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            jobs,
            control,
            shutdown,
        }
    }

    /// 一次扫描，返回重新入队的任务
    pub async fn scan_once(&self, now: DateTime<Utc>) -> Result<Vec<JobId>, ApplicationError> {
        let stale = self.jobs.find_stale(now - self.config.freeze_threshold).await?;
        let mut resumed = Vec::new();

        for job in stale {
            if self.control.is_active(job.id) {
                tracing::debug!(job_id = %job.id, "Stale job still active in this process, skipping");
                continue;
            }
            if let Err(e) = self.control.submit(job.id) {
                tracing::warn!(job_id = %job.id, error = %e, "Failed to enqueue stale job");
                continue;
            }
            tracing::warn!(
                job_id = %job.id,
                stage = job.checkpoint.stage.as_str(),
                heartbeat_at = %job.heartbeat_at,
                "Resuming frozen job"
            );
            resumed.push(job.id);
        }

        Ok(resumed)
    }

    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            freeze_threshold_secs = self.config.freeze_threshold.num_seconds(),
            "JobWatchdog started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.scan_once(Utc::now()).await {
                        Ok(resumed) if !resumed.is_empty() => {
                            tracing::info!(count = resumed.len(), "Watchdog resumed frozen jobs");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Watchdog scan failed"),
                    }
                }
            }
        }

        tracing::info!("JobWatchdog stopped");
    }
}
