//! In-Memory Job Control Implementation

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{JobControlError, JobControlPort};
use crate::domain::job::JobId;

/// 内存任务调度
///
/// 活跃执行以 CancellationToken 登记，同一 job_id 同时只有一个
pub struct InMemoryJobControl {
    /// job_id -> 取消令牌
    active: DashMap<JobId, CancellationToken>,
    /// 任务队列发送端
    queue_sender: mpsc::Sender<JobId>,
    /// 进程级关闭令牌，所有任务令牌都是它的子令牌
    shutdown: CancellationToken,
}

impl InMemoryJobControl {
    pub fn new(queue_sender: mpsc::Sender<JobId>) -> Self {
        Self::with_shutdown(queue_sender, CancellationToken::new())
    }

    pub fn with_shutdown(queue_sender: mpsc::Sender<JobId>, shutdown: CancellationToken) -> Self {
        Self {
            active: DashMap::new(),
            queue_sender,
            shutdown,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl JobControlPort for InMemoryJobControl {
    fn submit(&self, job_id: JobId) -> Result<(), JobControlError> {
        self.queue_sender.try_send(job_id).map_err(|e| match e {
            mpsc::error::TrySendError::Full(id) => JobControlError::QueueFull(id),
            mpsc::error::TrySendError::Closed(_) => JobControlError::QueueClosed,
        })?;
        tracing::debug!(job_id = %job_id, "Job enqueued");
        Ok(())
    }

    fn register(&self, job_id: JobId) -> Option<CancellationToken> {
        match self.active.entry(job_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let token = self.shutdown.child_token();
                slot.insert(token.clone());
                tracing::debug!(job_id = %job_id, "Job registered as active");
                Some(token)
            }
        }
    }

    fn release(&self, job_id: JobId) {
        if self.active.remove(&job_id).is_some() {
            tracing::debug!(job_id = %job_id, "Job released");
        }
    }

    fn cancel(&self, job_id: JobId) -> bool {
        match self.active.get(&job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn is_active(&self, job_id: JobId) -> bool {
        self.active.contains_key(&job_id)
    }

    fn active_count(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_exclusive() {
        let (tx, _rx) = mpsc::channel(4);
        let control = InMemoryJobControl::new(tx);
        let job = JobId::new();

        assert!(control.register(job).is_some());
        assert!(control.register(job).is_none());
        assert_eq!(control.active_count(), 1);

        control.release(job);
        assert!(!control.is_active(job));
        assert!(control.register(job).is_some());
    }

    #[test]
    fn test_cancel_only_affects_active_jobs() {
        let (tx, _rx) = mpsc::channel(4);
        let control = InMemoryJobControl::new(tx);
        let job = JobId::new();

        assert!(!control.cancel(job));
        let token = control.register(job).unwrap();
        assert!(control.cancel(job));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_shutdown_cancels_every_job() {
        let (tx, _rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let control = InMemoryJobControl::with_shutdown(tx, shutdown.clone());
        let a = control.register(JobId::new()).unwrap();
        let b = control.register(JobId::new()).unwrap();

        shutdown.cancel();

        assert!(a.is_cancelled() && b.is_cancelled());
    }

    #[tokio::test]
    async fn test_submit_reports_full_queue() {
        let (tx, mut rx) = mpsc::channel(1);
        let control = InMemoryJobControl::new(tx);
        let first = JobId::new();

        control.submit(first).unwrap();
        assert!(matches!(control.submit(JobId::new()), Err(JobControlError::QueueFull(_))));
        assert_eq!(rx.recv().await, Some(first));

        drop(rx);
        assert!(matches!(control.submit(JobId::new()), Err(JobControlError::QueueClosed)));
    }
}
