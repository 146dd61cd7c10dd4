//! Event Publisher Implementation
//!
//! WebSocket 事件推送实现

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::application::ports::{JobFinishedEvent, ProgressEvent, ProgressSink};
use crate::domain::job::{JobId, JobStage};
use crate::domain::manuscript::ManuscriptId;

const CHANNEL_CAPACITY: usize = 100;

/// WebSocket 事件类型
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum WsEvent {
    /// 工作单元完成
    JobProgress {
        job_id: JobId,
        manuscript_id: ManuscriptId,
        stage: JobStage,
        current_chapter: u32,
        total_chapters: u32,
        message: String,
    },
    /// 任务进入终态
    JobFinished {
        job_id: JobId,
        manuscript_id: ManuscriptId,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl WsEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            WsEvent::JobProgress { job_id, .. } | WsEvent::JobFinished { job_id, .. } => *job_id,
        }
    }
}

impl From<ProgressEvent> for WsEvent {
    fn from(event: ProgressEvent) -> Self {
        WsEvent::JobProgress {
            job_id: event.job_id,
            manuscript_id: event.manuscript_id,
            stage: event.stage,
            current_chapter: event.current_chapter,
            total_chapters: event.total_chapters,
            message: event.message,
        }
    }
}

impl From<JobFinishedEvent> for WsEvent {
    fn from(event: JobFinishedEvent) -> Self {
        WsEvent::JobFinished {
            job_id: event.job_id,
            manuscript_id: event.manuscript_id,
            status: event.status,
            message: event.message,
        }
    }
}

/// 事件发布器
///
/// 尽力而为：没有订阅者时事件直接丢弃，慢订阅者会丢失最旧的事件
pub struct EventPublisher {
    /// job_id -> broadcast sender
    job_channels: DashMap<JobId, broadcast::Sender<WsEvent>>,
    /// 全部任务的事件
    global_channel: broadcast::Sender<WsEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (global_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            job_channels: DashMap::new(),
            global_channel: global_tx,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅全部任务的事件
    pub fn subscribe_global(&self) -> broadcast::Receiver<WsEvent> {
        self.global_channel.subscribe()
    }

    /// 订阅单个任务的事件（通道按需创建）
    pub fn subscribe_job(&self, job_id: JobId) -> broadcast::Receiver<WsEvent> {
        self.job_channels
            .entry(job_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// 最后一个订阅者断开后移除通道
    pub fn unsubscribe_job(&self, job_id: JobId) {
        self.job_channels
            .remove_if(&job_id, |_, sender| sender.receiver_count() == 0);
    }

    /// 活跃的单任务通道数
    pub fn job_channel_count(&self) -> usize {
        self.job_channels.len()
    }

    fn publish(&self, event: WsEvent) {
        let job_id = event.job_id();
        if let Some(sender) = self.job_channels.get(&job_id) {
            if let Err(e) = sender.send(event.clone()) {
                tracing::debug!(job_id = %job_id, error = %e, "Failed to publish job event (no receivers)");
            }
        }
        if let Err(e) = self.global_channel.send(event) {
            tracing::trace!(job_id = %job_id, error = %e, "Failed to publish global event (no receivers)");
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for EventPublisher {
    fn publish_progress(&self, event: ProgressEvent) {
        self.publish(event.into());
    }

    /// 终态事件之后关闭该任务的通道，订阅者读完剩余事件后收到 Closed
    fn publish_finished(&self, event: JobFinishedEvent) {
        let job_id = event.job_id;
        self.publish(event.into());
        self.job_channels.remove(&job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    fn progress(job_id: JobId, current: u32) -> ProgressEvent {
        ProgressEvent {
            job_id,
            manuscript_id: ManuscriptId::new(),
            stage: JobStage::Summaries,
            current_chapter: current,
            total_chapters: 3,
            message: format!("Summarized chapter {}", current),
        }
    }

    #[tokio::test]
    async fn test_job_subscriber_sees_only_its_job() {
        let publisher = EventPublisher::new();
        let job = JobId::new();
        let other = JobId::new();
        let mut rx = publisher.subscribe_job(job);

        publisher.publish_progress(progress(other, 1));
        publisher.publish_progress(progress(job, 2));

        match rx.recv().await.unwrap() {
            WsEvent::JobProgress { current_chapter, .. } => assert_eq!(current_chapter, 2),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_finished_closes_job_channel() {
        let publisher = EventPublisher::new();
        let job = JobId::new();
        let mut rx = publisher.subscribe_job(job);
        let mut global = publisher.subscribe_global();

        publisher.publish_finished(JobFinishedEvent {
            job_id: job,
            manuscript_id: ManuscriptId::new(),
            status: "completed".to_string(),
            message: None,
        });

        assert!(matches!(rx.recv().await.unwrap(), WsEvent::JobFinished { .. }));
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
        assert!(matches!(global.recv().await.unwrap(), WsEvent::JobFinished { .. }));
        assert_eq!(publisher.job_channel_count(), 0);
    }

    #[test]
    fn test_event_wire_format() {
        let event: WsEvent = progress(JobId::new(), 1).into();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "JobProgress");
        assert_eq!(json["data"]["stage"], "summaries");
        assert_eq!(json["data"]["total_chapters"], 3);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let publisher = EventPublisher::new();
        publisher.publish_progress(progress(JobId::new(), 1));
        assert_eq!(publisher.job_channel_count(), 0);
    }

    #[test]
    fn test_unsubscribe_keeps_channel_while_others_listen() {
        let publisher = EventPublisher::new();
        let job = JobId::new();
        let first = publisher.subscribe_job(job);
        let second = publisher.subscribe_job(job);

        drop(first);
        publisher.unsubscribe_job(job);
        assert_eq!(publisher.job_channel_count(), 1);

        drop(second);
        publisher.unsubscribe_job(job);
        assert_eq!(publisher.job_channel_count(), 0);
    }
}
