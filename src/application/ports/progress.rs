//! Progress Port - 进度推送
//!
//! 尽力而为：没有订阅者时事件直接丢弃

use serde::Serialize;

use crate::domain::job::{JobId, JobStage};
use crate::domain::manuscript::ManuscriptId;

/// 进度事件
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub manuscript_id: ManuscriptId,
    pub stage: JobStage,
    pub current_chapter: u32,
    pub total_chapters: u32,
    pub message: String,
}

/// 任务终态事件
#[derive(Debug, Clone, Serialize)]
pub struct JobFinishedEvent {
    pub job_id: JobId,
    pub manuscript_id: ManuscriptId,
    pub status: String,
    pub message: Option<String>,
}

/// Progress Sink Port
pub trait ProgressSink: Send + Sync {
    fn publish_progress(&self, event: ProgressEvent);

    fn publish_finished(&self, event: JobFinishedEvent);
}
