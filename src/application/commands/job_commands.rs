//! Job Commands

use uuid::Uuid;

/// 启动修订任务
#[derive(Debug, Clone)]
pub struct StartRevision {
    pub manuscript_id: Uuid,
}

/// 启动翻译任务
#[derive(Debug, Clone)]
pub struct StartTranslation {
    pub manuscript_id: Uuid,
    pub target_language: String,
}

/// 取消任务
#[derive(Debug, Clone)]
pub struct CancelJob {
    pub job_id: Uuid,
}

/// 恢复任务（error / cancelled / 冻结的 running）
#[derive(Debug, Clone)]
pub struct ResumeJob {
    pub job_id: Uuid,
}
