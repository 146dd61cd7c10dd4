//! Job Queries

use uuid::Uuid;

/// 获取任务快照
#[derive(Debug, Clone)]
pub struct GetJob {
    pub job_id: Uuid,
}

/// 列出稿件的全部任务
#[derive(Debug, Clone)]
pub struct ListManuscriptJobs {
    pub manuscript_id: Uuid,
}

/// 列出任务的终审轮次
#[derive(Debug, Clone)]
pub struct ListReviewPasses {
    pub job_id: Uuid,
}
