//! Manuscript Queries

use uuid::Uuid;

/// 获取稿件详情（含章节）
#[derive(Debug, Clone)]
pub struct GetManuscript {
    pub manuscript_id: Uuid,
}

/// 列出稿件的分析报告
#[derive(Debug, Clone)]
pub struct ListAnalysisReports {
    pub manuscript_id: Uuid,
    /// 报告类型，如 "continuity"
    pub kind: Option<String>,
}

/// 获取稿件某语言的译文
#[derive(Debug, Clone)]
pub struct GetTranslation {
    pub manuscript_id: Uuid,
    pub target_language: String,
}
