//! Manuscript Context - Entities

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ChapterNumber, ChapterStatus, TokenUsage};
use crate::domain::text_similarity::content_hash;

/// 章节实体
///
/// 不变量:
/// - edited_content 一旦非空，即为后续所有阶段的权威内容
/// - edited_content 只由修订阶段写入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    id: Uuid,
    number: ChapterNumber,
    /// 导入时的原始位置（来源顺序）
    position: usize,
    title: String,
    original_content: String,
    edited_content: Option<String>,
    summary: Option<String>,
    /// 生成摘要时所依据内容的哈希
    summary_hash: Option<String>,
    status: ChapterStatus,
    token_usage: TokenUsage,
}

impl Chapter {
    pub fn new(number: ChapterNumber, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            number,
            position: 0,
            title: title.into(),
            original_content: content.into(),
            edited_content: None,
            summary: None,
            summary_hash: None,
            status: ChapterStatus::Pending,
            token_usage: TokenUsage::default(),
        }
    }

    /// 从持久化数据重建
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        number: ChapterNumber,
        position: usize,
        title: String,
        original_content: String,
        edited_content: Option<String>,
        summary: Option<String>,
        summary_hash: Option<String>,
        status: ChapterStatus,
        token_usage: TokenUsage,
    ) -> Self {
        Self {
            id,
            number,
            position,
            title,
            original_content,
            edited_content,
            summary,
            summary_hash,
            status,
            token_usage,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn number(&self) -> ChapterNumber {
        self.number
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn original_content(&self) -> &str {
        &self.original_content
    }

    pub fn edited_content(&self) -> Option<&str> {
        self.edited_content.as_deref()
    }

    /// 当前权威内容
    pub fn current_content(&self) -> &str {
        self.edited_content
            .as_deref()
            .unwrap_or(&self.original_content)
    }

    pub fn current_hash(&self) -> String {
        content_hash(self.current_content())
    }

    pub fn char_count(&self) -> usize {
        self.current_content().chars().count()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn summary_hash(&self) -> Option<&str> {
        self.summary_hash.as_deref()
    }

    /// 摘要是否与当前内容一致
    pub fn has_fresh_summary(&self) -> bool {
        match (&self.summary, &self.summary_hash) {
            (Some(summary), Some(hash)) => !summary.trim().is_empty() && *hash == self.current_hash(),
            _ => false,
        }
    }

    pub fn status(&self) -> ChapterStatus {
        self.status
    }

    pub fn token_usage(&self) -> &TokenUsage {
        &self.token_usage
    }

    /// 写入修订后的内容
    pub fn apply_edit(&mut self, content: String) {
        self.edited_content = Some(content);
        self.status = ChapterStatus::Completed;
    }

    pub fn set_summary(&mut self, summary: String) {
        self.summary_hash = Some(self.current_hash());
        self.summary = Some(summary);
    }

    pub fn set_status(&mut self, status: ChapterStatus) {
        self.status = status;
    }

    pub fn record_usage(&mut self, usage: &TokenUsage) {
        self.token_usage.add(usage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edited_content_is_authoritative() {
        let mut chapter = Chapter::new(ChapterNumber::new(1), "One", "original text");
        assert_eq!(chapter.current_content(), "original text");

        chapter.apply_edit("edited text".to_string());
        assert_eq!(chapter.current_content(), "edited text");
        assert_eq!(chapter.original_content(), "original text");
        assert_eq!(chapter.status(), ChapterStatus::Completed);
    }

    #[test]
    fn test_summary_goes_stale_after_edit() {
        let mut chapter = Chapter::new(ChapterNumber::new(1), "One", "original text");
        chapter.set_summary("a summary".to_string());
        assert!(chapter.has_fresh_summary());

        chapter.apply_edit("rewritten text".to_string());
        assert!(!chapter.has_fresh_summary());
    }
}
