//! Manuscript Context - Errors

use thiserror::Error;

use super::{ChapterNumber, ManuscriptId};

#[derive(Debug, Error)]
pub enum ManuscriptError {
    #[error("稿件不存在: {0}")]
    NotFound(ManuscriptId),

    #[error("章节不存在: {0}")]
    ChapterNotFound(ChapterNumber),

    #[error("无效的标题: {0}")]
    InvalidTitle(String),

    #[error("无效的状态迁移: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}
