//! Manuscript Context - 稿件限界上下文
//!
//! 职责:
//! - 稿件聚合管理
//! - 章节实体与派生排序
//! - 生命周期状态与 token 统计

mod aggregate;
mod entities;
mod errors;
mod value_objects;

pub use aggregate::Manuscript;
pub use entities::Chapter;
pub use errors::ManuscriptError;
pub use value_objects::{
    ChapterKind, ChapterNumber, ChapterStatus, ManuscriptId, ManuscriptStatus, TokenUsage,
};
