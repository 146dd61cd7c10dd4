//! Domain Layer - 领域层
//!
//! 包含四个限界上下文:
//! - Manuscript Context: 稿件与章节
//! - Review Context: 缺陷、审阅轮次与收敛
//! - World Context: 世界模型
//! - Job Context: 长时任务与检查点

pub mod job;
pub mod manuscript;
pub mod review;
pub mod world;

// 纯函数分析
pub mod structure;
pub mod text_similarity;

pub use structure::{analyze_structure, ChapterDigest, StructuralReport};
