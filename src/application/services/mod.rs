//! 应用服务 - 修订流水线各阶段
//!
//! 每个服务只依赖端口；生成调用的并发上限由 `PipelineSettings` 控制

mod architect;
mod context;
mod correction;
mod escalation;
mod final_review;
mod fixer;
mod job_runner;
mod parsing;
mod pipeline;
mod prompts;
mod settings;
mod summarizer;
mod translation;
mod world_extractor;

pub mod auditors;

#[cfg(test)]
pub mod testing;

pub use architect::{cliff_score, structural_problems, ArchitectAnalyzer, ArchitectReport, ReorderMove};
pub use context::{JobContext, UnitTracker};
pub use correction::{ChapterCorrector, CorrectionRound};
pub use escalation::{ChapterCorrection, EscalationPolicy};
pub use final_review::{FinalReviewer, ReviewOutcome};
pub use fixer::{within_length_tolerance, ChangeRecord, CorrectiveFixer, FixOutcome, FixerMode};
pub use job_runner::JobRunner;
pub use parsing::{parse_structured, ParseResult};
pub use pipeline::{RevisionOutcome, RevisionPipeline};
pub use settings::PipelineSettings;
pub use summarizer::{ChapterSummarizer, SummaryStats};
pub use translation::{pending_chapters, TranslationExecutor, TranslationOutcome};
pub use world_extractor::{ExtractionOutcome, WorldModelExtractor};
