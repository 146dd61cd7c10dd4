//! 定期质量审计
//!
//! 一个 `Auditor` trait，四个实现；触发方式与窗口由 `AuditScope` 描述

mod anachronism;
mod continuity;
mod repetition;
mod scheduler;
mod voice_rhythm;

pub use anachronism::{sample_chapters, AnachronismAuditor};
pub use continuity::ContinuityAuditor;
pub use repetition::RepetitionAuditor;
pub use scheduler::{audit_windows, AuditOutcome, AuditScheduler};
pub use voice_rhythm::VoiceRhythmAuditor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::parsing::{lenient_list, lenient_score, parse_structured, preview, ParseResult, RawDefect};
use crate::application::error::ApplicationError;
use crate::application::ports::{GenerationPort, GenerationRequest, GenerationTask, ReportKind};
use crate::domain::manuscript::{Chapter, ChapterNumber, TokenUsage};
use crate::domain::review::{Defect, DefectCategory};
use crate::domain::world::WorldModel;

/// 审计触发方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditTrigger {
    /// 每 N 章触发一次，审计最近 N 章
    EveryChapters(usize),
    /// 全稿只审计一次
    Once,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditScope {
    pub trigger: AuditTrigger,
}

impl AuditScope {
    pub fn every(chapters: usize) -> Self {
        Self {
            trigger: AuditTrigger::EveryChapters(chapters.max(1)),
        }
    }

    pub fn once() -> Self {
        Self {
            trigger: AuditTrigger::Once,
        }
    }
}

/// 审计结果
///
/// 子分数只作为终审提示的输入，从不替代终审分数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub kind: ReportKind,
    pub window: Option<(ChapterNumber, ChapterNumber)>,
    pub score: Option<u8>,
    pub defects: Vec<Defect>,
    pub details: serde_json::Value,
    pub parsed: bool,
    #[serde(skip)]
    pub usage: TokenUsage,
}

impl AuditReport {
    pub fn new(kind: ReportKind, chapters: &[&Chapter]) -> Self {
        let window = match (chapters.first(), chapters.last()) {
            (Some(first), Some(last)) => Some((first.number(), last.number())),
            _ => None,
        };
        Self {
            kind,
            window,
            score: None,
            defects: Vec::new(),
            details: serde_json::Value::Null,
            parsed: false,
            usage: TokenUsage::default(),
        }
    }

    /// 终审提示中的一行
    pub fn note(&self) -> String {
        let window = match self.window {
            Some((first, last)) if first == last => format!(" [{}]", first.label()),
            Some((first, last)) => format!(" [{} to {}]", first.label(), last.label()),
            None => String::new(),
        };
        let score = self
            .score
            .map(|s| format!("{}/10", s))
            .unwrap_or_else(|| "n/a".to_string());
        format!("{}{}: {}, {} finding(s)", self.kind.as_str(), window, score, self.defects.len())
    }
}

/// Auditor trait
#[async_trait]
pub trait Auditor: Send + Sync {
    fn kind(&self) -> ReportKind;

    fn scope(&self) -> AuditScope;

    /// 审计一个窗口（`Once` 审计收到全部章节）
    async fn run(&self, chapters: &[&Chapter], model: &WorldModel) -> Result<AuditReport, ApplicationError>;
}

#[derive(Debug, Default, Deserialize)]
struct WindowAuditResponse {
    #[serde(default, deserialize_with = "lenient_score")]
    score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_list")]
    defects: Vec<RawDefect>,
    #[serde(default)]
    details: serde_json::Value,
}

/// 分数规范到 0-10
pub(crate) fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        0
    } else {
        raw.round().clamp(0.0, 10.0) as u8
    }
}

/// 窗口审计的通用流程：一次调用，解析 `{score, defects, details}`
pub(crate) async fn window_audit(
    generation: &Arc<dyn GenerationPort>,
    kind: ReportKind,
    task: GenerationTask,
    system: String,
    user: String,
    default_category: DefectCategory,
    chapters: &[&Chapter],
) -> Result<AuditReport, ApplicationError> {
    let response = generation.generate(GenerationRequest::json(task, system, user)).await?;
    let mut report = AuditReport::new(kind, chapters);
    report.usage = response.usage;

    match parse_structured::<WindowAuditResponse>(&response.content) {
        ParseResult::Parsed(parsed) => {
            report.parsed = true;
            report.score = parsed.score.map(clamp_score);
            report.details = parsed.details;
            report.defects = parsed
                .defects
                .into_iter()
                .map(|d| d.into_defect(default_category))
                .filter(|d| !d.description.is_empty())
                .collect();
        }
        ParseResult::Unparseable(raw) => {
            tracing::warn!(
                kind = kind.as_str(),
                raw = %preview(&raw),
                "Unparseable audit response, treating as empty"
            );
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(7.4), 7);
        assert_eq!(clamp_score(12.0), 10);
        assert_eq!(clamp_score(-3.0), 0);
        assert_eq!(clamp_score(f64::NAN), 0);
    }

    #[test]
    fn test_report_kind_serde() {
        let json = serde_json::to_string(&ReportKind::VoiceRhythm).unwrap();
        assert_eq!(json, "\"voice_rhythm\"");
        let kind: ReportKind = serde_json::from_str("\"anachronism\"").unwrap();
        assert_eq!(kind, ReportKind::Anachronism);
    }

    #[test]
    fn test_note_format() {
        let mut report = AuditReport::new(ReportKind::Continuity, &[]);
        report.window = Some((ChapterNumber::new(1), ChapterNumber::new(5)));
        report.score = Some(8);
        assert_eq!(report.note(), "continuity [Chapter 1 to Chapter 5]: 8/10, 0 finding(s)");
    }
}
