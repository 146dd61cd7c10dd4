//! 时代错置审计：全稿一次
//!
//! 先从抽样章节推断时代背景；当代背景直接返回空列表，不发第二次调用

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{clamp_score, AuditReport, AuditScope, Auditor};
use crate::application::error::ApplicationError;
use crate::application::ports::{GenerationPort, GenerationRequest, GenerationTask, ReportKind};
use crate::application::services::parsing::{parse_structured, preview, ParseResult};
use crate::application::services::prompts;
use crate::domain::manuscript::{Chapter, ChapterNumber};
use crate::domain::review::{Defect, DefectCategory, Severity};
use crate::domain::world::WorldModel;

#[derive(Debug, Default, Deserialize)]
struct PeriodResponse {
    #[serde(default)]
    is_contemporary: bool,
    #[serde(default)]
    setting_period: Option<String>,
}

/// 一处时代错置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Anachronism {
    #[serde(default)]
    pub chapter: Option<i32>,
    #[serde(default)]
    pub excerpt: String,
    /// technological | linguistic | material | conceptual
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub replacement: String,
}

impl Anachronism {
    fn into_defect(self) -> Defect {
        let description = if self.explanation.trim().is_empty() {
            format!("{} anachronism: \"{}\"", self.kind.trim(), self.excerpt.trim())
        } else {
            format!(
                "{} anachronism: \"{}\" ({})",
                self.kind.trim(),
                self.excerpt.trim(),
                self.explanation.trim()
            )
        };
        let instruction = if self.replacement.trim().is_empty() || self.excerpt.trim().is_empty() {
            String::new()
        } else {
            format!(
                "Replace \"{}\" with \"{}\"",
                self.excerpt.trim(),
                self.replacement.trim()
            )
        };
        Defect::new(
            DefectCategory::Anachronism,
            Severity::parse_lenient(&self.severity),
            self.chapter.map(ChapterNumber::new).into_iter().collect(),
            description,
            instruction,
        )
    }
}

#[derive(Debug, Default, Deserialize)]
struct AnachronismResponse {
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    anachronisms: Vec<Anachronism>,
}

/// 抽样：首章、末章以及均匀分布的中间章节
pub fn sample_chapters<'a>(chapters: &[&'a Chapter], sample_size: usize) -> Vec<&'a Chapter> {
    let n = chapters.len();
    let size = sample_size.max(1);
    if n <= size {
        return chapters.to_vec();
    }
    if size == 1 {
        return vec![chapters[0]];
    }
    let mut indices: Vec<usize> = (0..size).map(|i| i * (n - 1) / (size - 1)).collect();
    indices.dedup();
    indices.into_iter().map(|i| chapters[i]).collect()
}

pub struct AnachronismAuditor {
    generation: Arc<dyn GenerationPort>,
    sample_size: usize,
    excerpt_chars: usize,
}

impl AnachronismAuditor {
    pub fn new(generation: Arc<dyn GenerationPort>, sample_size: usize, excerpt_chars: usize) -> Self {
        Self {
            generation,
            sample_size,
            excerpt_chars,
        }
    }
}

#[async_trait]
impl Auditor for AnachronismAuditor {
    fn kind(&self) -> ReportKind {
        ReportKind::Anachronism
    }

    fn scope(&self) -> AuditScope {
        AuditScope::once()
    }

    async fn run(&self, chapters: &[&Chapter], _model: &WorldModel) -> Result<AuditReport, ApplicationError> {
        let samples = sample_chapters(chapters, self.sample_size);
        let mut report = AuditReport::new(self.kind(), chapters);

        let response = self
            .generation
            .generate(GenerationRequest::json(
                GenerationTask::PeriodDetection,
                prompts::PERIOD_DETECTION_SYSTEM,
                prompts::period_detection_user(&samples, self.excerpt_chars),
            ))
            .await?;
        report.usage.add(&response.usage);

        let period = match parse_structured::<PeriodResponse>(&response.content) {
            ParseResult::Parsed(period) => period,
            ParseResult::Unparseable(raw) => {
                tracing::warn!(raw = %preview(&raw), "Unparseable period detection, skipping anachronism audit");
                return Ok(report);
            }
        };
        let setting = period
            .setting_period
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        if period.is_contemporary {
            tracing::info!(period = ?setting, "Contemporary setting, no anachronism audit needed");
            report.parsed = true;
            report.score = Some(10);
            report.details = serde_json::json!({
                "is_contemporary": true,
                "setting_period": setting,
                "anachronisms": [],
            });
            return Ok(report);
        }

        let setting = setting.unwrap_or_else(|| "unspecified historical period".to_string());
        let response = self
            .generation
            .generate(GenerationRequest::json(
                GenerationTask::AnachronismAudit,
                prompts::ANACHRONISM_AUDIT_SYSTEM,
                prompts::anachronism_user(&setting, &samples),
            ))
            .await?;
        report.usage.add(&response.usage);

        let parsed = match parse_structured::<AnachronismResponse>(&response.content) {
            ParseResult::Parsed(parsed) => parsed,
            ParseResult::Unparseable(raw) => {
                tracing::warn!(raw = %preview(&raw), "Unparseable anachronism audit, treating as empty");
                report.details = serde_json::json!({"is_contemporary": false, "setting_period": setting});
                return Ok(report);
            }
        };

        report.parsed = true;
        report.score = parsed.score.map(clamp_score);
        report.details = serde_json::json!({
            "is_contemporary": false,
            "setting_period": setting,
            "anachronisms": parsed.anachronisms,
        });
        report.defects = parsed
            .anachronisms
            .into_iter()
            .filter(|a| !a.excerpt.trim().is_empty())
            .map(Anachronism::into_defect)
            .collect();

        tracing::info!(
            period = %setting,
            found = report.defects.len(),
            "Anachronism audit completed"
        );
        Ok(report)
    }
}
