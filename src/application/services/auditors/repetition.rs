//! 语义重复审计：全稿一次，只读摘要

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{clamp_score, AuditReport, AuditScope, Auditor};
use crate::application::error::ApplicationError;
use crate::application::ports::{GenerationPort, GenerationRequest, GenerationTask, ReportKind};
use crate::application::services::parsing::{
    lenient_list, lenient_score, parse_structured, preview, ParseResult, RawDefect,
};
use crate::application::services::prompts;
use crate::domain::manuscript::{Chapter, ChapterNumber};
use crate::domain::review::{Defect, DefectCategory, Severity};
use crate::domain::world::WorldModel;

/// 埋下但未回收的伏笔
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Foreshadowing {
    #[serde(default)]
    pub planted_in: Option<i32>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
struct RepetitionResponse {
    #[serde(default, deserialize_with = "lenient_score")]
    score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_list")]
    defects: Vec<RawDefect>,
    #[serde(default, deserialize_with = "lenient_list")]
    unresolved_foreshadowing: Vec<Foreshadowing>,
    #[serde(default)]
    details: serde_json::Value,
}

pub struct RepetitionAuditor {
    generation: Arc<dyn GenerationPort>,
    fallback_chars: usize,
}

impl RepetitionAuditor {
    pub fn new(generation: Arc<dyn GenerationPort>, fallback_chars: usize) -> Self {
        Self {
            generation,
            fallback_chars,
        }
    }
}

#[async_trait]
impl Auditor for RepetitionAuditor {
    fn kind(&self) -> ReportKind {
        ReportKind::Repetition
    }

    fn scope(&self) -> AuditScope {
        AuditScope::once()
    }

    async fn run(&self, chapters: &[&Chapter], _model: &WorldModel) -> Result<AuditReport, ApplicationError> {
        let summaries = prompts::summaries_block(chapters, self.fallback_chars);
        let request = GenerationRequest::json(
            GenerationTask::RepetitionAudit,
            prompts::with_defect_schema(prompts::REPETITION_AUDIT_SYSTEM),
            prompts::repetition_user(&summaries),
        );
        let response = self.generation.generate(request).await?;
        let mut report = AuditReport::new(self.kind(), chapters);
        report.usage = response.usage;

        let parsed = match parse_structured::<RepetitionResponse>(&response.content) {
            ParseResult::Parsed(parsed) => parsed,
            ParseResult::Unparseable(raw) => {
                tracing::warn!(raw = %preview(&raw), "Unparseable repetition audit, treating as empty");
                return Ok(report);
            }
        };

        report.parsed = true;
        report.score = parsed.score.map(clamp_score);
        report.defects = parsed
            .defects
            .into_iter()
            .map(|d| d.into_defect(DefectCategory::Repetition))
            .filter(|d| !d.description.is_empty())
            .collect();

        // 伏笔只作记录，没有修正指令
        for item in parsed.unresolved_foreshadowing.iter().filter(|f| !f.description.trim().is_empty()) {
            report.defects.push(Defect::new(
                DefectCategory::Plot,
                Severity::Minor,
                item.planted_in.map(ChapterNumber::new).into_iter().collect(),
                format!("Unresolved foreshadowing: {}", item.description.trim()),
                String::new(),
            ));
        }
        report.details = serde_json::json!({
            "overview": parsed.details,
            "unresolved_foreshadowing": parsed.unresolved_foreshadowing,
        });
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::testing::manuscript_with;
    use crate::infrastructure::adapters::generation::ScriptedGenerationClient;

    #[tokio::test]
    async fn test_repetition_and_foreshadowing() {
        let generation = Arc::new(ScriptedGenerationClient::new().push(
            GenerationTask::RepetitionAudit,
            r#"{"score": 7,
                "defects": [{"severity":"minor","affected_chapters":[2,5],"description":"The gull image repeats",
                             "correction_instruction":"Replace the gull in chapter 5"}],
                "unresolved_foreshadowing": [{"planted_in": 1, "description": "The locked box is never opened"}]}"#,
        ));
        let manuscript = manuscript_with(&[(1, "a"), (2, "b"), (5, "c")]);
        let chapters: Vec<&Chapter> = manuscript.chapters().iter().collect();
        let auditor = RepetitionAuditor::new(generation.clone(), 100);

        let report = auditor.run(&chapters, &WorldModel::default()).await.unwrap();

        assert_eq!(report.defects.len(), 2);
        assert_eq!(report.defects[0].category, DefectCategory::Repetition);
        assert!(report.defects[0].is_actionable());
        assert!(!report.defects[1].is_actionable());
        assert!(report.defects[1].affects(ChapterNumber::new(1)));
        assert_eq!(report.details["unresolved_foreshadowing"][0]["planted_in"], 1);

        // 提示中只有摘要（未生成摘要时用摘录）
        let prompt = &generation.requests()[0].user_prompt;
        assert!(prompt.contains("[Chapter 5 | number 5]"));
    }
}
