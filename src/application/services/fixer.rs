//! 修正器
//!
//! 两个变体共用一个接口：结构修正器与叙事重写器
//! 本地守卫拒绝空输出与超出长度容差的输出

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::parsing::{parse_structured, preview, ParseResult};
use super::prompts;
use crate::application::error::ApplicationError;
use crate::application::ports::{GenerationPort, GenerationRequest, GenerationTask};
use crate::domain::manuscript::{Chapter, TokenUsage};
use crate::domain::review::Defect;
use crate::domain::world::WorldModel;

/// 修正器变体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixerMode {
    /// 结构、情节、世界观、连续性缺陷
    Structural,
    /// 文风、节奏、重复、时代错置缺陷
    NarrativeRewrite,
}

impl FixerMode {
    /// 按缺陷类别选择变体（同时存在时结构优先）
    pub fn for_defects(defects: &[&Defect]) -> Self {
        if defects.iter().all(|d| d.category.is_stylistic()) && !defects.is_empty() {
            FixerMode::NarrativeRewrite
        } else {
            FixerMode::Structural
        }
    }

    fn task(&self) -> GenerationTask {
        match self {
            FixerMode::Structural => GenerationTask::StructuralFix,
            FixerMode::NarrativeRewrite => GenerationTask::NarrativeRewrite,
        }
    }

    fn system_prompt(&self) -> &'static str {
        match self {
            FixerMode::Structural => prompts::STRUCTURAL_FIX_SYSTEM,
            FixerMode::NarrativeRewrite => prompts::NARRATIVE_REWRITE_SYSTEM,
        }
    }
}

/// 修改记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub before_snippet: String,
    #[serde(default)]
    pub after_snippet: String,
}

#[derive(Debug, Default, Deserialize)]
struct FixResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    changes: Vec<ChangeRecord>,
}

/// 修正结果
#[derive(Debug, Clone)]
pub enum FixOutcome {
    /// 通过本地守卫的替换内容
    Replaced {
        content: String,
        changes: Vec<ChangeRecord>,
        usage: TokenUsage,
    },
    /// 被本地守卫拒绝或无法解析
    Rejected { reason: String, usage: TokenUsage },
}

impl FixOutcome {
    pub fn usage(&self) -> &TokenUsage {
        match self {
            FixOutcome::Replaced { usage, .. } | FixOutcome::Rejected { usage, .. } => usage,
        }
    }
}

/// 长度守卫：|new − old| ≤ tolerance × old
pub fn within_length_tolerance(original: &str, candidate: &str, tolerance: f64) -> bool {
    let before = original.chars().count() as f64;
    let after = candidate.chars().count() as f64;
    if before == 0.0 {
        return after > 0.0;
    }
    ((after - before).abs() / before) <= tolerance
}

pub struct CorrectiveFixer {
    generation: Arc<dyn GenerationPort>,
    length_tolerance: f64,
}

impl CorrectiveFixer {
    pub fn new(generation: Arc<dyn GenerationPort>, length_tolerance: f64) -> Self {
        Self {
            generation,
            length_tolerance,
        }
    }

    /// 首次修正：一次调用覆盖该章节的全部缺陷
    pub async fn fix(
        &self,
        mode: FixerMode,
        chapter: &Chapter,
        defects: &[&Defect],
        model: &WorldModel,
    ) -> Result<FixOutcome, ApplicationError> {
        let user = prompts::fix_user(chapter, defects, model);
        self.run(mode, chapter, user).await
    }

    /// 升级重试：只针对一个缺陷，提示中带失败警告
    pub async fn fix_escalated(
        &self,
        mode: FixerMode,
        chapter: &Chapter,
        defect: &Defect,
        model: &WorldModel,
    ) -> Result<FixOutcome, ApplicationError> {
        let user = prompts::escalated_fix_user(chapter, defect, model);
        self.run(mode, chapter, user).await
    }

    async fn run(&self, mode: FixerMode, chapter: &Chapter, user: String) -> Result<FixOutcome, ApplicationError> {
        let request = GenerationRequest::json(mode.task(), mode.system_prompt(), user);
        let response = self.generation.generate(request).await?;
        let usage = response.usage;

        let parsed = match parse_structured::<FixResponse>(&response.content) {
            ParseResult::Parsed(parsed) => parsed,
            ParseResult::Unparseable(raw) => {
                tracing::warn!(
                    chapter = chapter.number().value(),
                    raw = %preview(&raw),
                    "Unparseable fixer response"
                );
                return Ok(FixOutcome::Rejected {
                    reason: "unparseable response".to_string(),
                    usage,
                });
            }
        };

        let content = parsed.content.trim().to_string();
        if content.is_empty() {
            return Ok(FixOutcome::Rejected {
                reason: "empty content".to_string(),
                usage,
            });
        }
        if !within_length_tolerance(chapter.current_content(), &content, self.length_tolerance) {
            tracing::warn!(
                chapter = chapter.number().value(),
                before = chapter.char_count(),
                after = content.chars().count(),
                tolerance = self.length_tolerance,
                "Fixer output outside length tolerance, rejected"
            );
            return Ok(FixOutcome::Rejected {
                reason: "length outside tolerance".to_string(),
                usage,
            });
        }

        Ok(FixOutcome::Replaced {
            content,
            changes: parsed.changes,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::manuscript::ChapterNumber;
    use crate::domain::review::{DefectCategory, Severity};
    use crate::infrastructure::adapters::generation::ScriptedGenerationClient;

    fn defect(category: DefectCategory) -> Defect {
        Defect::new(category, Severity::Major, vec![ChapterNumber::new(1)], "d", "fix")
    }

    #[test]
    fn test_mode_selection() {
        let voice = defect(DefectCategory::Voice);
        let plot = defect(DefectCategory::Plot);
        assert_eq!(FixerMode::for_defects(&[&voice]), FixerMode::NarrativeRewrite);
        assert_eq!(FixerMode::for_defects(&[&voice, &plot]), FixerMode::Structural);
    }

    #[test]
    fn test_length_tolerance() {
        let original = "x".repeat(100);
        assert!(within_length_tolerance(&original, &"y".repeat(110), 0.10));
        assert!(within_length_tolerance(&original, &"y".repeat(90), 0.10));
        assert!(!within_length_tolerance(&original, &"y".repeat(111), 0.10));
        assert!(!within_length_tolerance(&original, &"y".repeat(50), 0.10));
    }

    #[tokio::test]
    async fn test_guard_rejects_truncated_output() {
        let generation = Arc::new(ScriptedGenerationClient::new().push(
            GenerationTask::StructuralFix,
            r#"{"content": "Too short.", "changes": []}"#,
        ));
        let fixer = CorrectiveFixer::new(generation, 0.10);
        let chapter = Chapter::new(ChapterNumber::new(1), "One", "A".repeat(200));
        let d = defect(DefectCategory::Plot);

        let outcome = fixer
            .fix(FixerMode::Structural, &chapter, &[&d], &WorldModel::default())
            .await
            .unwrap();

        assert!(matches!(outcome, FixOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_accepts_replacement_within_tolerance() {
        let generation = Arc::new(ScriptedGenerationClient::new().push(
            GenerationTask::NarrativeRewrite,
            r#"{"content": "Her blue eyes narrowed.", "changes": [{"problem": "eye color", "solution": "blue", "before_snippet": "green", "after_snippet": "blue"}]}"#,
        ));
        let fixer = CorrectiveFixer::new(generation, 0.10);
        let chapter = Chapter::new(ChapterNumber::new(1), "One", "Her green eyes narrowed.");
        let d = defect(DefectCategory::Voice);

        let outcome = fixer
            .fix(FixerMode::NarrativeRewrite, &chapter, &[&d], &WorldModel::default())
            .await
            .unwrap();

        match outcome {
            FixOutcome::Replaced { content, changes, .. } => {
                assert_eq!(content, "Her blue eyes narrowed.");
                assert_eq!(changes.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
