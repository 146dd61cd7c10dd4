//! 重试升级策略
//!
//! 修正 → 独立校验 → 未生效则以升级措辞重发一次 → 再校验 → 仍未生效记为未解决
//! 每轮每个缺陷最多升级一次

use serde::Deserialize;
use std::sync::Arc;

use super::fixer::{ChangeRecord, CorrectiveFixer, FixOutcome, FixerMode};
use super::parsing::{parse_structured, ParseResult};
use super::prompts;
use crate::application::error::ApplicationError;
use crate::application::ports::{GenerationPort, GenerationRequest, GenerationTask};
use crate::domain::manuscript::{Chapter, ChapterNumber, TokenUsage};
use crate::domain::review::Defect;
use crate::domain::world::WorldModel;

#[derive(Debug, Default, Deserialize)]
struct VerificationResponse {
    #[serde(default)]
    applied: bool,
    #[serde(default)]
    evidence: String,
}

/// 单章修正结果
#[derive(Debug, Clone, Default)]
pub struct ChapterCorrection {
    pub chapter: Option<ChapterNumber>,
    /// 最终被接受的内容；None 表示原文不变
    pub content: Option<String>,
    pub resolved: Vec<Defect>,
    pub unresolved: Vec<Defect>,
    pub changes: Vec<ChangeRecord>,
    pub escalations: u32,
    pub usage: TokenUsage,
}

pub struct EscalationPolicy {
    fixer: CorrectiveFixer,
    generation: Arc<dyn GenerationPort>,
}

impl EscalationPolicy {
    pub fn new(generation: Arc<dyn GenerationPort>, length_tolerance: f64) -> Self {
        Self {
            fixer: CorrectiveFixer::new(generation.clone(), length_tolerance),
            generation,
        }
    }

    /// 修正一个章节的全部可执行缺陷
    pub async fn correct_chapter(
        &self,
        chapter: &Chapter,
        defects: &[&Defect],
        model: &WorldModel,
    ) -> Result<ChapterCorrection, ApplicationError> {
        let mut correction = ChapterCorrection {
            chapter: Some(chapter.number()),
            ..Default::default()
        };
        if defects.is_empty() {
            return Ok(correction);
        }

        let original = chapter.current_content().to_string();
        let mode = FixerMode::for_defects(defects);
        let outcome = self.fixer.fix(mode, chapter, defects, model).await?;
        correction.usage.add(outcome.usage());

        let mut unapplied: Vec<&Defect> = Vec::new();
        match outcome {
            FixOutcome::Replaced { content, changes, .. } => {
                for defect in defects {
                    if self.verify(defect, &original, &content, &mut correction.usage).await? {
                        correction.resolved.push((*defect).clone());
                    } else {
                        unapplied.push(defect);
                    }
                }
                correction.changes.extend(changes);
                correction.content = Some(content);
            }
            FixOutcome::Rejected { reason, .. } => {
                tracing::debug!(
                    chapter = chapter.number().value(),
                    reason = %reason,
                    "First fix rejected, escalating every defect"
                );
                unapplied.extend(defects.iter().copied());
            }
        }

        for defect in unapplied {
            correction.escalations += 1;
            let mut working = chapter.clone();
            if let Some(content) = &correction.content {
                working.apply_edit(content.clone());
            }

            let mode = FixerMode::for_defects(&[defect]);
            let outcome = self.fixer.fix_escalated(mode, &working, defect, model).await?;
            correction.usage.add(outcome.usage());

            let applied = match outcome {
                FixOutcome::Replaced { content, changes, .. } => {
                    if self.verify(defect, &original, &content, &mut correction.usage).await? {
                        correction.changes.extend(changes);
                        correction.content = Some(content);
                        true
                    } else {
                        false
                    }
                }
                FixOutcome::Rejected { .. } => false,
            };

            if applied {
                correction.resolved.push(defect.clone());
            } else {
                tracing::warn!(
                    chapter = chapter.number().value(),
                    description = %defect.description,
                    "Defect unresolved after escalation"
                );
                correction.unresolved.push(defect.clone());
            }
        }

        tracing::info!(
            chapter = chapter.number().value(),
            resolved = correction.resolved.len(),
            unresolved = correction.unresolved.len(),
            escalations = correction.escalations,
            "Chapter correction finished"
        );
        Ok(correction)
    }

    /// 独立校验；无法解析视为未生效
    async fn verify(
        &self,
        defect: &Defect,
        before: &str,
        after: &str,
        usage: &mut TokenUsage,
    ) -> Result<bool, ApplicationError> {
        let request = GenerationRequest::json(
            GenerationTask::Verification,
            prompts::VERIFICATION_SYSTEM,
            prompts::verification_user(&defect.correction_instruction, before, after),
        );
        let response = self.generation.generate(request).await?;
        usage.add(&response.usage);

        match parse_structured::<VerificationResponse>(&response.content) {
            ParseResult::Parsed(verdict) => {
                tracing::debug!(
                    applied = verdict.applied,
                    evidence = %verdict.evidence,
                    "Verification result"
                );
                Ok(verdict.applied)
            }
            ParseResult::Unparseable(_) => {
                tracing::warn!("Unparseable verification, treating as unapplied");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::review::{DefectCategory, Severity};
    use crate::infrastructure::adapters::generation::ScriptedGenerationClient;

    const ORIGINAL: &str = "Elena looked up. Her green eyes narrowed at the harbor.";
    const FIXED: &str = "Elena looked up. Her blue eyes narrowed at the harbor.";

    fn fix_json(content: &str) -> String {
        serde_json::json!({"content": content, "changes": []}).to_string()
    }

    fn eye_defect() -> Defect {
        Defect::new(
            DefectCategory::Continuity,
            Severity::Major,
            vec![ChapterNumber::new(3)],
            "Eye color changes from blue to green",
            "Change Elena's green eyes to blue",
        )
    }

    fn chapter() -> Chapter {
        Chapter::new(ChapterNumber::new(3), "Three", ORIGINAL)
    }

    #[tokio::test]
    async fn test_applied_on_first_try() {
        let generation = Arc::new(
            ScriptedGenerationClient::new()
                .push(GenerationTask::StructuralFix, fix_json(FIXED))
                .push(GenerationTask::Verification, r#"{"applied": true}"#),
        );
        let policy = EscalationPolicy::new(generation.clone(), 0.10);
        let defect = eye_defect();

        let result = policy
            .correct_chapter(&chapter(), &[&defect], &WorldModel::default())
            .await
            .unwrap();

        assert_eq!(result.content.as_deref(), Some(FIXED));
        assert_eq!(result.resolved.len(), 1);
        assert_eq!(result.escalations, 0);
    }

    #[tokio::test]
    async fn test_single_escalation_then_resolved() {
        let generation = Arc::new(
            ScriptedGenerationClient::new()
                .push(GenerationTask::StructuralFix, fix_json(ORIGINAL))
                .push(GenerationTask::Verification, r#"{"applied": false}"#)
                .push(GenerationTask::StructuralFix, fix_json(FIXED))
                .push(GenerationTask::Verification, r#"{"applied": true}"#),
        );
        let policy = EscalationPolicy::new(generation.clone(), 0.10);
        let defect = eye_defect();

        let result = policy
            .correct_chapter(&chapter(), &[&defect], &WorldModel::default())
            .await
            .unwrap();

        assert_eq!(result.escalations, 1);
        assert_eq!(result.resolved.len(), 1);
        assert!(result.unresolved.is_empty());
        assert_eq!(result.content.as_deref(), Some(FIXED));

        let requests = generation.requests();
        let escalated = &requests[2];
        assert!(escalated.user_prompt.starts_with("WARNING"));
        assert!(escalated.user_prompt.contains("Change Elena's green eyes to blue"));
    }

    #[tokio::test]
    async fn test_unresolved_after_one_escalation() {
        let generation = Arc::new(
            ScriptedGenerationClient::new()
                .with_default(GenerationTask::StructuralFix, fix_json(ORIGINAL))
                .with_default(GenerationTask::Verification, "no idea"),
        );
        let policy = EscalationPolicy::new(generation.clone(), 0.10);
        let defect = eye_defect();

        let result = policy
            .correct_chapter(&chapter(), &[&defect], &WorldModel::default())
            .await
            .unwrap();

        assert_eq!(result.escalations, 1);
        assert_eq!(result.unresolved.len(), 1);
        // 一次修正 + 一次升级
        assert_eq!(generation.calls_for(GenerationTask::StructuralFix), 2);
        assert_eq!(generation.calls_for(GenerationTask::Verification), 2);
    }

    #[tokio::test]
    async fn test_rejected_fix_escalates_each_defect_once() {
        let generation = Arc::new(
            ScriptedGenerationClient::new()
                .with_default(GenerationTask::StructuralFix, r#"{"content": ""}"#)
                .with_default(GenerationTask::Verification, r#"{"applied": true}"#),
        );
        let policy = EscalationPolicy::new(generation.clone(), 0.10);
        let first = eye_defect();
        let mut second = eye_defect();
        second.description = "Harbor is misnamed".to_string();

        let result = policy
            .correct_chapter(&chapter(), &[&first, &second], &WorldModel::default())
            .await
            .unwrap();

        assert_eq!(result.escalations, 2);
        assert_eq!(result.unresolved.len(), 2);
        assert!(result.content.is_none());
        assert_eq!(generation.calls_for(GenerationTask::Verification), 0);
    }
}
