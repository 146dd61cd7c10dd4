//! 修正轮次
//!
//! 把可执行缺陷按章节分组，每章同一时刻最多一个修正动作，章节之间有界并发

use futures_util::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use super::context::UnitTracker;
use super::escalation::EscalationPolicy;
use super::settings::PipelineSettings;
use crate::application::error::ApplicationError;
use crate::application::ports::{GenerationPort, ManuscriptRepositoryPort};
use crate::domain::job::JobStage;
use crate::domain::manuscript::{Chapter, ChapterStatus, Manuscript};
use crate::domain::review::Defect;
use crate::domain::world::WorldModel;

/// 一轮修正的汇总
#[derive(Debug, Clone, Default)]
pub struct CorrectionRound {
    pub resolved: Vec<Defect>,
    pub unresolved: Vec<Defect>,
    pub chapters_changed: usize,
    pub escalations: u32,
}

impl CorrectionRound {
    pub fn resolved_descriptions(&self) -> Vec<String> {
        self.resolved.iter().map(|d| d.description.clone()).collect()
    }
}

pub struct ChapterCorrector {
    policy: Arc<EscalationPolicy>,
    manuscripts: Arc<dyn ManuscriptRepositoryPort>,
    settings: PipelineSettings,
}

impl ChapterCorrector {
    pub fn new(
        generation: Arc<dyn GenerationPort>,
        manuscripts: Arc<dyn ManuscriptRepositoryPort>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            policy: Arc::new(EscalationPolicy::new(generation, settings.length_tolerance)),
            manuscripts,
            settings,
        }
    }

    /// 修正全部可执行缺陷；跨多章的缺陷只要有一章未解决即视为未解决
    pub async fn correct(
        &self,
        manuscript: &mut Manuscript,
        defects: &[Defect],
        model: &WorldModel,
        stage: JobStage,
        tracker: &dyn UnitTracker,
    ) -> Result<CorrectionRound, ApplicationError> {
        let mut round = CorrectionRound::default();
        // 按章节 id 分组：编号重复时每个副本都单独修正
        let mut by_chapter: BTreeMap<Uuid, (Chapter, Vec<Defect>)> = BTreeMap::new();
        for defect in defects.iter().filter(|d| d.is_actionable()) {
            for number in &defect.affected_chapters {
                let mut matched = false;
                for chapter in manuscript.chapters_numbered(*number) {
                    matched = true;
                    let (_, grouped) = by_chapter
                        .entry(chapter.id())
                        .or_insert_with(|| (chapter.clone(), Vec::new()));
                    push_unique(grouped, defect);
                }
                if !matched {
                    tracing::warn!(
                        chapter = number.value(),
                        description = %defect.description,
                        "Defect references unknown chapter"
                    );
                    push_unique(&mut round.unresolved, defect);
                }
            }
        }
        if by_chapter.is_empty() {
            return Ok(round);
        }

        let total = by_chapter.len() as u32;
        tracing::info!(
            manuscript_id = %manuscript.id(),
            stage = stage.as_str(),
            chapters = total,
            "Starting correction round"
        );

        let model = Arc::new(model.clone());
        let pending: Vec<_> = by_chapter
            .into_iter()
            .map(|(id, (chapter, defects))| {
                let policy = self.policy.clone();
                let model = model.clone();
                let cancel = tracker.cancel_signal();
                async move {
                    if cancel.is_cancelled() {
                        return (id, chapter.number(), None);
                    }
                    let refs: Vec<&Defect> = defects.iter().collect();
                    let result = policy.correct_chapter(&chapter, &refs, &model).await;
                    (id, chapter.number(), Some(result))
                }
            })
            .collect();
        let mut results = stream::iter(pending).buffer_unordered(self.settings.max_concurrent_calls.max(1));

        let mut done = 0u32;
        while let Some((id, number, result)) = results.next().await {
            let Some(result) = result else { continue };
            if tracker.is_cancelled() {
                continue;
            }
            let correction = result?;

            let chapter = manuscript
                .chapter_by_id_mut(id)
                .ok_or_else(|| ApplicationError::internal(format!("chapter {} vanished", number.value())))?;
            if let Some(content) = correction.content.filter(|c| c != chapter.current_content()) {
                chapter.apply_edit(content);
                round.chapters_changed += 1;
            }
            chapter.record_usage(&correction.usage);
            chapter.set_status(ChapterStatus::Completed);
            let snapshot = chapter.clone();
            self.manuscripts.save_chapter(manuscript.id(), &snapshot).await?;

            round.escalations += correction.escalations;
            for defect in &correction.resolved {
                push_unique(&mut round.resolved, defect);
            }
            for defect in &correction.unresolved {
                push_unique(&mut round.unresolved, defect);
            }

            done += 1;
            tracker
                .unit_done(stage, done, total, &format!("Corrected {}", number.label()))
                .await?;
        }
        tracker.ensure_active()?;

        round
            .resolved
            .retain(|d| !round.unresolved.iter().any(|u| u.description == d.description));

        tracing::info!(
            stage = stage.as_str(),
            resolved = round.resolved.len(),
            unresolved = round.unresolved.len(),
            changed = round.chapters_changed,
            "Correction round finished"
        );
        Ok(round)
    }
}

fn push_unique(list: &mut Vec<Defect>, defect: &Defect) {
    if !list.iter().any(|d| d.description == defect.description) {
        list.push(defect.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::GenerationTask;
    use crate::application::services::testing::{manuscript_with, MemoryManuscripts};
    use crate::domain::manuscript::ChapterNumber;
    use crate::domain::review::{DefectCategory, Severity};
    use crate::infrastructure::adapters::generation::ScriptedGenerationClient;
    use tokio_util::sync::CancellationToken;

    fn defect(chapters: &[i32], description: &str) -> Defect {
        Defect::new(
            DefectCategory::Plot,
            Severity::Major,
            chapters.iter().copied().map(ChapterNumber::new).collect(),
            description,
            "Rewrite the confrontation",
        )
    }

    #[tokio::test]
    async fn test_corrects_each_chapter_once_and_persists() {
        let generation = Arc::new(
            ScriptedGenerationClient::new()
                .with_default(
                    GenerationTask::StructuralFix,
                    r#"{"content": "The duel ended at dawn.", "changes": []}"#,
                )
                .with_default(GenerationTask::Verification, r#"{"applied": true}"#),
        );
        let manuscripts = Arc::new(MemoryManuscripts::default());
        let mut manuscript = manuscript_with(&[(1, "The duel ended at dusk."), (2, "The duel ended at noon.")]);
        let corrector = ChapterCorrector::new(generation.clone(), manuscripts.clone(), PipelineSettings::default());
        let defects = vec![defect(&[1, 2], "Duel timing"), defect(&[2], "Second duel")];

        let round = corrector
            .correct(&mut manuscript, &defects, &WorldModel::default(), JobStage::FinalReview, &CancellationToken::new())
            .await
            .unwrap();

        // 每章一次修正调用
        assert_eq!(generation.calls_for(GenerationTask::StructuralFix), 2);
        assert_eq!(round.chapters_changed, 2);
        assert_eq!(round.resolved.len(), 2);
        assert_eq!(manuscripts.saved_chapters(), 2);
        let saved = manuscripts.last_saved(ChapterNumber::new(2)).unwrap();
        assert_eq!(saved.current_content(), "The duel ended at dawn.");
    }

    #[tokio::test]
    async fn test_unknown_chapter_is_unresolved_and_not_actionable_skipped() {
        let generation = Arc::new(ScriptedGenerationClient::new());
        let manuscripts = Arc::new(MemoryManuscripts::default());
        let mut manuscript = manuscript_with(&[(1, "text")]);
        let corrector = ChapterCorrector::new(generation.clone(), manuscripts, PipelineSettings::default());
        let mut advisory = defect(&[1], "Advisory only");
        advisory.correction_instruction.clear();
        let defects = vec![defect(&[9], "Ghost chapter"), advisory];

        let round = corrector
            .correct(&mut manuscript, &defects, &WorldModel::default(), JobStage::Architect, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(generation.call_count(), 0);
        assert_eq!(round.unresolved.len(), 1);
        assert_eq!(round.unresolved[0].description, "Ghost chapter");
    }

    #[tokio::test]
    async fn test_duplicate_numbered_chapters_are_each_corrected() {
        let generation = Arc::new(
            ScriptedGenerationClient::new()
                .with_default(
                    GenerationTask::StructuralFix,
                    r#"{"content": "The bridge held.", "changes": []}"#,
                )
                .with_default(GenerationTask::Verification, r#"{"applied": true}"#),
        );
        let manuscripts = Arc::new(MemoryManuscripts::default());
        let mut manuscript = manuscript_with(&[(2, "The bridge fell."), (2, "The bridge fell again.")]);
        let corrector = ChapterCorrector::new(generation.clone(), manuscripts.clone(), PipelineSettings::default());
        let defects = vec![defect(&[2], "Bridge fate")];

        let round = corrector
            .correct(&mut manuscript, &defects, &WorldModel::default(), JobStage::FinalReview, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(generation.calls_for(GenerationTask::StructuralFix), 2);
        assert_eq!(round.chapters_changed, 2);
        assert_eq!(manuscripts.saved_chapters(), 2);
        assert!(manuscript
            .chapters()
            .iter()
            .all(|c| c.current_content() == "The bridge held."));
    }
}
