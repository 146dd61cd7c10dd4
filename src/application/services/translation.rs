//! 翻译任务
//!
//! 每章一次调用，逐章持久化；检查点为已翻译章节数，恢复时跳过已译章节

use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use uuid::Uuid;

use super::context::UnitTracker;
use super::settings::PipelineSettings;
use super::prompts;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    GenerationPort, GenerationRequest, GenerationTask, ManuscriptRepositoryPort, TranslationRecord,
};
use crate::domain::job::{Checkpoint, JobStage};
use crate::domain::manuscript::{Chapter, Manuscript};

/// 翻译结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationOutcome {
    pub translated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
}

/// 尚未翻译（或原文已变化）的章节
pub fn pending_chapters<'a>(manuscript: &'a Manuscript, existing: &[TranslationRecord]) -> Vec<&'a Chapter> {
    manuscript
        .chapters()
        .iter()
        .filter(|c| {
            let hash = c.current_hash();
            !existing
                .iter()
                .any(|t| t.chapter_id == c.id() && t.source_hash == hash)
        })
        .collect()
}

pub struct TranslationExecutor {
    generation: Arc<dyn GenerationPort>,
    manuscripts: Arc<dyn ManuscriptRepositoryPort>,
    settings: PipelineSettings,
}

impl TranslationExecutor {
    pub fn new(
        generation: Arc<dyn GenerationPort>,
        manuscripts: Arc<dyn ManuscriptRepositoryPort>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            generation,
            manuscripts,
            settings,
        }
    }

    /// 剩余待翻译章节数
    pub async fn remaining(&self, manuscript: &Manuscript, target_language: &str) -> Result<usize, ApplicationError> {
        let existing = self
            .manuscripts
            .find_translations(manuscript.id(), target_language)
            .await?;
        Ok(pending_chapters(manuscript, &existing).len())
    }

    pub async fn translate(
        &self,
        manuscript: &Manuscript,
        target_language: &str,
        tracker: &dyn UnitTracker,
    ) -> Result<TranslationOutcome, ApplicationError> {
        let existing = self
            .manuscripts
            .find_translations(manuscript.id(), target_language)
            .await?;
        let pending = pending_chapters(manuscript, &existing);
        let total = manuscript.chapter_count();
        let mut outcome = TranslationOutcome {
            skipped: total - pending.len(),
            total,
            ..Default::default()
        };

        tracing::info!(
            manuscript_id = %manuscript.id(),
            target_language = %target_language,
            pending = pending.len(),
            skipped = outcome.skipped,
            "Translating manuscript"
        );
        tracker
            .checkpoint(Checkpoint::at(JobStage::Translating, outcome.skipped as u32, total as u32))
            .await?;

        let source_language = manuscript.language();
        let futures: Vec<_> = pending
            .iter()
            .enumerate()
            .map(|(index, chapter)| {
                let generation = self.generation.clone();
                let cancel = tracker.cancel_signal();
                let request = GenerationRequest::text(
                    GenerationTask::Translation,
                    prompts::TRANSLATION_SYSTEM,
                    prompts::translation_user(chapter, source_language, target_language),
                );
                async move {
                    if cancel.is_cancelled() {
                        return (index, None);
                    }
                    (index, Some(generation.generate(request).await))
                }
            })
            .collect();
        let mut results = stream::iter(futures).buffered(self.settings.max_concurrent_calls.max(1));

        while let Some((index, result)) = results.next().await {
            let Some(result) = result else { continue };
            if tracker.is_cancelled() {
                continue;
            }
            let chapter = pending[index];
            let response = result?;
            let content = response.content.trim();
            if content.is_empty() {
                tracing::warn!(chapter = chapter.number().value(), "Empty translation, chapter left pending");
                outcome.failed += 1;
                continue;
            }

            let record = TranslationRecord {
                id: Uuid::new_v4(),
                manuscript_id: manuscript.id(),
                chapter_id: chapter.id(),
                chapter_number: chapter.number(),
                target_language: target_language.to_string(),
                title: chapter.title().to_string(),
                content: content.to_string(),
                source_hash: chapter.current_hash(),
                created_at: chrono::Utc::now(),
            };
            self.manuscripts.save_translation(&record).await?;
            outcome.translated += 1;

            let completed = (outcome.skipped + outcome.translated) as u32;
            tracker
                .checkpoint(Checkpoint::at(JobStage::Translating, completed, total as u32))
                .await?;
            tracker
                .unit_done(
                    JobStage::Translating,
                    completed,
                    total as u32,
                    &format!("Translated {}", chapter.number().label()),
                )
                .await?;
        }
        tracker.ensure_active()?;

        if outcome.failed > 0 {
            return Err(ApplicationError::GenerationError(format!(
                "{} chapter(s) returned an empty translation",
                outcome.failed
            )));
        }

        tracing::info!(
            translated = outcome.translated,
            skipped = outcome.skipped,
            "Translation finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::testing::{manuscript_with, MemoryManuscripts};
    use crate::infrastructure::adapters::generation::ScriptedGenerationClient;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_resume_skips_translated_chapters() {
        let generation = Arc::new(
            ScriptedGenerationClient::new().with_default(GenerationTask::Translation, "Texto traducido."),
        );
        let repo = Arc::new(MemoryManuscripts::default());
        let manuscript = manuscript_with(&[(1, "one"), (2, "two"), (3, "three")]);
        let executor = TranslationExecutor::new(generation.clone(), repo.clone(), PipelineSettings::default());

        let first = manuscript.chapters()[0].clone();
        repo.save_translation(&TranslationRecord {
            id: Uuid::new_v4(),
            manuscript_id: manuscript.id(),
            chapter_id: first.id(),
            chapter_number: first.number(),
            target_language: "es".to_string(),
            title: first.title().to_string(),
            content: "uno".to_string(),
            source_hash: first.current_hash(),
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

        assert_eq!(executor.remaining(&manuscript, "es").await.unwrap(), 2);
        let outcome = executor
            .translate(&manuscript, "es", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.translated, 2);
        assert_eq!(generation.calls_for(GenerationTask::Translation), 2);
        assert_eq!(executor.remaining(&manuscript, "es").await.unwrap(), 0);
        // 其他语言不受影响
        assert_eq!(executor.remaining(&manuscript, "fr").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_empty_translation_fails_stage() {
        let generation = Arc::new(ScriptedGenerationClient::new().with_default(GenerationTask::Translation, "  "));
        let repo = Arc::new(MemoryManuscripts::default());
        let manuscript = manuscript_with(&[(1, "one")]);
        let executor = TranslationExecutor::new(generation, repo, PipelineSettings::default());

        let result = executor.translate(&manuscript, "de", &CancellationToken::new()).await;

        assert!(matches!(result, Err(ApplicationError::GenerationError(_))));
        assert_eq!(executor.remaining(&manuscript, "de").await.unwrap(), 1);
    }
}
