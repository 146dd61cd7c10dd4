//! 章节摘要
//!
//! 仅为缺少摘要或内容已变化的章节生成；无法解析时退化为正文摘录

use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::context::UnitTracker;
use super::parsing::{excerpt, parse_structured, preview, ParseResult};
use super::prompts;
use super::settings::PipelineSettings;
use crate::application::error::ApplicationError;
use crate::application::ports::{GenerationPort, GenerationRequest, GenerationTask, ManuscriptRepositoryPort};
use crate::domain::job::JobStage;
use crate::domain::manuscript::{Chapter, Manuscript, TokenUsage};

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    summary: String,
}

/// 摘要阶段统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryStats {
    pub generated: usize,
    pub fallback: usize,
    pub reused: usize,
}

pub struct ChapterSummarizer {
    generation: Arc<dyn GenerationPort>,
    manuscripts: Arc<dyn ManuscriptRepositoryPort>,
    settings: PipelineSettings,
}

impl ChapterSummarizer {
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

    pub async fn summarize(
        &self,
        manuscript: &mut Manuscript,
        tracker: &dyn UnitTracker,
    ) -> Result<SummaryStats, ApplicationError> {
        self.summarize_at(manuscript, JobStage::Summaries, tracker).await
    }

    /// 在其他阶段中刷新过期摘要（修正后的章节）
    pub async fn summarize_at(
        &self,
        manuscript: &mut Manuscript,
        stage: JobStage,
        tracker: &dyn UnitTracker,
    ) -> Result<SummaryStats, ApplicationError> {
        let mut stats = SummaryStats::default();
        let pending: Vec<_> = manuscript
            .chapters()
            .iter()
            .filter(|c| !c.has_fresh_summary())
            .cloned()
            .collect();
        stats.reused = manuscript.chapter_count() - pending.len();
        let total = pending.len() as u32;

        tracing::info!(
            manuscript_id = %manuscript.id(),
            pending = total,
            reused = stats.reused,
            "Summarizing chapters"
        );

        let futures: Vec<_> = pending
            .into_iter()
            .map(|chapter| {
                let generation = self.generation.clone();
                let cancel = tracker.cancel_signal();
                async move {
                    if cancel.is_cancelled() {
                        return (chapter, None);
                    }
                    let request = GenerationRequest::json(
                        GenerationTask::Summary,
                        prompts::SUMMARY_SYSTEM,
                        prompts::summary_user(&chapter),
                    );
                    let result = generation.generate(request).await;
                    (chapter, Some(result))
                }
            })
            .collect();
        let mut results = stream::iter(futures).buffer_unordered(self.settings.max_concurrent_calls.max(1));

        let mut done = 0u32;
        while let Some((chapter, result)) = results.next().await {
            // 取消后已发出的调用结果直接丢弃
            let Some(result) = result else { continue };
            if tracker.is_cancelled() {
                continue;
            }
            let response = result?;

            let summary = match parse_structured::<SummaryResponse>(&response.content) {
                ParseResult::Parsed(parsed) if !parsed.summary.trim().is_empty() => {
                    stats.generated += 1;
                    parsed.summary.trim().to_string()
                }
                ParseResult::Parsed(_) | ParseResult::Unparseable(_) => {
                    tracing::warn!(
                        chapter = chapter.number().value(),
                        raw = %preview(&response.content),
                        "Unparseable summary, falling back to excerpt"
                    );
                    stats.fallback += 1;
                    excerpt(chapter.current_content(), self.settings.excerpt_chars)
                }
            };

            let updated = apply_summary(manuscript, chapter.id(), summary, &response.usage)?;
            self.manuscripts.save_chapter(manuscript.id(), &updated).await?;

            done += 1;
            tracker
                .unit_done(
                    stage,
                    done,
                    total,
                    &format!("Summarized {}", chapter.number().label()),
                )
                .await?;
        }

        tracker.ensure_active()?;
        Ok(stats)
    }
}

fn apply_summary(
    manuscript: &mut Manuscript,
    chapter_id: Uuid,
    summary: String,
    usage: &TokenUsage,
) -> Result<Chapter, ApplicationError> {
    let chapter = manuscript
        .chapter_by_id_mut(chapter_id)
        .ok_or_else(|| ApplicationError::not_found("Chapter", chapter_id))?;
    chapter.set_summary(summary);
    chapter.record_usage(usage);
    Ok(chapter.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::testing::{manuscript_with, MemoryManuscripts};
    use crate::infrastructure::adapters::generation::ScriptedGenerationClient;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_summaries_generated_and_fallback_on_garbage() {
        let generation = Arc::new(
            ScriptedGenerationClient::new()
                .push(GenerationTask::Summary, r#"{"summary": "Mara crosses the river."}"#)
                .push(GenerationTask::Summary, "not json at all"),
        );
        let repo = Arc::new(MemoryManuscripts::default());
        let mut manuscript = manuscript_with(&[(1, "Mara crossed the frozen river."), (2, "The duke waited.")]);
        let summarizer = ChapterSummarizer::new(generation.clone(), repo.clone(), PipelineSettings {
            max_concurrent_calls: 1,
            ..Default::default()
        });

        let stats = summarizer
            .summarize(&mut manuscript, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.generated, 1);
        assert_eq!(stats.fallback, 1);
        assert!(manuscript.chapters().iter().all(|c| c.has_fresh_summary()));
        assert_eq!(repo.saved_chapters(), 2);
    }

    #[tokio::test]
    async fn test_fresh_summaries_are_reused() {
        let generation = Arc::new(ScriptedGenerationClient::new());
        let repo = Arc::new(MemoryManuscripts::default());
        let mut manuscript = manuscript_with(&[(1, "text")]);
        manuscript
            .chapter_mut(crate::domain::manuscript::ChapterNumber::new(1))
            .unwrap()
            .set_summary("done".to_string());
        let summarizer = ChapterSummarizer::new(generation.clone(), repo, PipelineSettings::default());

        let stats = summarizer
            .summarize(&mut manuscript, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.reused, 1);
        assert_eq!(generation.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_issues_no_calls() {
        let generation = Arc::new(ScriptedGenerationClient::new());
        let repo = Arc::new(MemoryManuscripts::default());
        let mut manuscript = manuscript_with(&[(1, "text"), (2, "more")]);
        let token = CancellationToken::new();
        token.cancel();
        let summarizer = ChapterSummarizer::new(generation.clone(), repo, PipelineSettings::default());

        let result = summarizer.summarize(&mut manuscript, &token).await;

        assert!(matches!(result, Err(ApplicationError::Cancelled)));
        assert_eq!(generation.call_count(), 0);
    }
}
