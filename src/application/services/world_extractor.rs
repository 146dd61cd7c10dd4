//! 世界模型抽取
//!
//! 按排序后的章节分批，每批一次调用，有界并发；结果全局合并去重

use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use std::sync::Arc;

use super::context::UnitTracker;
use super::parsing::{parse_structured, preview, ParseResult};
use super::prompts;
use super::settings::PipelineSettings;
use crate::application::error::ApplicationError;
use crate::application::ports::{GenerationPort, GenerationRequest, GenerationTask};
use crate::domain::job::JobStage;
use crate::domain::manuscript::{Chapter, ChapterNumber, Manuscript, TokenUsage};
use crate::domain::world::{WorldEntity, WorldModel};

#[derive(Debug, Default, Deserialize)]
struct RawEntity {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    first_chapter: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractionResponse {
    #[serde(default)]
    characters: Vec<RawEntity>,
    #[serde(default)]
    locations: Vec<RawEntity>,
    #[serde(default)]
    timeline_events: Vec<RawEntity>,
    #[serde(default)]
    world_rules: Vec<RawEntity>,
    #[serde(default)]
    setting_period: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

impl ExtractionResponse {
    /// 转为部分世界模型；缺失的首次出现章节用批次首章兜底
    fn into_model(self, batch_first: ChapterNumber) -> WorldModel {
        let convert = |items: Vec<RawEntity>| -> Vec<WorldEntity> {
            items
                .into_iter()
                .map(|e| {
                    WorldEntity::new(
                        e.name.trim(),
                        e.description.trim(),
                        Some(e.first_chapter.map(ChapterNumber::new).unwrap_or(batch_first)),
                    )
                })
                .collect()
        };
        WorldModel {
            characters: convert(self.characters),
            locations: convert(self.locations),
            timeline_events: convert(self.timeline_events),
            world_rules: convert(self.world_rules),
            setting_period: self
                .setting_period
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty() && p != "null"),
        }
    }
}

/// 抽取结果
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub model: WorldModel,
    pub batches: usize,
    pub parsed_batches: usize,
    pub skipped_batches: usize,
    /// 报告了置信度的已解析批次的平均值
    pub average_confidence: Option<f64>,
    pub usage: TokenUsage,
}

pub struct WorldModelExtractor {
    generation: Arc<dyn GenerationPort>,
    settings: PipelineSettings,
}

impl WorldModelExtractor {
    pub fn new(generation: Arc<dyn GenerationPort>, settings: PipelineSettings) -> Self {
        Self { generation, settings }
    }

    pub async fn extract(
        &self,
        manuscript: &Manuscript,
        tracker: &dyn UnitTracker,
    ) -> Result<ExtractionOutcome, ApplicationError> {
        let chapters: Vec<&Chapter> = manuscript.chapters().iter().collect();
        let batch_size = self.settings.extraction_batch_size.max(1);
        let batches: Vec<Vec<&Chapter>> = chapters.chunks(batch_size).map(|b| b.to_vec()).collect();
        let total = batches.len() as u32;
        let genre = manuscript.genre();

        tracing::info!(
            manuscript_id = %manuscript.id(),
            chapters = chapters.len(),
            batches = total,
            "Extracting world model"
        );

        // 提示词先构造好，并发的 future 只持有自有数据
        let futures: Vec<_> = batches
            .into_iter()
            .enumerate()
            .map(|(index, batch)| {
                let generation = self.generation.clone();
                let cancel = tracker.cancel_signal();
                let first = batch.first().map(|c| c.number()).unwrap_or(ChapterNumber::PROLOGUE);
                let request = GenerationRequest::json(
                    GenerationTask::WorldExtraction,
                    prompts::WORLD_EXTRACTION_SYSTEM,
                    prompts::world_extraction_user(&batch, genre),
                );
                async move {
                    if cancel.is_cancelled() {
                        return (index, first, None);
                    }
                    (index, first, Some(generation.generate(request).await))
                }
            })
            .collect();
        let mut results = stream::iter(futures).buffered(self.settings.max_concurrent_calls.max(1));

        let mut outcome = ExtractionOutcome::default();
        let mut confidences = Vec::new();
        let mut done = 0u32;

        while let Some((index, first, result)) = results.next().await {
            let Some(result) = result else { continue };
            if tracker.is_cancelled() {
                continue;
            }
            let response = result?;
            outcome.batches += 1;
            outcome.usage.add(&response.usage);

            match parse_structured::<ExtractionResponse>(&response.content) {
                ParseResult::Parsed(parsed) => {
                    if let Some(confidence) = parsed.confidence {
                        confidences.push(confidence.clamp(0.0, 1.0));
                    }
                    outcome.model.merge(&parsed.into_model(first));
                    outcome.parsed_batches += 1;
                }
                ParseResult::Unparseable(raw) => {
                    tracing::warn!(
                        batch = index,
                        first_chapter = first.value(),
                        raw = %preview(&raw),
                        "Unparseable world extraction batch, skipping"
                    );
                    outcome.skipped_batches += 1;
                }
            }

            done += 1;
            tracker
                .unit_done(JobStage::WorldModel, done, total, &format!("Extracted batch {}", index + 1))
                .await?;
        }

        tracker.ensure_active()?;

        if !confidences.is_empty() {
            outcome.average_confidence = Some(confidences.iter().sum::<f64>() / confidences.len() as f64);
        }

        tracing::info!(
            entities = outcome.model.entity_count(),
            parsed = outcome.parsed_batches,
            skipped = outcome.skipped_batches,
            confidence = ?outcome.average_confidence,
            "World model extracted"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::testing::manuscript_with;
    use crate::infrastructure::adapters::generation::ScriptedGenerationClient;
    use tokio_util::sync::CancellationToken;

    fn settings(batch: usize) -> PipelineSettings {
        PipelineSettings {
            extraction_batch_size: batch,
            max_concurrent_calls: 2,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_batches_merged_and_unparseable_skipped() {
        let generation = Arc::new(
            ScriptedGenerationClient::new()
                .push(
                    GenerationTask::WorldExtraction,
                    r#"{"characters":[{"name":"Elena","description":"smuggler","first_chapter":1}],"confidence":0.8}"#,
                )
                .push(GenerationTask::WorldExtraction, "garbage")
                .push(
                    GenerationTask::WorldExtraction,
                    r#"{"characters":[{"name":"elena","description":"smuggler with a debt","first_chapter":5}],"setting_period":"1890s","confidence":0.6}"#,
                ),
        );
        let manuscript = manuscript_with(&[(1, "a"), (2, "b"), (3, "c"), (4, "d"), (5, "e")]);
        let extractor = WorldModelExtractor::new(generation.clone(), settings(2));

        let outcome = extractor.extract(&manuscript, &CancellationToken::new()).await.unwrap();

        assert_eq!(generation.calls_for(GenerationTask::WorldExtraction), 3);
        assert_eq!(outcome.parsed_batches, 2);
        assert_eq!(outcome.skipped_batches, 1);
        assert_eq!(outcome.model.characters.len(), 1);
        assert_eq!(outcome.model.characters[0].description, "smuggler with a debt");
        assert_eq!(outcome.model.characters[0].first_chapter, Some(ChapterNumber::new(1)));
        assert_eq!(outcome.model.setting_period.as_deref(), Some("1890s"));
        let confidence = outcome.average_confidence.unwrap();
        assert!((confidence - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let generation = Arc::new(
            ScriptedGenerationClient::new().push_failure(GenerationTask::WorldExtraction, "down"),
        );
        let manuscript = manuscript_with(&[(1, "a")]);
        let extractor = WorldModelExtractor::new(generation, settings(10));

        let result = extractor.extract(&manuscript, &CancellationToken::new()).await;
        assert!(matches!(result, Err(ApplicationError::GenerationError(_))));
    }
}
