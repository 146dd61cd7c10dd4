//! 修订流水线
//!
//! 结构分析 → 摘要 → 世界模型 → 架构分析（及修正）→ 定期审计（及修正）→ 终审收敛
//! 每个阶段结束时持久化检查点；恢复时从检查点记录的阶段继续

use std::sync::Arc;

use super::architect::{ArchitectAnalyzer, ArchitectReport};
use super::auditors::{AuditOutcome, AuditScheduler};
use super::context::UnitTracker;
use super::correction::ChapterCorrector;
use super::final_review::{FinalReviewer, ReviewOutcome};
use super::settings::PipelineSettings;
use super::summarizer::ChapterSummarizer;
use super::world_extractor::WorldModelExtractor;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    AnalysisReportRecord, AnalysisReportRepositoryPort, GenerationPort, ManuscriptRepositoryPort, ReportKind,
    ReviewPassRepositoryPort, WorldModelRepositoryPort,
};
use crate::domain::job::{Checkpoint, JobId, JobStage};
use crate::domain::manuscript::Manuscript;
use crate::domain::review::Defect;
use crate::domain::structure::{analyze_structure, ChapterDigest, StructuralReport};
use crate::domain::world::WorldModel;

/// 流水线结果
#[derive(Debug, Clone)]
pub struct RevisionOutcome {
    pub structure: StructuralReport,
    /// 恢复时跳过了架构阶段则为 None
    pub architect_score: Option<u8>,
    pub review: ReviewOutcome,
}

pub struct RevisionPipeline {
    world_models: Arc<dyn WorldModelRepositoryPort>,
    reports: Arc<dyn AnalysisReportRepositoryPort>,
    summarizer: ChapterSummarizer,
    extractor: WorldModelExtractor,
    architect: ArchitectAnalyzer,
    corrector: ChapterCorrector,
    auditors: AuditScheduler,
    reviewer: FinalReviewer,
    settings: PipelineSettings,
}

impl RevisionPipeline {
    pub fn new(
        generation: Arc<dyn GenerationPort>,
        manuscripts: Arc<dyn ManuscriptRepositoryPort>,
        world_models: Arc<dyn WorldModelRepositoryPort>,
        reports: Arc<dyn AnalysisReportRepositoryPort>,
        passes: Arc<dyn ReviewPassRepositoryPort>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            summarizer: ChapterSummarizer::new(generation.clone(), manuscripts.clone(), settings.clone()),
            extractor: WorldModelExtractor::new(generation.clone(), settings.clone()),
            architect: ArchitectAnalyzer::new(generation.clone(), settings.clone()),
            corrector: ChapterCorrector::new(generation.clone(), manuscripts.clone(), settings.clone()),
            auditors: AuditScheduler::standard(generation.clone(), reports.clone(), &settings),
            reviewer: FinalReviewer::new(generation, manuscripts, passes, settings.clone()),
            world_models,
            reports,
            settings,
        }
    }

    /// 从 `from` 阶段开始运行（新任务从 Structure 开始）
    pub async fn run(
        &self,
        manuscript: &mut Manuscript,
        job_id: JobId,
        from: JobStage,
        tracker: &dyn UnitTracker,
    ) -> Result<RevisionOutcome, ApplicationError> {
        tracing::info!(
            job_id = %job_id,
            manuscript_id = %manuscript.id(),
            chapters = manuscript.chapter_count(),
            from = from.as_str(),
            "Revision pipeline started"
        );

        // 纯计算，每次运行都重新得出
        let structure = self.analyze_structure(manuscript);
        if from <= JobStage::Structure {
            self.save_report(manuscript, job_id, ReportKind::Structure, &structure, None)
                .await?;
            tracker.unit_done(JobStage::Structure, 1, 1, "Structure analyzed").await?;
            self.advance(tracker, JobStage::Summaries).await?;
        }

        if from <= JobStage::Summaries {
            let stats = self.summarizer.summarize(manuscript, tracker).await?;
            tracing::info!(
                generated = stats.generated,
                fallback = stats.fallback,
                reused = stats.reused,
                "Summaries ready"
            );
            self.advance(tracker, JobStage::WorldModel).await?;
        }

        let model = if from <= JobStage::WorldModel {
            let outcome = self.extractor.extract(manuscript, tracker).await?;
            self.world_models.save(manuscript.id(), &outcome.model).await?;
            self.advance(tracker, JobStage::Architect).await?;
            outcome.model
        } else {
            self.world_models.find(manuscript.id()).await?.unwrap_or_default()
        };

        let mut architect_score = None;
        if from <= JobStage::Architect {
            let report = self.architect.analyze(manuscript, &model, &structure).await?;
            architect_score = Some(report.score);
            self.save_report(manuscript, job_id, ReportKind::Architect, &report, Some(report.score))
                .await?;
            tracker
                .unit_done(JobStage::Architect, 1, 1, &format!("Architecture score {}", report.score))
                .await?;
            self.fix_architect_problems(manuscript, &model, &report, tracker).await?;
            self.advance(tracker, JobStage::Audits).await?;
        }

        // 审计结果从持久化报告复用，恢复到终审阶段时也不会重复调用
        let audits = self.auditors.run(manuscript, &model, Some(job_id), tracker).await?;
        if from <= JobStage::Audits {
            self.fix_audit_defects(manuscript, &model, &audits, tracker).await?;
            self.advance(tracker, JobStage::FinalReview).await?;
        }

        let review = self
            .reviewer
            .converge(manuscript, &model, &audits.notes(), job_id, tracker)
            .await?;
        self.advance(tracker, JobStage::Done).await?;

        tracing::info!(
            job_id = %job_id,
            state = review.state.as_str(),
            best_score = review.best_score,
            "Revision pipeline finished"
        );
        Ok(RevisionOutcome {
            structure,
            architect_score,
            review,
        })
    }

    fn analyze_structure(&self, manuscript: &Manuscript) -> StructuralReport {
        let digests: Vec<ChapterDigest> = manuscript
            .chapters_in_source_order()
            .into_iter()
            .map(ChapterDigest::from_chapter)
            .collect();
        let report = analyze_structure(&digests, self.settings.duplicate_similarity);
        if report.has_issues {
            tracing::warn!(
                duplicates = report.duplicate_chapters.len(),
                out_of_order = report.out_of_order_chapters.len(),
                missing = ?report.missing_chapters,
                "Structural issues detected"
            );
        }
        report
    }

    async fn fix_architect_problems(
        &self,
        manuscript: &mut Manuscript,
        model: &WorldModel,
        report: &ArchitectReport,
        tracker: &dyn UnitTracker,
    ) -> Result<(), ApplicationError> {
        let actionable: Vec<Defect> = report.actionable().into_iter().cloned().collect();
        if actionable.is_empty() {
            return Ok(());
        }
        let round = self
            .corrector
            .correct(manuscript, &actionable, model, JobStage::Architect, tracker)
            .await?;
        self.refresh_summaries(manuscript, round.chapters_changed, JobStage::Architect, tracker)
            .await
    }

    async fn fix_audit_defects(
        &self,
        manuscript: &mut Manuscript,
        model: &WorldModel,
        audits: &AuditOutcome,
        tracker: &dyn UnitTracker,
    ) -> Result<(), ApplicationError> {
        let defects = audits.defects();
        if !defects.iter().any(|d| d.is_actionable()) {
            return Ok(());
        }
        let round = self
            .corrector
            .correct(manuscript, &defects, model, JobStage::Audits, tracker)
            .await?;
        self.refresh_summaries(manuscript, round.chapters_changed, JobStage::Audits, tracker)
            .await
    }

    async fn refresh_summaries(
        &self,
        manuscript: &mut Manuscript,
        changed: usize,
        stage: JobStage,
        tracker: &dyn UnitTracker,
    ) -> Result<(), ApplicationError> {
        if changed == 0 {
            return Ok(());
        }
        self.summarizer.summarize_at(manuscript, stage, tracker).await?;
        Ok(())
    }

    async fn advance(&self, tracker: &dyn UnitTracker, next: JobStage) -> Result<(), ApplicationError> {
        tracker.checkpoint(Checkpoint::start(next)).await
    }

    async fn save_report<T: serde::Serialize>(
        &self,
        manuscript: &Manuscript,
        job_id: JobId,
        kind: ReportKind,
        payload: &T,
        score: Option<u8>,
    ) -> Result<(), ApplicationError> {
        let payload = serde_json::to_value(payload).map_err(|e| ApplicationError::internal(e.to_string()))?;
        let mut record = AnalysisReportRecord::new(manuscript.id(), Some(job_id), kind, payload);
        if let Some(score) = score {
            record = record.with_score(score);
        }
        self.reports.save(&record).await?;
        Ok(())
    }
}
