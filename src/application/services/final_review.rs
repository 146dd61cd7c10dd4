//! 终审收敛循环
//!
//! 审阅 → 修正 → 再审阅，直到分数达到阈值或轮数用尽
//! 已解决的缺陷描述单调累积，并用于过滤后续轮次的重复报告

use serde::Deserialize;
use std::sync::Arc;

use super::context::UnitTracker;
use super::correction::ChapterCorrector;
use super::parsing::{lenient_list, lenient_score, lenient_string, parse_structured, preview, ParseResult, RawDefect};
use super::prompts;
use super::settings::PipelineSettings;
use super::summarizer::ChapterSummarizer;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    GenerationPort, GenerationRequest, GenerationTask, ManuscriptRepositoryPort, ReviewPassRepositoryPort,
};
use crate::domain::job::{JobId, JobStage};
use crate::domain::manuscript::{Chapter, Manuscript};
use crate::domain::review::{
    advance, ConvergencePolicy, ConvergenceState, DefectCategory, LoopEvent, ResolvedLedger, ReviewPass,
};
use crate::domain::world::WorldModel;

#[derive(Debug, Default, Deserialize)]
struct FinalReviewResponse {
    #[serde(default, deserialize_with = "lenient_score")]
    score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_list")]
    defects: Vec<RawDefect>,
    #[serde(default, deserialize_with = "lenient_string")]
    summary: String,
}

/// 收敛结果
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub state: ConvergenceState,
    /// 本任务的全部轮次（包括恢复前已持久化的）
    pub passes: Vec<ReviewPass>,
    pub best_score: u8,
}

impl ReviewOutcome {
    fn from_passes(state: ConvergenceState, passes: Vec<ReviewPass>) -> Self {
        let best_score = passes.iter().map(|p| p.score).max().unwrap_or(0);
        Self {
            state,
            passes,
            best_score,
        }
    }

    pub fn final_score(&self) -> Option<u8> {
        self.passes.last().map(|p| p.score)
    }
}

pub struct FinalReviewer {
    generation: Arc<dyn GenerationPort>,
    passes: Arc<dyn ReviewPassRepositoryPort>,
    corrector: ChapterCorrector,
    summarizer: ChapterSummarizer,
    settings: PipelineSettings,
}

impl FinalReviewer {
    pub fn new(
        generation: Arc<dyn GenerationPort>,
        manuscripts: Arc<dyn ManuscriptRepositoryPort>,
        passes: Arc<dyn ReviewPassRepositoryPort>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            corrector: ChapterCorrector::new(generation.clone(), manuscripts.clone(), settings.clone()),
            summarizer: ChapterSummarizer::new(generation.clone(), manuscripts, settings.clone()),
            generation,
            passes,
            settings,
        }
    }

    fn policy(&self) -> ConvergencePolicy {
        ConvergencePolicy::new(self.settings.approval_threshold, self.settings.max_review_passes)
    }

    pub async fn converge(
        &self,
        manuscript: &mut Manuscript,
        model: &WorldModel,
        audit_notes: &str,
        job_id: JobId,
        tracker: &dyn UnitTracker,
    ) -> Result<ReviewOutcome, ApplicationError> {
        let policy = self.policy();
        let mut passes = self.passes.find_by_job(job_id).await?;
        let mut ledger = passes
            .last()
            .map(|p| ResolvedLedger::from_descriptions(p.resolved_defect_descriptions.clone()))
            .unwrap_or_default();

        // 恢复：最后一轮已是终态时直接返回
        if let Some(last) = passes.last() {
            let state = policy.after_review(last.pass_number, last.score);
            if state.is_terminal() {
                tracing::info!(
                    job_id = %job_id,
                    pass = last.pass_number,
                    state = state.as_str(),
                    "Review loop already finished"
                );
                return Ok(ReviewOutcome::from_passes(state, passes));
            }
        }

        let mut pass_number = passes.last().map(|p| p.pass_number + 1).unwrap_or(1);
        let mut state = advance(ConvergenceState::Drafting, &policy, LoopEvent::DraftReady);

        while policy.can_start(pass_number) {
            tracker.ensure_active()?;

            let mut pass = self.review(manuscript, audit_notes, &ledger, pass_number).await?;
            state = advance(state, &policy, LoopEvent::Reviewed {
                pass_number,
                score: pass.score,
            });

            if state == ConvergenceState::Revising {
                let round = self
                    .corrector
                    .correct(manuscript, &pass.defects, model, JobStage::FinalReview, tracker)
                    .await?;
                for description in round.resolved_descriptions() {
                    ledger.record(description);
                }
                pass.unresolved_defects = round.unresolved;
                if round.chapters_changed > 0 {
                    self.summarizer
                        .summarize_at(manuscript, JobStage::FinalReview, tracker)
                        .await?;
                }
            }

            pass.resolved_defect_descriptions = ledger.descriptions().to_vec();
            self.passes.save(job_id, manuscript.id(), &pass).await?;

            tracing::info!(
                job_id = %job_id,
                pass = pass_number,
                score = pass.score,
                verdict = pass.verdict.as_str(),
                defects = pass.defects.len(),
                unresolved = pass.unresolved_defects.len(),
                resolved_total = ledger.len(),
                state = state.as_str(),
                "Review pass finished"
            );
            let message = format!("Review pass {}: score {}", pass_number, pass.score);
            passes.push(pass);
            tracker
                .unit_done(JobStage::FinalReview, pass_number, policy.max_passes, &message)
                .await?;

            if state.is_terminal() {
                break;
            }
            state = advance(state, &policy, LoopEvent::RevisionApplied);
            pass_number += 1;
        }

        if !state.is_terminal() {
            state = ConvergenceState::Exhausted;
        }
        let outcome = ReviewOutcome::from_passes(state, passes);
        tracing::info!(
            job_id = %job_id,
            state = outcome.state.as_str(),
            best_score = outcome.best_score,
            passes = outcome.passes.len(),
            "Review loop finished"
        );
        Ok(outcome)
    }

    /// 一轮完整审阅；无法解析按 0 分记录
    async fn review(
        &self,
        manuscript: &Manuscript,
        audit_notes: &str,
        ledger: &ResolvedLedger,
        pass_number: u32,
    ) -> Result<ReviewPass, ApplicationError> {
        let threshold = self.settings.approval_threshold;
        let chapters: Vec<&Chapter> = manuscript.chapters().iter().collect();
        let summaries = prompts::summaries_block(&chapters, self.settings.excerpt_chars);
        let request = GenerationRequest::json(
            GenerationTask::FinalReview,
            prompts::with_defect_schema(prompts::FINAL_REVIEW_SYSTEM),
            prompts::final_review_user(&summaries, audit_notes, ledger.descriptions(), pass_number),
        );
        let response = self.generation.generate(request).await?;

        let parsed = match parse_structured::<FinalReviewResponse>(&response.content) {
            ParseResult::Parsed(parsed) => parsed,
            ParseResult::Unparseable(raw) => {
                tracing::warn!(
                    pass = pass_number,
                    raw = %preview(&raw),
                    "Unparseable final review, recording score 0"
                );
                return Ok(ReviewPass::unparseable(pass_number, threshold));
            }
        };

        let defects = parsed
            .defects
            .into_iter()
            .map(|d| d.into_defect(DefectCategory::Plot))
            .filter(|d| !d.description.is_empty())
            .collect();
        let (kept, suppressed) = ledger.suppress(defects);
        if suppressed > 0 {
            tracing::info!(pass = pass_number, suppressed = suppressed, "Dropped already resolved defects");
        }
        if !parsed.summary.trim().is_empty() {
            tracing::debug!(pass = pass_number, summary = %preview(&parsed.summary), "Reviewer summary");
        }

        let score = parsed.score.map(super::auditors::clamp_score).unwrap_or(0);
        Ok(ReviewPass::new(pass_number, score, threshold, kept))
    }
}
