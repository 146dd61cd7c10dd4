//! 审计调度
//!
//! 按章节数计算每个审计器的窗口；末尾不足一个窗口的章节在最后补审一次
//! 恢复运行时跳过本任务已持久化的窗口

use futures_util::stream::{self, StreamExt};
use std::ops::Range;
use std::sync::Arc;

use super::{
    AnachronismAuditor, AuditReport, AuditScope, AuditTrigger, Auditor, ContinuityAuditor, RepetitionAuditor,
    VoiceRhythmAuditor,
};
use crate::application::error::ApplicationError;
use crate::application::ports::{AnalysisReportRecord, AnalysisReportRepositoryPort, GenerationPort};
use crate::application::services::context::UnitTracker;
use crate::application::services::settings::PipelineSettings;
use crate::domain::job::{JobId, JobStage};
use crate::domain::manuscript::{Chapter, Manuscript};
use crate::domain::review::Defect;
use crate::domain::world::WorldModel;

/// 计算审计窗口（排序后章节的下标区间）
///
/// 每 N 章：`[0..N), [N..2N), ...`，剩余不足 N 章时追加 `[n - rest..n)`
pub fn audit_windows(chapter_count: usize, scope: AuditScope) -> Vec<Range<usize>> {
    if chapter_count == 0 {
        return Vec::new();
    }
    match scope.trigger {
        AuditTrigger::Once => vec![0..chapter_count],
        AuditTrigger::EveryChapters(size) => {
            let size = size.max(1);
            let mut windows: Vec<Range<usize>> = (1..=chapter_count / size)
                .map(|i| (i - 1) * size..i * size)
                .collect();
            let rest = chapter_count % size;
            if rest > 0 {
                windows.push(chapter_count - rest..chapter_count);
            }
            windows
        }
    }
}

/// 全部审计结果
#[derive(Debug, Clone, Default)]
pub struct AuditOutcome {
    pub reports: Vec<AuditReport>,
    /// 从已持久化报告恢复的窗口数
    pub reused: usize,
}

impl AuditOutcome {
    pub fn defects(&self) -> Vec<Defect> {
        self.reports.iter().flat_map(|r| r.defects.iter().cloned()).collect()
    }

    /// 终审提示用的子分数摘要
    pub fn notes(&self) -> String {
        if self.reports.is_empty() {
            return "(no audits)".to_string();
        }
        self.reports.iter().map(|r| r.note()).collect::<Vec<_>>().join("\n")
    }
}

pub struct AuditScheduler {
    auditors: Vec<Arc<dyn Auditor>>,
    reports: Arc<dyn AnalysisReportRepositoryPort>,
    max_concurrent_calls: usize,
}

impl AuditScheduler {
    pub fn new(
        auditors: Vec<Arc<dyn Auditor>>,
        reports: Arc<dyn AnalysisReportRepositoryPort>,
        max_concurrent_calls: usize,
    ) -> Self {
        Self {
            auditors,
            reports,
            max_concurrent_calls,
        }
    }

    /// 四个标准审计器
    pub fn standard(
        generation: Arc<dyn GenerationPort>,
        reports: Arc<dyn AnalysisReportRepositoryPort>,
        settings: &PipelineSettings,
    ) -> Self {
        let auditors: Vec<Arc<dyn Auditor>> = vec![
            Arc::new(ContinuityAuditor::new(generation.clone(), settings.continuity_window)),
            Arc::new(VoiceRhythmAuditor::new(generation.clone(), settings.voice_window)),
            Arc::new(RepetitionAuditor::new(generation.clone(), settings.excerpt_chars)),
            Arc::new(AnachronismAuditor::new(
                generation,
                settings.anachronism_sample_size,
                settings.excerpt_chars,
            )),
        ];
        Self::new(auditors, reports, settings.max_concurrent_calls)
    }

    pub async fn run(
        &self,
        manuscript: &Manuscript,
        model: &WorldModel,
        job_id: Option<JobId>,
        tracker: &dyn UnitTracker,
    ) -> Result<AuditOutcome, ApplicationError> {
        let chapters: Vec<&Chapter> = manuscript.chapters().iter().collect();

        let existing = match job_id {
            Some(id) => self.reports.find_by_job(id).await?,
            None => Vec::new(),
        };

        let mut slots: Vec<Option<AuditReport>> = Vec::new();
        let mut pending = Vec::new();
        for auditor in &self.auditors {
            for range in audit_windows(chapters.len(), auditor.scope()) {
                let window = &chapters[range];
                let reused = find_persisted(&existing, auditor.as_ref(), window);
                if reused.is_none() {
                    let owned: Vec<Chapter> = window.iter().map(|c| (*c).clone()).collect();
                    pending.push((slots.len(), auditor.clone(), owned));
                }
                slots.push(reused);
            }
        }

        let reused = slots.iter().filter(|s| s.is_some()).count();
        let total = pending.len() as u32;
        tracing::info!(
            manuscript_id = %manuscript.id(),
            windows = slots.len(),
            pending = total,
            reused = reused,
            "Running scheduled audits"
        );

        let model = Arc::new(model.clone());
        let futures: Vec<_> = pending
            .into_iter()
            .map(|(slot, auditor, window)| {
                let model = model.clone();
                let cancel = tracker.cancel_signal();
                async move {
                    if cancel.is_cancelled() {
                        return (slot, None);
                    }
                    let refs: Vec<&Chapter> = window.iter().collect();
                    (slot, Some(auditor.run(&refs, &model).await))
                }
            })
            .collect();
        let mut results = stream::iter(futures).buffer_unordered(self.max_concurrent_calls.max(1));

        let mut done = 0u32;
        while let Some((slot, result)) = results.next().await {
            let Some(result) = result else { continue };
            if tracker.is_cancelled() {
                continue;
            }
            let report = result?;

            let payload =
                serde_json::to_value(&report).map_err(|e| ApplicationError::internal(e.to_string()))?;
            let mut record = AnalysisReportRecord::new(manuscript.id(), job_id, report.kind, payload);
            if let Some((first, last)) = report.window {
                record = record.with_window(first, last);
            }
            if let Some(score) = report.score {
                record = record.with_score(score);
            }
            self.reports.save(&record).await?;

            tracing::info!(
                kind = report.kind.as_str(),
                score = ?report.score,
                defects = report.defects.len(),
                "Audit window completed"
            );
            let message = format!("Audit {}", report.note());
            slots[slot] = Some(report);

            done += 1;
            tracker.unit_done(JobStage::Audits, done, total, &message).await?;
        }
        tracker.ensure_active()?;

        Ok(AuditOutcome {
            reports: slots.into_iter().flatten().collect(),
            reused,
        })
    }
}

fn find_persisted(
    existing: &[AnalysisReportRecord],
    auditor: &dyn Auditor,
    window: &[&Chapter],
) -> Option<AuditReport> {
    let bounds = match (window.first(), window.last()) {
        (Some(first), Some(last)) => Some((first.number(), last.number())),
        _ => None,
    };
    existing
        .iter()
        .rev()
        .find(|r| r.kind == auditor.kind() && r.window == bounds)
        .and_then(|r| serde_json::from_value::<AuditReport>(r.payload.clone()).ok())
}
