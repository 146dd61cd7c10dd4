//! 服务层测试辅助

use async_trait::async_trait;
use std::sync::Mutex;

use crate::application::ports::{
    AnalysisReportRecord, AnalysisReportRepositoryPort, JobFinishedEvent, ManuscriptRepositoryPort, ProgressEvent,
    ProgressSink, ReportKind, RepositoryError, ReviewPassRepositoryPort, TranslationRecord, WorldModelRepositoryPort,
};
use crate::domain::job::JobId;
use crate::domain::manuscript::{Chapter, ChapterNumber, Manuscript, ManuscriptId, ManuscriptStatus};
use crate::domain::review::ReviewPass;
use crate::domain::world::WorldModel;

/// 构造带章节的稿件
pub fn manuscript_with(chapters: &[(i32, &str)]) -> Manuscript {
    let mut manuscript = Manuscript::new("Test Manuscript", "en", "historical").unwrap();
    for (number, content) in chapters {
        manuscript.add_chapter(Chapter::new(
            ChapterNumber::new(*number),
            format!("Chapter {}", number),
            *content,
        ));
    }
    manuscript
}

/// 只记录写入次数的稿件仓储
#[derive(Default)]
pub struct MemoryManuscripts {
    chapters: Mutex<Vec<Chapter>>,
    translations: Mutex<Vec<TranslationRecord>>,
}

impl MemoryManuscripts {
    pub fn saved_chapters(&self) -> usize {
        self.chapters.lock().unwrap().len()
    }

    pub fn last_saved(&self, number: ChapterNumber) -> Option<Chapter> {
        self.chapters
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.number() == number)
            .cloned()
    }
}

#[async_trait]
impl ManuscriptRepositoryPort for MemoryManuscripts {
    async fn save(&self, _manuscript: &Manuscript) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn find_by_id(&self, _id: ManuscriptId) -> Result<Option<Manuscript>, RepositoryError> {
        Ok(None)
    }

    async fn save_chapter(&self, _manuscript_id: ManuscriptId, chapter: &Chapter) -> Result<(), RepositoryError> {
        self.chapters.lock().unwrap().push(chapter.clone());
        Ok(())
    }

    async fn update_status(&self, _id: ManuscriptId, _status: ManuscriptStatus) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn save_translation(&self, translation: &TranslationRecord) -> Result<(), RepositoryError> {
        self.translations.lock().unwrap().push(translation.clone());
        Ok(())
    }

    async fn find_translations(
        &self,
        manuscript_id: ManuscriptId,
        target_language: &str,
    ) -> Result<Vec<TranslationRecord>, RepositoryError> {
        Ok(self
            .translations
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.manuscript_id == manuscript_id && t.target_language == target_language)
            .cloned()
            .collect())
    }
}

/// 分析报告仓储
#[derive(Default)]
pub struct MemoryReports(Mutex<Vec<AnalysisReportRecord>>);

impl MemoryReports {
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalysisReportRepositoryPort for MemoryReports {
    async fn save(&self, report: &AnalysisReportRecord) -> Result<(), RepositoryError> {
        self.0.lock().unwrap().push(report.clone());
        Ok(())
    }

    async fn find_by_manuscript(
        &self,
        manuscript_id: ManuscriptId,
        kind: Option<ReportKind>,
    ) -> Result<Vec<AnalysisReportRecord>, RepositoryError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.manuscript_id == manuscript_id && kind.map_or(true, |k| r.kind == k))
            .cloned()
            .collect())
    }

    async fn find_by_job(&self, job_id: JobId) -> Result<Vec<AnalysisReportRecord>, RepositoryError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.job_id == Some(job_id))
            .cloned()
            .collect())
    }
}

/// 审阅轮次仓储
#[derive(Default)]
pub struct MemoryPasses(Mutex<Vec<(JobId, ReviewPass)>>);

#[async_trait]
impl ReviewPassRepositoryPort for MemoryPasses {
    async fn save(&self, job_id: JobId, _manuscript_id: ManuscriptId, pass: &ReviewPass) -> Result<(), RepositoryError> {
        self.0.lock().unwrap().push((job_id, pass.clone()));
        Ok(())
    }

    async fn find_by_job(&self, job_id: JobId) -> Result<Vec<ReviewPass>, RepositoryError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == job_id)
            .map(|(_, p)| p.clone())
            .collect())
    }
}

/// 世界模型仓储
#[derive(Default)]
pub struct MemoryWorldModels(Mutex<Option<WorldModel>>);

#[async_trait]
impl WorldModelRepositoryPort for MemoryWorldModels {
    async fn save(&self, _manuscript_id: ManuscriptId, model: &WorldModel) -> Result<(), RepositoryError> {
        *self.0.lock().unwrap() = Some(model.clone());
        Ok(())
    }

    async fn find(&self, _manuscript_id: ManuscriptId) -> Result<Option<WorldModel>, RepositoryError> {
        Ok(self.0.lock().unwrap().clone())
    }
}

/// 记录全部进度事件
#[derive(Default)]
pub struct RecordingProgress {
    pub progress: Mutex<Vec<ProgressEvent>>,
    pub finished: Mutex<Vec<JobFinishedEvent>>,
}

impl RecordingProgress {
    pub fn finished_statuses(&self) -> Vec<String> {
        self.finished.lock().unwrap().iter().map(|e| e.status.clone()).collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn publish_progress(&self, event: ProgressEvent) {
        self.progress.lock().unwrap().push(event);
    }

    fn publish_finished(&self, event: JobFinishedEvent) {
        self.finished.lock().unwrap().push(event);
    }
}
