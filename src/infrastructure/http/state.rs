//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;

use crate::application::{
    // Command handlers
    CancelJobHandler, CreateManuscriptHandler, ResumeJobHandler, StartJobHandler,
    // Query handlers
    GetJobHandler, GetManuscriptHandler, GetTranslationHandler, ListAnalysisReportsHandler,
    ListManuscriptJobsHandler, ListReviewPassesHandler,
    // Ports
    AnalysisReportRepositoryPort, JobControlPort, JobRepositoryPort, ManuscriptRepositoryPort,
    ReviewPassRepositoryPort,
};
use crate::infrastructure::events::EventPublisher;

/// 应用状态
pub struct AppState {
    // ========== Ports ==========
    pub jobs: Arc<dyn JobRepositoryPort>,
    pub job_control: Arc<dyn JobControlPort>,
    pub event_publisher: Arc<EventPublisher>,

    // ========== Command Handlers ==========
    pub create_manuscript_handler: CreateManuscriptHandler,
    pub start_job_handler: StartJobHandler,
    pub cancel_job_handler: CancelJobHandler,
    pub resume_job_handler: ResumeJobHandler,

    // ========== Query Handlers ==========
    pub get_manuscript_handler: GetManuscriptHandler,
    pub list_reports_handler: ListAnalysisReportsHandler,
    pub get_translation_handler: GetTranslationHandler,
    pub get_job_handler: GetJobHandler,
    pub list_jobs_handler: ListManuscriptJobsHandler,
    pub list_passes_handler: ListReviewPassesHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        manuscripts: Arc<dyn ManuscriptRepositoryPort>,
        jobs: Arc<dyn JobRepositoryPort>,
        reports: Arc<dyn AnalysisReportRepositoryPort>,
        passes: Arc<dyn ReviewPassRepositoryPort>,
        job_control: Arc<dyn JobControlPort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            // Ports
            jobs: jobs.clone(),
            job_control: job_control.clone(),
            event_publisher,

            // Command handlers
            create_manuscript_handler: CreateManuscriptHandler::new(manuscripts.clone()),
            start_job_handler: StartJobHandler::new(
                manuscripts.clone(),
                jobs.clone(),
                job_control.clone(),
            ),
            cancel_job_handler: CancelJobHandler::new(jobs.clone(), job_control.clone()),
            resume_job_handler: ResumeJobHandler::new(jobs.clone(), job_control),

            // Query handlers
            get_manuscript_handler: GetManuscriptHandler::new(manuscripts.clone()),
            list_reports_handler: ListAnalysisReportsHandler::new(reports),
            get_translation_handler: GetTranslationHandler::new(manuscripts),
            get_job_handler: GetJobHandler::new(jobs.clone()),
            list_jobs_handler: ListManuscriptJobsHandler::new(jobs.clone()),
            list_passes_handler: ListReviewPassesHandler::new(jobs, passes),
        }
    }
}
