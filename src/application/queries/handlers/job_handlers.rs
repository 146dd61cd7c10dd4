//! Job Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{JobRepositoryPort, ReviewPassRepositoryPort};
use crate::application::queries::{GetJob, ListManuscriptJobs, ListReviewPasses};
use crate::domain::job::{JobId, LongRunningJob};
use crate::domain::manuscript::ManuscriptId;
use crate::domain::review::ReviewPass;

/// GetJob Handler
pub struct GetJobHandler {
    jobs: Arc<dyn JobRepositoryPort>,
}

impl GetJobHandler {
    pub fn new(jobs: Arc<dyn JobRepositoryPort>) -> Self {
        Self { jobs }
    }

    pub async fn handle(&self, query: GetJob) -> Result<LongRunningJob, ApplicationError> {
        self.jobs
            .find_by_id(JobId::from_uuid(query.job_id))
            .await?
            .ok_or_else(|| ApplicationError::not_found("Job", query.job_id))
    }
}

/// ListManuscriptJobs Handler
pub struct ListManuscriptJobsHandler {
    jobs: Arc<dyn JobRepositoryPort>,
}

impl ListManuscriptJobsHandler {
    pub fn new(jobs: Arc<dyn JobRepositoryPort>) -> Self {
        Self { jobs }
    }

    pub async fn handle(&self, query: ListManuscriptJobs) -> Result<Vec<LongRunningJob>, ApplicationError> {
        Ok(self
            .jobs
            .find_by_manuscript(ManuscriptId::from_uuid(query.manuscript_id))
            .await?)
    }
}

/// ListReviewPasses Handler
pub struct ListReviewPassesHandler {
    jobs: Arc<dyn JobRepositoryPort>,
    passes: Arc<dyn ReviewPassRepositoryPort>,
}

impl ListReviewPassesHandler {
    pub fn new(jobs: Arc<dyn JobRepositoryPort>, passes: Arc<dyn ReviewPassRepositoryPort>) -> Self {
        Self { jobs, passes }
    }

    pub async fn handle(&self, query: ListReviewPasses) -> Result<Vec<ReviewPass>, ApplicationError> {
        let job_id = JobId::from_uuid(query.job_id);
        if self.jobs.find_by_id(job_id).await?.is_none() {
            return Err(ApplicationError::not_found("Job", query.job_id));
        }
        Ok(self.passes.find_by_job(job_id).await?)
    }
}
