//! Manuscript Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{
    AnalysisReportRecord, AnalysisReportRepositoryPort, ManuscriptRepositoryPort, ReportKind, TranslationRecord,
};
use crate::application::queries::{GetManuscript, GetTranslation, ListAnalysisReports};
use crate::domain::manuscript::{Manuscript, ManuscriptId};

/// GetManuscript Handler
pub struct GetManuscriptHandler {
    manuscripts: Arc<dyn ManuscriptRepositoryPort>,
}

impl GetManuscriptHandler {
    pub fn new(manuscripts: Arc<dyn ManuscriptRepositoryPort>) -> Self {
        Self { manuscripts }
    }

    pub async fn handle(&self, query: GetManuscript) -> Result<Manuscript, ApplicationError> {
        self.manuscripts
            .find_by_id(ManuscriptId::from_uuid(query.manuscript_id))
            .await?
            .ok_or_else(|| ApplicationError::not_found("Manuscript", query.manuscript_id))
    }
}

/// ListAnalysisReports Handler
pub struct ListAnalysisReportsHandler {
    reports: Arc<dyn AnalysisReportRepositoryPort>,
}

impl ListAnalysisReportsHandler {
    pub fn new(reports: Arc<dyn AnalysisReportRepositoryPort>) -> Self {
        Self { reports }
    }

    pub async fn handle(&self, query: ListAnalysisReports) -> Result<Vec<AnalysisReportRecord>, ApplicationError> {
        let kind = match query.kind.as_deref() {
            Some(raw) => Some(
                ReportKind::from_str(raw)
                    .ok_or_else(|| ApplicationError::validation(format!("Unknown report kind: {}", raw)))?,
            ),
            None => None,
        };
        Ok(self
            .reports
            .find_by_manuscript(ManuscriptId::from_uuid(query.manuscript_id), kind)
            .await?)
    }
}

/// GetTranslation Handler
pub struct GetTranslationHandler {
    manuscripts: Arc<dyn ManuscriptRepositoryPort>,
}

impl GetTranslationHandler {
    pub fn new(manuscripts: Arc<dyn ManuscriptRepositoryPort>) -> Self {
        Self { manuscripts }
    }

    /// 按章节顺序返回译文
    pub async fn handle(&self, query: GetTranslation) -> Result<Vec<TranslationRecord>, ApplicationError> {
        let mut records = self
            .manuscripts
            .find_translations(ManuscriptId::from_uuid(query.manuscript_id), &query.target_language)
            .await?;
        records.sort_by_key(|r| r.chapter_number);
        Ok(records)
    }
}
