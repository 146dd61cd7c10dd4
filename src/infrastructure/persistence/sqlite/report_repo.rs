//! SQLite Analysis Report Repository

use async_trait::async_trait;
use sqlx::FromRow;
use uuid::Uuid;

use super::database::{db_error, json_error, parse_timestamp, timestamp};
use super::DbPool;
use crate::application::ports::{
    AnalysisReportRecord, AnalysisReportRepositoryPort, ReportKind, RepositoryError,
};
use crate::domain::job::JobId;
use crate::domain::manuscript::{ChapterNumber, ManuscriptId};

pub struct SqliteAnalysisReportRepository {
    pool: DbPool,
}

impl SqliteAnalysisReportRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ReportRow {
    id: String,
    manuscript_id: String,
    job_id: Option<String>,
    kind: String,
    window_start: Option<i64>,
    window_end: Option<i64>,
    score: Option<i64>,
    payload: String,
    created_at: String,
}

impl TryFrom<ReportRow> for AnalysisReportRecord {
    type Error = RepositoryError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        let parse = |s: &str| Uuid::parse_str(s).map_err(|e| RepositoryError::SerializationError(e.to_string()));
        let kind = ReportKind::from_str(&row.kind)
            .ok_or_else(|| RepositoryError::SerializationError(format!("unknown report kind: {}", row.kind)))?;
        let window = match (row.window_start, row.window_end) {
            (Some(first), Some(last)) => Some((ChapterNumber::new(first as i32), ChapterNumber::new(last as i32))),
            _ => None,
        };

        Ok(AnalysisReportRecord {
            id: parse(&row.id)?,
            manuscript_id: ManuscriptId::from_uuid(parse(&row.manuscript_id)?),
            job_id: row.job_id.as_deref().map(parse).transpose()?.map(JobId::from_uuid),
            kind,
            window,
            score: row.score.map(|s| s.clamp(0, 10) as u8),
            payload: serde_json::from_str(&row.payload).map_err(json_error)?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

const SELECT_REPORT: &str = "SELECT id, manuscript_id, job_id, kind, window_start, window_end, score, payload, created_at FROM analysis_reports";

#[async_trait]
impl AnalysisReportRepositoryPort for SqliteAnalysisReportRepository {
    async fn save(&self, report: &AnalysisReportRecord) -> Result<(), RepositoryError> {
        let payload = serde_json::to_string(&report.payload).map_err(json_error)?;
        sqlx::query(
            r#"
            INSERT INTO analysis_reports (id, manuscript_id, job_id, kind, window_start, window_end, score, payload, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(report.id.to_string())
        .bind(report.manuscript_id.to_string())
        .bind(report.job_id.map(|id| id.to_string()))
        .bind(report.kind.as_str())
        .bind(report.window.map(|(first, _)| first.value() as i64))
        .bind(report.window.map(|(_, last)| last.value() as i64))
        .bind(report.score.map(|s| s as i64))
        .bind(payload)
        .bind(timestamp(report.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_by_manuscript(
        &self,
        manuscript_id: ManuscriptId,
        kind: Option<ReportKind>,
    ) -> Result<Vec<AnalysisReportRecord>, RepositoryError> {
        let rows: Vec<ReportRow> = match kind {
            Some(kind) => sqlx::query_as(&format!(
                "{} WHERE manuscript_id = ? AND kind = ? ORDER BY created_at",
                SELECT_REPORT
            ))
            .bind(manuscript_id.to_string())
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query_as(&format!("{} WHERE manuscript_id = ? ORDER BY created_at", SELECT_REPORT))
                .bind(manuscript_id.to_string())
                .fetch_all(&self.pool)
                .await,
        }
        .map_err(db_error)?;

        rows.into_iter().map(AnalysisReportRecord::try_from).collect()
    }

    async fn find_by_job(&self, job_id: JobId) -> Result<Vec<AnalysisReportRecord>, RepositoryError> {
        let rows: Vec<ReportRow> = sqlx::query_as(&format!("{} WHERE job_id = ? ORDER BY created_at", SELECT_REPORT))
            .bind(job_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.into_iter().map(AnalysisReportRecord::try_from).collect()
    }
}
