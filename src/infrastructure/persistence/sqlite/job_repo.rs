//! SQLite Job Repository
//!
//! 锁、心跳与检查点都是带 lock_token 条件的单条 UPDATE

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::database::{db_error, parse_timestamp, timestamp};
use super::DbPool;
use crate::application::ports::{JobRepositoryPort, RepositoryError};
use crate::domain::job::{Checkpoint, JobId, JobKind, JobStage, JobStatus, LongRunningJob};
use crate::domain::manuscript::ManuscriptId;

pub struct SqliteJobRepository {
    pool: DbPool,
}

impl SqliteJobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct JobRow {
    id: String,
    manuscript_id: String,
    kind: String,
    target_language: Option<String>,
    status: String,
    stage: String,
    completed_units: i64,
    total_units: i64,
    heartbeat_at: String,
    lock_token: Option<String>,
    cancel_requested: i64,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<JobRow> for LongRunningJob {
    type Error = RepositoryError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let parse = |s: &str| Uuid::parse_str(s).map_err(|e| RepositoryError::SerializationError(e.to_string()));
        let kind = JobKind::from_parts(&row.kind, row.target_language)
            .ok_or_else(|| RepositoryError::SerializationError(format!("invalid job kind: {}", row.kind)))?;
        let status = JobStatus::from_str(&row.status)
            .ok_or_else(|| RepositoryError::SerializationError(format!("invalid job status: {}", row.status)))?;
        let stage = JobStage::from_str(&row.stage)
            .ok_or_else(|| RepositoryError::SerializationError(format!("invalid job stage: {}", row.stage)))?;

        Ok(LongRunningJob {
            id: JobId::from_uuid(parse(&row.id)?),
            manuscript_id: ManuscriptId::from_uuid(parse(&row.manuscript_id)?),
            kind,
            status,
            checkpoint: Checkpoint::at(stage, row.completed_units as u32, row.total_units as u32),
            heartbeat_at: parse_timestamp(&row.heartbeat_at)?,
            lock_token: row.lock_token,
            cancel_requested: row.cancel_requested != 0,
            error_message: row.error_message,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

const SELECT_JOB: &str = r#"
    SELECT id, manuscript_id, kind, target_language, status, stage, completed_units, total_units,
           heartbeat_at, lock_token, cancel_requested, error_message, created_at, updated_at
    FROM jobs
"#;

#[async_trait]
impl JobRepositoryPort for SqliteJobRepository {
    async fn save(&self, job: &LongRunningJob) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, manuscript_id, kind, target_language, status, stage, completed_units, total_units,
                heartbeat_at, lock_token, cancel_requested, error_message, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                stage = excluded.stage,
                completed_units = excluded.completed_units,
                total_units = excluded.total_units,
                heartbeat_at = excluded.heartbeat_at,
                lock_token = excluded.lock_token,
                cancel_requested = excluded.cancel_requested,
                error_message = excluded.error_message,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(job.id.to_string())
        .bind(job.manuscript_id.to_string())
        .bind(job.kind.as_str())
        .bind(job.kind.target_language())
        .bind(job.status.as_str())
        .bind(job.checkpoint.stage.as_str())
        .bind(job.checkpoint.completed_units as i64)
        .bind(job.checkpoint.total_units as i64)
        .bind(timestamp(job.heartbeat_at))
        .bind(job.lock_token.as_deref())
        .bind(job.cancel_requested as i64)
        .bind(job.error_message.as_deref())
        .bind(timestamp(job.created_at))
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<LongRunningJob>, RepositoryError> {
        let row: Option<JobRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_JOB))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(LongRunningJob::try_from).transpose()
    }

    async fn find_by_manuscript(&self, manuscript_id: ManuscriptId) -> Result<Vec<LongRunningJob>, RepositoryError> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "{} WHERE manuscript_id = ? ORDER BY created_at DESC",
            SELECT_JOB
        ))
        .bind(manuscript_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(LongRunningJob::try_from).collect()
    }

    async fn find_stale(&self, before: DateTime<Utc>) -> Result<Vec<LongRunningJob>, RepositoryError> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "{} WHERE status = 'running' AND heartbeat_at < ? ORDER BY heartbeat_at",
            SELECT_JOB
        ))
        .bind(timestamp(before))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(LongRunningJob::try_from).collect()
    }

    async fn try_acquire_lock(
        &self,
        id: JobId,
        token: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let now = timestamp(Utc::now());
        let result = sqlx::query(
            r#"
            UPDATE jobs SET lock_token = ?, heartbeat_at = ?, updated_at = ?
            WHERE id = ? AND status = 'running'
              AND (lock_token IS NULL OR heartbeat_at < ?)
            "#,
        )
        .bind(token)
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .bind(timestamp(stale_before))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_lock(&self, id: JobId, token: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE jobs SET lock_token = NULL, updated_at = ? WHERE id = ? AND lock_token = ?")
            .bind(timestamp(Utc::now()))
            .bind(id.to_string())
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn heartbeat(&self, id: JobId, token: &str) -> Result<bool, RepositoryError> {
        let now = timestamp(Utc::now());
        let result = sqlx::query("UPDATE jobs SET heartbeat_at = ?, updated_at = ? WHERE id = ? AND lock_token = ?")
            .bind(&now)
            .bind(&now)
            .bind(id.to_string())
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn save_checkpoint(
        &self,
        id: JobId,
        token: &str,
        checkpoint: &Checkpoint,
    ) -> Result<bool, RepositoryError> {
        let now = timestamp(Utc::now());
        let result = sqlx::query(
            r#"
            UPDATE jobs SET stage = ?, completed_units = ?, total_units = ?, heartbeat_at = ?, updated_at = ?
            WHERE id = ? AND lock_token = ?
            "#,
        )
        .bind(checkpoint.stage.as_str())
        .bind(checkpoint.completed_units as i64)
        .bind(checkpoint.total_units as i64)
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn finish(
        &self,
        id: JobId,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE jobs SET status = ?, error_message = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(error_message)
            .bind(timestamp(Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Job {}", id)));
        }
        Ok(())
    }

    async fn request_cancel(&self, id: JobId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE jobs SET cancel_requested = 1, updated_at = ? WHERE id = ?")
            .bind(timestamp(Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Job {}", id)));
        }
        Ok(())
    }
}
