//! SQLite Review Pass Repository

use async_trait::async_trait;
use sqlx::FromRow;

use super::database::{db_error, json_error, parse_timestamp, timestamp};
use super::DbPool;
use crate::application::ports::{RepositoryError, ReviewPassRepositoryPort};
use crate::domain::job::JobId;
use crate::domain::manuscript::ManuscriptId;
use crate::domain::review::{ReviewPass, Verdict};

pub struct SqliteReviewPassRepository {
    pool: DbPool,
}

impl SqliteReviewPassRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ReviewPassRow {
    pass_number: i64,
    score: i64,
    verdict: String,
    defects: String,
    unresolved_defects: String,
    resolved_descriptions: String,
    created_at: String,
}

impl TryFrom<ReviewPassRow> for ReviewPass {
    type Error = RepositoryError;

    fn try_from(row: ReviewPassRow) -> Result<Self, Self::Error> {
        Ok(ReviewPass {
            pass_number: row.pass_number as u32,
            score: row.score.clamp(0, 10) as u8,
            verdict: Verdict::from_str(&row.verdict)
                .ok_or_else(|| RepositoryError::SerializationError(format!("unknown verdict: {}", row.verdict)))?,
            defects: serde_json::from_str(&row.defects).map_err(json_error)?,
            unresolved_defects: serde_json::from_str(&row.unresolved_defects).map_err(json_error)?,
            resolved_defect_descriptions: serde_json::from_str(&row.resolved_descriptions).map_err(json_error)?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[async_trait]
impl ReviewPassRepositoryPort for SqliteReviewPassRepository {
    async fn save(&self, job_id: JobId, manuscript_id: ManuscriptId, pass: &ReviewPass) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO review_passes (
                job_id, pass_number, manuscript_id, score, verdict, defects, unresolved_defects,
                resolved_descriptions, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(job_id, pass_number) DO UPDATE SET
                score = excluded.score,
                verdict = excluded.verdict,
                defects = excluded.defects,
                unresolved_defects = excluded.unresolved_defects,
                resolved_descriptions = excluded.resolved_descriptions
            "#,
        )
        .bind(job_id.to_string())
        .bind(pass.pass_number as i64)
        .bind(manuscript_id.to_string())
        .bind(pass.score as i64)
        .bind(pass.verdict.as_str())
        .bind(serde_json::to_string(&pass.defects).map_err(json_error)?)
        .bind(serde_json::to_string(&pass.unresolved_defects).map_err(json_error)?)
        .bind(serde_json::to_string(&pass.resolved_defect_descriptions).map_err(json_error)?)
        .bind(timestamp(pass.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_by_job(&self, job_id: JobId) -> Result<Vec<ReviewPass>, RepositoryError> {
        let rows: Vec<ReviewPassRow> = sqlx::query_as(
            r#"
            SELECT pass_number, score, verdict, defects, unresolved_defects, resolved_descriptions, created_at
            FROM review_passes WHERE job_id = ? ORDER BY pass_number
            "#,
        )
        .bind(job_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(ReviewPass::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::manuscript::ChapterNumber;
    use crate::domain::review::{Defect, DefectCategory, Severity};
    use crate::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};

    #[tokio::test]
    async fn test_passes_round_trip_in_order() {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = SqliteReviewPassRepository::new(pool);
        let job_id = JobId::new();
        let manuscript_id = ManuscriptId::new();

        let defect = Defect::new(
            DefectCategory::Continuity,
            Severity::Major,
            vec![ChapterNumber::new(3)],
            "Anna's wound vanishes",
            "Mention the bandage",
        );
        let mut second = ReviewPass::new(2, 9, 9, Vec::new());
        second.resolved_defect_descriptions = vec!["Anna's wound vanishes".to_string()];
        let mut first = ReviewPass::new(1, 7, 9, vec![defect.clone()]);
        first.unresolved_defects = vec![defect];

        repo.save(job_id, manuscript_id, &second).await.unwrap();
        repo.save(job_id, manuscript_id, &first).await.unwrap();
        // 同一轮次重复保存不产生新行
        repo.save(job_id, manuscript_id, &first).await.unwrap();

        let passes = repo.find_by_job(job_id).await.unwrap();
        assert_eq!(passes.len(), 2);
        assert_eq!(passes[0].pass_number, 1);
        assert_eq!(passes[0].verdict, Verdict::RequiresRevision);
        assert_eq!(passes[0].unresolved_defects.len(), 1);
        assert_eq!(passes[1].resolved_defect_descriptions, vec!["Anna's wound vanishes".to_string()]);
        assert!(repo.find_by_job(JobId::new()).await.unwrap().is_empty());
    }
}
