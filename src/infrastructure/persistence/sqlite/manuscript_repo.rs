//! SQLite Manuscript Repository

use async_trait::async_trait;
use chrono::Utc;
use sqlx::FromRow;
use uuid::Uuid;

use super::database::{db_error, parse_timestamp, timestamp};
use super::DbPool;
use crate::application::ports::{ManuscriptRepositoryPort, RepositoryError, TranslationRecord};
use crate::domain::manuscript::{
    Chapter, ChapterNumber, ChapterStatus, Manuscript, ManuscriptId, ManuscriptStatus, TokenUsage,
};

/// SQLite Manuscript Repository
pub struct SqliteManuscriptRepository {
    pool: DbPool,
}

impl SqliteManuscriptRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_uuid(value: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(value).map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

#[derive(FromRow)]
struct ManuscriptRow {
    id: String,
    title: String,
    language: String,
    genre: String,
    status: String,
    created_at: String,
    updated_at: String,
}

#[derive(FromRow)]
struct ChapterRow {
    id: String,
    chapter_number: i64,
    position: i64,
    title: String,
    original_content: String,
    edited_content: Option<String>,
    summary: Option<String>,
    summary_hash: Option<String>,
    status: String,
    input_tokens: i64,
    output_tokens: i64,
    thinking_tokens: i64,
}

impl TryFrom<ChapterRow> for Chapter {
    type Error = RepositoryError;

    fn try_from(row: ChapterRow) -> Result<Self, Self::Error> {
        Ok(Chapter::restore(
            parse_uuid(&row.id)?,
            ChapterNumber::new(row.chapter_number as i32),
            row.position as usize,
            row.title,
            row.original_content,
            row.edited_content,
            row.summary,
            row.summary_hash,
            ChapterStatus::from_str(&row.status).unwrap_or_default(),
            TokenUsage::new(
                row.input_tokens as u64,
                row.output_tokens as u64,
                row.thinking_tokens as u64,
            ),
        ))
    }
}

#[derive(FromRow)]
struct TranslationRow {
    id: String,
    manuscript_id: String,
    chapter_id: String,
    chapter_number: i64,
    target_language: String,
    title: String,
    content: String,
    source_hash: String,
    created_at: String,
}

impl TryFrom<TranslationRow> for TranslationRecord {
    type Error = RepositoryError;

    fn try_from(row: TranslationRow) -> Result<Self, Self::Error> {
        Ok(TranslationRecord {
            id: parse_uuid(&row.id)?,
            manuscript_id: ManuscriptId::from_uuid(parse_uuid(&row.manuscript_id)?),
            chapter_id: parse_uuid(&row.chapter_id)?,
            chapter_number: ChapterNumber::new(row.chapter_number as i32),
            target_language: row.target_language,
            title: row.title,
            content: row.content,
            source_hash: row.source_hash,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

const UPSERT_CHAPTER: &str = r#"
    INSERT INTO chapters (
        id, manuscript_id, chapter_number, position, title, original_content, edited_content,
        summary, summary_hash, status, input_tokens, output_tokens, thinking_tokens, updated_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        chapter_number = excluded.chapter_number,
        position = excluded.position,
        title = excluded.title,
        edited_content = excluded.edited_content,
        summary = excluded.summary,
        summary_hash = excluded.summary_hash,
        status = excluded.status,
        input_tokens = excluded.input_tokens,
        output_tokens = excluded.output_tokens,
        thinking_tokens = excluded.thinking_tokens,
        updated_at = excluded.updated_at
"#;

fn bind_chapter<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    manuscript_id: ManuscriptId,
    chapter: &'q Chapter,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    let usage = chapter.token_usage();
    query
        .bind(chapter.id().to_string())
        .bind(manuscript_id.to_string())
        .bind(chapter.number().value() as i64)
        .bind(chapter.position() as i64)
        .bind(chapter.title())
        .bind(chapter.original_content())
        .bind(chapter.edited_content())
        .bind(chapter.summary())
        .bind(chapter.summary_hash())
        .bind(chapter.status().as_str())
        .bind(usage.input_tokens as i64)
        .bind(usage.output_tokens as i64)
        .bind(usage.thinking_tokens as i64)
        .bind(timestamp(Utc::now()))
}

#[async_trait]
impl ManuscriptRepositoryPort for SqliteManuscriptRepository {
    async fn save(&self, manuscript: &Manuscript) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(
            r#"
            INSERT INTO manuscripts (id, title, language, genre, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                language = excluded.language,
                genre = excluded.genre,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(manuscript.id().to_string())
        .bind(manuscript.title())
        .bind(manuscript.language())
        .bind(manuscript.genre())
        .bind(manuscript.status().as_str())
        .bind(timestamp(manuscript.created_at()))
        .bind(timestamp(manuscript.updated_at()))
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        for chapter in manuscript.chapters() {
            bind_chapter(sqlx::query(UPSERT_CHAPTER), manuscript.id(), chapter)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn find_by_id(&self, id: ManuscriptId) -> Result<Option<Manuscript>, RepositoryError> {
        let row: Option<ManuscriptRow> = sqlx::query_as(
            "SELECT id, title, language, genre, status, created_at, updated_at FROM manuscripts WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let chapter_rows: Vec<ChapterRow> = sqlx::query_as(
            r#"
            SELECT id, chapter_number, position, title, original_content, edited_content,
                   summary, summary_hash, status, input_tokens, output_tokens, thinking_tokens
            FROM chapters WHERE manuscript_id = ? ORDER BY position
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let chapters = chapter_rows
            .into_iter()
            .map(Chapter::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Manuscript::restore(
            ManuscriptId::from_uuid(parse_uuid(&row.id)?),
            row.title,
            row.language,
            row.genre,
            ManuscriptStatus::from_str(&row.status).unwrap_or_default(),
            chapters,
            parse_timestamp(&row.created_at)?,
            parse_timestamp(&row.updated_at)?,
        )))
    }

    async fn save_chapter(&self, manuscript_id: ManuscriptId, chapter: &Chapter) -> Result<(), RepositoryError> {
        bind_chapter(sqlx::query(UPSERT_CHAPTER), manuscript_id, chapter)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn update_status(&self, id: ManuscriptId, status: ManuscriptStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE manuscripts SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(timestamp(Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Manuscript {}", id)));
        }
        Ok(())
    }

    async fn save_translation(&self, translation: &TranslationRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO translations (
                id, manuscript_id, chapter_id, chapter_number, target_language, title, content, source_hash, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(chapter_id, target_language) DO UPDATE SET
                chapter_number = excluded.chapter_number,
                title = excluded.title,
                content = excluded.content,
                source_hash = excluded.source_hash,
                created_at = excluded.created_at
            "#,
        )
        .bind(translation.id.to_string())
        .bind(translation.manuscript_id.to_string())
        .bind(translation.chapter_id.to_string())
        .bind(translation.chapter_number.value() as i64)
        .bind(&translation.target_language)
        .bind(&translation.title)
        .bind(&translation.content)
        .bind(&translation.source_hash)
        .bind(timestamp(translation.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_translations(
        &self,
        manuscript_id: ManuscriptId,
        target_language: &str,
    ) -> Result<Vec<TranslationRecord>, RepositoryError> {
        let rows: Vec<TranslationRow> = sqlx::query_as(
            r#"
            SELECT id, manuscript_id, chapter_id, chapter_number, target_language, title, content, source_hash, created_at
            FROM translations WHERE manuscript_id = ? AND target_language = ?
            "#,
        )
        .bind(manuscript_id.to_string())
        .bind(target_language)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(TranslationRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};

    async fn repo() -> SqliteManuscriptRepository {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteManuscriptRepository::new(pool)
    }

    fn manuscript() -> Manuscript {
        let mut manuscript = Manuscript::new("Ashes", "en", "literary").unwrap();
        for (number, content) in [(2, "second"), (0, "prologue"), (1, "first"), (2, "second again")] {
            manuscript.add_chapter(Chapter::new(ChapterNumber::new(number), format!("Ch {}", number), content));
        }
        manuscript
    }

    #[tokio::test]
    async fn test_save_and_find_keeps_duplicates_and_order() {
        let repo = repo().await;
        let manuscript = manuscript();
        repo.save(&manuscript).await.unwrap();

        let found = repo.find_by_id(manuscript.id()).await.unwrap().unwrap();

        assert_eq!(found.chapter_count(), 4);
        let numbers: Vec<i32> = found.chapters().iter().map(|c| c.number().value()).collect();
        assert_eq!(numbers, vec![0, 1, 2, 2]);
        let source: Vec<&str> = found
            .chapters_in_source_order()
            .iter()
            .map(|c| c.original_content())
            .collect();
        assert_eq!(source, vec!["second", "prologue", "first", "second again"]);
    }

    #[tokio::test]
    async fn test_save_chapter_persists_edit_and_usage() {
        let repo = repo().await;
        let mut manuscript = manuscript();
        repo.save(&manuscript).await.unwrap();

        let chapter = manuscript.chapter_mut(ChapterNumber::new(1)).unwrap();
        chapter.apply_edit("first, revised".to_string());
        chapter.set_summary("A revision.".to_string());
        chapter.record_usage(&TokenUsage::new(100, 50, 10));
        let snapshot = chapter.clone();
        repo.save_chapter(manuscript.id(), &snapshot).await.unwrap();

        let found = repo.find_by_id(manuscript.id()).await.unwrap().unwrap();
        let chapter = found.chapter(ChapterNumber::new(1)).unwrap();
        assert_eq!(chapter.current_content(), "first, revised");
        assert_eq!(chapter.original_content(), "first");
        assert!(chapter.has_fresh_summary());
        assert_eq!(chapter.token_usage().total(), 160);
    }

    #[tokio::test]
    async fn test_update_status_unknown_manuscript() {
        let repo = repo().await;
        let result = repo.update_status(ManuscriptId::new(), ManuscriptStatus::Processing).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_translation_upsert_replaces_stale_entry() {
        let repo = repo().await;
        let manuscript = manuscript();
        repo.save(&manuscript).await.unwrap();
        let chapter = &manuscript.chapters()[0];
        let mut record = TranslationRecord {
            id: Uuid::new_v4(),
            manuscript_id: manuscript.id(),
            chapter_id: chapter.id(),
            chapter_number: chapter.number(),
            target_language: "es".to_string(),
            title: "Prólogo".to_string(),
            content: "viejo".to_string(),
            source_hash: "old".to_string(),
            created_at: Utc::now(),
        };
        repo.save_translation(&record).await.unwrap();
        record.id = Uuid::new_v4();
        record.content = "nuevo".to_string();
        record.source_hash = chapter.current_hash();
        repo.save_translation(&record).await.unwrap();

        let found = repo.find_translations(manuscript.id(), "es").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "nuevo");
        assert!(repo.find_translations(manuscript.id(), "de").await.unwrap().is_empty());
    }
}
