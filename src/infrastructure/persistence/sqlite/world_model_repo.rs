//! SQLite World Model Repository
//!
//! 世界模型整体存为一个 JSON 列，每个稿件一行

use async_trait::async_trait;
use chrono::Utc;

use super::database::{db_error, json_error, timestamp};
use super::DbPool;
use crate::application::ports::{RepositoryError, WorldModelRepositoryPort};
use crate::domain::manuscript::ManuscriptId;
use crate::domain::world::WorldModel;

pub struct SqliteWorldModelRepository {
    pool: DbPool,
}

impl SqliteWorldModelRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorldModelRepositoryPort for SqliteWorldModelRepository {
    async fn save(&self, manuscript_id: ManuscriptId, model: &WorldModel) -> Result<(), RepositoryError> {
        let payload = serde_json::to_string(model).map_err(json_error)?;
        sqlx::query(
            r#"
            INSERT INTO world_models (manuscript_id, payload, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(manuscript_id) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(manuscript_id.to_string())
        .bind(payload)
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find(&self, manuscript_id: ManuscriptId) -> Result<Option<WorldModel>, RepositoryError> {
        let payload: Option<(String,)> = sqlx::query_as("SELECT payload FROM world_models WHERE manuscript_id = ?")
            .bind(manuscript_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        payload
            .map(|(raw,)| serde_json::from_str(&raw).map_err(json_error))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::ManuscriptRepositoryPort;
    use crate::domain::manuscript::{ChapterNumber, Manuscript};
    use crate::domain::world::WorldEntity;
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteManuscriptRepository,
    };

    #[tokio::test]
    async fn test_save_replaces_previous_model() {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let manuscript = Manuscript::new("Ashes", "en", "literary").unwrap();
        SqliteManuscriptRepository::new(pool.clone()).save(&manuscript).await.unwrap();
        let repo = SqliteWorldModelRepository::new(pool);

        assert!(repo.find(manuscript.id()).await.unwrap().is_none());

        let mut model = WorldModel::default();
        model
            .characters
            .push(WorldEntity::new("Anna", "A courier", Some(ChapterNumber::new(1))));
        repo.save(manuscript.id(), &model).await.unwrap();
        model.setting_period = Some("1920s".to_string());
        repo.save(manuscript.id(), &model).await.unwrap();

        let found = repo.find(manuscript.id()).await.unwrap().unwrap();
        assert_eq!(found, model);
    }
}
