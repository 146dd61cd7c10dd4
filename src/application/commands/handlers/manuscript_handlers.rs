//! Manuscript Command Handlers

use std::sync::Arc;

use crate::application::commands::CreateManuscript;
use crate::application::error::ApplicationError;
use crate::application::ports::ManuscriptRepositoryPort;
use crate::domain::manuscript::{Chapter, ChapterNumber, Manuscript};

/// CreateManuscript Handler
pub struct CreateManuscriptHandler {
    manuscripts: Arc<dyn ManuscriptRepositoryPort>,
}

impl CreateManuscriptHandler {
    pub fn new(manuscripts: Arc<dyn ManuscriptRepositoryPort>) -> Self {
        Self { manuscripts }
    }

    pub async fn handle(&self, command: CreateManuscript) -> Result<Manuscript, ApplicationError> {
        if command.chapters.is_empty() {
            return Err(ApplicationError::validation("Manuscript must contain at least one chapter"));
        }
        if command.language.trim().is_empty() {
            return Err(ApplicationError::validation("Language must not be empty"));
        }

        let mut manuscript = Manuscript::new(command.title, command.language, command.genre)?;
        // 导入顺序即来源顺序，编号重复也原样保留，交给结构分析处理
        for chapter in command.chapters {
            manuscript.add_chapter(Chapter::new(
                ChapterNumber::new(chapter.number),
                chapter.title,
                chapter.content,
            ));
        }

        self.manuscripts.save(&manuscript).await?;

        tracing::info!(
            manuscript_id = %manuscript.id(),
            title = %manuscript.title(),
            chapters = manuscript.chapter_count(),
            "Manuscript created"
        );
        Ok(manuscript)
    }
}
