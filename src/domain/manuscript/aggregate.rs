//! Manuscript Context - Aggregate Root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Chapter, ChapterNumber, ManuscriptError, ManuscriptId, ManuscriptStatus};

/// Manuscript 聚合根
///
/// 不变量:
/// - 章节只属于一个 Manuscript
/// - 同一时刻只有一个流水线阶段修改章节
/// - chapters() 始终按派生的章节排序返回
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manuscript {
    id: ManuscriptId,
    title: String,
    language: String,
    genre: String,
    status: ManuscriptStatus,
    chapters: Vec<Chapter>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Manuscript {
    /// 创建新稿件
    pub fn new(
        title: impl Into<String>,
        language: impl Into<String>,
        genre: impl Into<String>,
    ) -> Result<Self, ManuscriptError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ManuscriptError::InvalidTitle("标题不能为空".to_string()));
        }
        let now = Utc::now();
        Ok(Self {
            id: ManuscriptId::new(),
            title,
            language: language.into(),
            genre: genre.into(),
            status: ManuscriptStatus::Pending,
            chapters: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// 从持久化数据重建
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ManuscriptId,
        title: String,
        language: String,
        genre: String,
        status: ManuscriptStatus,
        chapters: Vec<Chapter>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let mut manuscript = Self {
            id,
            title,
            language,
            genre,
            status,
            chapters,
            created_at,
            updated_at,
        };
        manuscript.sort_chapters();
        manuscript
    }

    /// 添加章节（保持排序）
    pub fn add_chapter(&mut self, mut chapter: Chapter) {
        chapter.set_position(self.chapters.len());
        self.chapters.push(chapter);
        self.sort_chapters();
        self.updated_at = Utc::now();
    }

    // 编号相同的章节保留来源先后
    fn sort_chapters(&mut self) {
        self.chapters.sort_by_key(|c| (c.number(), c.position()));
    }

    /// 按来源顺序（导入顺序）返回章节
    pub fn chapters_in_source_order(&self) -> Vec<&Chapter> {
        let mut chapters: Vec<&Chapter> = self.chapters.iter().collect();
        chapters.sort_by_key(|c| c.position());
        chapters
    }

    pub fn id(&self) -> ManuscriptId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn genre(&self) -> &str {
        &self.genre
    }

    pub fn status(&self) -> ManuscriptStatus {
        self.status
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 按编号查找（编号重复时返回排序后的第一个；需要逐个副本处理时用 `chapters_numbered`）
    pub fn chapter(&self, number: ChapterNumber) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.number() == number)
    }

    /// 同一编号的全部章节（编号允许重复）
    pub fn chapters_numbered(&self, number: ChapterNumber) -> impl Iterator<Item = &Chapter> {
        self.chapters.iter().filter(move |c| c.number() == number)
    }

    pub fn chapter_by_id(&self, id: Uuid) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id() == id)
    }

    pub fn chapter_by_id_mut(&mut self, id: Uuid) -> Option<&mut Chapter> {
        self.updated_at = Utc::now();
        self.chapters.iter_mut().find(|c| c.id() == id)
    }

    pub fn chapter_mut(&mut self, number: ChapterNumber) -> Option<&mut Chapter> {
        self.updated_at = Utc::now();
        self.chapters.iter_mut().find(|c| c.number() == number)
    }

    /// 状态迁移: pending → processing → completed | error
    pub fn transition_to(&mut self, next: ManuscriptStatus) -> Result<(), ManuscriptError> {
        let allowed = matches!(
            (self.status, next),
            (ManuscriptStatus::Pending, ManuscriptStatus::Processing)
                | (ManuscriptStatus::Processing, ManuscriptStatus::Completed)
                | (ManuscriptStatus::Processing, ManuscriptStatus::Error)
                // 恢复或重新运行
                | (ManuscriptStatus::Error, ManuscriptStatus::Processing)
                | (ManuscriptStatus::Completed, ManuscriptStatus::Processing)
                | (ManuscriptStatus::Processing, ManuscriptStatus::Processing)
        );
        if !allowed {
            return Err(ManuscriptError::InvalidTransition {
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
