//! Repository Ports - 出站端口
//!
//! 定义数据持久化的抽象接口
//! 具体实现在 infrastructure 层（如 SQLite）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::job::{Checkpoint, JobId, JobStatus, LongRunningJob};
use crate::domain::manuscript::{Chapter, ChapterNumber, Manuscript, ManuscriptId, ManuscriptStatus};
use crate::domain::review::ReviewPass;
use crate::domain::world::WorldModel;

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// ============================================================================
// Manuscript Repository
// ============================================================================

/// 译文章节（用于持久化）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRecord {
    pub id: Uuid,
    pub manuscript_id: ManuscriptId,
    pub chapter_id: Uuid,
    pub chapter_number: ChapterNumber,
    pub target_language: String,
    pub title: String,
    pub content: String,
    /// 翻译所依据原文的哈希
    pub source_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Manuscript Repository Port
#[async_trait]
pub trait ManuscriptRepositoryPort: Send + Sync {
    /// 保存稿件及全部章节
    async fn save(&self, manuscript: &Manuscript) -> Result<(), RepositoryError>;

    /// 根据 ID 查找稿件（含章节）
    async fn find_by_id(&self, id: ManuscriptId) -> Result<Option<Manuscript>, RepositoryError>;

    /// 保存单个章节（每个工作单元结束时调用）
    async fn save_chapter(&self, manuscript_id: ManuscriptId, chapter: &Chapter) -> Result<(), RepositoryError>;

    /// 更新稿件生命周期状态
    async fn update_status(&self, id: ManuscriptId, status: ManuscriptStatus) -> Result<(), RepositoryError>;

    /// 保存译文章节
    async fn save_translation(&self, translation: &TranslationRecord) -> Result<(), RepositoryError>;

    /// 获取稿件某语言的全部译文章节
    async fn find_translations(
        &self,
        manuscript_id: ManuscriptId,
        target_language: &str,
    ) -> Result<Vec<TranslationRecord>, RepositoryError>;
}

// ============================================================================
// World Model Repository
// ============================================================================

/// World Model Repository Port
#[async_trait]
pub trait WorldModelRepositoryPort: Send + Sync {
    async fn save(&self, manuscript_id: ManuscriptId, model: &WorldModel) -> Result<(), RepositoryError>;

    async fn find(&self, manuscript_id: ManuscriptId) -> Result<Option<WorldModel>, RepositoryError>;
}

// ============================================================================
// Analysis Report Repository
// ============================================================================

/// 分析报告类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Structure,
    Architect,
    Continuity,
    VoiceRhythm,
    Repetition,
    Anachronism,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Structure => "structure",
            ReportKind::Architect => "architect",
            ReportKind::Continuity => "continuity",
            ReportKind::VoiceRhythm => "voice_rhythm",
            ReportKind::Repetition => "repetition",
            ReportKind::Anachronism => "anachronism",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "structure" => Some(ReportKind::Structure),
            "architect" => Some(ReportKind::Architect),
            "continuity" => Some(ReportKind::Continuity),
            "voice_rhythm" => Some(ReportKind::VoiceRhythm),
            "repetition" => Some(ReportKind::Repetition),
            "anachronism" => Some(ReportKind::Anachronism),
            _ => None,
        }
    }
}

/// 分析报告（用于持久化）
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReportRecord {
    pub id: Uuid,
    pub manuscript_id: ManuscriptId,
    pub job_id: Option<JobId>,
    pub kind: ReportKind,
    /// 覆盖的章节窗口（首、尾）
    pub window: Option<(ChapterNumber, ChapterNumber)>,
    pub score: Option<u8>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AnalysisReportRecord {
    pub fn new(
        manuscript_id: ManuscriptId,
        job_id: Option<JobId>,
        kind: ReportKind,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            manuscript_id,
            job_id,
            kind,
            window: None,
            score: None,
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn with_window(mut self, first: ChapterNumber, last: ChapterNumber) -> Self {
        self.window = Some((first, last));
        self
    }

    pub fn with_score(mut self, score: u8) -> Self {
        self.score = Some(score);
        self
    }
}

/// Analysis Report Repository Port
#[async_trait]
pub trait AnalysisReportRepositoryPort: Send + Sync {
    async fn save(&self, report: &AnalysisReportRecord) -> Result<(), RepositoryError>;

    /// 获取稿件的报告（按时间顺序），可按类型过滤
    async fn find_by_manuscript(
        &self,
        manuscript_id: ManuscriptId,
        kind: Option<ReportKind>,
    ) -> Result<Vec<AnalysisReportRecord>, RepositoryError>;

    /// 获取任务的报告（用于恢复时跳过已完成的审计窗口）
    async fn find_by_job(&self, job_id: JobId) -> Result<Vec<AnalysisReportRecord>, RepositoryError>;
}

// ============================================================================
// Review Pass Repository
// ============================================================================

/// Review Pass Repository Port
#[async_trait]
pub trait ReviewPassRepositoryPort: Send + Sync {
    async fn save(
        &self,
        job_id: JobId,
        manuscript_id: ManuscriptId,
        pass: &ReviewPass,
    ) -> Result<(), RepositoryError>;

    /// 获取任务的全部审阅轮次（按轮次升序）
    async fn find_by_job(&self, job_id: JobId) -> Result<Vec<ReviewPass>, RepositoryError>;
}

// ============================================================================
// Job Repository
// ============================================================================

/// Job Repository Port
///
/// 锁相关操作必须是单条原子更新
#[async_trait]
pub trait JobRepositoryPort: Send + Sync {
    /// 插入或整体更新任务
    async fn save(&self, job: &LongRunningJob) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: JobId) -> Result<Option<LongRunningJob>, RepositoryError>;

    /// 稿件的全部任务（新到旧）
    async fn find_by_manuscript(&self, manuscript_id: ManuscriptId) -> Result<Vec<LongRunningJob>, RepositoryError>;

    /// 心跳早于 `before` 的 running 任务
    async fn find_stale(&self, before: DateTime<Utc>) -> Result<Vec<LongRunningJob>, RepositoryError>;

    /// 原子获取锁：无人持有或持有者心跳早于 `stale_before`
    async fn try_acquire_lock(
        &self,
        id: JobId,
        token: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// 释放锁（仅当令牌匹配）
    async fn release_lock(&self, id: JobId, token: &str) -> Result<(), RepositoryError>;

    /// 刷新心跳，锁已被接管时返回 false
    async fn heartbeat(&self, id: JobId, token: &str) -> Result<bool, RepositoryError>;

    /// 写入检查点并刷新心跳，锁已被接管时返回 false
    async fn save_checkpoint(
        &self,
        id: JobId,
        token: &str,
        checkpoint: &Checkpoint,
    ) -> Result<bool, RepositoryError>;

    /// 终态写入
    async fn finish(
        &self,
        id: JobId,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// 标记取消请求
    async fn request_cancel(&self, id: JobId) -> Result<(), RepositoryError>;
}
