//! Data Transfer Objects

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::{AnalysisReportRecord, TranslationRecord};
use crate::domain::job::LongRunningJob;
use crate::domain::manuscript::{Chapter, Manuscript};
use crate::domain::review::{Defect, ReviewPass};

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

// ============================================================================
// Manuscript DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChapterInput {
    pub number: i32,
    #[serde(default)]
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateManuscriptRequest {
    pub title: String,
    pub language: String,
    #[serde(default)]
    pub genre: String,
    pub chapters: Vec<ChapterInput>,
}

#[derive(Debug, Deserialize)]
pub struct ManuscriptIdRequest {
    pub manuscript_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ListReportsRequest {
    pub manuscript_id: Uuid,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetTranslationRequest {
    pub manuscript_id: Uuid,
    pub target_language: String,
}

#[derive(Debug, Serialize)]
pub struct ChapterResponse {
    pub id: Uuid,
    pub number: i32,
    pub label: String,
    pub position: usize,
    pub title: String,
    pub status: String,
    pub char_count: usize,
    pub edited: bool,
    pub content: String,
    pub summary: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub thinking_tokens: u64,
}

impl From<&Chapter> for ChapterResponse {
    fn from(chapter: &Chapter) -> Self {
        let usage = chapter.token_usage();
        Self {
            id: chapter.id(),
            number: chapter.number().value(),
            label: chapter.number().label(),
            position: chapter.position(),
            title: chapter.title().to_string(),
            status: chapter.status().as_str().to_string(),
            char_count: chapter.char_count(),
            edited: chapter.edited_content().is_some(),
            content: chapter.current_content().to_string(),
            summary: chapter.summary().map(str::to_string),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            thinking_tokens: usage.thinking_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ManuscriptResponse {
    pub id: Uuid,
    pub title: String,
    pub language: String,
    pub genre: String,
    pub status: String,
    pub total_chapters: usize,
    pub chapters: Vec<ChapterResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Manuscript> for ManuscriptResponse {
    fn from(manuscript: &Manuscript) -> Self {
        Self {
            id: *manuscript.id().as_uuid(),
            title: manuscript.title().to_string(),
            language: manuscript.language().to_string(),
            genre: manuscript.genre().to_string(),
            status: manuscript.status().as_str().to_string(),
            total_chapters: manuscript.chapter_count(),
            chapters: manuscript
                .chapters_in_source_order()
                .into_iter()
                .map(ChapterResponse::from)
                .collect(),
            created_at: manuscript.created_at().to_rfc3339(),
            updated_at: manuscript.updated_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: Uuid,
    pub job_id: Option<Uuid>,
    pub kind: String,
    pub window_start: Option<i32>,
    pub window_end: Option<i32>,
    pub score: Option<u8>,
    pub payload: serde_json::Value,
    pub created_at: String,
}

impl From<AnalysisReportRecord> for ReportResponse {
    fn from(report: AnalysisReportRecord) -> Self {
        Self {
            id: report.id,
            job_id: report.job_id.map(|id| *id.as_uuid()),
            kind: report.kind.as_str().to_string(),
            window_start: report.window.map(|(first, _)| first.value()),
            window_end: report.window.map(|(_, last)| last.value()),
            score: report.score,
            payload: report.payload,
            created_at: report.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TranslatedChapterResponse {
    pub chapter_id: Uuid,
    pub chapter_number: i32,
    pub title: String,
    pub content: String,
}

impl From<TranslationRecord> for TranslatedChapterResponse {
    fn from(record: TranslationRecord) -> Self {
        Self {
            chapter_id: record.chapter_id,
            chapter_number: record.chapter_number.value(),
            title: record.title,
            content: record.content,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TranslationResponse {
    pub manuscript_id: Uuid,
    pub target_language: String,
    pub chapters: Vec<TranslatedChapterResponse>,
}

// ============================================================================
// Job DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartJobRequest {
    pub manuscript_id: Uuid,
    /// 为空时启动修订任务，否则启动翻译任务
    #[serde(default)]
    pub target_language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobIdRequest {
    pub job_id: Uuid,
}

/// 任务快照
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub manuscript_id: Uuid,
    pub kind: String,
    pub target_language: Option<String>,
    pub status: String,
    pub stage: String,
    pub completed_units: u32,
    pub total_units: u32,
    pub heartbeat_at: String,
    pub cancel_requested: bool,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&LongRunningJob> for JobResponse {
    fn from(job: &LongRunningJob) -> Self {
        Self {
            id: *job.id.as_uuid(),
            manuscript_id: *job.manuscript_id.as_uuid(),
            kind: job.kind.as_str().to_string(),
            target_language: job.kind.target_language().map(str::to_string),
            status: job.status.as_str().to_string(),
            stage: job.checkpoint.stage.as_str().to_string(),
            completed_units: job.checkpoint.completed_units,
            total_units: job.checkpoint.total_units,
            heartbeat_at: job.heartbeat_at.to_rfc3339(),
            cancel_requested: job.cancel_requested,
            error_message: job.error_message.clone(),
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Review DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ReviewPassResponse {
    pub pass_number: u32,
    pub score: u8,
    pub verdict: String,
    pub defects: Vec<Defect>,
    pub unresolved_defects: Vec<Defect>,
    pub resolved_defect_descriptions: Vec<String>,
    pub created_at: String,
}

impl From<ReviewPass> for ReviewPassResponse {
    fn from(pass: ReviewPass) -> Self {
        Self {
            pass_number: pass.pass_number,
            score: pass.score,
            verdict: pass.verdict.as_str().to_string(),
            defects: pass.defects,
            unresolved_defects: pass.unresolved_defects,
            resolved_defect_descriptions: pass.resolved_defect_descriptions,
            created_at: pass.created_at.to_rfc3339(),
        }
    }
}
