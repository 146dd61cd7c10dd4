//! Manuscript HTTP Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::{CreateManuscript, GetManuscript, GetTranslation, ListAnalysisReports, NewChapter};
use crate::infrastructure::http::dto::{
    ApiResponse, CreateManuscriptRequest, GetTranslationRequest, ListReportsRequest, ManuscriptIdRequest,
    ManuscriptResponse, ReportResponse, TranslatedChapterResponse, TranslationResponse,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 导入已分章的稿件
pub async fn create_manuscript(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateManuscriptRequest>,
) -> Result<Json<ApiResponse<ManuscriptResponse>>, ApiError> {
    let command = CreateManuscript {
        title: request.title,
        language: request.language,
        genre: request.genre,
        chapters: request
            .chapters
            .into_iter()
            .map(|c| NewChapter {
                number: c.number,
                title: c.title,
                content: c.content,
            })
            .collect(),
    };

    let manuscript = state.create_manuscript_handler.handle(command).await?;

    tracing::info!(
        manuscript_id = %manuscript.id(),
        chapters = manuscript.chapter_count(),
        "Manuscript created"
    );

    Ok(Json(ApiResponse::success(ManuscriptResponse::from(&manuscript))))
}

/// 获取稿件详情（含章节当前内容）
pub async fn get_manuscript(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ManuscriptIdRequest>,
) -> Result<Json<ApiResponse<ManuscriptResponse>>, ApiError> {
    let manuscript = state
        .get_manuscript_handler
        .handle(GetManuscript {
            manuscript_id: request.manuscript_id,
        })
        .await?;

    Ok(Json(ApiResponse::success(ManuscriptResponse::from(&manuscript))))
}

/// 列出分析报告，可按类型过滤
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ListReportsRequest>,
) -> Result<Json<ApiResponse<Vec<ReportResponse>>>, ApiError> {
    let reports = state
        .list_reports_handler
        .handle(ListAnalysisReports {
            manuscript_id: request.manuscript_id,
            kind: request.kind,
        })
        .await?;

    Ok(Json(ApiResponse::success(
        reports.into_iter().map(ReportResponse::from).collect(),
    )))
}

pub async fn get_translation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GetTranslationRequest>,
) -> Result<Json<ApiResponse<TranslationResponse>>, ApiError> {
    let records = state
        .get_translation_handler
        .handle(GetTranslation {
            manuscript_id: request.manuscript_id,
            target_language: request.target_language.clone(),
        })
        .await?;

    Ok(Json(ApiResponse::success(TranslationResponse {
        manuscript_id: request.manuscript_id,
        target_language: request.target_language,
        chapters: records.into_iter().map(TranslatedChapterResponse::from).collect(),
    })))
}
