//! Job HTTP Handlers
//!
//! 启动、取消、恢复与查询长时任务

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::{CancelJob, GetJob, ListManuscriptJobs, ResumeJob, StartRevision, StartTranslation};
use crate::infrastructure::http::dto::{ApiResponse, JobIdRequest, JobResponse, ManuscriptIdRequest, StartJobRequest};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 启动任务：带 target_language 时为翻译，否则为修订
pub async fn start_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartJobRequest>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let job = match request.target_language {
        Some(target_language) => {
            state
                .start_job_handler
                .start_translation(StartTranslation {
                    manuscript_id: request.manuscript_id,
                    target_language,
                })
                .await?
        }
        None => {
            state
                .start_job_handler
                .start_revision(StartRevision {
                    manuscript_id: request.manuscript_id,
                })
                .await?
        }
    };

    tracing::info!(
        job_id = %job.id,
        manuscript_id = %job.manuscript_id,
        kind = job.kind.as_str(),
        "Job started"
    );

    Ok(Json(ApiResponse::success(JobResponse::from(&job))))
}

pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JobIdRequest>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let job = state
        .cancel_job_handler
        .handle(CancelJob { job_id: request.job_id })
        .await?;

    Ok(Json(ApiResponse::success(JobResponse::from(&job))))
}

pub async fn resume_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JobIdRequest>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let job = state
        .resume_job_handler
        .handle(ResumeJob { job_id: request.job_id })
        .await?;

    Ok(Json(ApiResponse::success(JobResponse::from(&job))))
}

/// 任务快照（状态、检查点、心跳）
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JobIdRequest>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let job = state
        .get_job_handler
        .handle(GetJob { job_id: request.job_id })
        .await?;

    Ok(Json(ApiResponse::success(JobResponse::from(&job))))
}

pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ManuscriptIdRequest>,
) -> Result<Json<ApiResponse<Vec<JobResponse>>>, ApiError> {
    let jobs = state
        .list_jobs_handler
        .handle(ListManuscriptJobs {
            manuscript_id: request.manuscript_id,
        })
        .await?;

    Ok(Json(ApiResponse::success(jobs.iter().map(JobResponse::from).collect())))
}
