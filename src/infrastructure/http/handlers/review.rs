//! Review HTTP Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::ListReviewPasses;
use crate::infrastructure::http::dto::{ApiResponse, JobIdRequest, ReviewPassResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 列出修订任务的终审轮次
pub async fn list_review_passes(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JobIdRequest>,
) -> Result<Json<ApiResponse<Vec<ReviewPassResponse>>>, ApiError> {
    let passes = state
        .list_passes_handler
        .handle(ListReviewPasses { job_id: request.job_id })
        .await?;

    Ok(Json(ApiResponse::success(
        passes.into_iter().map(ReviewPassResponse::from).collect(),
    )))
}
