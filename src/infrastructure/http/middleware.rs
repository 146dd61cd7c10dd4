//! HTTP Middleware
//!
//! 请求日志：带上稿件/任务标识，便于把失败请求和任务日志对上

use std::time::Instant;

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header::CONTENT_LENGTH, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// 只读取不超过该大小的请求体来提取标识（导入稿件的大请求体不读）
const SUBJECT_BODY_LIMIT: usize = 16 * 1024;

/// 请求涉及的任务与稿件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestSubject {
    pub job_id: Option<String>,
    pub manuscript_id: Option<String>,
}

impl RequestSubject {
    fn from_json(bytes: &[u8]) -> Self {
        let Ok(value) = serde_json::from_slice::<Value>(bytes) else {
            return Self::default();
        };
        let field = |name: &str| match value.get(name) {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        };
        Self {
            job_id: field("job_id"),
            manuscript_id: field("manuscript_id"),
        }
    }
}

/// 提取请求涉及的标识；需要读请求体时原样放回
pub async fn extract_subject(request: Request) -> Result<(Request, RequestSubject), Response> {
    let path = request.uri().path();

    if let Some(job_id) = path.strip_prefix("/ws/job/") {
        let subject = RequestSubject {
            job_id: Some(job_id.trim_end_matches('/').to_string()),
            manuscript_id: None,
        };
        return Ok((request, subject));
    }

    let carries_ids = request.method() == Method::POST
        && (path.starts_with("/api/job/")
            || path.starts_with("/api/review/")
            || (path.starts_with("/api/manuscript/") && path != "/api/manuscript/create"));
    let small_body = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len <= SUBJECT_BODY_LIMIT);
    if !carries_ids || !small_body {
        return Ok((request, RequestSubject::default()));
    }

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, SUBJECT_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(uri = %parts.uri, error = %e, "Failed to read request body");
            return Err((StatusCode::BAD_REQUEST, "invalid request body").into_response());
        }
    };
    let subject = RequestSubject::from_json(&bytes);
    Ok((Request::from_parts(parts, Body::from(bytes)), subject))
}

/// 请求日志中间件
///
/// 4xx/5xx 按级别记录，其余请求在 debug 级别记录耗时
/// 业务错误（errno != 0）在 ApiError::into_response() 中记录
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let (request, subject) = match extract_subject(request).await {
        Ok(extracted) => extracted,
        Err(response) => return response,
    };
    let job_id = subject.job_id.as_deref().unwrap_or("-");
    let manuscript_id = subject.manuscript_id.as_deref().unwrap_or("-");

    let started = Instant::now();
    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            job_id = job_id,
            manuscript_id = manuscript_id,
            elapsed_ms = elapsed_ms,
            "HTTP server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            job_id = job_id,
            manuscript_id = manuscript_id,
            elapsed_ms = elapsed_ms,
            "HTTP client error"
        );
    } else {
        tracing::debug!(
            method = %method,
            uri = %uri,
            job_id = job_id,
            manuscript_id = manuscript_id,
            elapsed_ms = elapsed_ms,
            "Request handled"
        );
    }

    response
}
