//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                      GET   健康检查
//! - /api/manuscript/create         POST  导入已分章的稿件
//! - /api/manuscript/get            POST  获取稿件详情
//! - /api/manuscript/reports        POST  列出分析报告
//! - /api/manuscript/translation    POST  获取译文
//! - /api/job/start                 POST  启动修订或翻译任务
//! - /api/job/cancel                POST  取消任务
//! - /api/job/resume                POST  恢复任务
//! - /api/job/get                   POST  任务快照
//! - /api/job/list                  POST  稿件的全部任务
//! - /api/review/passes             POST  终审轮次
//! - /ws/job/{id}                   WS    单任务事件
//! - /ws/events                     WS    全局事件

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws/job/:job_id", get(handlers::job_websocket_handler))
        .route("/ws/events", get(handlers::global_websocket_handler))
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/manuscript", manuscript_routes())
        .nest("/job", job_routes())
        .nest("/review", review_routes())
}

/// Manuscript 路由
fn manuscript_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(handlers::create_manuscript))
        .route("/get", post(handlers::get_manuscript))
        .route("/reports", post(handlers::list_reports))
        .route("/translation", post(handlers::get_translation))
}

/// Job 路由
fn job_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/start", post(handlers::start_job))
        .route("/cancel", post(handlers::cancel_job))
        .route("/resume", post(handlers::resume_job))
        .route("/get", post(handlers::get_job))
        .route("/list", post(handlers::list_jobs))
}

/// Review 路由
fn review_routes() -> Router<Arc<AppState>> {
    Router::new().route("/passes", post(handlers::list_review_passes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tower::util::ServiceExt;

    use crate::domain::job::JobId;
    use crate::infrastructure::events::EventPublisher;
    use crate::infrastructure::memory::InMemoryJobControl;
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteAnalysisReportRepository, SqliteJobRepository,
        SqliteManuscriptRepository, SqliteReviewPassRepository,
    };

    struct TestApp {
        router: Router,
        queue: mpsc::Receiver<JobId>,
    }

    async fn test_app() -> TestApp {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let (tx, rx) = mpsc::channel(16);
        let state = AppState::new(
            Arc::new(SqliteManuscriptRepository::new(pool.clone())),
            Arc::new(SqliteJobRepository::new(pool.clone())),
            Arc::new(SqliteAnalysisReportRepository::new(pool.clone())),
            Arc::new(SqliteReviewPassRepository::new(pool)),
            InMemoryJobControl::new(tx).arc(),
            EventPublisher::new().arc(),
        );
        TestApp {
            router: create_routes().with_state(Arc::new(state)),
            queue: rx,
        }
    }

    async fn post_json(router: &Router, uri: &str, body: Value) -> Value {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn manuscript_body() -> Value {
        json!({
            "title": "The Lighthouse",
            "language": "en",
            "genre": "mystery",
            "chapters": [
                {"number": 1, "title": "Arrival", "content": "Mara reached the island at dusk."},
                {"number": 2, "title": "Storm", "content": "The storm cut the radio line."}
            ]
        })
    }

    #[tokio::test]
    async fn test_ping() {
        let app = test_app().await;
        let request = Request::builder().uri("/api/ping").body(Body::empty()).unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_and_get_manuscript() {
        let app = test_app().await;
        let created = post_json(&app.router, "/api/manuscript/create", manuscript_body()).await;
        assert_eq!(created["errno"], 0);
        assert_eq!(created["data"]["total_chapters"], 2);

        let id = created["data"]["id"].clone();
        let fetched = post_json(&app.router, "/api/manuscript/get", json!({"manuscript_id": id})).await;
        assert_eq!(fetched["errno"], 0);
        assert_eq!(fetched["data"]["chapters"][1]["title"], "Storm");
        assert_eq!(fetched["data"]["status"], "pending");
    }

    #[tokio::test]
    async fn test_start_job_enqueues_and_rejects_second_run() {
        let mut app = test_app().await;
        let created = post_json(&app.router, "/api/manuscript/create", manuscript_body()).await;
        let manuscript_id = created["data"]["id"].clone();

        let started = post_json(&app.router, "/api/job/start", json!({"manuscript_id": manuscript_id})).await;
        assert_eq!(started["errno"], 0);
        assert_eq!(started["data"]["kind"], "revision");
        assert_eq!(started["data"]["status"], "running");
        assert!(app.queue.try_recv().is_ok());

        let second = post_json(&app.router, "/api/job/start", json!({"manuscript_id": manuscript_id})).await;
        assert_eq!(second["errno"], 409);

        let listed = post_json(&app.router, "/api/job/list", json!({"manuscript_id": manuscript_id})).await;
        assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_inactive_job_finishes_it() {
        let app = test_app().await;
        let created = post_json(&app.router, "/api/manuscript/create", manuscript_body()).await;
        let manuscript_id = created["data"]["id"].clone();
        let started = post_json(
            &app.router,
            "/api/job/start",
            json!({"manuscript_id": manuscript_id, "target_language": "de"}),
        )
        .await;
        assert_eq!(started["data"]["kind"], "translation");
        let job_id = started["data"]["id"].clone();

        let cancelled = post_json(&app.router, "/api/job/cancel", json!({"job_id": job_id})).await;
        assert_eq!(cancelled["errno"], 0);
        assert_eq!(cancelled["data"]["status"], "cancelled");
        assert_eq!(cancelled["data"]["cancel_requested"], true);
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let app = test_app().await;
        let response = post_json(
            &app.router,
            "/api/job/get",
            json!({"job_id": uuid::Uuid::new_v4()}),
        )
        .await;
        assert_eq!(response["errno"], 404);
        assert!(response["data"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_report_kind_is_bad_request() {
        let app = test_app().await;
        let created = post_json(&app.router, "/api/manuscript/create", manuscript_body()).await;
        let response = post_json(
            &app.router,
            "/api/manuscript/reports",
            json!({"manuscript_id": created["data"]["id"], "kind": "weather"}),
        )
        .await;
        assert_eq!(response["errno"], 400);
    }
}
