//! Revisor - 长篇稿件修订编排引擎
//!
//! 进程装配：配置、日志、数据库、生成客户端、任务执行与 HTTP 服务

use std::sync::Arc;

use revisor::application::{GenerationPort, JobRunner, PipelineSettings, RevisionPipeline, TranslationExecutor};
use revisor::config::{load_config, print_config, AppConfig, GenerationProvider};
use revisor::infrastructure::adapters::{HttpGenerationClient, HttpGenerationClientConfig, ScriptedGenerationClient};
use revisor::infrastructure::events::EventPublisher;
use revisor::infrastructure::http::{AppState, HttpServer};
use revisor::infrastructure::memory::InMemoryJobControl;
use revisor::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteAnalysisReportRepository, SqliteJobRepository,
    SqliteManuscriptRepository, SqliteReviewPassRepository, SqliteWorldModelRepository,
};
use revisor::infrastructure::worker::{JobWatchdog, JobWatchdogConfig, RevisionWorker, RevisionWorkerConfig};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);

    tracing::info!("Revisor - 长篇稿件修订编排引擎");
    print_config(&config);

    // 确保数据目录存在
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 初始化数据库
    let db_config = DatabaseConfig {
        database_url: config.database.database_url(),
        max_connections: config.database.max_connections,
    };
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;

    // 创建 Repository 适配器
    let manuscript_repo = Arc::new(SqliteManuscriptRepository::new(pool.clone()));
    let world_model_repo = Arc::new(SqliteWorldModelRepository::new(pool.clone()));
    let report_repo = Arc::new(SqliteAnalysisReportRepository::new(pool.clone()));
    let pass_repo = Arc::new(SqliteReviewPassRepository::new(pool.clone()));
    let job_repo = Arc::new(SqliteJobRepository::new(pool.clone()));

    let generation = build_generation_client(&config)?;

    // 创建事件发布器
    let event_publisher = EventPublisher::new().arc();

    // 任务队列与取消令牌
    let shutdown = CancellationToken::new();
    let (job_tx, job_rx) = mpsc::channel(config.worker.queue_capacity);
    let job_control = InMemoryJobControl::with_shutdown(job_tx, shutdown.clone()).arc();

    // 流水线与任务执行器
    let settings = PipelineSettings::from(&config.pipeline);
    let pipeline = RevisionPipeline::new(
        generation.clone(),
        manuscript_repo.clone(),
        world_model_repo,
        report_repo.clone(),
        pass_repo.clone(),
        settings.clone(),
    );
    let translator = TranslationExecutor::new(generation, manuscript_repo.clone(), settings);
    let freeze_threshold = chrono::Duration::seconds(config.watchdog.freeze_threshold_secs as i64);
    let runner = Arc::new(JobRunner::new(
        job_repo.clone(),
        manuscript_repo.clone(),
        job_control.clone(),
        event_publisher.clone(),
        pipeline,
        translator,
        freeze_threshold,
    ));

    // 启动 Worker
    let worker = RevisionWorker::new(
        RevisionWorkerConfig {
            max_concurrent_jobs: config.worker.max_concurrent_jobs,
        },
        job_rx,
        runner,
        shutdown.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());

    // 启动看门狗（首次扫描在启动时立即执行，接管上次进程遗留的冻结任务）
    if config.watchdog.enabled {
        let watchdog = JobWatchdog::new(
            JobWatchdogConfig {
                interval: std::time::Duration::from_secs(config.watchdog.interval_secs),
                freeze_threshold,
            },
            job_repo.clone(),
            job_control.clone(),
            shutdown.clone(),
        );
        tokio::spawn(watchdog.run());
    }

    // 创建 HTTP 服务器
    let state = AppState::new(
        manuscript_repo,
        job_repo,
        report_repo,
        pass_repo,
        job_control,
        event_publisher,
    );
    let server = HttpServer::new(config.server.clone(), state);

    // 启动服务器（带优雅关闭）
    let shutdown_for_signal = shutdown.clone();
    server
        .run_with_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Received shutdown signal");
            shutdown_for_signal.cancel();
        })
        .await?;

    // 进行中的任务在当前工作单元结束后停下，检查点已持久化
    shutdown.cancel();
    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "RevisionWorker terminated abnormally");
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// 初始化日志，RUST_LOG 优先于配置中的级别
fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},revisor={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_generation_client(config: &AppConfig) -> anyhow::Result<Arc<dyn GenerationPort>> {
    match config.generation.provider {
        GenerationProvider::Openai => {
            let client = HttpGenerationClient::new(HttpGenerationClientConfig {
                base_url: config.generation.url.clone(),
                api_key: config.generation.api_key.clone(),
                model: config.generation.model.clone(),
                timeout_secs: config.generation.timeout_secs,
                max_retries: config.generation.max_retries,
                initial_backoff_ms: config.generation.initial_backoff_ms,
                max_tokens: config.generation.max_tokens,
            })?;
            Ok(Arc::new(client))
        }
        GenerationProvider::Scripted => {
            tracing::warn!("Using offline scripted generation client");
            Ok(Arc::new(ScriptedGenerationClient::offline()))
        }
    }
}
