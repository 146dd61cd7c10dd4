//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, GenerationProvider};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径（扩展名由 config crate 推断）
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `REVISOR_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `REVISOR_SERVER__PORT=8080`
/// - `REVISOR_GENERATION__URL=http://llm-gateway:8000/v1`
/// - `REVISOR_GENERATION__PROVIDER=scripted`
/// - `REVISOR_PIPELINE__MAX_REVIEW_PASSES=3`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5070)?
        .set_default("server.body_limit_mb", 64)?
        .set_default("generation.provider", "openai")?
        .set_default("generation.url", "http://localhost:8000/v1")?
        .set_default("generation.timeout_secs", 300)?
        .set_default("generation.max_retries", 3)?
        .set_default("database.path", "data/revisor.db")?
        .set_default("database.max_connections", 5)?
        .set_default("worker.max_concurrent_jobs", 2)?
        .set_default("worker.queue_capacity", 256)?
        .set_default("watchdog.enabled", true)?
        .set_default("watchdog.interval_secs", 120)?
        .set_default("watchdog.freeze_threshold_secs", 720)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 例如: REVISOR_WATCHDOG__INTERVAL_SECS=60
    builder = builder.add_source(
        Environment::with_prefix("REVISOR")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.server.body_limit_mb == 0 {
        return Err(ConfigError::ValidationError(
            "Server body limit must be at least 1 MB".to_string(),
        ));
    }

    if config.generation.provider == GenerationProvider::Openai && config.generation.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "Generation URL cannot be empty".to_string(),
        ));
    }

    if config.database.path.is_empty() {
        return Err(ConfigError::ValidationError(
            "Database path cannot be empty".to_string(),
        ));
    }

    let pipeline = &config.pipeline;
    if pipeline.voice_window <= pipeline.continuity_window {
        return Err(ConfigError::ValidationError(format!(
            "Voice window ({}) must be larger than continuity window ({})",
            pipeline.voice_window, pipeline.continuity_window
        )));
    }

    if pipeline.continuity_window == 0 {
        return Err(ConfigError::ValidationError(
            "Continuity window cannot be 0".to_string(),
        ));
    }

    if pipeline.approval_threshold > 10 {
        return Err(ConfigError::ValidationError(
            "Approval threshold must be within 0-10".to_string(),
        ));
    }

    if pipeline.extraction_batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "Extraction batch size cannot be 0".to_string(),
        ));
    }

    if pipeline.max_concurrent_calls == 0 || config.worker.max_concurrent_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "Concurrency limits cannot be 0".to_string(),
        ));
    }

    if config.worker.queue_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "Queue capacity cannot be 0".to_string(),
        ));
    }

    if config.watchdog.enabled && config.watchdog.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Watchdog interval cannot be 0 when watchdog is enabled".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!("Generation Provider: {:?}", config.generation.provider);
    if config.generation.provider == GenerationProvider::Openai {
        tracing::info!("Generation URL: {}", config.generation.url);
        tracing::info!("Generation Model: {}", config.generation.model);
        tracing::info!("Generation Timeout: {}s", config.generation.timeout_secs);
        tracing::info!("Generation Max Retries: {}", config.generation.max_retries);
    }
    tracing::info!("Database: {}", config.database.path);
    tracing::info!("Database Max Connections: {}", config.database.max_connections);
    tracing::info!(
        "Pipeline: windows {}/{}, max passes {}, threshold {}",
        config.pipeline.continuity_window,
        config.pipeline.voice_window,
        config.pipeline.max_review_passes,
        config.pipeline.approval_threshold
    );
    tracing::info!("Worker Concurrency: {}", config.worker.max_concurrent_jobs);
    tracing::info!("Watchdog Enabled: {}", config.watchdog.enabled);
    if config.watchdog.enabled {
        tracing::info!("Watchdog Interval: {}s", config.watchdog.interval_secs);
        tracing::info!("Freeze Threshold: {}s", config.watchdog.freeze_threshold_secs);
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_body_limit() {
        let mut config = AppConfig::default();
        config.server.body_limit_mb = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_generation_url() {
        let mut config = AppConfig::default();
        config.generation.url = String::new();
        assert!(validate_config(&config).is_err());

        config.generation.provider = GenerationProvider::Scripted;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_empty_db_path() {
        let mut config = AppConfig::default();
        config.database.path = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_inverted_windows() {
        let mut config = AppConfig::default();
        config.pipeline.voice_window = config.pipeline.continuity_window;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_threshold_above_ten() {
        let mut config = AppConfig::default();
        config.pipeline.approval_threshold = 11;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_watchdog_interval() {
        let mut config = AppConfig::default();
        config.watchdog.interval_secs = 0;
        assert!(validate_config(&config).is_err());

        config.watchdog.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[generation]
provider = "scripted"
model = "editor-large"

[pipeline]
max_review_passes = 2
continuity_window = 4
voice_window = 8

[watchdog]
freeze_threshold_secs = 600
"#
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.generation.provider, GenerationProvider::Scripted);
        assert_eq!(config.generation.model, "editor-large");
        assert_eq!(config.pipeline.max_review_passes, 2);
        assert_eq!(config.pipeline.approval_threshold, 9);
        assert_eq!(config.watchdog.freeze_threshold_secs, 600);
        assert_eq!(config.watchdog.interval_secs, 120);
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[pipeline]\ncontinuity_window = 10\nvoice_window = 5").unwrap();

        let result = load_config_from_path(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
