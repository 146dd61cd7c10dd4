//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;

use crate::application::PipelineSettings;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 文本生成服务配置
    #[serde(default)]
    pub generation: GenerationConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 流水线参数
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// 任务执行配置
    #[serde(default)]
    pub worker: WorkerConfig,

    /// 看门狗配置
    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 请求体上限（MB），整部稿件以 JSON 提交
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5070
}

fn default_body_limit_mb() -> usize {
    64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_mb: default_body_limit_mb(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb.saturating_mul(1024 * 1024)
    }
}

/// 生成服务提供方
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// OpenAI 兼容的 /chat/completions
    #[default]
    Openai,
    /// 离线脚本响应（本地演示与测试）
    Scripted,
}

/// 文本生成服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub provider: GenerationProvider,

    /// 服务基础 URL
    #[serde(default = "default_generation_url")]
    pub url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// 瞬时错误最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 首次退避（毫秒）
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_generation_url() -> String {
    "http://localhost:8000/v1".to_string()
}

fn default_model() -> String {
    "default".to_string()
}

fn default_generation_timeout() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    2000
}

fn default_max_tokens() -> u32 {
    16384
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProvider::default(),
            url: default_generation_url(),
            api_key: None,
            model: default_model(),
            timeout_secs: default_generation_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/revisor.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// 获取数据库 URL
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}

/// 流水线参数，缺省值与 `PipelineSettings::default()` 一致
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub extraction_batch_size: usize,
    pub continuity_window: usize,
    pub voice_window: usize,
    pub max_review_passes: u32,
    pub approval_threshold: u8,
    pub max_concurrent_calls: usize,
    pub duplicate_similarity: f64,
    pub length_tolerance: f64,
    pub anachronism_sample_size: usize,
    pub excerpt_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let settings = PipelineSettings::default();
        Self {
            extraction_batch_size: settings.extraction_batch_size,
            continuity_window: settings.continuity_window,
            voice_window: settings.voice_window,
            max_review_passes: settings.max_review_passes,
            approval_threshold: settings.approval_threshold,
            max_concurrent_calls: settings.max_concurrent_calls,
            duplicate_similarity: settings.duplicate_similarity,
            length_tolerance: settings.length_tolerance,
            anachronism_sample_size: settings.anachronism_sample_size,
            excerpt_chars: settings.excerpt_chars,
        }
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            extraction_batch_size: config.extraction_batch_size,
            continuity_window: config.continuity_window,
            voice_window: config.voice_window,
            max_review_passes: config.max_review_passes,
            approval_threshold: config.approval_threshold,
            max_concurrent_calls: config.max_concurrent_calls,
            duplicate_similarity: config.duplicate_similarity,
            length_tolerance: config.length_tolerance,
            anachronism_sample_size: config.anachronism_sample_size,
            excerpt_chars: config.excerpt_chars,
        }
    }
}

/// 任务执行配置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// 同时执行的任务数
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// 待执行队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// 看门狗配置
#[derive(Debug, Clone, Deserialize)]
pub struct WatchdogConfig {
    /// 是否启用冻结任务恢复
    #[serde(default = "default_watchdog_enabled")]
    pub enabled: bool,

    /// 扫描间隔（秒）
    #[serde(default = "default_watchdog_interval")]
    pub interval_secs: u64,

    /// 心跳超过该时长视为冻结（秒）
    #[serde(default = "default_freeze_threshold")]
    pub freeze_threshold_secs: u64,
}

fn default_watchdog_enabled() -> bool {
    true
}

fn default_watchdog_interval() -> u64 {
    120
}

fn default_freeze_threshold() -> u64 {
    720 // 12 分钟
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: default_watchdog_enabled(),
            interval_secs: default_watchdog_interval(),
            freeze_threshold_secs: default_freeze_threshold(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5070);
        assert_eq!(config.generation.provider, GenerationProvider::Openai);
        assert_eq!(config.database.path, "data/revisor.db");
        assert_eq!(config.watchdog.freeze_threshold_secs, 720);
    }

    #[test]
    fn test_database_url() {
        let config = DatabaseConfig::default();
        assert_eq!(config.database_url(), "sqlite:data/revisor.db?mode=rwc");
    }

    #[test]
    fn test_pipeline_config_maps_to_settings() {
        let mut config = PipelineConfig::default();
        config.max_review_passes = 3;
        let settings = PipelineSettings::from(&config);
        assert_eq!(settings.max_review_passes, 3);
        assert_eq!(settings.voice_window, PipelineSettings::default().voice_window);
    }
}
