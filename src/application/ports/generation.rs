//! Generation Port - 文本生成能力抽象
//!
//! 定义外部生成式文本服务的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::manuscript::TokenUsage;

/// 生成错误
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    /// 是否值得退避重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationError::NetworkError(_) | GenerationError::Timeout | GenerationError::RateLimited(_)
        )
    }
}

/// 调用用途（日志、统计与脚本化测试路由）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationTask {
    Summary,
    WorldExtraction,
    Architect,
    StructuralFix,
    NarrativeRewrite,
    Verification,
    ContinuityAudit,
    VoiceAudit,
    RepetitionAudit,
    PeriodDetection,
    AnachronismAudit,
    FinalReview,
    Translation,
}

impl GenerationTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationTask::Summary => "summary",
            GenerationTask::WorldExtraction => "world_extraction",
            GenerationTask::Architect => "architect",
            GenerationTask::StructuralFix => "structural_fix",
            GenerationTask::NarrativeRewrite => "narrative_rewrite",
            GenerationTask::Verification => "verification",
            GenerationTask::ContinuityAudit => "continuity_audit",
            GenerationTask::VoiceAudit => "voice_audit",
            GenerationTask::RepetitionAudit => "repetition_audit",
            GenerationTask::PeriodDetection => "period_detection",
            GenerationTask::AnachronismAudit => "anachronism_audit",
            GenerationTask::FinalReview => "final_review",
            GenerationTask::Translation => "translation",
        }
    }
}

/// 期望的响应格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

/// 生成请求
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub task: GenerationTask,
    pub system_prompt: String,
    pub user_prompt: String,
    pub format: ResponseFormat,
}

impl GenerationRequest {
    pub fn json(task: GenerationTask, system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            task,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            format: ResponseFormat::Json,
        }
    }

    pub fn text(task: GenerationTask, system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            task,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            format: ResponseFormat::Text,
        }
    }
}

/// 生成响应
#[derive(Debug, Clone, Default)]
pub struct GenerationResponse {
    pub content: String,
    pub usage: TokenUsage,
}

/// Generation Port
///
/// 瞬时错误由实现方负责退避重试，调用方只看到最终结果
#[async_trait]
pub trait GenerationPort: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError>;
}
