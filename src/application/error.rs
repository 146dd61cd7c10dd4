//! 应用层错误定义
//!
//! 统一的命令/查询/流水线错误类型

use thiserror::Error;
use uuid::Uuid;

use crate::application::ports::{GenerationError, JobControlError, RepositoryError};
use crate::domain::job::JobError;
use crate::domain::manuscript::ManuscriptError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: Uuid,
    },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 业务规则违反
    #[error("Business rule violation: {0}")]
    BusinessRuleViolation(String),

    /// 状态无效
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 仓储错误
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// 生成服务错误（已由客户端重试过）
    #[error("Generation error: {0}")]
    GenerationError(String),

    /// 任务被取消
    #[error("Job cancelled")]
    Cancelled,

    /// 任务锁被其他执行者接管
    #[error("Job lock lost: {0}")]
    LockLost(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: Uuid) -> Self {
        Self::NotFound { resource_type, id }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建业务规则违反错误
    pub fn business_rule(message: impl Into<String>) -> Self {
        Self::BusinessRuleViolation(message.into())
    }

    /// 创建状态无效错误
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        Self::RepositoryError(err.to_string())
    }
}

impl From<GenerationError> for ApplicationError {
    fn from(err: GenerationError) -> Self {
        Self::GenerationError(err.to_string())
    }
}

impl From<JobControlError> for ApplicationError {
    fn from(err: JobControlError) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<ManuscriptError> for ApplicationError {
    fn from(err: ManuscriptError) -> Self {
        match err {
            ManuscriptError::NotFound(id) => Self::not_found("Manuscript", *id.as_uuid()),
            other => Self::BusinessRuleViolation(other.to_string()),
        }
    }
}

impl From<JobError> for ApplicationError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(id) => Self::not_found("Job", *id.as_uuid()),
            JobError::Cancelled(_) => Self::Cancelled,
            other => Self::InvalidState(other.to_string()),
        }
    }
}
