//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（Generation、Repository、JobControl、Progress）
//! - services: 修订流水线各阶段与任务执行器
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;
pub mod services;

// Re-exports
pub use commands::{
    handlers::{CancelJobHandler, CreateManuscriptHandler, ResumeJobHandler, StartJobHandler},
    CancelJob, CreateManuscript, NewChapter, ResumeJob, StartRevision, StartTranslation,
};

pub use error::ApplicationError;

pub use ports::{
    AnalysisReportRecord, AnalysisReportRepositoryPort, GenerationError, GenerationPort, GenerationRequest,
    GenerationResponse, GenerationTask, JobControlError, JobControlPort, JobFinishedEvent, JobRepositoryPort,
    ManuscriptRepositoryPort, ProgressEvent, ProgressSink, ReportKind, RepositoryError, ResponseFormat,
    ReviewPassRepositoryPort, TranslationRecord, WorldModelRepositoryPort,
};

pub use queries::{
    handlers::{
        GetJobHandler, GetManuscriptHandler, GetTranslationHandler, ListAnalysisReportsHandler,
        ListManuscriptJobsHandler, ListReviewPassesHandler,
    },
    GetJob, GetManuscript, GetTranslation, ListAnalysisReports, ListManuscriptJobs, ListReviewPasses,
};

pub use services::{JobRunner, PipelineSettings, RevisionPipeline, TranslationExecutor};
