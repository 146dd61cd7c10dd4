//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod generation;
mod job_control;
mod progress;
mod repositories;

pub use generation::{
    GenerationError, GenerationPort, GenerationRequest, GenerationResponse, GenerationTask,
    ResponseFormat,
};
pub use job_control::{JobControlError, JobControlPort};
pub use progress::{JobFinishedEvent, ProgressEvent, ProgressSink};
pub use repositories::{
    AnalysisReportRecord, AnalysisReportRepositoryPort, JobRepositoryPort,
    ManuscriptRepositoryPort, ReportKind, RepositoryError, ReviewPassRepositoryPort,
    TranslationRecord, WorldModelRepositoryPort,
};
