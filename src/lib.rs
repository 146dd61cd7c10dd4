//! Revisor - 长篇稿件修订编排引擎
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Manuscript Context: 稿件、章节与章节编号规则
//! - Review Context: 缺陷、审阅轮次、已解决台账与收敛规则
//! - World Context: 世界模型
//! - Job Context: 长时任务、检查点与心跳
//!
//! 应用层 (application/):
//! - Ports: 端口定义（Generation, Repositories, JobControl, ProgressSink）
//! - Services: 修订流水线各阶段、翻译与任务执行器
//! - Commands / Queries: CQRS 处理器
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API + WebSocket
//! - Memory: 任务队列与取消令牌
//! - Worker: RevisionWorker 与 JobWatchdog
//! - Persistence: SQLite 存储
//! - Adapters: 文本生成客户端
//! - Events: WebSocket 事件发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
