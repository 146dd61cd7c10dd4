//! Memory Layer - In-Memory State Management
//!
//! 实现 JobControl，管理任务队列与活跃执行的取消令牌

mod job_control;

pub use job_control::InMemoryJobControl;
