//! Job Context - 长时任务限界上下文
//!
//! 职责:
//! - 任务生命周期与检查点
//! - 心跳与冻结判定
//! - 互斥锁令牌

mod entity;
mod errors;
mod value_objects;

pub use entity::LongRunningJob;
pub use errors::JobError;
pub use value_objects::{Checkpoint, JobId, JobKind, JobStage, JobStatus};
