//! Query Handlers 实现
//!
//! 所有 QueryHandler 的具体实现

mod job_handlers;
mod manuscript_handlers;

pub use job_handlers::*;
pub use manuscript_handlers::*;
