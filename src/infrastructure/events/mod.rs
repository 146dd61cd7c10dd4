//! Events Layer - 进度事件推送
//!
//! 基于 tokio broadcast 的进度流，供 WebSocket 订阅

mod publisher;

pub use publisher::{EventPublisher, WsEvent};
