//! World Context - 世界模型
//!
//! 角色、地点、时间线事件、世界规则与时代背景

mod model;

pub use model::{WorldEntity, WorldModel};
