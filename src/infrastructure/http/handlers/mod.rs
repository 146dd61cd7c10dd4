//! HTTP Handlers

mod job;
mod manuscript;
mod ping;
mod review;
mod websocket;

pub use job::*;
pub use manuscript::*;
pub use ping::*;
pub use review::*;
pub use websocket::*;
