//! Generation Adapter - 文本生成客户端实现

mod http_generation_client;
mod scripted_generation_client;

pub use http_generation_client::{HttpGenerationClient, HttpGenerationClientConfig};
pub use scripted_generation_client::ScriptedGenerationClient;
