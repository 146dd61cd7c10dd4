//! HTTP Generation Client - 调用 OpenAI 兼容的对话补全服务
//!
//! 实现 GenerationPort trait
//!
//! 外部 API:
//! POST {base_url}/chat/completions
//! Request: {"model": "...", "messages": [...], "response_format": {"type": "json_object"}}
//! Response: {"choices": [{"message": {"content": "..."}}], "usage": {...}}

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::{
    GenerationError, GenerationPort, GenerationRequest, GenerationResponse, ResponseFormat,
};
use crate::domain::manuscript::TokenUsage;

const BACKOFF_MULTIPLIER: u64 = 2;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ChatResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    completion_tokens_details: Option<CompletionDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionDetails {
    #[serde(default)]
    reasoning_tokens: u64,
}

impl From<Usage> for TokenUsage {
    fn from(usage: Usage) -> Self {
        let thinking = usage
            .completion_tokens_details
            .map(|d| d.reasoning_tokens)
            .unwrap_or(0);
        TokenUsage::new(
            usage.prompt_tokens,
            usage.completion_tokens.saturating_sub(thinking),
            thinking,
        )
    }
}

/// HTTP 生成客户端配置
#[derive(Debug, Clone)]
pub struct HttpGenerationClientConfig {
    /// 服务基础 URL（不含 /chat/completions）
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 瞬时错误最大重试次数
    pub max_retries: u32,
    /// 首次退避（毫秒），之后每次翻倍
    pub initial_backoff_ms: u64,
    pub max_tokens: u32,
}

impl Default for HttpGenerationClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".to_string(),
            api_key: None,
            model: "default".to_string(),
            timeout_secs: 300,
            max_retries: 3,
            initial_backoff_ms: 2000,
            max_tokens: 16384,
        }
    }
}

/// HTTP 生成客户端
pub struct HttpGenerationClient {
    client: Client,
    config: HttpGenerationClientConfig,
}

impl HttpGenerationClient {
    pub fn new(config: HttpGenerationClientConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = BACKOFF_MULTIPLIER.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.config.initial_backoff_ms.saturating_mul(factor))
    }

    async fn send_once(&self, request: &GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system_prompt,
                },
                Message {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            stream: false,
            response_format: match request.format {
                ResponseFormat::Json => Some(ChatResponseFormat {
                    format_type: "json_object",
                }),
                ResponseFormat::Text => None,
            },
        };

        let mut builder = self.client.post(self.completions_url()).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout
            } else if e.is_connect() {
                GenerationError::NetworkError(format!("Cannot connect to generation service: {}", e))
            } else {
                GenerationError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_status(status, text));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| GenerationError::InvalidResponse(format!("{}: {}", e, truncate(&text))))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(GenerationResponse {
            content,
            usage: parsed.usage.map(TokenUsage::from).unwrap_or_default(),
        })
    }
}

fn classify_status(status: StatusCode, body: String) -> GenerationError {
    let message = format!("HTTP {}: {}", status, truncate(&body));
    if status == StatusCode::TOO_MANY_REQUESTS {
        GenerationError::RateLimited(message)
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        GenerationError::NetworkError(message)
    } else {
        GenerationError::ServiceError(message)
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(300).collect()
}

#[async_trait]
impl GenerationPort for HttpGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        let mut attempt = 0;
        loop {
            tracing::debug!(
                task = request.task.as_str(),
                attempt = attempt,
                prompt_chars = request.user_prompt.len(),
                "Sending generation request"
            );

            match self.send_once(&request).await {
                Ok(response) => {
                    tracing::debug!(
                        task = request.task.as_str(),
                        input_tokens = response.usage.input_tokens,
                        output_tokens = response.usage.output_tokens,
                        "Generation completed"
                    );
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        task = request.task.as_str(),
                        error = %e,
                        attempt = attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Transient generation failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(task = request.task.as_str(), error = %e, "Generation failed");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let client = HttpGenerationClient::new(HttpGenerationClientConfig {
            initial_backoff_ms: 100,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.backoff(1), Duration::from_millis(100));
        assert_eq!(client.backoff(2), Duration::from_millis(200));
        assert_eq!(client.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, String::new()).is_transient());
        assert!(!classify_status(StatusCode::UNAUTHORIZED, String::new()).is_transient());
    }

    #[test]
    fn test_usage_splits_reasoning_tokens() {
        let usage: Usage = serde_json::from_str(
            r#"{"prompt_tokens": 100, "completion_tokens": 50, "completion_tokens_details": {"reasoning_tokens": 20}}"#,
        )
        .unwrap();
        assert_eq!(TokenUsage::from(usage), TokenUsage::new(100, 30, 20));
    }

    #[tokio::test]
    async fn test_unreachable_service_fails_after_retries() {
        let client = HttpGenerationClient::new(HttpGenerationClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            max_retries: 1,
            initial_backoff_ms: 1,
            timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();
        let request = GenerationRequest::text(
            crate::application::ports::GenerationTask::Summary,
            "system",
            "user",
        );
        let result = client.generate(request).await;
        assert!(matches!(result, Err(GenerationError::NetworkError(_)) | Err(GenerationError::Timeout)));
    }
}
