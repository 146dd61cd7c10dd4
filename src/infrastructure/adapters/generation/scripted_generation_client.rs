//! Scripted Generation Client - 按用途回放预设响应
//!
//! 用于测试与离线运行，不调用任何外部服务

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::application::ports::{
    GenerationError, GenerationPort, GenerationRequest, GenerationResponse, GenerationTask,
};
use crate::domain::manuscript::TokenUsage;

#[derive(Debug, Clone)]
enum ScriptedReply {
    Content(String),
    Failure(String),
}

/// 脚本化生成客户端
///
/// 每个用途一个 FIFO 队列；队列为空时使用该用途的默认响应，都没有则返回错误
#[derive(Default)]
pub struct ScriptedGenerationClient {
    queues: DashMap<GenerationTask, VecDeque<ScriptedReply>>,
    defaults: DashMap<GenerationTask, String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerationClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 离线模式：所有分析都判定为无问题
    pub fn offline() -> Self {
        Self::new()
            .with_default(GenerationTask::Summary, "{}")
            .with_default(GenerationTask::WorldExtraction, "{}")
            .with_default(GenerationTask::Architect, r#"{"problems": [], "reorder_plan": []}"#)
            .with_default(GenerationTask::Verification, r#"{"applied": true}"#)
            .with_default(GenerationTask::ContinuityAudit, r#"{"score": 10, "defects": []}"#)
            .with_default(GenerationTask::VoiceAudit, r#"{"score": 10, "defects": []}"#)
            .with_default(GenerationTask::RepetitionAudit, r#"{"score": 10, "defects": []}"#)
            .with_default(
                GenerationTask::PeriodDetection,
                r#"{"is_contemporary": true, "setting_period": "present day"}"#,
            )
            .with_default(GenerationTask::AnachronismAudit, r#"{"score": 10, "anachronisms": []}"#)
            .with_default(GenerationTask::FinalReview, r#"{"score": 10, "defects": []}"#)
    }

    /// 追加一条响应
    pub fn push(self, task: GenerationTask, content: impl Into<String>) -> Self {
        self.queues
            .entry(task)
            .or_default()
            .push_back(ScriptedReply::Content(content.into()));
        self
    }

    /// 追加一次失败
    pub fn push_failure(self, task: GenerationTask, message: impl Into<String>) -> Self {
        self.queues
            .entry(task)
            .or_default()
            .push_back(ScriptedReply::Failure(message.into()));
        self
    }

    /// 设置默认响应
    pub fn with_default(self, task: GenerationTask, content: impl Into<String>) -> Self {
        self.defaults.insert(task, content.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, task: GenerationTask) -> usize {
        self.requests
            .lock()
            .map(|r| r.iter().filter(|req| req.task == task).count())
            .unwrap_or(0)
    }

    /// 已收到的请求（按到达顺序）
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_reply(&self, task: GenerationTask) -> Option<ScriptedReply> {
        if let Some(mut queue) = self.queues.get_mut(&task) {
            if let Some(reply) = queue.pop_front() {
                return Some(reply);
            }
        }
        self.defaults
            .get(&task)
            .map(|content| ScriptedReply::Content(content.clone()))
    }
}

#[async_trait]
impl GenerationPort for ScriptedGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let task = request.task;
        let prompt_chars = (request.system_prompt.len() + request.user_prompt.len()) as u64;
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let reply = self.next_reply(task).ok_or_else(|| {
            GenerationError::ServiceError(format!("no scripted response for {}", task.as_str()))
        })?;

        tracing::debug!(task = task.as_str(), "ScriptedGenerationClient: replaying response");

        match reply {
            ScriptedReply::Content(content) => Ok(GenerationResponse {
                usage: TokenUsage::new(prompt_chars / 4, content.len() as u64 / 4, 0),
                content,
            }),
            ScriptedReply::Failure(message) => Err(GenerationError::ServiceError(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(task: GenerationTask) -> GenerationRequest {
        GenerationRequest::json(task, "system", "user")
    }

    #[tokio::test]
    async fn test_replays_in_order_then_default() {
        let client = ScriptedGenerationClient::new()
            .push(GenerationTask::FinalReview, "first")
            .push(GenerationTask::FinalReview, "second")
            .with_default(GenerationTask::FinalReview, "fallback");

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(client.generate(request(GenerationTask::FinalReview)).await.unwrap().content);
        }
        assert_eq!(seen, vec!["first", "second", "fallback"]);
        assert_eq!(client.call_count(), 3);
        assert_eq!(client.calls_for(GenerationTask::FinalReview), 3);
    }

    #[tokio::test]
    async fn test_unscripted_task_fails() {
        let client = ScriptedGenerationClient::new();
        assert!(client.generate(request(GenerationTask::Architect)).await.is_err());
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let client = ScriptedGenerationClient::new().push_failure(GenerationTask::Summary, "boom");
        let err = client.generate(request(GenerationTask::Summary)).await.unwrap_err();
        assert!(!err.is_transient());
    }
}
