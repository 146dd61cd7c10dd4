//! WebSocket Handler
//!
//! - /ws/events：全部任务的进度与终态事件
//! - /ws/job/:job_id：单个任务的事件，任务进入终态后关闭

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::domain::job::JobId;
use crate::infrastructure::events::WsEvent;
use crate::infrastructure::http::state::AppState;

/// 单任务 WebSocket 连接
pub async fn job_websocket_handler(
    ws: WebSocketUpgrade,
    Path(job_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_job_socket(socket, JobId::from_uuid(job_id), state))
}

/// 全局 WebSocket 连接
pub async fn global_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_global_socket(socket, state))
}

async fn handle_job_socket(socket: WebSocket, job_id: JobId, state: Arc<AppState>) {
    let (mut sender, receiver) = socket.split();

    // 先订阅再查状态，避免错过两者之间发出的终态事件
    let event_rx = state.event_publisher.subscribe_job(job_id);

    let job = match state.jobs.find_by_id(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            tracing::warn!(job_id = %job_id, "WebSocket connection rejected: unknown job");
            drop(event_rx);
            state.event_publisher.unsubscribe_job(job_id);
            let _ = sender.close().await;
            return;
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Failed to load job for WebSocket");
            drop(event_rx);
            state.event_publisher.unsubscribe_job(job_id);
            let _ = sender.close().await;
            return;
        }
    };

    // 已结束的任务直接推送终态快照
    if job.status.is_terminal() {
        drop(event_rx);
        state.event_publisher.unsubscribe_job(job_id);
        let event = WsEvent::JobFinished {
            job_id,
            manuscript_id: job.manuscript_id,
            status: job.status.as_str().to_string(),
            message: job.error_message.clone(),
        };
        let _ = send_event(&mut sender, &event).await;
        let _ = sender.close().await;
        return;
    }

    tracing::info!(job_id = %job_id, "Job WebSocket connected");

    pump(sender, receiver, event_rx).await;

    state.event_publisher.unsubscribe_job(job_id);
    tracing::info!(job_id = %job_id, "Job WebSocket disconnected");
}

async fn handle_global_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    let event_rx = state.event_publisher.subscribe_global();

    tracing::info!("Global WebSocket connected");

    pump(sender, receiver, event_rx).await;

    tracing::info!("Global WebSocket disconnected");
}

/// 转发事件直到通道关闭或客户端断开
async fn pump(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut event_rx: broadcast::Receiver<WsEvent>,
) {
    // 事件转发任务
    let mut forward_task = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "WebSocket subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => {
                    let _ = sender.close().await;
                    break;
                }
            }
        }
    });

    // 接收客户端消息（心跳）
    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    tracing::debug!("WebSocket closed by client");
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    // 任一方结束即拆除另一方，释放订阅
    tokio::select! {
        _ = &mut forward_task => receive_task.abort(),
        _ = &mut receive_task => {
            forward_task.abort();
            let _ = forward_task.await;
        }
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &WsEvent,
) -> Result<(), axum::Error> {
    let msg = match serde_json::to_string(event) {
        Ok(json) => Message::Text(json),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize event");
            return Ok(());
        }
    };

    sender.send(msg).await.map_err(|e| {
        tracing::debug!(error = %e, "Failed to send WebSocket message");
        e
    })
}
