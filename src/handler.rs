// ====================================================================================
// src/handler.rs - WebSocket 连接处理
// ====================================================================================
use crate::{
    models::{ClientMessage, ServerMessage},
    session::Session,
    state::AppState,
};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc;

// RAII Guard for connection counting
pub struct ConnectionGuard {
    count: Arc<AtomicU32>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicU32>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}

// 处理单个WebSocket连接
pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let _conn_guard = ConnectionGuard::new(state.total_connections.clone());
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.config.outbound_buffer);

    let mut session = Session::new(state, tx);
    let conn_id = session.id();
    tracing::debug!("Connection {} opened", conn_id);

    // 发送任务：序列化并写回客户端
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to encode message for {}: {}", conn_id, e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    session.greet().await;

    // 同一连接的事件按到达顺序依次处理
    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Close(_) => break,
            other => {
                if let Some(client_msg) = decode(other) {
                    session.handle(client_msg).await;
                }
            }
        }
    }

    session.disconnect().await;
    writer.abort();
    tracing::debug!("Connection {} closed", conn_id);
}

// 非文本帧或无法解析的消息直接忽略
pub fn decode(msg: Message) -> Option<ClientMessage> {
    let Message::Text(text) = msg else { return None };
    match serde_json::from_str(&text) {
        Ok(client_msg) => Some(client_msg),
        Err(e) => {
            tracing::debug!("Ignoring malformed message: {}", e);
            None
        }
    }
}
