// ====================================================================================
// src/session.rs - 连接会话状态机
// ====================================================================================
use crate::{
    maze,
    models::{ClientMessage, JoinRequest, ServerMessage},
    state::AppState,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Joined(String),
    Disconnected,
}

// 一个连接的会话：Connected -> Joined(room) -> Disconnected
pub struct Session {
    conn_id: Uuid,
    state: SessionState,
    outbound: mpsc::Sender<ServerMessage>,
    app: Arc<AppState>,
}

impl Session {
    pub fn new(app: Arc<AppState>, outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self { conn_id: Uuid::new_v4(), state: SessionState::Connected, outbound, app }
    }

    pub fn id(&self) -> Uuid {
        self.conn_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub async fn greet(&self) {
        self.reply(ServerMessage::Welcome { id: self.conn_id }).await;
    }

    pub async fn handle(&mut self, msg: ClientMessage) {
        match msg {
            ClientMessage::Join(req) => self.on_join(req).await,
            ClientMessage::Move { room, dy, dx } => self.on_move(room, dy, dx).await,
            ClientMessage::GetLeaderboard { room } => self.on_get_leaderboard(room).await,
        }
    }

    async fn on_join(&mut self, req: JoinRequest) {
        if self.state != SessionState::Connected {
            tracing::debug!("Ignoring join from {} in state {:?}", self.conn_id, self.state);
            return;
        }

        let config = &self.app.config;
        let params = req.with_defaults(config.default_maze_size);
        let size = match maze::validate_size(params.size, config.max_maze_size) {
            Ok(size) => size,
            Err(e) => {
                // 只告知请求方，不广播
                self.reply(ServerMessage::Error { message: e.to_string() }).await;
                return;
            }
        };

        match self
            .app
            .registry
            .join(&params.room, params.name, params.color, size, self.conn_id, self.outbound.clone())
            .await
        {
            Ok(_) => self.state = SessionState::Joined(params.room),
            Err(e) => {
                tracing::error!("Join failed for {} in room {}: {}", self.conn_id, params.room, e);
                self.reply(ServerMessage::Error { message: e.to_string() }).await;
            }
        }
    }

    async fn on_move(&mut self, room: Option<String>, dy: i32, dx: i32) {
        let SessionState::Joined(joined) = &self.state else { return };
        if room.as_ref().is_some_and(|r| r != joined) {
            return;
        }
        // 超速的移动直接丢弃
        if !self.app.rate_limiter.allow(self.conn_id) {
            tracing::trace!("Rate limited move from {}", self.conn_id);
            return;
        }
        self.app.registry.move_player(joined, self.conn_id, dy, dx).await;
    }

    async fn on_get_leaderboard(&mut self, room: Option<String>) {
        let SessionState::Joined(joined) = &self.state else { return };
        let room = room.filter(|r| !r.is_empty()).unwrap_or_else(|| joined.clone());
        match self.app.leaderboard.top(&room, self.app.config.leaderboard_limit).await {
            Ok(entries) => self.reply(ServerMessage::Leaderboard { room, entries }).await,
            Err(e) => tracing::warn!("Failed to load leaderboard for room {}: {}", room, e),
        }
    }

    pub async fn disconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        if let SessionState::Joined(_) = self.state {
            self.app.registry.leave(self.conn_id).await;
        }
        self.app.rate_limiter.forget(self.conn_id);
        self.state = SessionState::Disconnected;
    }

    async fn reply(&self, msg: ServerMessage) {
        if self.outbound.send(msg).await.is_err() {
            tracing::debug!("Connection {} already closed", self.conn_id);
        }
    }
}
