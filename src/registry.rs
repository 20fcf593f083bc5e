// ====================================================================================
// src/registry.rs - 房间注册表与房间处理器
// ====================================================================================
use crate::{
    error::AppError,
    leaderboard::{LeaderboardEntry, LeaderboardStore},
    maze,
    models::{RoomCommand, RoomDetailsResponse, ServerMessage},
    room::{MoveOutcome, Room, RoomSnapshot},
};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

const ROOM_COMMAND_BUFFER: usize = 256;

#[derive(Clone, Debug)]
pub struct RoomSettings {
    pub leaderboard_limit: u32,
    pub record_max_retries: u32,
    pub record_retry_delay: Duration,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self { leaderboard_limit: 50, record_max_retries: 2, record_retry_delay: Duration::from_millis(200) }
    }
}

// 每个房间一个处理任务，房间状态只由该任务修改；注册表只保存各房间的发送端
pub struct RoomRegistry {
    rooms: DashMap<String, mpsc::Sender<RoomCommand>>,
    memberships: DashMap<Uuid, String>,
    leaderboard: LeaderboardStore,
    settings: RoomSettings,
}

impl RoomRegistry {
    pub fn new(leaderboard: LeaderboardStore, settings: RoomSettings) -> Self {
        Self { rooms: DashMap::new(), memberships: DashMap::new(), leaderboard, settings }
    }

    // 房间不存在时按请求尺寸创建；已存在则沿用原尺寸
    pub async fn join(
        &self,
        room_key: &str,
        name: String,
        color: String,
        size: usize,
        conn_id: Uuid,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<RoomSnapshot, AppError> {
        // entry 持有分片写锁，并发加入同一房间只会创建一次；锁不跨 await
        let room_tx = match self.rooms.entry(room_key.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let maze = maze::generate(size)?;
                let tx = start_room_handler(Room::new(room_key, maze), self.leaderboard.clone(), self.settings.clone());
                tracing::info!("Created room {} with a {}x{} maze", room_key, size, size);
                entry.insert(tx).clone()
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        room_tx
            .send(RoomCommand::Join { conn_id, name, color, sender, reply: reply_tx })
            .await
            .map_err(|_| AppError::Internal(format!("room {} handler is down", room_key)))?;
        let snapshot = reply_rx
            .await
            .map_err(|_| AppError::Internal(format!("room {} dropped join reply", room_key)))?;

        // 房间确认加入后才登记归属
        self.memberships.insert(conn_id, room_key.to_string());
        Ok(snapshot)
    }

    // 未知房间或连接直接返回 None
    pub async fn move_player(&self, room_key: &str, conn_id: Uuid, dy: i32, dx: i32) -> Option<MoveOutcome> {
        let room_tx = self.sender(room_key)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        room_tx.send(RoomCommand::Move { conn_id, dy, dx, reply: reply_tx }).await.ok()?;
        reply_rx.await.ok().flatten()
    }

    // 从所在房间移除玩家，返回房间名
    pub async fn leave(&self, conn_id: Uuid) -> Option<String> {
        let (_, room_key) = self.memberships.remove(&conn_id)?;
        let room_tx = self.sender(&room_key)?;
        if room_tx.send(RoomCommand::Leave { conn_id }).await.is_err() {
            tracing::warn!("Room {} handler is down, could not remove {}", room_key, conn_id);
        }
        Some(room_key)
    }

    #[cfg(test)]
    pub async fn details(&self, room_key: &str) -> Option<RoomDetailsResponse> {
        query_details(self.sender(room_key)?).await
    }

    pub async fn list(&self) -> Vec<RoomDetailsResponse> {
        // 先收集发送端，查询期间不持有分片锁
        let senders: Vec<_> = self.rooms.iter().map(|entry| entry.value().clone()).collect();
        let mut details = Vec::with_capacity(senders.len());
        for tx in senders {
            if let Some(d) = query_details(tx).await {
                details.push(d);
            }
        }
        details.sort_by(|a, b| a.room.cmp(&b.room));
        details
    }

    fn sender(&self, room_key: &str) -> Option<mpsc::Sender<RoomCommand>> {
        self.rooms.get(room_key).map(|tx| tx.value().clone())
    }
}

async fn query_details(room_tx: mpsc::Sender<RoomCommand>) -> Option<RoomDetailsResponse> {
    let (reply_tx, reply_rx) = oneshot::channel();
    room_tx.send(RoomCommand::Details { reply: reply_tx }).await.ok()?;
    reply_rx.await.ok()
}

// 启动一个房间的处理任务
fn start_room_handler(room: Room, leaderboard: LeaderboardStore, settings: RoomSettings) -> mpsc::Sender<RoomCommand> {
    let (tx, rx) = mpsc::channel(ROOM_COMMAND_BUFFER);
    tokio::spawn(room_message_loop(room, rx, leaderboard, settings));
    tx
}

// 房间的消息处理循环，校验、修改与广播在同一任务内完成
async fn room_message_loop(
    mut room: Room,
    mut rx: mpsc::Receiver<RoomCommand>,
    leaderboard: LeaderboardStore,
    settings: RoomSettings,
) {
    let mut members: HashMap<Uuid, mpsc::Sender<ServerMessage>> = HashMap::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RoomCommand::Join { conn_id, name, color, sender, reply } => {
                tracing::debug!("{} ({}) joined room {}", name, conn_id, room.key());
                room.add_player(conn_id, name, color, Instant::now());
                members.insert(conn_id, sender);
                let snapshot = room.snapshot();
                broadcast(&members, ServerMessage::GameState(snapshot.clone()));
                let _ = reply.send(snapshot);
            }
            RoomCommand::Move { conn_id, dy, dx, reply } => {
                let outcome = room.apply_move(&conn_id, dy, dx, Instant::now());
                if let Some(outcome) = &outcome {
                    broadcast(&members, ServerMessage::PlayerMoved { id: conn_id, pos: outcome.pos, moves: outcome.moves });
                    if let Some(finish) = &outcome.finish {
                        let entry = LeaderboardEntry::new(room.key(), &finish.name, finish.elapsed_secs, finish.moves);
                        tracing::info!(
                            "{} finished room {} in {}s / {} moves, score {}",
                            finish.name, room.key(), finish.elapsed_secs, finish.moves, finish.score
                        );
                        if let Err(e) = leaderboard
                            .record_with_retry(&entry, settings.record_max_retries, settings.record_retry_delay)
                            .await
                        {
                            tracing::error!("Dropping leaderboard entry for {} in room {}: {}", finish.name, room.key(), e);
                        }
                        broadcast(&members, ServerMessage::PlayerFinished {
                            id: conn_id,
                            name: finish.name.clone(),
                            time: finish.elapsed_secs,
                            moves: finish.moves,
                            score: finish.score,
                        });
                        match leaderboard.top(room.key(), settings.leaderboard_limit).await {
                            Ok(entries) => broadcast(&members, ServerMessage::Leaderboard { room: room.key().to_string(), entries }),
                            Err(e) => tracing::warn!("Failed to load leaderboard for room {}: {}", room.key(), e),
                        }
                    }
                }
                let _ = reply.send(outcome);
            }
            RoomCommand::Leave { conn_id } => {
                members.remove(&conn_id);
                if let Some(player) = room.remove_player(&conn_id) {
                    tracing::debug!("{} ({}) left room {}", player.name, conn_id, room.key());
                    broadcast(&members, ServerMessage::PlayerLeft { id: conn_id });
                }
            }
            RoomCommand::Details { reply } => {
                let _ = reply.send(RoomDetailsResponse {
                    room: room.key().to_string(),
                    size: room.size(),
                    players: room.player_count(),
                    created_at: room.created_at().timestamp(),
                });
            }
        }
    }

    tracing::info!("Room {} handler shutting down.", room.key());
}

// 广播消息给房间内的所有连接，慢连接的消息直接丢弃，不阻塞房间
fn broadcast(members: &HashMap<Uuid, mpsc::Sender<ServerMessage>>, msg: ServerMessage) {
    for (conn_id, sender) in members {
        match sender.try_send(msg.clone()) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => tracing::warn!("Outbound buffer full for {}, dropping message", conn_id),
        }
    }
}
