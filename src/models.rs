// ====================================================================================
// src/models.rs - 数据模型定义
// ====================================================================================
use crate::leaderboard::LeaderboardEntry;
use crate::maze::{Difficulty, Position};
use crate::room::{MoveOutcome, RoomSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

pub const DEFAULT_ROOM: &str = "classroom";
pub const DEFAULT_NAME: &str = "Player";
pub const DEFAULT_COLOR: &str = "#0066FF";
pub const MAX_NAME_LEN: usize = 32;

// 客户端 -> 服务器
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    Join(JoinRequest),
    Move {
        #[serde(default)]
        room: Option<String>,
        #[serde(default)]
        dy: i32,
        #[serde(default)]
        dx: i32,
    },
    GetLeaderboard {
        #[serde(default)]
        room: Option<String>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JoinRequest {
    pub room: Option<String>,
    pub name: Option<String>,
    pub size: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub color: Option<String>,
}

// 补全默认值之后的加入参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinParams {
    pub room: String,
    pub name: String,
    pub size: i64,
    pub color: String,
}

impl JoinRequest {
    // 空字符串也视为缺省；显式 size 优先于难度
    pub fn with_defaults(self, default_size: usize) -> JoinParams {
        let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let name = non_empty(self.name)
            .map(|n| n.chars().take(MAX_NAME_LEN).collect())
            .unwrap_or_else(|| DEFAULT_NAME.to_string());
        let size = self
            .size
            .or_else(|| self.difficulty.map(|d| d.size() as i64))
            .unwrap_or(default_size as i64);
        JoinParams {
            room: non_empty(self.room).unwrap_or_else(|| DEFAULT_ROOM.to_string()),
            name,
            size,
            color: non_empty(self.color).unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        }
    }
}

// 服务器 -> 客户端
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome { id: Uuid },
    GameState(RoomSnapshot),
    PlayerMoved { id: Uuid, pos: Position, moves: i64 },
    PlayerFinished { id: Uuid, name: String, time: i64, moves: i64, score: i64 },
    Leaderboard { room: String, entries: Vec<LeaderboardEntry> },
    PlayerLeft { id: Uuid },
    Error { message: String },
}

// 发往房间处理器的命令
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        conn_id: Uuid,
        name: String,
        color: String,
        sender: mpsc::Sender<ServerMessage>,
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Move {
        conn_id: Uuid,
        dy: i32,
        dx: i32,
        reply: oneshot::Sender<Option<MoveOutcome>>,
    },
    Leave {
        conn_id: Uuid,
    },
    Details {
        reply: oneshot::Sender<RoomDetailsResponse>,
    },
}

// HTTP 响应模型
#[derive(Serialize, Clone, Debug)]
pub struct RoomDetailsResponse {
    pub room: String,
    pub size: usize,
    pub players: usize,
    pub created_at: i64,
}

#[derive(Deserialize, Debug, Default)]
pub struct LeaderboardQuery {
    pub limit: Option<u32>,
}

#[derive(Serialize, Debug)]
pub struct LeaderboardResponse {
    pub room: String,
    pub entries: Vec<LeaderboardEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_defaults_fill_missing_and_blank_fields() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"join","payload":{"name":"  "}}"#).unwrap();
        let ClientMessage::Join(req) = msg else { panic!("expected join") };
        let params = req.with_defaults(15);
        assert_eq!(
            params,
            JoinParams {
                room: "classroom".into(),
                name: "Player".into(),
                size: 15,
                color: "#0066FF".into()
            }
        );
    }

    #[test]
    fn explicit_size_beats_difficulty() {
        let req: JoinRequest = serde_json::from_str(r#"{"size":21,"difficulty":"hard"}"#).unwrap();
        assert_eq!(req.with_defaults(15).size, 21);
        let req: JoinRequest = serde_json::from_str(r#"{"difficulty":"easy"}"#).unwrap();
        assert_eq!(req.with_defaults(15).size, 11);
    }

    #[test]
    fn long_names_are_truncated() {
        let req = JoinRequest { name: Some("x".repeat(100)), ..Default::default() };
        assert_eq!(req.with_defaults(15).name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn move_parses_with_missing_offsets() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"move","payload":{"room":"lab","dx":1}}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Move { dy: 0, dx: 1, .. }));
    }

    #[test]
    fn server_messages_are_tagged() {
        let id = Uuid::nil();
        let json = serde_json::to_value(ServerMessage::PlayerMoved { id, pos: Position::new(1, 2), moves: 3 }).unwrap();
        assert_eq!(json["type"], "player_moved");
        assert_eq!(json["payload"]["pos"], serde_json::json!([1, 2]));
        assert_eq!(json["payload"]["moves"], 3);

        let json = serde_json::to_value(ServerMessage::PlayerLeft { id }).unwrap();
        assert_eq!(json["type"], "player_left");
    }
}
