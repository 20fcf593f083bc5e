// ====================================================================================
// src/room.rs - 房间状态与移动规则
// ====================================================================================
use crate::leaderboard;
use crate::maze::{Cell, Maze, Position};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    pub pos: Position,
    pub moves: i64,
    pub joined_at: Instant,
    pub finished: bool,
    pub color: String,
}

// 广播给客户端的玩家视图
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlayerView {
    pub name: String,
    pub pos: Position,
    pub moves: i64,
    pub color: String,
}

impl From<&Player> for PlayerView {
    fn from(p: &Player) -> Self {
        Self { name: p.name.clone(), pos: p.pos, moves: p.moves, color: p.color.clone() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub maze: Vec<Vec<Cell>>,
    pub players: HashMap<Uuid, PlayerView>,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishRecord {
    pub name: String,
    pub elapsed_secs: i64,
    pub moves: i64,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub pos: Position,
    pub moves: i64,
    pub finish: Option<FinishRecord>,
}

#[derive(Debug)]
pub struct Room {
    key: String,
    maze: Maze,
    players: HashMap<Uuid, Player>,
    created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(key: impl Into<String>, maze: Maze) -> Self {
        Self { key: key.into(), maze, players: HashMap::new(), created_at: Utc::now() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn size(&self) -> usize {
        self.maze.size()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn player(&self, conn_id: &Uuid) -> Option<&Player> {
        self.players.get(conn_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    // 新玩家总是从起点开始
    pub fn add_player(&mut self, conn_id: Uuid, name: String, color: String, now: Instant) -> &Player {
        let player = Player {
            name,
            pos: self.maze.start(),
            moves: 0,
            joined_at: now,
            finished: false,
            color,
        };
        self.players.insert(conn_id, player);
        &self.players[&conn_id]
    }

    pub fn remove_player(&mut self, conn_id: &Uuid) -> Option<Player> {
        self.players.remove(conn_id)
    }

    // 越界、撞墙、未知连接或非法步长都不改变状态
    pub fn apply_move(&mut self, conn_id: &Uuid, dy: i32, dx: i32, now: Instant) -> Option<MoveOutcome> {
        if dy.abs() > 1 || dx.abs() > 1 || (dy == 0 && dx == 0) {
            return None;
        }
        let exit = self.maze.exit();
        let player = self.players.get(conn_id)?;
        let target = player.pos.offset(dy, dx)?;
        if !self.maze.is_walkable(target) {
            return None;
        }

        let player = self.players.get_mut(conn_id)?;
        player.pos = target;
        player.moves += 1;

        let finish = if target == exit && !player.finished {
            player.finished = true;
            let elapsed_secs = now.saturating_duration_since(player.joined_at).as_secs() as i64;
            Some(FinishRecord {
                name: player.name.clone(),
                elapsed_secs,
                moves: player.moves,
                score: leaderboard::score(player.moves, elapsed_secs),
            })
        } else {
            None
        };

        Some(MoveOutcome { pos: target, moves: player.moves, finish })
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            maze: self.maze.grid().to_vec(),
            players: self.players.iter().map(|(id, p)| (*id, PlayerView::from(p))).collect(),
            size: self.maze.size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const W: Cell = Cell::Wall;
    const O: Cell = Cell::Open;
    const S: Cell = Cell::Start;
    const E: Cell = Cell::Exit;

    // 一条走廊：(1,1) -> (1,3) -> (3,3)
    fn corridor() -> Maze {
        Maze::from_grid(vec![
            vec![W, W, W, W, W],
            vec![W, S, O, O, W],
            vec![W, W, W, O, W],
            vec![W, W, W, E, W],
            vec![W, W, W, W, W],
        ])
        .unwrap()
    }

    fn room_with_player() -> (Room, Uuid, Instant) {
        let mut room = Room::new("lab", corridor());
        let id = Uuid::new_v4();
        let t0 = Instant::now();
        room.add_player(id, "ana".into(), "#0066FF".into(), t0);
        (room, id, t0)
    }

    #[test]
    fn player_starts_at_start() {
        let (room, id, _) = room_with_player();
        let p = room.player(&id).unwrap();
        assert_eq!(p.pos, Position::new(1, 1));
        assert_eq!(p.moves, 0);
        assert!(!p.finished);
    }

    #[test]
    fn wall_move_is_rejected_without_state_change() {
        let (mut room, id, t0) = room_with_player();
        assert_eq!(room.apply_move(&id, 1, 0, t0), None);
        assert_eq!(room.apply_move(&id, -1, 0, t0), None);
        let p = room.player(&id).unwrap();
        assert_eq!(p.pos, Position::new(1, 1));
        assert_eq!(p.moves, 0);
    }

    #[test]
    fn malformed_steps_are_rejected() {
        let (mut room, id, t0) = room_with_player();
        assert_eq!(room.apply_move(&id, 0, 0, t0), None);
        assert_eq!(room.apply_move(&id, 0, 2, t0), None);
        assert_eq!(room.apply_move(&Uuid::new_v4(), 0, 1, t0), None);
        assert_eq!(room.player(&id).unwrap().moves, 0);
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let mut room = Room::new("lab", corridor());
        let id = Uuid::new_v4();
        room.add_player(id, "ana".into(), "red".into(), Instant::now());
        room.players.get_mut(&id).unwrap().pos = Position::new(0, 0);
        assert_eq!(room.apply_move(&id, -1, 0, Instant::now()), None);
        assert_eq!(room.apply_move(&id, 0, -1, Instant::now()), None);
    }

    #[test]
    fn reaching_exit_finishes_once() {
        let (mut room, id, t0) = room_with_player();
        let later = t0 + Duration::from_secs(30);

        assert_eq!(room.apply_move(&id, 0, 1, t0).unwrap().finish, None);
        assert_eq!(room.apply_move(&id, 0, 1, t0).unwrap().finish, None);
        assert_eq!(room.apply_move(&id, 1, 0, t0).unwrap().finish, None);
        let outcome = room.apply_move(&id, 1, 0, later).unwrap();
        assert_eq!(outcome.pos, Position::new(3, 3));
        assert_eq!(
            outcome.finish,
            Some(FinishRecord { name: "ana".into(), elapsed_secs: 30, moves: 4, score: 1000 - 40 - 60 })
        );
        assert!(room.player(&id).unwrap().finished);

        // 离开再回到出口不再计分
        assert!(room.apply_move(&id, -1, 0, later).unwrap().finish.is_none());
        let again = room.apply_move(&id, 1, 0, later).unwrap();
        assert_eq!(again.moves, 6);
        assert!(again.finish.is_none());
    }

    #[test]
    fn removed_player_disappears_from_snapshot() {
        let (mut room, id, t0) = room_with_player();
        let other = Uuid::new_v4();
        room.add_player(other, "bo".into(), "green".into(), t0);
        assert_eq!(room.snapshot().players.len(), 2);

        assert!(room.remove_player(&id).is_some());
        let snap = room.snapshot();
        assert_eq!(snap.players.len(), 1);
        assert!(snap.players.contains_key(&other));
        assert_eq!(snap.size, 5);
        assert!(room.remove_player(&id).is_none());
    }
}
