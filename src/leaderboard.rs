// ====================================================================================
// src/leaderboard.rs - 排行榜存储与计分
// ====================================================================================
use crate::error::AppError;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use std::time::Duration;

pub const BASE_SCORE: i64 = 1000;
pub const MOVE_PENALTY: i64 = 10;
pub const SECOND_PENALTY: i64 = 2;

// 单人和多人模式共用的计分规则，最低为 0
pub fn score(moves: i64, elapsed_secs: i64) -> i64 {
    BASE_SCORE
        .saturating_sub(MOVE_PENALTY.saturating_mul(moves))
        .saturating_sub(SECOND_PENALTY.saturating_mul(elapsed_secs))
        .max(0)
}

// 一条完成记录，只追加不修改
#[derive(FromRow, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    #[serde(skip)]
    pub room: String,
    pub player: String,
    #[sqlx(rename = "time_taken")]
    #[serde(rename = "time")]
    pub elapsed_secs: i64,
    pub moves: i64,
    pub score: i64,
    #[sqlx(rename = "ts")]
    #[serde(skip)]
    pub recorded_at: i64,
}

impl LeaderboardEntry {
    pub fn new(room: &str, player: &str, elapsed_secs: i64, moves: i64) -> Self {
        Self {
            room: room.to_string(),
            player: player.to_string(),
            elapsed_secs,
            moves,
            score: score(moves, elapsed_secs),
            recorded_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LeaderboardStore {
    pool: SqlitePool,
}

impl LeaderboardStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn record(&self, entry: &LeaderboardEntry) -> Result<(), AppError> {
        sqlx::query("INSERT INTO leaderboard (player, room, time_taken, moves, score, ts) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(&entry.player)
            .bind(&entry.room)
            .bind(entry.elapsed_secs)
            .bind(entry.moves)
            .bind(entry.score)
            .bind(entry.recorded_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // 写入失败时按配置重试，最后一次失败返回错误
    pub async fn record_with_retry(
        &self,
        entry: &LeaderboardEntry,
        max_retries: u32,
        delay: Duration,
    ) -> Result<(), AppError> {
        let mut attempt = 0;
        loop {
            match self.record(entry).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Leaderboard write failed for {} in room {} (attempt {}/{}): {}",
                        entry.player, entry.room, attempt, max_retries + 1, e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // 分数降序，同分按用时升序
    pub async fn top(&self, room: &str, limit: u32) -> Result<Vec<LeaderboardEntry>, AppError> {
        let entries = sqlx::query_as::<_, LeaderboardEntry>(
            "SELECT room, player, time_taken, moves, score, ts FROM leaderboard WHERE room = ? ORDER BY score DESC, time_taken ASC, id ASC LIMIT ?",
        )
        .bind(room)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
