// ====================================================================================
// src/db.rs - 数据库连接与迁移
// ====================================================================================
use crate::error::AppError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS leaderboard (id INTEGER PRIMARY KEY AUTOINCREMENT, player TEXT NOT NULL, room TEXT NOT NULL, time_taken INTEGER NOT NULL, moves INTEGER NOT NULL, score INTEGER NOT NULL, ts INTEGER NOT NULL)",
    // 按房间取排行
    "CREATE INDEX IF NOT EXISTS idx_leaderboard_room_rank ON leaderboard(room, score DESC, time_taken ASC)",
];

// 连接数据库，内存库只能用单个永不过期的连接，否则每个连接各是一个库
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

    let pool = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?
    };

    migrate(&pool).await?;
    Ok(pool)
}

// 初始化数据库表
pub async fn migrate(pool: &SqlitePool) -> Result<(), AppError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
