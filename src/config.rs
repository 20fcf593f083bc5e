// ====================================================================================
// src/config.rs - 配置管理
// ====================================================================================
use crate::error::AppError;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub max_connections: u32,

    // 游戏参数
    pub move_rate_per_sec: f64,
    pub default_maze_size: usize,
    pub max_maze_size: usize,
    pub leaderboard_limit: u32,

    // 排行榜写入重试
    pub record_max_retries: u32,
    pub record_retry_delay_ms: u64,

    // 每个连接的发送缓冲
    pub outbound_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            bind_address: "0.0.0.0:5000".to_string(),
            max_connections: 10_000,
            move_rate_per_sec: 10.0,
            default_maze_size: 15,
            max_maze_size: 101,
            leaderboard_limit: 50,
            record_max_retries: 2,
            record_retry_delay_ms: 200,
            outbound_buffer: 64,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        // 尝试加载 .env 文件，如果失败则忽略（可能文件不存在）
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }

        let defaults = Self::default();
        let config = Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_address: std::env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            max_connections: env_or("MAX_CONNECTIONS", defaults.max_connections)?,
            move_rate_per_sec: env_or("MOVE_RATE_PER_SEC", defaults.move_rate_per_sec)?,
            default_maze_size: env_or("DEFAULT_MAZE_SIZE", defaults.default_maze_size)?,
            max_maze_size: env_or("MAX_MAZE_SIZE", defaults.max_maze_size)?,
            leaderboard_limit: env_or("LEADERBOARD_LIMIT", defaults.leaderboard_limit)?,
            record_max_retries: env_or("LEADERBOARD_RECORD_RETRIES", defaults.record_max_retries)?,
            record_retry_delay_ms: env_or("LEADERBOARD_RETRY_DELAY_MS", defaults.record_retry_delay_ms)?,
            outbound_buffer: env_or("OUTBOUND_BUFFER", defaults.outbound_buffer)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.move_rate_per_sec > 0.0) {
            return Err(AppError::Config("MOVE_RATE_PER_SEC must be positive".into()));
        }
        crate::maze::validate_size(self.default_maze_size as i64, self.max_maze_size)
            .map_err(|e| AppError::Config(format!("DEFAULT_MAZE_SIZE: {}", e)))?;
        if self.outbound_buffer == 0 {
            return Err(AppError::Config("OUTBOUND_BUFFER must be at least 1".into()));
        }
        Ok(())
    }

    pub fn record_retry_delay(&self) -> Duration {
        Duration::from_millis(self.record_retry_delay_ms)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a valid number, got {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}
