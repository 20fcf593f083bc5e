// ====================================================================================
// src/state.rs - 共享应用状态
// ====================================================================================
use crate::{
    config::Config,
    leaderboard::LeaderboardStore,
    rate_limit::RateLimiter,
    registry::{RoomRegistry, RoomSettings},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::sync::atomic::AtomicU32;

pub struct AppState {
    pub registry: RoomRegistry,
    pub rate_limiter: RateLimiter,
    pub leaderboard: LeaderboardStore,
    pub total_connections: Arc<AtomicU32>,
    pub config: Config,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: Config) -> Self {
        let leaderboard = LeaderboardStore::new(db_pool);
        let settings = RoomSettings {
            leaderboard_limit: config.leaderboard_limit,
            record_max_retries: config.record_max_retries,
            record_retry_delay: config.record_retry_delay(),
        };
        Self {
            registry: RoomRegistry::new(leaderboard.clone(), settings),
            rate_limiter: RateLimiter::new(config.move_rate_per_sec),
            leaderboard,
            total_connections: Arc::new(AtomicU32::new(0)),
            config,
        }
    }
}
