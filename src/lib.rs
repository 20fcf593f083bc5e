// ====================================================================================
// src/lib.rs - 多人迷宫服务
// ====================================================================================
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod leaderboard;
pub mod maze;
pub mod models;
pub mod rate_limit;
pub mod registry;
pub mod room;
pub mod routes;
pub mod session;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use state::AppState;
