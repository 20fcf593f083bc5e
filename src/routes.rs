// ====================================================================================
// src/routes.rs - HTTP路由处理
// ====================================================================================
use crate::{
    error::AppError,
    handler,
    models::{LeaderboardQuery, LeaderboardResponse, RoomDetailsResponse},
    state::AppState,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tower_http::cors::{Any, CorsLayer};

pub fn router(state: Arc<AppState>) -> Router {
    // 定义CORS策略
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(ws_handler))
        .route("/rooms", get(list_rooms))
        .route("/rooms/:room/leaderboard", get(get_leaderboard))
        .with_state(state)
        .layer(cors)
}

// 健康检查
pub async fn health_check() -> impl IntoResponse {
    "OK"
}

// WebSocket处理器
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // 负载保护检查
    if state.total_connections.load(Ordering::Relaxed) >= state.config.max_connections {
        return AppError::ServiceUnavailable("connection limit reached".to_string()).into_response();
    }

    ws.on_upgrade(move |socket| handler::handle_socket(socket, state))
}

// 查询所有房间
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomDetailsResponse>> {
    Json(state.registry.list().await)
}

// 查询房间排行榜
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(room): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let max = state.config.leaderboard_limit;
    let limit = query.limit.unwrap_or(max).min(max);
    if limit == 0 {
        return Err(AppError::BadRequest("limit must be at least 1".to_string()));
    }
    let entries = state.leaderboard.top(&room, limit).await?;
    Ok(Json(LeaderboardResponse { room, entries }))
}
