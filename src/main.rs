// ====================================================================================
// src/main.rs - 应用入口
// ====================================================================================
use maze_server::{AppState, Config, db, routes};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志记录
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "maze_server=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env()?;

    // 连接数据库并运行迁移
    tracing::info!("Connecting to database: {}", config.database_url);
    let pool = db::connect(&config.database_url).await?;
    tracing::info!("Database ready");

    let addr: SocketAddr = config.bind_address.parse()?;
    let app_state = Arc::new(AppState::new(pool, config));
    let app = routes::router(app_state);

    // 启动服务器
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Maze server listening on {}", addr);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
