//! 主应用程序入口
//!
//! 加载配置，组装共享组件并启动 Axum 服务。

use std::sync::Arc;

use application::{InMemoryMessageRepository, MessageRepository, SessionContext};
use config::AppConfig;
use infrastructure::{Infrastructure, InfrastructureConfig};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load()?;
    tracing::info!(config = %config.sanitize(), "configuration loaded");

    let message_repository: Arc<dyn MessageRepository> = match &config.database.url {
        Some(url) => {
            let infrastructure = Infrastructure::connect(InfrastructureConfig {
                database_url: url.clone(),
                max_connections: config.database.max_connections,
            })
            .await?;
            infrastructure.message_repository_trait()
        }
        None => {
            tracing::warn!("no database configured, messages are kept in memory");
            Arc::new(InMemoryMessageRepository::default())
        }
    };

    // 注册表、广播中心和在线状态协调器在这里创建一次，由所有连接共享
    let session = SessionContext::build(
        message_repository,
        config.session.outbound_queue_capacity,
    );
    let app = router(AppState::new(session, config.session.history_limit));

    let listener = TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "chat relay listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
