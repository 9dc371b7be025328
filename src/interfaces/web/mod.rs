pub(crate) mod auth;
mod handlers;
mod router;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::info;

use crate::core::assistant::Assistant;
use crate::core::config::AppConfig;
use crate::core::db::Database;
use crate::core::lifecycle::LifecycleComponent;

use router::build_api_router;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) assistant: Arc<Assistant>,
    pub(crate) db: Database,
    pub(crate) token_ttl_minutes: u32,
}

/// HTTP API for login, user administration and the assistant.
pub struct ApiServer {
    state: AppState,
    host: String,
    port: u16,
    cors_origins: Vec<String>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ApiServer {
    pub fn new(config: &AppConfig, assistant: Arc<Assistant>) -> Self {
        let db = assistant.db().clone();
        Self {
            state: AppState {
                assistant,
                db,
                token_ttl_minutes: config.auth.token_ttl_minutes,
            },
            host: config.server.host.clone(),
            port: config.server.port,
            cors_origins: config.server.cors_origins.clone(),
            shutdown_tx: None,
        }
    }
}

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server Interface initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding API server to {}", addr))?;
        let app = build_api_router(self.state.clone(), &self.cors_origins);
        let (tx, rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(tx);

        info!("API Server running at http://{addr}");
        tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!("API Server crashed: {}", e);
            }
        });
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server Interface shutting down...");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        Ok(())
    }
}
