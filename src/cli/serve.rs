use anyhow::Result;
use console::style;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::core::assistant::{Assistant, AssistantDeps};
use crate::core::config::AppConfig;
use crate::core::db::Database;
use crate::core::lifecycle::LifecycleManager;
use crate::core::terminal;
use crate::interfaces::web::ApiServer;

pub(super) async fn run_serve(config: AppConfig) -> Result<()> {
    let db = Database::open(&config.database.path).await?.with_bootstrap_admin(
        config.auth.admin_username.clone(),
        config.auth.admin_password.clone(),
    );
    let deps = AssistantDeps::from_config(&config).await?;
    let assistant = Arc::new(Assistant::new(&config, db.clone(), deps));

    let mut lifecycle = LifecycleManager::new();
    lifecycle.attach(Arc::new(Mutex::new(db)));
    lifecycle.attach(Arc::new(Mutex::new(ApiServer::new(&config, assistant))));
    lifecycle.start().await?;

    terminal::print_banner();
    terminal::print_link(
        "API",
        &format!("http://{}:{}", config.server.host, config.server.port),
    );
    terminal::print_status("Lifecycle", &format!("{:?}", lifecycle.state()));
    terminal::print_status(
        "Data directory",
        &config.ingest.data_dir.display().to_string(),
    );
    println!(
        "\n  Press {} to stop the server.\n",
        style("Ctrl+C").bold().yellow()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    lifecycle.shutdown().await?;
    Ok(())
}
