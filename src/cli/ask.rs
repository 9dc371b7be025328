use anyhow::{Context, Result};
use console::style;

use crate::core::assistant::{Assistant, AssistantDeps};
use crate::core::config::AppConfig;
use crate::core::db::Database;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::terminal;

/// Open the chat database and seed the admin user when it is empty.
async fn open_database(config: &AppConfig) -> Result<Database> {
    let mut db = Database::open(&config.database.path).await?.with_bootstrap_admin(
        config.auth.admin_username.clone(),
        config.auth.admin_password.clone(),
    );
    db.on_init().await?;
    Ok(db)
}

async fn build_assistant(config: &AppConfig) -> Result<Assistant> {
    let db = open_database(config).await?;
    let deps = AssistantDeps::from_config(config).await?;
    Ok(Assistant::new(config, db, deps))
}

pub(super) async fn run_ingest(config: AppConfig) -> Result<()> {
    let assistant = build_assistant(&config).await?;
    terminal::print_step(&format!(
        "Ingesting documents from {}",
        config.ingest.data_dir.display()
    ));
    let report = assistant.gen_knowledgebase().await?;

    for name in &report.ingested {
        terminal::print_success(&format!("Ingested {}", name));
    }
    for name in &report.skipped {
        terminal::print_info(&format!("Skipped {} (already ingested)", name));
    }
    match report.error() {
        Some(error) => terminal::print_warn(&error),
        None => terminal::print_success(report.status()),
    }

    let (files, chunks, summaries) = assistant.knowledge_base_size().await?;
    terminal::print_status(
        "Knowledge base",
        &format!(
            "{} files, {} text chunks, {} incident summaries",
            files, chunks, summaries
        ),
    );
    Ok(())
}

async fn find_user(db: &Database, config: &AppConfig, user: Option<&str>) -> Result<i64> {
    let username = user.unwrap_or(&config.auth.admin_username);
    let user = db
        .find_user_by_name(username)
        .await?
        .with_context(|| format!("user '{}' does not exist", username))?;
    Ok(user.id)
}

pub(super) async fn run_ask(config: AppConfig, query: &str, user: Option<&str>) -> Result<()> {
    let assistant = build_assistant(&config).await?;
    let user_id = find_user(assistant.db(), &config, user).await?;
    let answer = assistant.gen_ai_completion(user_id, query).await?;
    println!("\n{}\n{}\n", style("Answer").bold().cyan(), answer);
    Ok(())
}

pub(super) async fn run_history(config: AppConfig, user: Option<&str>, limit: usize) -> Result<()> {
    let assistant = build_assistant(&config).await?;
    let user_id = find_user(assistant.db(), &config, user).await?;
    let questions = assistant.recent_questions(user_id, limit).await?;
    if questions.is_empty() {
        terminal::print_info("No questions asked yet.");
        return Ok(());
    }
    for (i, question) in questions.iter().enumerate() {
        println!("  {} {}", style(format!("{:>2}.", i + 1)).dim(), question);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.path = dir.join("ai_sre.db");
        config
    }

    #[tokio::test]
    async fn default_user_resolves_on_a_fresh_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());
        let db = open_database(&config).await.expect("open database");
        let admin = db
            .find_user_by_name("admin")
            .await
            .expect("lookup")
            .expect("admin seeded");
        assert_eq!(find_user(&db, &config, None).await.expect("resolve"), admin.id);
        assert!(find_user(&db, &config, Some("nobody")).await.is_err());
    }

    #[tokio::test]
    async fn reopening_keeps_the_seeded_admin() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config_in(dir.path());
        config.auth.admin_password = Some("s3cret".to_string());
        open_database(&config).await.expect("first open");
        let db = open_database(&config).await.expect("second open");
        assert_eq!(db.find_all_users().await.expect("users").len(), 1);
        assert!(
            db.authenticate_user("admin", "s3cret")
                .await
                .expect("auth query")
                .is_some()
        );
    }
}
