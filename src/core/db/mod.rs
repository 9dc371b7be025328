mod chats;
mod ingested;
mod tokens;
pub mod types;
mod users;

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::core::lifecycle::LifecycleComponent;
use types::Roles;

/// Relational store for users, chats, ingested files and session tokens.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    bootstrap_admin: Option<(String, Option<String>)>,
}

fn init_schema(db: &Connection) -> Result<()> {
    db.execute_batch(
        "PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('ADMIN', 'EMPLOYEE')),
            created DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS chats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            role_type TEXT NOT NULL CHECK (role_type IN ('system', 'ai', 'human', 'tool')),
            content TEXT NOT NULL,
            created DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX IF NOT EXISTS idx_chats_user_id ON chats(user_id, id);

        CREATE TABLE IF NOT EXISTS ingested_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_name TEXT NOT NULL,
            file_hash TEXT NOT NULL,
            created DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX IF NOT EXISTS idx_ingested_files_hash ON ingested_files(file_hash);

        CREATE TABLE IF NOT EXISTS api_tokens (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            token_hash TEXT NOT NULL UNIQUE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            expires_at DATETIME NOT NULL
        );",
    )?;
    Ok(())
}

impl Database {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let db = Connection::open(path)?;
        init_schema(&db)?;
        info!("Opened chat database at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(db)),
            bootstrap_admin: None,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()?;
        init_schema(&db)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(db)),
            bootstrap_admin: None,
        })
    }

    /// Seed an admin account on init when the users table is empty.
    pub fn with_bootstrap_admin(mut self, username: String, password: Option<String>) -> Self {
        self.bootstrap_admin = Some((username, password));
        self
    }

    /// Create the admin user if no user exists yet. Returns the generated password, if any.
    pub async fn ensure_admin(
        &self,
        username: &str,
        password: Option<&str>,
    ) -> Result<Option<String>> {
        if !self.find_all_users().await?.is_empty() {
            return Ok(None);
        }
        let (password, generated) = match password {
            Some(p) => (p.to_string(), None),
            None => {
                let bytes: [u8; 12] = rand::random();
                let p = hex::encode(bytes);
                (p.clone(), Some(p))
            }
        };
        self.create_user(username, &password, Roles::Admin).await?;
        info!("Seeded default admin user '{}'", username);
        Ok(generated)
    }
}

#[async_trait]
impl LifecycleComponent for Database {
    async fn on_init(&mut self) -> anyhow::Result<()> {
        if let Some((username, password)) = self.bootstrap_admin.clone()
            && let Some(generated) = self.ensure_admin(&username, password.as_deref()).await?
        {
            warn!(
                "No admin password configured; generated one for '{}': {}",
                username, generated
            );
        }
        let purged = self.purge_expired_tokens().await?;
        if purged > 0 {
            info!("Purged {} expired session tokens", purged);
        }
        Ok(())
    }

    async fn on_shutdown(&mut self) -> anyhow::Result<()> {
        let db = self.conn.lock().await;
        // Let SQLite checkpoint and release file handles cleanly
        db.execute_batch("PRAGMA optimize;")?;
        info!("Chat database closed");
        Ok(())
    }
}
