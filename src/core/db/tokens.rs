use anyhow::Result;
use rusqlite::{OptionalExtension, params};
use sha2::{Digest, Sha256};

use super::Database;
use super::types::{Roles, User};

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn generate_raw_token() -> String {
    let bytes: [u8; 32] = rand::random();
    format!("sre_{}", hex::encode(bytes))
}

impl Database {
    /// Issue a bearer token for `user_id`; only its digest is persisted.
    pub async fn create_session_token(&self, user_id: i64, ttl_minutes: u32) -> Result<String> {
        let raw_token = generate_raw_token();
        let token_hash = hash_token(&raw_token);
        let id = uuid::Uuid::new_v4().to_string();

        let db = self.conn.lock().await;
        db.execute(
            "INSERT INTO api_tokens (id, user_id, token_hash, expires_at)
             VALUES (?1, ?2, ?3, datetime('now', ?4))",
            params![id, user_id, token_hash, format!("+{} minutes", ttl_minutes)],
        )?;
        Ok(raw_token)
    }

    /// Resolve a bearer token to its user; unknown or expired tokens yield `None`.
    pub async fn validate_session_token(&self, raw_token: &str) -> Result<Option<User>> {
        let token_hash = hash_token(raw_token);
        let db = self.conn.lock().await;
        let user = db
            .query_row(
                "SELECT u.id, u.username, u.password, u.role, u.created, u.updated
                 FROM api_tokens t JOIN users u ON u.id = t.user_id
                 WHERE t.token_hash = ?1 AND t.expires_at > datetime('now')",
                params![token_hash],
                |row| {
                    let role: String = row.get(3)?;
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        password_hash: row.get(2)?,
                        role: Roles::from_role(&role).unwrap_or(Roles::Employee),
                        created: row.get(4)?,
                        updated: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    pub async fn purge_expired_tokens(&self) -> Result<usize> {
        let db = self.conn.lock().await;
        let rows = db.execute(
            "DELETE FROM api_tokens WHERE expires_at <= datetime('now')",
            [],
        )?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issued_token_resolves_to_user() {
        let db = Database::open_in_memory().expect("db opens");
        let user = db
            .create_user("gina", "pw", Roles::Employee)
            .await
            .expect("user");
        let token = db.create_session_token(user.id, 15).await.expect("token");
        assert!(token.starts_with("sre_"));

        let resolved = db.validate_session_token(&token).await.expect("validate");
        assert_eq!(resolved.map(|u| u.id), Some(user.id));
        assert!(
            db.validate_session_token("sre_bogus")
                .await
                .expect("validate")
                .is_none()
        );
    }

    #[tokio::test]
    async fn expired_token_is_rejected_and_purged() {
        let db = Database::open_in_memory().expect("db opens");
        let user = db
            .create_user("hank", "pw", Roles::Employee)
            .await
            .expect("user");
        let token = db.create_session_token(user.id, 0).await.expect("token");
        assert!(db.validate_session_token(&token).await.expect("validate").is_none());
        assert_eq!(db.purge_expired_tokens().await.expect("purge"), 1);
    }

    #[test]
    fn token_hash_is_stable_hex() {
        let h = hash_token("abc");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_token("abc"));
    }
}
