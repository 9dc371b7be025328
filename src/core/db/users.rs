use anyhow::{Result, anyhow};
use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rusqlite::{OptionalExtension, Row, params};

use super::Database;
use super::types::{Roles, User};

const USER_COLUMNS: &str = "id, username, password, role, created, updated";

fn hash_password(password: &str) -> Result<String> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| anyhow!("failed to encode salt: {}", e))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: Roles::from_role(&role).unwrap_or(Roles::Employee),
        created: row.get(4)?,
        updated: row.get(5)?,
    })
}

impl Database {
    /// Usernames are unique; a duplicate insert fails on the UNIQUE constraint.
    pub async fn create_user(&self, username: &str, password: &str, role: Roles) -> Result<User> {
        let password_hash = hash_password(password)?;
        let db = self.conn.lock().await;
        db.execute(
            "INSERT INTO users (username, password, role) VALUES (?1, ?2, ?3)",
            params![username, password_hash, role.as_str()],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                anyhow!("username '{}' already exists", username)
            }
            other => other.into(),
        })?;
        let id = db.last_insert_rowid();
        let user = db.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            user_from_row,
        )?;
        Ok(user)
    }

    pub async fn find_all_users(&self) -> Result<Vec<User>> {
        let db = self.conn.lock().await;
        let mut stmt = db.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
        let rows = stmt.query_map([], user_from_row)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let db = self.conn.lock().await;
        let user = db
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub async fn find_user_by_name(&self, username: &str) -> Result<Option<User>> {
        let db = self.conn.lock().await;
        let user = db
            .query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Returns the user when the password matches its stored argon2 hash.
    pub async fn authenticate_user(&self, username: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.find_user_by_name(username).await? else {
            return Ok(None);
        };
        if verify_password(password, &user.password_hash) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }
}
