use anyhow::Result;
use rusqlite::{Row, params};

use super::Database;
use super::types::{ChatHistory, ChatRecord};
use crate::core::llm::RoleType;

pub const CHAT_CONTENT_MAX_CHARS: usize = 2048;

fn bounded(content: &str) -> &str {
    match content.char_indices().nth(CHAT_CONTENT_MAX_CHARS) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

fn chat_from_row(row: &Row<'_>) -> rusqlite::Result<ChatRecord> {
    let role: String = row.get(1)?;
    Ok(ChatRecord {
        id: row.get(0)?,
        role_type: RoleType::from_role(&role).unwrap_or(RoleType::System),
        content: row.get(2)?,
        created: row.get(3)?,
    })
}

/// Pair newest-first rows into question/answer history, oldest first.
///
/// Answers without a preceding question are dropped, and a question whose
/// answer is missing is kept with an empty answer.
pub(super) fn pair_history(mut newest_first: Vec<ChatRecord>) -> ChatHistory {
    // Oldest rows at the tail may be answers whose question fell outside the window
    while newest_first
        .last()
        .is_some_and(|c| c.role_type == RoleType::Ai)
    {
        newest_first.pop();
    }
    newest_first.reverse();

    let mut history = ChatHistory::default();
    let mut pending: Option<String> = None;
    for chat in newest_first {
        match chat.role_type {
            RoleType::Human => {
                if let Some(question) = pending.replace(chat.content) {
                    history.insert(question, String::new());
                }
            }
            RoleType::Ai => {
                if let Some(question) = pending.take() {
                    history.insert(question, chat.content);
                }
            }
            _ => {}
        }
    }
    if let Some(question) = pending {
        history.insert(question, String::new());
    }
    history
}

impl Database {
    pub async fn create_chat(
        &self,
        user_id: i64,
        role_type: RoleType,
        content: &str,
    ) -> Result<ChatRecord> {
        let db = self.conn.lock().await;
        db.execute(
            "INSERT INTO chats (user_id, role_type, content) VALUES (?1, ?2, ?3)",
            params![user_id, role_type.as_str(), bounded(content)],
        )?;
        let id = db.last_insert_rowid();
        let chat = db.query_row(
            "SELECT id, role_type, content, created FROM chats WHERE id = ?1",
            params![id],
            chat_from_row,
        )?;
        Ok(chat)
    }

    pub async fn find_chats_by_user_id(&self, user_id: i64) -> Result<Vec<ChatRecord>> {
        let db = self.conn.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, role_type, content, created FROM chats
             WHERE user_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![user_id], chat_from_row)?;
        let mut chats = Vec::new();
        for row in rows {
            chats.push(row?);
        }
        Ok(chats)
    }

    /// The user's latest human messages, newest first.
    pub async fn find_recent_human_records(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<ChatRecord>> {
        let db = self.conn.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, role_type, content, created FROM chats
             WHERE user_id = ?1 AND role_type = 'human' ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64], chat_from_row)?;
        let mut chats = Vec::new();
        for row in rows {
            chats.push(row?);
        }
        Ok(chats)
    }

    /// Question/answer pairs from the user's latest `2 * limit` chat rows.
    pub async fn find_recent_chat_history(&self, user_id: i64, limit: usize) -> Result<ChatHistory> {
        let rows = {
            let db = self.conn.lock().await;
            let mut stmt = db.prepare(
                "SELECT id, role_type, content, created FROM chats
                 WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
            )?;
            let mapped = stmt.query_map(params![user_id, (limit * 2) as i64], chat_from_row)?;
            let mut rows = Vec::new();
            for row in mapped {
                rows.push(row?);
            }
            rows
        };
        Ok(pair_history(rows))
    }
}
