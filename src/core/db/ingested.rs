use anyhow::Result;
use rusqlite::{OptionalExtension, params};

use super::Database;
use super::types::IngestedFileRecord;

impl Database {
    pub async fn create_ingested_file(
        &self,
        file_name: &str,
        file_hash: &str,
    ) -> Result<IngestedFileRecord> {
        let db = self.conn.lock().await;
        db.execute(
            "INSERT INTO ingested_files (file_name, file_hash) VALUES (?1, ?2)",
            params![file_name, file_hash],
        )?;
        let id = db.last_insert_rowid();
        let record = db.query_row(
            "SELECT id, file_name, file_hash, created FROM ingested_files WHERE id = ?1",
            params![id],
            |row| {
                Ok(IngestedFileRecord {
                    id: row.get(0)?,
                    file_name: row.get(1)?,
                    file_hash: row.get(2)?,
                    created: row.get(3)?,
                })
            },
        )?;
        Ok(record)
    }

    pub async fn find_ingested_file_by_hash(
        &self,
        file_hash: &str,
    ) -> Result<Option<IngestedFileRecord>> {
        let db = self.conn.lock().await;
        let record = db
            .query_row(
                "SELECT id, file_name, file_hash, created FROM ingested_files
                 WHERE file_hash = ?1 ORDER BY id LIMIT 1",
                params![file_hash],
                |row| {
                    Ok(IngestedFileRecord {
                        id: row.get(0)?,
                        file_name: row.get(1)?,
                        file_hash: row.get(2)?,
                        created: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub async fn count_ingested_files(&self) -> Result<usize> {
        let db = self.conn.lock().await;
        let count: i64 = db.query_row("SELECT COUNT(*) FROM ingested_files", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_by_hash_finds_recorded_file() {
        let db = Database::open_in_memory().expect("db opens");
        assert!(db.find_ingested_file_by_hash("abc").await.expect("query").is_none());
        db.create_ingested_file("runbook.pdf", "abc").await.expect("insert");
        let found = db.find_ingested_file_by_hash("abc").await.expect("query");
        assert_eq!(found.map(|r| r.file_name), Some("runbook.pdf".to_string()));
        assert_eq!(db.count_ingested_files().await.expect("count"), 1);
    }
}
