//! Embedding collections on SQLite + sqlite-vec.
//!
//! Each collection is a content table (`<name>_docs`) paired with a `vec0`
//! virtual table (`<name>_vec`) sharing rowids. Embeddings are L2-normalised
//! on the way in, so vec0's euclidean distance maps onto cosine similarity.

pub mod multi_vector;
pub mod object_store;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, ffi::sqlite3_auto_extension, params};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Once};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::llm::Embedder;

static REGISTER_VEC: Once = Once::new();

fn register_sqlite_vec() {
    REGISTER_VEC.call_once(|| {
        // Load sqlite-vec extension globally for rusqlite
        unsafe {
            sqlite3_auto_extension(Some(std::mem::transmute::<
                *const (),
                unsafe extern "C" fn(
                    *mut rusqlite::ffi::sqlite3,
                    *mut *mut std::os::raw::c_char,
                    *const rusqlite::ffi::sqlite3_api_routines,
                ) -> std::os::raw::c_int,
            >(
                sqlite_vec::sqlite3_vec_init as *const ()
            )));
        }
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// Full-text chunks of engineering documents.
    Text,
    /// Summaries of incident analysis documents.
    Summary,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Text, Collection::Summary];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Text => "demo_text_collection",
            Collection::Summary => "demo_summary_collection",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

fn init_collections(db: &Connection, dims: usize) -> Result<()> {
    for collection in Collection::ALL {
        let name = collection.name();
        db.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {name}_docs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{{}}'
            );
            CREATE VIRTUAL TABLE IF NOT EXISTS {name}_vec USING vec0(
                embedding float[{dims}]
            );"
        ))?;
    }
    Ok(())
}

pub struct VectorStore {
    db: Arc<Mutex<Connection>>,
    embedder: Arc<dyn Embedder>,
}

impl VectorStore {
    pub async fn open<P: AsRef<Path>>(path: P, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        register_sqlite_vec();
        let db = Connection::open(path)
            .with_context(|| format!("opening vector store {}", path.display()))?;
        init_collections(&db, embedder.dimensions())?;
        info!(
            "Opened vector store at {} ({} dims)",
            path.display(),
            embedder.dimensions()
        );
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            embedder,
        })
    }

    pub fn open_in_memory(embedder: Arc<dyn Embedder>) -> Result<Self> {
        register_sqlite_vec();
        let db = Connection::open_in_memory()?;
        init_collections(&db, embedder.dimensions())?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            embedder,
        })
    }

    /// Embed and insert `docs`, returning the number stored.
    pub async fn add_documents(&self, collection: Collection, docs: &[Document]) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = docs.iter().map(|d| d.page_content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != docs.len() {
            bail!(
                "embedder returned {} vectors for {} documents",
                embeddings.len(),
                docs.len()
            );
        }

        let name = collection.name();
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        for (doc, embedding) in docs.iter().zip(embeddings) {
            let embedding = self.check_dims(embedding)?;
            tx.execute(
                &format!("INSERT INTO {name}_docs (content, metadata) VALUES (?1, ?2)"),
                params![doc.page_content, serde_json::to_string(&doc.metadata)?],
            )?;
            let rowid = tx.last_insert_rowid();
            tx.execute(
                &format!("INSERT INTO {name}_vec (rowid, embedding) VALUES (?1, ?2)"),
                params![rowid, serde_json::to_string(&normalize(embedding))?],
            )?;
        }
        tx.commit()?;
        debug!("Stored {} documents in {}", docs.len(), name);
        Ok(docs.len())
    }

    /// Top-`k` documents for `query` with cosine similarity, best first.
    pub async fn similarity_search_with_score(
        &self,
        collection: Collection,
        query: &str,
        k: usize,
    ) -> Result<Vec<(Document, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let Some(embedding) = embeddings.pop() else {
            bail!("embedder returned no vector for the query");
        };
        let embedding = normalize(self.check_dims(embedding)?);

        let name = collection.name();
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "WITH knn AS (
                SELECT rowid, distance FROM {name}_vec
                WHERE embedding MATCH ?1 AND k = ?2
             )
             SELECT d.content, d.metadata, knn.distance
             FROM knn JOIN {name}_docs d ON d.id = knn.rowid
             ORDER BY knn.distance"
        ))?;
        let rows = stmt.query_map(
            params![serde_json::to_string(&embedding)?, k as i64],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            },
        )?;

        let mut results = Vec::new();
        for row in rows {
            let (content, metadata, distance) = row?;
            let metadata: Map<String, Value> = serde_json::from_str(&metadata).unwrap_or_default();
            // |a - b|^2 = 2 - 2cos for unit vectors
            let score = 1.0 - (distance * distance / 2.0) as f32;
            results.push((
                Document {
                    page_content: content,
                    metadata,
                },
                score,
            ));
        }
        Ok(results)
    }

    pub async fn count(&self, collection: Collection) -> Result<usize> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row(
            &format!("SELECT COUNT(*) FROM {}_docs", collection.name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn check_dims(&self, embedding: Vec<f32>) -> Result<Vec<f32>> {
        let expected = self.embedder.dimensions();
        if embedding.len() != expected {
            bail!(
                "embedding has {} dimensions, collection expects {}",
                embedding.len(),
                expected
            );
        }
        Ok(embedding)
    }
}
