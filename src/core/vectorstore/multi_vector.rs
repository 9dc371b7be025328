use anyhow::Result;
use std::sync::Arc;
use tracing::warn;

use super::object_store::LocalFileStore;
use super::{Collection, VectorStore};

pub const ID_KEY: &str = "doc_id";

/// Searches summary embeddings and returns the raw documents they point at.
pub struct MultiVectorRetriever {
    vectorstore: Arc<VectorStore>,
    docstore: Arc<LocalFileStore>,
    collection: Collection,
    k: usize,
}

impl MultiVectorRetriever {
    pub fn new(
        vectorstore: Arc<VectorStore>,
        docstore: Arc<LocalFileStore>,
        collection: Collection,
        k: usize,
    ) -> Self {
        Self {
            vectorstore,
            docstore,
            collection,
            k,
        }
    }

    pub async fn invoke(&self, query: &str) -> Result<Vec<Vec<u8>>> {
        let hits = self
            .vectorstore
            .similarity_search_with_score(self.collection, query, self.k)
            .await?;

        let mut ids: Vec<String> = Vec::new();
        for (doc, _) in &hits {
            match doc.metadata_str(ID_KEY) {
                Some(id) if !ids.iter().any(|seen| seen == id) => ids.push(id.to_string()),
                Some(_) => {}
                None => warn!("Summary without {} in {}", ID_KEY, self.collection.name()),
            }
        }

        let docs = self.docstore.mget(&ids).await?;
        Ok(docs.into_iter().flatten().collect())
    }
}
