use anyhow::{Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Path, PathBuf};

/// Byte values on the local filesystem, one file per key.
pub struct LocalFileStore {
    root: PathBuf,
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        bail!("invalid object store key: {:?}", key);
    }
    Ok(())
}

impl LocalFileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub async fn mset(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        for (key, value) in entries {
            check_key(key)?;
            tokio::fs::write(self.root.join(key), value).await?;
        }
        Ok(())
    }

    /// Values in key order; missing keys come back as `None`.
    pub async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            check_key(key)?;
            match tokio::fs::read(self.root.join(key)).await {
                Ok(bytes) => values.push(Some(bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => values.push(None),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(values)
    }
}

/// Stored form of a rasterised document: a JSON list of base64 PNG pages.
pub fn encode_pages(pages: &[Vec<u8>]) -> Result<Vec<u8>> {
    let encoded: Vec<String> = pages.iter().map(|p| STANDARD.encode(p)).collect();
    Ok(serde_json::to_vec(&encoded)?)
}

pub fn decode_pages(raw: &[u8]) -> Result<Vec<String>> {
    Ok(serde_json::from_slice(raw)?)
}
