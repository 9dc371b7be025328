use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Text extraction and page rasterisation for PDF files.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Text of each page, in page order.
    async fn extract_text(&self, path: &Path) -> Result<Vec<String>>;

    /// PNG bytes of each page, in page order.
    async fn render_pages(&self, path: &Path) -> Result<Vec<Vec<u8>>>;
}

/// Shells out to poppler's `pdftotext` and `pdftoppm`.
pub struct PopplerRenderer {
    dpi: u32,
}

impl Default for PopplerRenderer {
    fn default() -> Self {
        Self { dpi: 100 }
    }
}

async fn run(cmd: &mut Command, what: &str) -> Result<Vec<u8>> {
    let output = cmd
        .output()
        .await
        .with_context(|| format!("failed to spawn {} (is poppler installed?)", what))?;
    if !output.status.success() {
        bail!(
            "{} exited with {}: {}",
            what,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output.stdout)
}

#[async_trait]
impl DocumentRenderer for PopplerRenderer {
    async fn extract_text(&self, path: &Path) -> Result<Vec<String>> {
        let stdout = run(
            Command::new("pdftotext").arg("-layout").arg(path).arg("-"),
            "pdftotext",
        )
        .await?;
        let text = String::from_utf8_lossy(&stdout);
        // pdftotext ends every page with a form feed
        let mut pages: Vec<String> = text.split('\x0c').map(str::to_string).collect();
        if pages.last().is_some_and(|p| p.trim().is_empty()) {
            pages.pop();
        }
        Ok(pages)
    }

    async fn render_pages(&self, path: &Path) -> Result<Vec<Vec<u8>>> {
        let out_dir = tempfile::tempdir()?;
        let prefix = out_dir.path().join("page");
        run(
            Command::new("pdftoppm")
                .arg("-png")
                .arg("-r")
                .arg(self.dpi.to_string())
                .arg(path)
                .arg(&prefix),
            "pdftoppm",
        )
        .await?;

        let mut files: Vec<PathBuf> = Vec::new();
        let mut entries = tokio::fs::read_dir(out_dir.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let p = entry.path();
            if p.extension().is_some_and(|e| e == "png") {
                files.push(p);
            }
        }
        // pdftoppm zero-pads page numbers, so name order is page order
        files.sort();

        let mut pages = Vec::with_capacity(files.len());
        for file in files {
            pages.push(tokio::fs::read(&file).await?);
        }
        Ok(pages)
    }
}
