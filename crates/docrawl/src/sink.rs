use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use url::Url;

use crate::error::CrawlError;

/// Receives one document per successfully crawled page.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn store(&self, url: &Url, markdown: &str) -> Result<(), CrawlError>;
}

/// Writes one markdown file per page into an output directory.
///
/// The directory is created on first use. Filenames are derived from the
/// URL's domain and path, reduced to filesystem-safe characters.
pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn ensure_dir(&self) -> Result<(), CrawlError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
            tracing::info!("Created output directory: {}", self.dir.display());
        } else if !self.dir.is_dir() {
            return Err(CrawlError::Output(format!(
                "output path '{}' exists but is not a directory",
                self.dir.display()
            )));
        }
        Ok(())
    }
}

/// Derives a markdown filename from a page URL.
fn file_name_for(url: &Url) -> String {
    let domain = sanitize_component(url.domain().unwrap_or("unknown_domain"), 50);
    let path = url.path();
    let path = if path == "/" || path.is_empty() {
        "index".to_string()
    } else {
        sanitize_component(path.trim_matches('/'), 100)
    };
    format!("{}_{}.md", domain, path)
}

fn sanitize_component(component: &str, max_len: usize) -> String {
    let mut sanitized: String = component
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if sanitized.is_empty() {
        sanitized.push_str("empty");
    }

    if sanitized.chars().count() > max_len {
        sanitized = sanitized.chars().take(max_len).collect();
    }
    sanitized
}

#[async_trait]
impl DocumentSink for DirSink {
    async fn store(&self, url: &Url, markdown: &str) -> Result<(), CrawlError> {
        self.ensure_dir()?;
        let path = self.dir.join(file_name_for(url));
        fs::write(&path, markdown)?;
        tracing::debug!("Wrote {} bytes to {}", markdown.len(), path.display());
        Ok(())
    }
}

/// Streams each document to stdout with a filename header.
pub struct StdoutSink;

#[async_trait]
impl DocumentSink for StdoutSink {
    async fn store(&self, url: &Url, markdown: &str) -> Result<(), CrawlError> {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "-- {} --", file_name_for(url))?;
        handle.write_all(markdown.as_bytes())?;
        writeln!(handle)?;
        handle.flush()?;
        Ok(())
    }
}
