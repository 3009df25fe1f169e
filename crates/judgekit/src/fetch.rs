//! Test case resource fetching
//!
//! Test cases reference their input and expected output by path or URL.
//! Backends resolve those references through a [`ResourceFetcher`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors raised while fetching a test case resource
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to fetch file: {path}")]
    NotFound { path: String },

    #[error("Failed to fetch file: {path}")]
    Status { path: String, status: u16 },

    #[error("Failed to fetch file: {path}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to fetch file: {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid resource path: {0}")]
    InvalidPath(String),
}

/// Source of test case text
#[async_trait]
pub trait ResourceFetcher: Send + Sync + std::fmt::Debug {
    /// Fetch the full text behind a resource reference
    async fn fetch_text(&self, path: &str) -> Result<String, FetchError>;
}

/// Fetches `http://`/`https://` references over HTTP and everything else from disk
#[derive(Debug, Clone)]
pub struct ResourceLoader {
    /// Directory relative references are resolved against
    root: Option<PathBuf>,

    client: reqwest::Client,
}

impl ResourceLoader {
    /// Create a loader resolving relative paths against `root`
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            client: reqwest::Client::new(),
        }
    }

    /// Use an existing HTTP client
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Get the host path for a resource reference
    ///
    /// A leading `/` is taken relative to the root, and path traversal is rejected.
    pub fn file_path(&self, path: &str) -> Result<PathBuf, FetchError> {
        if Path::new(path)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(FetchError::InvalidPath(format!(
                "path traversal not allowed: {path}"
            )));
        }
        Ok(match self.root {
            Some(ref root) => root.join(path.trim_start_matches('/')),
            None => PathBuf::from(path),
        })
    }

    async fn fetch_url(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                path: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                path: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| FetchError::Http {
            path: url.to_string(),
            source,
        })
    }

    async fn fetch_file(&self, path: &str) -> Result<String, FetchError> {
        let host_path = self.file_path(path)?;
        tokio::fs::read_to_string(&host_path)
            .await
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => FetchError::NotFound {
                    path: path.to_string(),
                },
                _ => FetchError::Io {
                    path: path.to_string(),
                    source,
                },
            })
    }
}

impl Default for ResourceLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl ResourceFetcher for ResourceLoader {
    #[instrument(skip(self))]
    async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
        let text = if is_url(path) {
            self.fetch_url(path).await?
        } else {
            self.fetch_file(path).await?
        };
        debug!(len = text.len(), "fetched resource");
        Ok(text)
    }
}

fn is_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// In-memory resources, for tests and callers that already hold the text
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    files: HashMap<String, String>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    /// Add or replace a resource
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

#[async_trait]
impl ResourceFetcher for MemoryFetcher {
    async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                path: path.to_string(),
            })
    }
}
