//! Storage for uploaded contract evidence.
//!
//! Development keeps files on local disk and hands back `/uploads/bonds/<file>`;
//! production uploads them to HTTP object storage and hands back the public URL.

use crate::config::settings::StorageSettings;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// File received from a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Name supplied by the client
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Extension of the client file name, if it has one.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && ext.chars().all(char::is_alphanumeric))
    }
}

/// Persists uploaded files and returns a reference to them.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stores the file. The returned string is what gets persisted on the contract.
    async fn store(&self, file: UploadedFile) -> Result<String>;
}

/// Writes files under a local directory with random names.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    upload_dir: PathBuf,
    public_prefix: String,
}

impl LocalFileStore {
    /// Creates a store writing into `upload_dir`.
    pub fn new(upload_dir: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            public_prefix: public_prefix.into(),
        }
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.bytes.len()))]
    async fn store(&self, file: UploadedFile) -> Result<String> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let name = match file.extension() {
            Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };
        tokio::fs::write(self.upload_dir.join(&name), &file.bytes).await?;
        debug!(%name, "Stored upload locally");
        Ok(format!("{}/{name}", self.public_prefix.trim_end_matches('/')))
    }
}

/// Uploads files with authenticated `PUT` requests.
#[derive(Debug, Clone)]
pub struct ObjectFileStore {
    client: reqwest::Client,
    endpoint: String,
    public_base_url: String,
    token: String,
}

impl ObjectFileStore {
    /// Creates a store for the given bucket endpoint.
    #[must_use]
    pub fn new(endpoint: String, public_base_url: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            public_base_url,
            token,
        }
    }

    fn object_key(file: &UploadedFile) -> String {
        let safe_name: String = file
            .file_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        format!("bonds/{}-{safe_name}", Uuid::new_v4())
    }
}

#[async_trait]
impl FileStore for ObjectFileStore {
    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.bytes.len()))]
    async fn store(&self, file: UploadedFile) -> Result<String> {
        let key = Self::object_key(&file);
        let content_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let response = self
            .client
            .put(format!("{}/{key}", self.endpoint.trim_end_matches('/')))
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, content_type)
            .body(file.bytes)
            .send()
            .await
            .map_err(|e| Error::external("storage", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::external(
                "storage",
                format!("Upload rejected with {status}: {detail}"),
            ));
        }

        debug!(%key, "Uploaded to object storage");
        Ok(format!("{}/{key}", self.public_base_url.trim_end_matches('/')))
    }
}

/// Picks the file store for the configured environment.
#[must_use]
pub fn file_store_from_settings(settings: &StorageSettings) -> Arc<dyn FileStore> {
    match settings {
        StorageSettings::Local {
            upload_dir,
            public_prefix,
        } => Arc::new(LocalFileStore::new(upload_dir, public_prefix.clone())),
        StorageSettings::Object {
            endpoint,
            public_base_url,
            token,
        } => Arc::new(ObjectFileStore::new(
            endpoint.clone(),
            public_base_url.clone(),
            token.clone(),
        )),
    }
}
