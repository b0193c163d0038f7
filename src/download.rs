use crate::config::{TITLE_BASICS_FILE, TITLE_EPISODE_FILE};
use crate::error::IngestError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub type ByteStream = BoxStream<'static, Result<Bytes, IngestError>>;

/// Fetches a remote file as a stream of chunks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Non-success statuses and broken transfers surface as
    /// [`IngestError::DownloadFailure`].
    async fn fetch(&self, url: &str) -> Result<ByteStream, IngestError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<ByteStream, IngestError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IngestError::download(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::download(url, format!("HTTP {status}")));
        }

        let url = url.to_string();
        Ok(response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| IngestError::download(&url, e)))
            .boxed())
    }
}

/// A published dataset: its cache file name and where to fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub file_name: String,
    pub url: String,
}

impl Dataset {
    pub fn new(base_url: &str, file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            url: format!("{}/{}", base_url.trim_end_matches('/'), file_name),
        }
    }

    pub fn title_basics(base_url: &str) -> Self {
        Self::new(base_url, TITLE_BASICS_FILE)
    }

    pub fn title_episode(base_url: &str) -> Self {
        Self::new(base_url, TITLE_EPISODE_FILE)
    }
}

/// Returns the local copy of `dataset`, downloading it on first use.
///
/// An existing file is trusted as-is and never re-fetched. Downloads land in a
/// `.part` file that is renamed on success and removed on failure, so the final
/// path never holds a partial file. No retries here.
pub async fn ensure_dataset<T>(
    transport: &T,
    dataset: &Dataset,
    cache_dir: &Path,
) -> Result<PathBuf, IngestError>
where
    T: Transport + ?Sized,
{
    let final_path = cache_dir.join(&dataset.file_name);
    if final_path.exists() {
        debug!(path = ?final_path, "Dataset already cached");
        return Ok(final_path);
    }

    tokio::fs::create_dir_all(cache_dir)
        .await
        .map_err(|e| IngestError::io(cache_dir, e))?;

    let tmp_path = cache_dir.join(format!("{}.part", dataset.file_name));
    info!(url = %dataset.url, "Downloading dataset");

    match download_to(transport, &dataset.url, &tmp_path).await {
        Ok(bytes) => {
            tokio::fs::rename(&tmp_path, &final_path)
                .await
                .map_err(|e| IngestError::io(&final_path, e))?;
            info!(path = ?final_path, bytes, "Dataset downloaded");
            Ok(final_path)
        }
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(&tmp_path).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = ?tmp_path, error = %rm, "Failed to remove partial download");
                }
            }
            Err(e)
        }
    }
}

async fn download_to<T>(transport: &T, url: &str, dest: &Path) -> Result<u64, IngestError>
where
    T: Transport + ?Sized,
{
    let mut stream = transport.fetch(url).await?;
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| IngestError::io(dest, e))?;

    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| IngestError::io(dest, e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| IngestError::io(dest, e))?;

    Ok(written)
}
