//! Download of the model artifact into local storage

use futures::StreamExt;
use reqwest::Url;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::FetchConfig;
use crate::error::{HowlError, Result};

/// Download progress, reported once per received chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub bytes_done: u64,
    /// `None` when the server sent no Content-Length
    pub bytes_total: Option<u64>,
}

impl DownloadProgress {
    pub fn percent(&self) -> Option<f64> {
        match self.bytes_total {
            Some(total) if total > 0 => Some(self.bytes_done as f64 * 100.0 / total as f64),
            _ => None,
        }
    }
}

/// A finished download, handed straight to the loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub local_path: PathBuf,
    pub bytes: u64,
}

/// Fetches the configured artifact over HTTP(S).
///
/// No retry, checksum or timeout: a failed transfer is reported once and the
/// caller decides what to show.
#[derive(Debug, Clone)]
pub struct ModelFetcher {
    config: FetchConfig,
    client: reqwest::Client,
}

impl ModelFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| HowlError::Download(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Use a preconfigured client (proxy, TLS roots, user agent).
    pub fn with_client(config: FetchConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Download the artifact, replacing whatever is at the destination.
    ///
    /// The body is streamed to `<file>.part` and only moved over the
    /// destination once the transfer completed.
    pub async fn fetch<F>(&self, mut on_progress: F) -> Result<DownloadResult>
    where
        F: FnMut(DownloadProgress) + Send,
    {
        let url = Url::parse(&self.config.model_url)
            .map_err(|_| HowlError::InvalidUrl(self.config.model_url.clone()))?;

        fs::create_dir_all(&self.config.model_dir)
            .await
            .map_err(HowlError::MoveArtifact)?;

        let partial = self.config.partial_destination();
        let destination = self.config.destination();

        info!("Downloading model from {}", url);

        let bytes = match self.download_to(url, &partial, &mut on_progress).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Model download failed: {}", e);
                discard_partial(&partial).await;
                return Err(e);
            }
        };

        if let Err(e) = replace_artifact(&partial, &destination).await {
            warn!("Could not move model into place: {}", e);
            discard_partial(&partial).await;
            return Err(e);
        }

        info!(
            "Model saved to {} ({} bytes)",
            destination.display(),
            bytes
        );

        Ok(DownloadResult {
            local_path: destination,
            bytes,
        })
    }

    async fn download_to<F>(&self, url: Url, partial: &Path, on_progress: &mut F) -> Result<u64>
    where
        F: FnMut(DownloadProgress) + Send,
    {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HowlError::Download(format!("HTTP {}", status)));
        }

        let bytes_total = response.content_length();
        let mut file = fs::File::create(partial)
            .await
            .map_err(HowlError::MoveArtifact)?;
        let mut bytes_done: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(HowlError::MoveArtifact)?;
            bytes_done += chunk.len() as u64;

            let progress = DownloadProgress {
                bytes_done,
                bytes_total,
            };
            debug!("Downloaded {} / {:?} bytes", bytes_done, bytes_total);
            on_progress(progress);
        }

        file.flush().await.map_err(HowlError::MoveArtifact)?;
        Ok(bytes_done)
    }
}

async fn replace_artifact(partial: &Path, destination: &Path) -> Result<()> {
    if fs::try_exists(destination)
        .await
        .map_err(HowlError::MoveArtifact)?
    {
        fs::remove_file(destination)
            .await
            .map_err(HowlError::MoveArtifact)?;
    }
    fs::rename(partial, destination)
        .await
        .map_err(HowlError::MoveArtifact)
}

async fn discard_partial(partial: &Path) {
    if let Err(e) = fs::remove_file(partial).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!("Could not remove {}: {}", partial.display(), e);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_server::{refused_url, serve_once};
    use super::*;
    use tempfile::tempdir;

    fn fetcher_for(url: String, dir: &Path) -> ModelFetcher {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        ModelFetcher::with_client(
            FetchConfig::new(url, dir).with_model_file("model.gguf"),
            client,
        )
    }

    #[tokio::test]
    async fn test_fetch_writes_artifact() {
        let temp_dir = tempdir().unwrap();
        let url = serve_once("200 OK", b"GGUF fake weights").await;
        let fetcher = fetcher_for(url, temp_dir.path());

        let mut last = None;
        let result = fetcher.fetch(|p| last = Some(p)).await.unwrap();

        assert_eq!(result.local_path, temp_dir.path().join("model.gguf"));
        assert_eq!(result.bytes, 17);
        assert_eq!(
            std::fs::read(&result.local_path).unwrap(),
            b"GGUF fake weights"
        );
        let last = last.unwrap();
        assert_eq!(last.bytes_done, 17);
        assert_eq!(last.bytes_total, Some(17));
        assert_eq!(last.percent(), Some(100.0));
        assert!(!fetcher.config().partial_destination().exists());
    }

    #[tokio::test]
    async fn test_fetch_overwrites_previous_artifact() {
        let temp_dir = tempdir().unwrap();
        let stale = temp_dir.path().join("model.gguf");
        std::fs::write(&stale, b"old model from a previous run").unwrap();

        let url = serve_once("200 OK", b"new").await;
        let fetcher = fetcher_for(url, temp_dir.path());
        fetcher.fetch(|_| {}).await.unwrap();

        assert_eq!(std::fs::read(&stale).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_fetch_creates_missing_directory() {
        let temp_dir = tempdir().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let url = serve_once("200 OK", b"x").await;
        let fetcher = fetcher_for(url, &nested);

        let result = fetcher.fetch(|_| {}).await.unwrap();
        assert!(result.local_path.starts_with(&nested));
    }

    #[tokio::test]
    async fn test_fetch_http_error_status() {
        let temp_dir = tempdir().unwrap();
        let url = serve_once("404 Not Found", b"missing").await;
        let fetcher = fetcher_for(url, temp_dir.path());

        let err = fetcher.fetch(|_| {}).await.unwrap_err();
        assert!(matches!(err, HowlError::Download(_)));
        assert!(err.to_string().contains("404"));
        assert!(!temp_dir.path().join("model.gguf").exists());
        assert!(!fetcher.config().partial_destination().exists());
    }

    #[tokio::test]
    async fn test_fetch_network_error() {
        let temp_dir = tempdir().unwrap();
        let fetcher = fetcher_for(refused_url().await, temp_dir.path());

        let err = fetcher.fetch(|_| {}).await.unwrap_err();
        assert!(matches!(err, HowlError::Download(_)));
        assert!(err.to_string().starts_with("Download failed:"));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let temp_dir = tempdir().unwrap();
        let fetcher = fetcher_for("not a url".to_string(), temp_dir.path());

        let err = fetcher.fetch(|_| {}).await.unwrap_err();
        assert!(matches!(err, HowlError::InvalidUrl(_)));
        assert_eq!(err.to_string(), "Invalid model URL.");
    }

    #[tokio::test]
    async fn test_fetch_move_failure_keeps_directory() {
        let temp_dir = tempdir().unwrap();
        // A directory squatting on the destination cannot be replaced by a file.
        let blocker = temp_dir.path().join("model.gguf");
        std::fs::create_dir(&blocker).unwrap();

        let url = serve_once("200 OK", b"GGUF").await;
        let fetcher = fetcher_for(url, temp_dir.path());

        let err = fetcher.fetch(|_| {}).await.unwrap_err();
        assert!(matches!(err, HowlError::MoveArtifact(_)));
        assert!(err.to_string().starts_with("Error moving model file:"));
        assert!(blocker.is_dir());
        assert!(!fetcher.config().partial_destination().exists());
    }

    #[tokio::test]
    async fn test_fetch_unwritable_model_dir() {
        let temp_dir = tempdir().unwrap();
        let not_a_dir = temp_dir.path().join("occupied");
        std::fs::write(&not_a_dir, b"plain file").unwrap();

        let fetcher = fetcher_for(refused_url().await, &not_a_dir.join("models"));

        let err = fetcher.fetch(|_| {}).await.unwrap_err();
        assert!(matches!(err, HowlError::MoveArtifact(_)));
        assert!(err.to_string().starts_with("Error moving model file:"));
    }
}
