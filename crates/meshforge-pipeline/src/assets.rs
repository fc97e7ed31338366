//! Viewer asset store.
//!
//! The embedded viewer widget needs a fixed set of JavaScript files served
//! from the cache. They are fetched once from the configured CDN and reused;
//! files already on disk are skipped.

use std::fs;
use std::path::PathBuf;

use meshforge_core::{PipelineConfig, StageError};
use thiserror::Error;

/// JavaScript files the embedded viewer widget needs.
pub const VIEWER_ASSET_FILES: [&str; 8] = [
    "stl_viewer.min.js",
    "three.min.js",
    "webgl_detector.js",
    "Projector.js",
    "CanvasRenderer.js",
    "OrbitControls.js",
    "load_stl.min.js",
    "parser.min.js",
];

/// Fetches and caches the viewer widget files.
#[derive(Debug, Clone)]
pub struct AssetStore {
    js_dir: PathBuf,
    cdn_base: String,
    http: reqwest::Client,
}

impl AssetStore {
    /// Creates a store from pipeline configuration.
    pub fn new(config: &PipelineConfig) -> Self {
        Self::with_cdn(config.js_dir(), config.viewer_cdn_url.clone())
    }

    /// Creates a store for an explicit asset directory and CDN base.
    pub fn with_cdn(js_dir: impl Into<PathBuf>, cdn_base: impl Into<String>) -> Self {
        let mut cdn_base = cdn_base.into();
        if !cdn_base.is_empty() && !cdn_base.ends_with('/') {
            cdn_base.push('/');
        }
        Self {
            js_dir: js_dir.into(),
            cdn_base,
            http: reqwest::Client::new(),
        }
    }

    /// Ensures every viewer file exists in the cache, downloading missing
    /// ones. Returns the number of files fetched.
    pub async fn ensure_viewer_assets(&self) -> Result<usize, AssetError> {
        fs::create_dir_all(&self.js_dir).map_err(|e| AssetError::CreateDir {
            path: self.js_dir.clone(),
            source: e,
        })?;

        let mut fetched = 0;
        for file in VIEWER_ASSET_FILES {
            let path = self.js_dir.join(file);
            if path.exists() {
                tracing::debug!(file, "viewer asset already cached");
                continue;
            }

            tracing::info!(file, "downloading viewer asset");
            let url = format!("{}{}", self.cdn_base, file);
            let response = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| AssetError::Download {
                    file,
                    source: e,
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(AssetError::Status {
                    file,
                    status: status.as_u16(),
                });
            }

            let bytes = response.bytes().await.map_err(|e| AssetError::Download {
                file,
                source: e,
            })?;
            fs::write(&path, &bytes).map_err(|e| AssetError::Write {
                path: path.clone(),
                source: e,
            })?;
            fetched += 1;
        }

        Ok(fetched)
    }
}

/// Errors raised while populating the viewer asset cache.
#[derive(Debug, Error)]
pub enum AssetError {
    /// The asset directory could not be created.
    #[error("failed to create asset directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A viewer file could not be downloaded.
    #[error("failed to download viewer asset {file}: {source}")]
    Download {
        file: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The CDN answered with a non-success status.
    #[error("viewer asset {file} fetch returned HTTP {status}")]
    Status { file: &'static str, status: u16 },

    /// A downloaded file could not be written.
    #[error("failed to write viewer asset {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StageError for AssetError {
    fn code(&self) -> &'static str {
        match self {
            AssetError::CreateDir { .. } => "ASSET_001",
            AssetError::Download { .. } => "ASSET_002",
            AssetError::Status { .. } => "ASSET_003",
            AssetError::Write { .. } => "ASSET_004",
        }
    }

    fn category(&self) -> &'static str {
        "assets"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshforge_core::PipelineConfig;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Spawns a stub CDN that answers every GET with the given status and
    /// body.
    async fn spawn_cdn(status: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = vec![0u8; 8192];
                let mut total = 0;
                loop {
                    let n = stream.read(&mut buf[total..]).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    total += n;
                    if buf[..total].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.write_all(body).await;
                let _ = stream.shutdown().await;
            }
        });
        format!("http://{}/", addr)
    }

    async fn store_for(tmp: &TempDir, cdn_base: &str) -> AssetStore {
        let config = PipelineConfig::new("http://render.local/")
            .unwrap()
            .viewer_cdn_url(cdn_base)
            .unwrap()
            .cache_root(tmp.path());
        AssetStore::new(&config)
    }

    #[tokio::test]
    async fn test_fetches_all_files_once() {
        let tmp = TempDir::new().unwrap();
        let cdn = spawn_cdn("200 OK", b"// js").await;
        let store = store_for(&tmp, &cdn).await;

        let fetched = store.ensure_viewer_assets().await.unwrap();
        assert_eq!(fetched, VIEWER_ASSET_FILES.len());
        for file in VIEWER_ASSET_FILES {
            assert!(tmp.path().join("js").join(file).exists());
        }

        // Second run finds everything cached.
        let fetched = store.ensure_viewer_assets().await.unwrap();
        assert_eq!(fetched, 0);
    }

    #[tokio::test]
    async fn test_existing_files_are_not_refetched() {
        let tmp = TempDir::new().unwrap();
        let cdn = spawn_cdn("200 OK", b"// fresh").await;
        let store = store_for(&tmp, &cdn).await;

        let js_dir = tmp.path().join("js");
        fs::create_dir_all(&js_dir).unwrap();
        fs::write(js_dir.join("three.min.js"), b"// pinned").unwrap();

        let fetched = store.ensure_viewer_assets().await.unwrap();
        assert_eq!(fetched, VIEWER_ASSET_FILES.len() - 1);
        assert_eq!(fs::read(js_dir.join("three.min.js")).unwrap(), b"// pinned");
    }

    #[tokio::test]
    async fn test_cdn_failure_status() {
        let tmp = TempDir::new().unwrap();
        let cdn = spawn_cdn("404 Not Found", b"").await;
        let store = store_for(&tmp, &cdn).await;

        let err = store.ensure_viewer_assets().await.unwrap_err();
        assert!(matches!(err, AssetError::Status { status: 404, .. }));
    }
}
