//! Image fetcher for remote URLs and local files

use crate::codec::decode_image;
use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    image::{DecodedImage, FetchRequest, ImageFetcher, ModelData, TargetSize},
};
use bytes::Bytes;
use core_runtime::logging::{redact_if_sensitive, strip_path};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Where the bytes of a request come from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Http(String),
    File(PathBuf),
}

/// Reqwest-based image fetcher
///
/// Supports:
/// - `http://` and `https://` URLs, with the request's headers
/// - `file://` URLs and plain filesystem paths, read via `tokio::fs`
///
/// Decoding and downscaling run on the blocking pool.
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    /// Create a fetcher with a 30 second request timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a fetcher with a custom request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("image-cache/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Create a fetcher around an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn resolve_source(data: &ModelData) -> Result<Source> {
        match data {
            ModelData::None => Err(BridgeError::OperationFailed(
                "Image request has no source".to_string(),
            )),
            ModelData::ResourceId(id) => Err(BridgeError::NotAvailable(format!(
                "Bundled resource {} is not available on desktop",
                id
            ))),
            ModelData::Path(path) => Ok(Source::File(path.clone())),
            ModelData::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(BridgeError::OperationFailed(
                        "Image request has an empty locator".to_string(),
                    ));
                }
                if text.starts_with("http://") || text.starts_with("https://") {
                    Ok(Source::Http(text.to_string()))
                } else if let Some(path) = text.strip_prefix("file://") {
                    Ok(Source::File(PathBuf::from(path)))
                } else {
                    Ok(Source::File(PathBuf::from(text)))
                }
            }
        }
    }

    async fn download(&self, url: &str, request: &FetchRequest) -> Result<Bytes> {
        let mut builder = self.client.get(url);
        for (name, value) in &request.headers {
            debug!(header = %name, value = %redact_if_sensitive(name, value), "Adding request header");
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Image download failed");
            if e.is_timeout() {
                BridgeError::OperationFailed(format!("Request timed out: {}", url))
            } else if e.is_connect() {
                BridgeError::OperationFailed(format!("Connection failed: {}", e))
            } else {
                BridgeError::OperationFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::OperationFailed(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))
    }

    async fn read_file(path: &Path) -> Result<Bytes> {
        let display_path = path.to_string_lossy();
        debug!(file = %strip_path(&display_path), "Reading local image");
        let data = tokio::fs::read(path).await?;
        Ok(Bytes::from(data))
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<DecodedImage> {
        let bytes = match Self::resolve_source(&request.data)? {
            Source::Http(url) => self.download(&url, request).await?,
            Source::File(path) => Self::read_file(&path).await?,
        };

        let size: Option<TargetSize> = request.size;
        let image = tokio::task::spawn_blocking(move || decode_image(&bytes, size))
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Decode task failed: {}", e)))??;

        debug!(
            width = image.width(),
            height = image.height(),
            "Fetched and decoded image"
        );
        Ok(image)
    }
}
