//! Image Fetching and Codec Abstractions
//!
//! Host capabilities the image cache depends on but does not implement:
//! - [`ImageFetcher`] - Retrieve and decode an image from its source (network, file, bundled resource)
//! - [`ImageCodec`] - Encode a decoded image to bytes for persistence and decode it back
//!
//! Decoded images are represented by [`DecodedImage`], a framework-independent
//! RGBA8 pixel buffer. Hosts convert it to their native bitmap type at the edge.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::Result;

/// Bytes per pixel of a [`DecodedImage`] buffer (RGBA8).
pub const BYTES_PER_PIXEL: usize = 4;

/// A decoded image held as a tightly packed RGBA8 pixel buffer.
///
/// Cloning is cheap: the pixel buffer is reference counted.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    pixels: Bytes,
}

impl DecodedImage {
    /// Wrap an RGBA8 pixel buffer.
    ///
    /// The buffer length is not validated against the dimensions; codecs are
    /// expected to produce consistent buffers.
    pub fn new(width: u32, height: u32, pixels: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    /// Create an image filled with a single RGBA color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * BYTES_PER_PIXEL);
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 pixel data.
    pub fn pixels(&self) -> &Bytes {
        &self.pixels
    }

    /// Size of the decoded pixel buffer in bytes.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("byte_size", &self.pixels.len())
            .finish()
    }
}

/// Requested output dimensions for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetSize {
    pub width: i32,
    pub height: i32,
}

impl TargetSize {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Returns true if both dimensions are positive and can be used for resizing.
    pub fn is_constrained(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Payload of an image request: where the image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelData {
    /// No payload
    None,
    /// URL or any other string locator
    Text(String),
    /// Local file
    Path(PathBuf),
    /// Host-bundled resource identifier
    ResourceId(i64),
}

impl ModelData {
    /// Stable string form used for cache keys.
    ///
    /// `None` becomes `"null"`, text is trimmed, everything else uses its
    /// display form.
    pub fn normalized(&self) -> String {
        match self {
            ModelData::None => "null".to_string(),
            ModelData::Text(text) => text.trim().to_string(),
            ModelData::Path(path) => path.display().to_string(),
            ModelData::ResourceId(id) => id.to_string(),
        }
    }
}

impl From<&str> for ModelData {
    fn from(value: &str) -> Self {
        ModelData::Text(value.to_string())
    }
}

impl From<String> for ModelData {
    fn from(value: String) -> Self {
        ModelData::Text(value)
    }
}

impl From<PathBuf> for ModelData {
    fn from(value: PathBuf) -> Self {
        ModelData::Path(value)
    }
}

/// Everything an [`ImageFetcher`] needs to produce an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub data: ModelData,
    /// Extra request headers (e.g. `Referer`, `Authorization`)
    pub headers: BTreeMap<String, String>,
    pub size: Option<TargetSize>,
}

impl FetchRequest {
    pub fn new(data: ModelData) -> Self {
        Self {
            data,
            headers: BTreeMap::new(),
            size: None,
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_size(mut self, size: Option<TargetSize>) -> Self {
        self.size = size;
        self
    }
}

/// Image fetch capability
///
/// Retrieves an image from its source and decodes it. Implementations own
/// their timeout and retry policy; the cache treats every call as a possibly
/// slow, possibly failing operation.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::image::{FetchRequest, ImageFetcher, ModelData};
///
/// async fn cover(fetcher: &dyn ImageFetcher) -> Result<()> {
///     let request = FetchRequest::new(ModelData::from("https://example.com/cover.jpg"));
///     let image = fetcher.fetch(&request).await?;
///     println!("{}x{}", image.width(), image.height());
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch and decode the image described by `request`.
    async fn fetch(&self, request: &FetchRequest) -> Result<DecodedImage>;
}

/// Image codec capability
///
/// Pure transformations between decoded pixels and an encoded blob (e.g. PNG).
/// Both directions are CPU bound and are invoked from blocking worker threads.
pub trait ImageCodec: Send + Sync {
    /// Encode an image for persistence.
    fn encode(&self, image: &DecodedImage) -> Result<Bytes>;

    /// Decode a previously encoded blob.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage>;
}
