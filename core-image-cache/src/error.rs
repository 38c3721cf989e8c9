//! # Image Cache Error Types
//!
//! Only failures that leave the caller without an image are errors. Tier
//! misses, expired or corrupt records, and failed disk writes are absorbed
//! inside the cache and never surface here.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors delivered to callers of [`ImageCacheManager::load`](crate::ImageCacheManager::load).
///
/// The type is `Clone` because one failed fetch is delivered to every
/// coalesced waiter for the same key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageCacheError {
    /// The underlying fetch capability failed.
    #[error("Image fetch failed: {0}")]
    Fetch(String),

    /// The fetched or cached bytes could not be decoded.
    #[error("Image decode failed: {0}")]
    Decode(String),

    /// The fetched image could not be encoded for the disk tier.
    #[error("Image encode failed: {0}")]
    Encode(String),

    /// Internal error (worker task panicked or was aborted).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImageCacheError {
    /// Returns `true` if the error originated in the fetch capability.
    pub fn is_fetch_error(&self) -> bool {
        matches!(self, ImageCacheError::Fetch(_))
    }

    /// Returns `true` if the error came from the codec in either direction.
    pub fn is_codec_error(&self) -> bool {
        matches!(
            self,
            ImageCacheError::Decode(_) | ImageCacheError::Encode(_)
        )
    }
}

impl From<BridgeError> for ImageCacheError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Decode(message) => ImageCacheError::Decode(message),
            other => ImageCacheError::Fetch(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ImageCacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        ImageCacheError::Internal(format!("Worker task failed: {}", err))
    }
}

/// Result type for image cache operations.
pub type Result<T> = std::result::Result<T, ImageCacheError>;
