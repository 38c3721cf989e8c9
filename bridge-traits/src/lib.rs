//! # Host Bridge Traits
//!
//! Capability traits that the image cache requires from its host application.
//!
//! ## Overview
//!
//! This crate defines the contract between the cache core and platform-specific
//! implementations. Each trait represents a capability the core needs but that
//! is implemented differently per platform (desktop, Android, iOS).
//!
//! ## Traits
//!
//! ### Images
//! - [`ImageFetcher`](image::ImageFetcher) - Fetch and decode an image from its source
//! - [`ImageCodec`](image::ImageCodec) - Encode decoded pixels for disk and decode them back
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate |
//! |----------|---------------------|
//! | Desktop  | `bridge-desktop`    |
//! | Android / iOS | Host-provided adapters |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should convert platform-specific errors into it and keep
//! the message actionable (include the failing locator, status code, etc.).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single implementation can be
//! shared across the cache's async tasks and blocking decode workers.
//!
//! ## Examples
//!
//! ### Implementing ImageCodec
//!
//! ```ignore
//! use bridge_traits::error::Result;
//! use bridge_traits::image::{DecodedImage, ImageCodec};
//! use bytes::Bytes;
//!
//! pub struct RawCodec;
//!
//! impl ImageCodec for RawCodec {
//!     fn encode(&self, image: &DecodedImage) -> Result<Bytes> {
//!         Ok(image.pixels().clone())
//!     }
//!
//!     fn decode(&self, bytes: &[u8]) -> Result<DecodedImage> {
//!         // Implementation
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod image;
pub mod time;

pub use error::{BridgeError, Result};

// Re-export commonly used types
pub use image::{DecodedImage, FetchRequest, ImageCodec, ImageFetcher, ModelData, TargetSize};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
