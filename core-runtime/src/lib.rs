//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the image cache core:
//! - Logging and tracing infrastructure
//! - Log redaction helpers
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions used throughout the workspace and
//! the bridge between `tracing` and a host-provided `LoggerSink`.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
