//! Image request descriptors
//!
//! An [`ImageModel`] describes what the caller wants to display. Only part of
//! it identifies the image for caching purposes (see [`crate::key`]); the rest,
//! such as request headers, is forwarded to the fetcher untouched.

use bridge_traits::image::{FetchRequest, ModelData, TargetSize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Payload with request headers and an optional caller-chosen key tag.
///
/// Two models with the same payload and tag share a cache entry even if their
/// headers differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheImageModel {
    pub data: ModelData,
    pub headers: BTreeMap<String, String>,
    pub key_tag: String,
}

impl CacheImageModel {
    pub fn new(data: impl Into<ModelData>) -> Self {
        Self {
            data: data.into(),
            headers: BTreeMap::new(),
            key_tag: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_key_tag(mut self, tag: impl Into<String>) -> Self {
        self.key_tag = tag.into();
        self
    }
}

/// Request descriptor accepted by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageModel {
    /// Bare payload
    Data(ModelData),
    /// Payload with headers and key tag
    Tagged(CacheImageModel),
    /// Payload carried by a higher-level request wrapper
    Request(ModelData),
}

impl ImageModel {
    /// The payload regardless of wrapping.
    pub fn data(&self) -> &ModelData {
        match self {
            ImageModel::Data(data) | ImageModel::Request(data) => data,
            ImageModel::Tagged(model) => &model.data,
        }
    }

    /// Build the request handed to the fetch capability.
    pub fn to_fetch_request(&self, size: Option<TargetSize>) -> FetchRequest {
        let request = FetchRequest::new(self.data().clone()).with_size(size);
        match self {
            ImageModel::Tagged(model) => request.with_headers(model.headers.clone()),
            _ => request,
        }
    }
}

impl fmt::Display for ImageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageModel::Data(data) => write!(f, "{}", data.normalized()),
            ImageModel::Tagged(model) => {
                write!(f, "{} [{}]", model.data.normalized(), model.key_tag)
            }
            ImageModel::Request(data) => write!(f, "request {}", data.normalized()),
        }
    }
}

impl From<ModelData> for ImageModel {
    fn from(data: ModelData) -> Self {
        ImageModel::Data(data)
    }
}

impl From<&str> for ImageModel {
    fn from(value: &str) -> Self {
        ImageModel::Data(ModelData::from(value))
    }
}

impl From<String> for ImageModel {
    fn from(value: String) -> Self {
        ImageModel::Data(ModelData::from(value))
    }
}

impl From<PathBuf> for ImageModel {
    fn from(value: PathBuf) -> Self {
        ImageModel::Data(ModelData::from(value))
    }
}

impl From<CacheImageModel> for ImageModel {
    fn from(model: CacheImageModel) -> Self {
        ImageModel::Tagged(model)
    }
}

/// Light/dark appearance the image is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ThemeVariant {
    #[default]
    Light,
    Dark,
}

impl ThemeVariant {
    pub fn is_dark(&self) -> bool {
        matches!(self, ThemeVariant::Dark)
    }

    pub fn from_dark(dark: bool) -> Self {
        if dark {
            ThemeVariant::Dark
        } else {
            ThemeVariant::Light
        }
    }
}
