//! Cache key derivation
//!
//! A key identifies one rendered image: the cache format version, the theme
//! variant, the requested size and the normalized request payload. Anything
//! else on the request (headers, for instance) does not take part, so requests
//! that differ only there share an entry.

use crate::model::{ImageModel, ThemeVariant};
use bridge_traits::image::TargetSize;
use md5::{Digest, Md5};
use std::fmt;

/// Opaque, fixed-length cache key (32 lowercase hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the disk record for this key.
    pub fn file_name(&self) -> String {
        format!("{}.bin", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the cache key for a request.
///
/// Pure function of its inputs. The theme variant must be captured by the
/// caller; nothing is read from the environment here.
pub fn create_key(
    model: &ImageModel,
    size: Option<TargetSize>,
    theme: ThemeVariant,
    version: &str,
) -> CacheKey {
    let (width, height) = size.map_or((-1, -1), |s| (s.width, s.height));
    let input = format!(
        "{}|{}|{}|{}|{}",
        version,
        theme.is_dark(),
        width,
        height,
        normalize_model(model)
    );

    let digest = Md5::digest(input.as_bytes());
    CacheKey(hex::encode(digest))
}

fn normalize_model(model: &ImageModel) -> String {
    match model {
        ImageModel::Tagged(tagged) => {
            format!("model:{}|{}", tagged.key_tag, tagged.data.normalized())
        }
        ImageModel::Request(data) => format!("request:{}", data.normalized()),
        ImageModel::Data(data) => data.normalized(),
    }
}
