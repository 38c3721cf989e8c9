//! PNG codec and image decoding helpers using the `image` crate

use bridge_traits::{
    error::{BridgeError, Result},
    image::{DecodedImage, ImageCodec, TargetSize},
};
use bytes::Bytes;
use image::{imageops::FilterType, DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

/// Lossless codec storing cached images as PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngImageCodec;

impl PngImageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for PngImageCodec {
    fn encode(&self, image: &DecodedImage) -> Result<Bytes> {
        let buffer = RgbaImage::from_raw(image.width(), image.height(), image.pixels().to_vec())
            .ok_or_else(|| {
                BridgeError::OperationFailed(format!(
                    "Pixel buffer of {} bytes does not match {}x{}",
                    image.byte_size(),
                    image.width(),
                    image.height()
                ))
            })?;

        let mut out = Vec::new();
        DynamicImage::ImageRgba8(buffer)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .map_err(|e| BridgeError::OperationFailed(format!("PNG encode failed: {}", e)))?;

        Ok(Bytes::from(out))
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage> {
        decode_image(bytes, None)
    }
}

/// Decode any supported format into RGBA8, downscaling to fit `size`.
///
/// The image is only ever made smaller and keeps its aspect ratio. Sizes with
/// a non-positive dimension leave the image untouched.
pub fn decode_image(bytes: &[u8], size: Option<TargetSize>) -> Result<DecodedImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| BridgeError::Decode(format!("Unsupported or corrupt image: {}", e)))?;

    let image = match size {
        Some(target) if target.is_constrained() => fit_within(image, target),
        _ => image,
    };

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(DecodedImage::new(width, height, rgba.into_raw()))
}

fn fit_within(image: DynamicImage, target: TargetSize) -> DynamicImage {
    let max_width = target.width as u32;
    let max_height = target.height as u32;
    if image.width() <= max_width && image.height() <= max_height {
        return image;
    }
    image.resize(max_width, max_height, FilterType::Triangle)
}
