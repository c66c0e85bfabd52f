use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};

use crate::error::DecodeError;

/// Media-type prefix for frame payloads. The consumer side accepts payloads
/// both with and without it.
pub const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// One emitted preview unit: created per callback invocation, serialized
/// immediately, not retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFrame {
    pub step: usize,
    pub total: usize,
    pub data_url: String,
}

impl PreviewFrame {
    pub fn new(step: usize, total: usize, data_url: String) -> Self {
        Self {
            step,
            total,
            data_url,
        }
    }

    /// The bare base64 payload, prefix stripped.
    pub fn payload_base64(&self) -> &str {
        strip_data_url_prefix(&self.data_url)
    }
}

pub fn strip_data_url_prefix(payload: &str) -> &str {
    payload.strip_prefix(DATA_URL_PREFIX).unwrap_or(payload)
}

/// Serialize a raster as lossless PNG wrapped in a base64 data URL.
pub fn encode_data_url(image: &RgbImage) -> Result<String, DecodeError> {
    let mut png = Vec::new();
    PngEncoder::new(Cursor::new(&mut png)).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(format!("{DATA_URL_PREFIX}{}", STANDARD.encode(&png)))
}
