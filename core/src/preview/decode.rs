use std::sync::Arc;

use image::RgbImage;

use crate::error::DecodeError;

use super::frame;
use super::latent::{Device, Latent, SessionState};

/// First-stage decoder capability exposed by whichever model/session type is
/// active. Primary decode returns pixels in the model's native signed range;
/// the sampler-level approximation returns unit-range pixels directly.
pub trait LatentDecoder: Send + Sync {
    fn name(&self) -> &str;

    /// Device the decoder expects its input on.
    fn device(&self) -> Device;

    /// Full first-stage (VAE) decode. Output values in [-1, 1].
    fn decode_first_stage(&self, latent: &Latent) -> Result<DecodedTensor, DecodeError>;

    /// Cheap sampler-level approximation, used when the primary path fails.
    /// Output values in [0, 1].
    fn decode_approx(&self, latent: &Latent) -> Result<DecodedTensor, DecodeError>;
}

/// Raw decoder output. Layout may be NCHW, NHWC, CHW or HWC; the pipeline
/// below normalizes all of them.
#[derive(Debug, Clone)]
pub struct DecodedTensor {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

/// Value range of a decoded tensor, used to normalize into [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRange {
    /// Native first-stage output, [-1, 1].
    Signed,
    /// Approximate decode output, [0, 1].
    Unit,
}

/// One step of the capture pipeline: shared state → latent → decoder →
/// raster → data URL.
///
/// Returns `Ok(None)` when there is nothing to show yet (no latent, no
/// decoder) — early steps routinely hit this. Returns `Err` only when an
/// actual decode was attempted and failed; the caller logs it and treats the
/// step as frame-less. The decoder is resolved from the request's typed slot
/// first, then from the shared state.
pub fn capture_preview(
    request_decoder: Option<&Arc<dyn LatentDecoder>>,
    state: &SessionState,
) -> Result<Option<String>, DecodeError> {
    let Some(latent) = state.latent() else {
        return Ok(None);
    };

    let Some(decoder) = request_decoder.cloned().or_else(|| state.decoder()) else {
        tracing::debug!(error.kind = "preview.no_decoder", "no active decoder, skipping frame");
        return Ok(None);
    };

    let latent = if latent.device() != decoder.device() {
        latent.to_device(decoder.device())
    } else {
        latent
    };

    let (tensor, range) = match decoder.decode_first_stage(&latent) {
        Ok(t) => (t, ValueRange::Signed),
        Err(primary) => {
            tracing::debug!(
                error.kind = "preview.primary_decode_failed",
                decoder = decoder.name(),
                error = %primary,
                "falling back to sampler-level decode"
            );
            // Exactly one fallback attempt; its failure fails the step.
            (decoder.decode_approx(&latent)?, ValueRange::Unit)
        }
    };

    let raster = to_rgb_image(&tensor, range)?;
    let data_url = frame::encode_data_url(&raster)?;
    Ok(Some(data_url))
}

/// Normalize a decoded tensor into an 8-bit HWC raster: select the first
/// sample of a batch, reorder channel-first layouts, map the native range
/// into [0, 1] and quantize.
pub(crate) fn to_rgb_image(
    tensor: &DecodedTensor,
    range: ValueRange,
) -> Result<RgbImage, DecodeError> {
    let expected: usize = tensor.shape.iter().product();
    if expected == 0 || tensor.data.len() != expected {
        return Err(DecodeError::BadShape {
            shape: tensor.shape.clone(),
        });
    }

    let (sample_shape, sample) = first_sample(tensor)?;
    let (height, width, hwc) = to_hwc(&sample_shape, sample)?;

    let mut buf = Vec::with_capacity(hwc.len());
    for v in hwc {
        let unit = match range {
            ValueRange::Signed => (v + 1.0) / 2.0,
            ValueRange::Unit => v,
        };
        buf.push((unit.clamp(0.0, 1.0) * 255.0).round() as u8);
    }

    let len = buf.len();
    RgbImage::from_raw(width as u32, height as u32, buf).ok_or(DecodeError::RasterMismatch {
        width: width as u32,
        height: height as u32,
        len,
    })
}

/// Drop the batch axis if present, keeping the first sample.
fn first_sample(tensor: &DecodedTensor) -> Result<(Vec<usize>, &[f32]), DecodeError> {
    match tensor.shape.len() {
        4 => {
            let per_sample: usize = tensor.shape[1..].iter().product();
            Ok((tensor.shape[1..].to_vec(), &tensor.data[..per_sample]))
        }
        3 => Ok((tensor.shape.clone(), &tensor.data[..])),
        _ => Err(DecodeError::BadShape {
            shape: tensor.shape.clone(),
        }),
    }
}

/// Reorder a rank-3 sample into (H, W, C). Channel-first input is detected by
/// a leading axis of 3, matching the engine's RGB decode output.
fn to_hwc(shape: &[usize], data: &[f32]) -> Result<(usize, usize, Vec<f32>), DecodeError> {
    match shape {
        [3, h, w] => {
            let (h, w) = (*h, *w);
            let plane = h * w;
            let mut out = vec![0.0f32; data.len()];
            for y in 0..h {
                for x in 0..w {
                    for c in 0..3 {
                        out[(y * w + x) * 3 + c] = data[c * plane + y * w + x];
                    }
                }
            }
            Ok((h, w, out))
        }
        [h, w, 3] => Ok((*h, *w, data.to_vec())),
        _ => Err(DecodeError::BadShape {
            shape: shape.to_vec(),
        }),
    }
}
