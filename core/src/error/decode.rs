use thiserror::Error;

/// Failure of the per-step latent decode pipeline.
///
/// Every variant is recoverable-silent from the generation's point of view:
/// the step yields no frame and the run continues.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("latent has invalid shape {shape:?}")]
    BadShape { shape: Vec<usize> },
    #[error("decoder failed: {0}")]
    Decoder(String),
    #[error("raster dimensions {width}x{height} do not match buffer of {len} bytes")]
    RasterMismatch {
        width: u32,
        height: u32,
        len: usize,
    },
    #[error("png encode failed: {0}")]
    Png(#[from] image::ImageError),
}
