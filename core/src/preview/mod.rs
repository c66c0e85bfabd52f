//! Latent capture and decode.
//!
//! Reads the shared generation state each step, locates the current partial
//! latent, decodes it through the active model's first-stage decoder (with a
//! sampler-level fallback), and encodes the raster as a base64 PNG data URL.
//! Every failure in this pipeline is recoverable-silent: the step yields no
//! frame and the generation continues.

mod decode;
mod frame;
mod latent;

pub use decode::{capture_preview, DecodedTensor, LatentDecoder, ValueRange};
pub use frame::{encode_data_url, strip_data_url_prefix, PreviewFrame, DATA_URL_PREFIX};
pub use latent::{Device, Latent, SessionState};
