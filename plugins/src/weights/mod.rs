//! Weights and LoRA download cache.
//!
//! Filesystem cache keyed by URL, least-recently-used eviction under a byte
//! budget. URL classes mirror what the platform sends: Replicate delivery
//! tars (a known inner member is extracted), Civitai model downloads, and
//! plain `.safetensors` URLs.

mod cache;
mod fetch;

pub use cache::WeightsCache;
pub use fetch::download_file;
