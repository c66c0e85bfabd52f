//! Seam for the weights/LoRA download cache. The concrete cache (HTTP fetch,
//! filesystem layout, eviction) lives in the plugins crate.

use std::path::PathBuf;

use async_trait::async_trait;

#[async_trait]
pub trait WeightsProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Ensure the artifact behind `url` exists locally and return its path.
    async fn ensure(&self, url: &str) -> anyhow::Result<PathBuf>;

    /// Fetch `url` to an explicit destination outside the cache index, used
    /// for the base checkpoint. Skips the download when `dest` exists unless
    /// `force` is set.
    async fn fetch_to(&self, url: &str, dest: &std::path::Path, force: bool)
        -> anyhow::Result<()>;

    /// Files currently present in the cache, for logging and diagnostics.
    fn cached_files(&self) -> anyhow::Result<Vec<PathBuf>>;
}
