use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use lazy_static::lazy_static;
use lru::LruCache;
use regex::Regex;

use fluxbridge_core::api::{WeightsConfig, WeightsError, WeightsProvider};

use super::fetch::download_file;

lazy_static! {
    static ref REPLICATE_TAR_RE: Regex = Regex::new(
        r"^https?://replicate\.delivery/[a-zA-Z0-9_-]+/[a-zA-Z0-9_-]+/trained_model\.tar$"
    )
    .expect("replicate tar regex");
    static ref CIVITAI_RE: Regex = Regex::new(
        r"^https?://civitai\.com/api/download/models/[0-9]+\?type=Model&format=SafeTensor"
    )
    .expect("civitai regex");
}

/// Path of the LoRA inside a Replicate training-output tar.
const REPLICATE_TAR_MEMBER: &str = "output/flux_train_replicate/lora.safetensors";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlClass {
    ReplicateTar,
    Civitai,
    SafetensorsFile,
}

fn classify(url: &str) -> Result<UrlClass, WeightsError> {
    if REPLICATE_TAR_RE.is_match(url) {
        Ok(UrlClass::ReplicateTar)
    } else if CIVITAI_RE.is_match(url) {
        Ok(UrlClass::Civitai)
    } else if url.ends_with(".safetensors") {
        Ok(UrlClass::SafetensorsFile)
    } else {
        Err(WeightsError::UnsupportedUrl(url.to_string()))
    }
}

/// URL-keyed filesystem cache with least-recently-used eviction under a
/// byte budget.
pub struct WeightsCache {
    dir: PathBuf,
    max_bytes: u64,
    client: reqwest::Client,
    // file name → size on disk; LRU order doubles as the eviction order.
    index: Mutex<LruCache<String, u64>>,
}

impl WeightsCache {
    pub fn new(cfg: &WeightsConfig) -> Result<Self, WeightsError> {
        let dir = PathBuf::from(&cfg.dir);
        std::fs::create_dir_all(&dir)?;

        // Rebuild the index from disk, oldest modification first so they
        // evict first.
        let mut existing: Vec<(String, u64, std::time::SystemTime)> = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".part") || name.ends_with(".tar") {
                // Leftovers from an interrupted download.
                std::fs::remove_file(entry.path()).ok();
                continue;
            }
            let mtime = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            existing.push((name, meta.len(), mtime));
        }
        existing.sort_by_key(|(_, _, mtime)| *mtime);

        let mut index = LruCache::unbounded();
        for (name, size, _) in existing {
            index.put(name, size);
        }

        Ok(Self {
            dir,
            max_bytes: cfg.max_bytes,
            client: reqwest::Client::new(),
            index: Mutex::new(index),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.dir
    }

    fn file_name_for(url: &str) -> String {
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        format!("{:016x}.safetensors", hasher.finish())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, u64>> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn ensure_inner(&self, url: &str) -> Result<PathBuf, WeightsError> {
        let class = classify(url)?;
        let file_name = Self::file_name_for(url);
        let dest = self.dir.join(&file_name);

        if dest.exists() {
            // Promote in the LRU order.
            self.lock().get(&file_name);
            tracing::debug!(url = %url, path = %dest.display(), "weights cache hit");
            return Ok(dest);
        }

        match class {
            UrlClass::ReplicateTar => {
                tracing::info!(url = %url, "downloading lora from replicate delivery tar");
                let tar_path = dest.with_extension("tar");
                download_file(&self.client, url, &tar_path).await?;
                extract_tar_member(&tar_path, REPLICATE_TAR_MEMBER, &dest).await?;
                tokio::fs::remove_file(&tar_path).await.ok();
            }
            UrlClass::Civitai => {
                let slug = url.split("?type").next().unwrap_or(url);
                tracing::info!(url = %slug, "downloading lora from civitai");
                download_file(&self.client, url, &dest).await?;
            }
            UrlClass::SafetensorsFile => {
                tracing::info!(url = %url, "downloading lora from safetensors url");
                download_file(&self.client, url, &dest).await?;
            }
        }

        let size = tokio::fs::metadata(&dest).await?.len();
        self.lock().put(file_name, size);
        self.evict_to_budget().await;

        Ok(dest)
    }

    /// Drop least-recently-used entries until the cache fits the budget.
    /// The most recent entry always survives, even when it alone exceeds
    /// the budget.
    async fn evict_to_budget(&self) {
        loop {
            let victim = {
                let mut index = self.lock();
                let total: u64 = index.iter().map(|(_, size)| *size).sum();
                if total <= self.max_bytes || index.len() <= 1 {
                    break;
                }
                index.pop_lru()
            };
            let Some((name, size)) = victim else {
                break;
            };
            let path = self.dir.join(&name);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::info!(
                        path = %path.display(),
                        freed_bytes = size,
                        "evicted weights cache entry"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        error.kind = "weights.evict_failed",
                        path = %path.display(),
                        error = %e,
                        "failed to remove evicted cache entry"
                    );
                }
            }
        }
    }
}

/// Pull one member out of an uncompressed tar using the system `tar` binary,
/// then move it to `dest`.
async fn extract_tar_member(
    tar_path: &Path,
    member: &str,
    dest: &Path,
) -> Result<(), WeightsError> {
    let scratch = tar_path.with_extension("extract");
    tokio::fs::create_dir_all(&scratch).await?;

    let status = tokio::process::Command::new("tar")
        .arg("-xf")
        .arg(tar_path)
        .arg("-C")
        .arg(&scratch)
        .arg(member)
        .status()
        .await
        .map_err(|e| WeightsError::Download(format!("tar spawn failed: {e}")))?;

    if !status.success() {
        tokio::fs::remove_dir_all(&scratch).await.ok();
        return Err(WeightsError::MissingMember(format!(
            "{member} (tar exited with {status})"
        )));
    }

    let extracted = scratch.join(member);
    if !extracted.exists() {
        tokio::fs::remove_dir_all(&scratch).await.ok();
        return Err(WeightsError::MissingMember(member.to_string()));
    }

    tokio::fs::rename(&extracted, dest).await?;
    tokio::fs::remove_dir_all(&scratch).await.ok();
    Ok(())
}

#[async_trait]
impl WeightsProvider for WeightsCache {
    fn name(&self) -> &str {
        "weights-cache"
    }

    async fn ensure(&self, url: &str) -> anyhow::Result<PathBuf> {
        Ok(self.ensure_inner(url).await?)
    }

    async fn fetch_to(&self, url: &str, dest: &Path, force: bool) -> anyhow::Result<()> {
        if dest.exists() && !force {
            tracing::info!(dest = %dest.display(), "checkpoint already present");
            return Ok(());
        }
        download_file(&self.client, url, dest).await?;
        Ok(())
    }

    fn cached_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.metadata()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(dir: &Path, max_bytes: u64) -> WeightsConfig {
        WeightsConfig {
            dir: dir.to_string_lossy().to_string(),
            max_bytes,
            checkpoint_file: "flux_checkpoint.safetensors".into(),
            checkpoint_url: None,
        }
    }

    #[test]
    fn classifies_the_three_url_families() {
        assert_eq!(
            classify("https://replicate.delivery/abc123/def-456/trained_model.tar").unwrap(),
            UrlClass::ReplicateTar
        );
        assert_eq!(
            classify("https://civitai.com/api/download/models/12345?type=Model&format=SafeTensor")
                .unwrap(),
            UrlClass::Civitai
        );
        assert_eq!(
            classify("https://example.com/loras/style.safetensors").unwrap(),
            UrlClass::SafetensorsFile
        );
        assert!(matches!(
            classify("https://example.com/readme.txt"),
            Err(WeightsError::UnsupportedUrl(_))
        ));
    }

    #[test]
    fn replicate_tar_regex_is_anchored() {
        assert!(classify("https://replicate.delivery/a/b/trained_model.tar.gz").is_err());
        assert!(classify("https://evil.example/replicate.delivery/a/b/trained_model.tar").is_err());
    }

    #[tokio::test]
    async fn ensure_downloads_once_then_hits_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/style.safetensors")
            .with_status(200)
            .with_body(b"lora-bytes")
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = WeightsCache::new(&cfg(dir.path(), u64::MAX)).unwrap();
        let url = format!("{}/style.safetensors", server.url());

        let first = cache.ensure(&url).await.unwrap();
        let second = cache.ensure(&url).await.unwrap();
        mock.assert_async().await;

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"lora-bytes");
    }

    #[tokio::test]
    async fn eviction_drops_least_recently_used_entry() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/a.safetensors")
            .with_status(200)
            .with_body(vec![1u8; 64])
            .create_async()
            .await;
        server
            .mock("GET", "/b.safetensors")
            .with_status(200)
            .with_body(vec![2u8; 64])
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        // Budget holds one 64-byte file, not two.
        let cache = WeightsCache::new(&cfg(dir.path(), 100)).unwrap();

        let a = cache
            .ensure(&format!("{}/a.safetensors", server.url()))
            .await
            .unwrap();
        let b = cache
            .ensure(&format!("{}/b.safetensors", server.url()))
            .await
            .unwrap();

        assert!(!a.exists(), "oldest entry should have been evicted");
        assert!(b.exists());
        assert_eq!(cache.cached_files().unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn unsupported_url_is_rejected_without_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = WeightsCache::new(&cfg(dir.path(), u64::MAX)).unwrap();
        assert!(cache.ensure("https://example.com/model.ckpt").await.is_err());
        assert!(cache.cached_files().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_to_skips_existing_unless_forced() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ckpt.safetensors")
            .with_status(200)
            .with_body(b"fresh")
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = WeightsCache::new(&cfg(dir.path(), u64::MAX)).unwrap();
        let dest = dir.path().join("checkpoint.safetensors");
        std::fs::write(&dest, b"stale").unwrap();

        let url = format!("{}/ckpt.safetensors", server.url());
        cache.fetch_to(&url, &dest, false).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"stale");

        cache.fetch_to(&url, &dest, true).await.unwrap();
        mock.assert_async().await;
        assert_eq!(std::fs::read(&dest).unwrap(), b"fresh");
    }
}
