use std::path::Path;
use std::time::Instant;

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;

use fluxbridge_core::api::WeightsError;

/// Stream `url` to `dest` via a `.part` temp file and an atomic rename.
/// Shows a progress bar on stderr when the server announces a length.
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<(), WeightsError> {
    let started = Instant::now();
    tracing::info!(url = %url, dest = %dest.display(), "downloading weights");

    let resp = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| WeightsError::Download(e.to_string()))?;

    let bar = match resp.content_length() {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::with_template(
                    "{msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_message(
                dest.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );
            Some(bar)
        }
        None => None,
    };

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let part = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&part).await?;

    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| WeightsError::Download(e.to_string()))?;
        file.write_all(&chunk).await?;
        if let Some(bar) = bar.as_ref() {
            bar.inc(chunk.len() as u64);
        }
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&part, dest).await?;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    tracing::info!(
        dest = %dest.display(),
        duration_ms = started.elapsed().as_millis() as u64,
        "download finished"
    );
    Ok(())
}
