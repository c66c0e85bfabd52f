use std::path::PathBuf;

use sysinfo::System;

use crate::config::AppConfig;
use crate::error::PredictError;
use crate::hook::{EngineOptions, GenerationBackend, LivePreviewOptions, MemorySplit};
use crate::weights::WeightsProvider;

/// Divide device memory between resident weights and inference workspace.
/// The inference share defaults to 10%, which keeps the large Flux weight
/// set resident while leaving headroom for activations.
pub fn plan_memory_split(
    total_bytes: u64,
    inference_fraction: f64,
    pin_shared_memory: bool,
    async_swap: bool,
) -> MemorySplit {
    let fraction = inference_fraction.clamp(0.0, 1.0);
    let inference_bytes = (total_bytes as f64 * fraction) as u64;
    let weights_bytes = total_bytes.saturating_sub(inference_bytes);

    tracing::info!(
        weights_mb = weights_bytes / (1024 * 1024),
        inference_mb = inference_bytes / (1024 * 1024),
        pin_shared_memory,
        async_swap,
        "planned memory split"
    );

    MemorySplit {
        weights_bytes,
        inference_bytes,
        pin_shared_memory,
        async_swap,
    }
}

fn total_memory_bytes() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory()
}

pub fn build_engine_options(cfg: &AppConfig) -> EngineOptions {
    EngineOptions {
        preset: cfg.engine.preset.clone(),
        checkpoint: cfg.weights.checkpoint_file.clone(),
        unet_storage_dtype: cfg.engine.unet_storage_dtype.clone(),
        live_preview: LivePreviewOptions {
            enabled: cfg.preview.enabled,
            every_n_steps: cfg.preview.every_n_steps,
            refresh_period_ms: cfg.preview.refresh_period_ms,
            fast_interrupt: cfg.preview.fast_interrupt,
            show_progress_grid: false,
        },
        memory: plan_memory_split(
            total_memory_bytes(),
            cfg.engine.inference_memory_fraction,
            cfg.engine.pin_shared_memory,
            cfg.engine.async_swap,
        ),
    }
}

/// One-time engine initialization: make sure the base checkpoint exists
/// (downloading it when missing or when a forced URL is given) and push the
/// option block to the engine. Safe to call before every prediction.
pub async fn ensure_setup(
    backend: &dyn GenerationBackend,
    cfg: &AppConfig,
    weights: Option<&dyn WeightsProvider>,
    force_checkpoint_url: Option<&str>,
) -> Result<(), PredictError> {
    let checkpoint_path = checkpoint_path(cfg);

    let wanted_url = force_checkpoint_url
        .map(str::to_string)
        .or_else(|| cfg.weights.checkpoint_url.clone());

    match (wanted_url, weights) {
        (Some(url), Some(weights)) => {
            let force = force_checkpoint_url.is_some();
            weights
                .fetch_to(&url, &checkpoint_path, force)
                .await
                .map_err(|e| PredictError::Setup(format!("checkpoint download failed: {e}")))?;
        }
        (Some(_), None) => {
            return Err(PredictError::Setup(
                "checkpoint url configured but no weights provider available".into(),
            ));
        }
        (None, _) => {
            if !checkpoint_path.exists() {
                tracing::warn!(
                    checkpoint = %checkpoint_path.display(),
                    "base checkpoint missing and no download url configured"
                );
            }
        }
    }

    let options = build_engine_options(cfg);
    backend
        .apply_options(&options)
        .await
        .map_err(|e| PredictError::Setup(e.to_string()))?;

    tracing::info!(
        preset = %options.preset,
        checkpoint = %options.checkpoint,
        live_preview = options.live_preview.enabled,
        "engine setup applied"
    );
    Ok(())
}

fn checkpoint_path(cfg: &AppConfig) -> PathBuf {
    let file = PathBuf::from(&cfg.weights.checkpoint_file);
    if file.is_absolute() {
        file
    } else {
        PathBuf::from(&cfg.weights.dir).join(file)
    }
}
