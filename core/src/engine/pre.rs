use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::{AppConfig, PreviewConfig};
use crate::error::PredictError;
use crate::hook::{GenerationRequest, LoraRef, Txt2ImgPayload};
use crate::weights::WeightsProvider;

use super::types::PredictRequest;

pub struct EngineContext<'a> {
    pub cfg: &'a AppConfig,
    pub weights: Option<&'a dyn WeightsProvider>,
}

pub struct PreparedRequest {
    pub request: GenerationRequest,
    pub lora_paths: Vec<PathBuf>,
}

/// Pre-run: validate, stage LoRA weights through the cache, marshal the
/// platform request into the engine's processing request.
pub async fn pre_run(
    ctx: &EngineContext<'_>,
    req: &PredictRequest,
) -> Result<PreparedRequest, PredictError> {
    req.validate()?;

    let lora_paths = if req.lora_urls.is_empty() {
        Vec::new()
    } else {
        let Some(weights) = ctx.weights else {
            return Err(PredictError::Config(
                "lora urls given but no weights provider available".into(),
            ));
        };
        stage_loras(weights, &req.lora_urls).await
    };

    if let Some(weights) = ctx.weights {
        if let Ok(files) = weights.cached_files() {
            tracing::debug!(available = files.len(), "weights cache inventory");
        }
    }

    let request = marshal_request(req, &lora_paths, &ctx.cfg.preview);
    tracing::debug!(request = ?request, "marshaled processing request");

    Ok(PreparedRequest {
        request,
        lora_paths,
    })
}

/// Download each LoRA through the cache. A failing URL skips that LoRA and
/// never fails the prediction.
async fn stage_loras(weights: &dyn WeightsProvider, urls: &[String]) -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(urls.len());
    for url in urls {
        match weights.ensure(url).await {
            Ok(path) => {
                tracing::info!(url = %url, path = %path.display(), "lora staged");
                paths.push(path);
            }
            Err(e) => {
                tracing::warn!(
                    error.kind = "weights.lora_skipped",
                    url = %url,
                    error = %e,
                    "lora download failed, skipping"
                );
            }
        }
    }
    paths
}

fn marshal_request(
    req: &PredictRequest,
    lora_paths: &[PathBuf],
    preview: &PreviewConfig,
) -> GenerationRequest {
    let live_preview = req.enable_live_preview && preview.enabled;

    let payload = Txt2ImgPayload {
        prompt: req.prompt.clone(),
        width: req.width,
        height: req.height,
        batch_size: req.num_outputs,
        steps: req.num_inference_steps,
        cfg_scale: req.guidance_scale,
        distilled_cfg_scale: req.distilled_guidance_scale,
        seed: req.seed,
        do_not_save_samples: true,
        sampler_name: req.sampler.clone(),
        scheduler: req.scheduler.clone(),
        enable_hr: req.enable_hr,
        hr_upscaler: req.hr_upscaler.clone(),
        hr_second_pass_steps: req.hr_steps,
        denoising_strength: req.enable_hr.then_some(req.denoising_strength),
        hr_scale: req.hr_scale,
        hr_additional_modules: Vec::new(),
        enable_live_preview: live_preview.then_some(true),
        show_progress_every_n_steps: live_preview.then_some(preview.every_n_steps),
    };

    let loras = lora_paths
        .iter()
        .zip(req.lora_scales.iter())
        .map(|(path, scale)| LoraRef {
            name: lora_name(path),
            scale: *scale,
        })
        .collect();

    let mut additional_modules = BTreeMap::new();
    additional_modules.insert("clip_l.safetensors".to_string(), req.enable_clip_l);
    additional_modules.insert("t5xxl_fp16.safetensors".to_string(), req.enable_t5xxl_fp16);
    additional_modules.insert("ae.safetensors".to_string(), req.enable_ae);

    let mut request = GenerationRequest::new(payload);
    request.loras = loras;
    request.additional_modules = additional_modules;
    request
}

fn lora_name(path: &std::path::Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    file_name
        .strip_suffix(".safetensors")
        .unwrap_or(&file_name)
        .to_string()
}
