use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::preview::LatentDecoder;

/// Shape of the engine's step callback: `(step, total_steps)`.
pub type StepFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// The engine's txt2img processing payload, marshaled from a
/// `PredictRequest`. Field names follow the engine's own API schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Txt2ImgPayload {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub batch_size: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    pub distilled_cfg_scale: f64,
    pub seed: i64,
    pub do_not_save_samples: bool,
    pub sampler_name: String,
    pub scheduler: String,
    pub enable_hr: bool,
    pub hr_upscaler: String,
    pub hr_second_pass_steps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denoising_strength: Option<f64>,
    pub hr_scale: f64,
    pub hr_additional_modules: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_live_preview: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_progress_every_n_steps: Option<u32>,
}

/// An extra-network (LoRA) reference: file stem plus weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraRef {
    pub name: String,
    pub scale: f64,
}

/// The processing-request object handed to a backend. Carries the payload,
/// staged extra networks, the mutable nullable step-callback slot the
/// interceptor chains onto, and a typed decoder slot (resolved before the
/// shared session state when capturing previews).
pub struct GenerationRequest {
    pub txt2img: Txt2ImgPayload,
    pub loras: Vec<LoraRef>,
    pub additional_modules: BTreeMap<String, bool>,
    pub step_hook: Option<StepFn>,
    pub decoder: Option<Arc<dyn LatentDecoder>>,
}

impl GenerationRequest {
    pub fn new(txt2img: Txt2ImgPayload) -> Self {
        Self {
            txt2img,
            loras: Vec::new(),
            additional_modules: BTreeMap::new(),
            step_hook: None,
            decoder: None,
        }
    }
}

impl std::fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("txt2img", &self.txt2img)
            .field("loras", &self.loras)
            .field("additional_modules", &self.additional_modules)
            .field("step_hook", &self.step_hook.as_ref().map(|_| "<fn>"))
            .field("decoder", &self.decoder.as_ref().map(|d| d.name().to_string()))
            .finish()
    }
}

/// Metadata the engine returns alongside images, parsed from its info blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationInfo {
    #[serde(default)]
    pub all_seeds: Vec<i64>,
}

/// Completed generation: base64 PNG images plus metadata.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutput {
    pub images: Vec<String>,
    pub info: GenerationInfo,
}

/// Engine options applied once at setup.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub preset: String,
    pub checkpoint: String,
    pub unet_storage_dtype: String,
    pub live_preview: LivePreviewOptions,
    pub memory: MemorySplit,
}

#[derive(Debug, Clone)]
pub struct LivePreviewOptions {
    pub enabled: bool,
    pub every_n_steps: u32,
    pub refresh_period_ms: u64,
    pub fast_interrupt: bool,
    pub show_progress_grid: bool,
}

/// How device memory is divided between resident weights and inference
/// workspace, plus the swap behavior toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySplit {
    pub weights_bytes: u64,
    pub inference_bytes: u64,
    pub pin_shared_memory: bool,
    pub async_swap: bool,
}
