use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::PredictError;

/// Sampling methods the Flux preset accepts.
pub const SAMPLERS: &[&str] = &[
    "[Forge] Flux Realistic",
    "Euler",
    "DEIS",
    "Euler a",
    "DPM++ 2M",
    "DPM++ SDE",
    "DPM++ 2M SDE",
    "DPM++ 2M SDE Karras",
    "DPM++ 2M SDE Exponential",
    "DPM++ 3M SDE",
    "DPM++ 3M SDE Karras",
    "DPM++ 3M SDE Exponential",
];

/// Schedule types the Flux preset accepts.
pub const SCHEDULERS: &[&str] = &[
    "Simple",
    "Karras",
    "Exponential",
    "SGM Uniform",
    "SGM Karras",
    "SGM Exponential",
    "Align Your Steps",
    "Align Your Steps 11",
    "Align Your Steps 32",
    "Align Your Steps GITS",
    "KL Optimal",
    "Normal",
    "DDIM",
    "Beta",
    "Turbo",
];

pub const HR_UPSCALERS: &[&str] = &[
    "Latent",
    "Latent (antialiased)",
    "Latent (bicubic)",
    "Latent (bicubic antialiased)",
    "Latent (nearest)",
    "Latent (nearest-exact)",
    "None",
    "Lanczos",
    "Nearest",
    "ESRGAN_4x",
    "LDSR",
    "R-ESRGAN 4x+",
    "R-ESRGAN 4x+ Anime6B",
    "ScuNET GAN",
    "ScuNET PSNR",
    "SwinIR 4x",
];

/// One prediction request as received from the hosting platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub prompt: String,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_num_outputs")]
    pub num_outputs: u32,

    #[serde(default = "default_sampler")]
    pub sampler: String,

    #[serde(default = "default_scheduler")]
    pub scheduler: String,

    #[serde(default = "default_steps")]
    pub num_inference_steps: u32,

    /// CFG scale; 1.0 is the Flux recommendation.
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,

    /// Distilled CFG scale, the main guidance knob for Flux.
    #[serde(default = "default_distilled_guidance_scale")]
    pub distilled_guidance_scale: f64,

    /// -1 lets the engine randomize.
    #[serde(default = "default_seed")]
    pub seed: i64,

    #[serde(default)]
    pub enable_hr: bool,

    #[serde(default = "default_hr_upscaler")]
    pub hr_upscaler: String,

    #[serde(default = "default_hr_steps")]
    pub hr_steps: u32,

    #[serde(default = "default_hr_scale")]
    pub hr_scale: f64,

    #[serde(default = "default_denoising_strength")]
    pub denoising_strength: f64,

    #[serde(default)]
    pub lora_urls: Vec<String>,

    #[serde(default = "default_lora_scales")]
    pub lora_scales: Vec<f64>,

    /// Forces a re-download of the base checkpoint before generating.
    #[serde(default)]
    pub checkpoint_url: Option<String>,

    #[serde(default)]
    pub enable_clip_l: bool,

    #[serde(default)]
    pub enable_t5xxl_fp16: bool,

    #[serde(default)]
    pub enable_ae: bool,

    #[serde(default = "default_enable_live_preview")]
    pub enable_live_preview: bool,
}

fn default_width() -> u32 {
    768
}

fn default_height() -> u32 {
    1280
}

fn default_num_outputs() -> u32 {
    1
}

fn default_sampler() -> String {
    "[Forge] Flux Realistic".to_string()
}

fn default_scheduler() -> String {
    "Simple".to_string()
}

fn default_steps() -> u32 {
    28
}

fn default_guidance_scale() -> f64 {
    1.0
}

fn default_distilled_guidance_scale() -> f64 {
    3.5
}

fn default_seed() -> i64 {
    -1
}

fn default_hr_upscaler() -> String {
    "Latent".to_string()
}

fn default_hr_steps() -> u32 {
    10
}

fn default_hr_scale() -> f64 {
    1.5
}

fn default_denoising_strength() -> f64 {
    0.1
}

fn default_lora_scales() -> Vec<f64> {
    vec![1.0]
}

fn default_enable_live_preview() -> bool {
    true
}

impl PredictRequest {
    pub fn validate(&self) -> Result<(), PredictError> {
        fn range<T: PartialOrd + std::fmt::Display>(
            field: &str,
            value: T,
            min: T,
            max: T,
        ) -> Result<(), PredictError> {
            if value < min || value > max {
                return Err(PredictError::InvalidRequest(format!(
                    "{field} must be between {min} and {max}, got {value}"
                )));
            }
            Ok(())
        }

        if self.prompt.trim().is_empty() {
            return Err(PredictError::InvalidRequest("prompt is empty".into()));
        }
        range("width", self.width, 1, 1280)?;
        range("height", self.height, 1, 1280)?;
        range("num_outputs", self.num_outputs, 1, 4)?;
        range("num_inference_steps", self.num_inference_steps, 1, 50)?;
        range("guidance_scale", self.guidance_scale, 0.0, 50.0)?;
        range(
            "distilled_guidance_scale",
            self.distilled_guidance_scale,
            0.0,
            30.0,
        )?;
        range("hr_steps", self.hr_steps, 0, 100)?;
        range("hr_scale", self.hr_scale, 1.0, 4.0)?;
        range("denoising_strength", self.denoising_strength, 0.0, 1.0)?;

        if !SAMPLERS.contains(&self.sampler.as_str()) {
            return Err(PredictError::InvalidRequest(format!(
                "unknown sampler: {}",
                self.sampler
            )));
        }
        if !SCHEDULERS.contains(&self.scheduler.as_str()) {
            return Err(PredictError::InvalidRequest(format!(
                "unknown scheduler: {}",
                self.scheduler
            )));
        }
        if !HR_UPSCALERS.contains(&self.hr_upscaler.as_str()) {
            return Err(PredictError::InvalidRequest(format!(
                "unknown hr_upscaler: {}",
                self.hr_upscaler
            )));
        }
        Ok(())
    }
}

/// Result of one prediction.
#[derive(Debug, Clone, Serialize)]
pub struct PredictOutput {
    pub paths: Vec<PathBuf>,
    pub seeds: Vec<i64>,
    pub duration_ms: u64,
    pub steps_observed: usize,
    pub completed_at: String,
}
