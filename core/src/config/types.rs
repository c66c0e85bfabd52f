use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub weights: WeightsConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            backend: BackendConfig::default(),
            weights: WeightsConfig::default(),
            preview: PreviewConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr. Stdout is reserved for preview frames.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "fluxbridge_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    WebUi(WebUiConfig),
    Replay(ReplayConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::WebUi(WebUiConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebUiConfig {
    #[serde(default = "default_webui_base_url")]
    pub base_url: String,

    #[serde(default = "default_webui_timeout_ms")]
    pub timeout_ms: u64,

    /// Interval for progress polling while a generation is in flight.
    #[serde(default = "default_webui_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_webui_base_url() -> String {
    "http://127.0.0.1:7860".to_string()
}

fn default_webui_timeout_ms() -> u64 {
    600_000
}

fn default_webui_poll_interval_ms() -> u64 {
    250
}

impl Default for WebUiConfig {
    fn default() -> Self {
        Self {
            base_url: default_webui_base_url(),
            timeout_ms: default_webui_timeout_ms(),
            poll_interval_ms: default_webui_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// JSONL trajectory file with one recorded step per line.
    pub trajectory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsConfig {
    /// Cache directory. Filled in by `load_default` when left empty.
    #[serde(default)]
    pub dir: String,

    /// LRU eviction budget for the cache, in bytes.
    #[serde(default = "default_weights_max_bytes")]
    pub max_bytes: u64,

    /// Base checkpoint target path, relative to `dir` unless absolute.
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,

    /// Fallback download URL for the base checkpoint when the file is absent.
    #[serde(default)]
    pub checkpoint_url: Option<String>,
}

fn default_weights_max_bytes() -> u64 {
    // Roughly ten Flux-sized LoRA sets; evicted least-recently-used first.
    40 * 1024 * 1024 * 1024
}

fn default_checkpoint_file() -> String {
    "flux_checkpoint.safetensors".to_string()
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            dir: String::new(),
            max_bytes: default_weights_max_bytes(),
            checkpoint_file: default_checkpoint_file(),
            checkpoint_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    #[serde(default = "default_preview_enabled")]
    pub enabled: bool,

    #[serde(default = "default_preview_every_n_steps")]
    pub every_n_steps: u32,

    #[serde(default = "default_preview_refresh_period_ms")]
    pub refresh_period_ms: u64,

    #[serde(default = "default_preview_fast_interrupt")]
    pub fast_interrupt: bool,

    /// Mirror frames to stderr in addition to stdout.
    #[serde(default = "default_preview_mirror_stderr")]
    pub mirror_stderr: bool,
}

fn default_preview_enabled() -> bool {
    true
}

fn default_preview_every_n_steps() -> u32 {
    1
}

fn default_preview_refresh_period_ms() -> u64 {
    250
}

fn default_preview_fast_interrupt() -> bool {
    true
}

fn default_preview_mirror_stderr() -> bool {
    true
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: default_preview_enabled(),
            every_n_steps: default_preview_every_n_steps(),
            refresh_period_ms: default_preview_refresh_period_ms(),
            fast_interrupt: default_preview_fast_interrupt(),
            mirror_stderr: default_preview_mirror_stderr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_preset")]
    pub preset: String,

    #[serde(default = "default_unet_storage_dtype")]
    pub unet_storage_dtype: String,

    /// Fraction of total device memory reserved for inference; the remainder
    /// is handed to model weights.
    #[serde(default = "default_inference_memory_fraction")]
    pub inference_memory_fraction: f64,

    #[serde(default = "default_pin_shared_memory")]
    pub pin_shared_memory: bool,

    #[serde(default = "default_async_swap")]
    pub async_swap: bool,
}

fn default_engine_preset() -> String {
    "flux".to_string()
}

fn default_unet_storage_dtype() -> String {
    "Automatic (fp16 LoRA)".to_string()
}

fn default_inference_memory_fraction() -> f64 {
    0.1
}

fn default_pin_shared_memory() -> bool {
    true
}

fn default_async_swap() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preset: default_engine_preset(),
            unet_storage_dtype: default_unet_storage_dtype(),
            inference_memory_fraction: default_inference_memory_fraction(),
            pin_shared_memory: default_pin_shared_memory(),
            async_swap: default_async_swap(),
        }
    }
}
