//! HTTP bridge to a co-hosted SD webui (forge) server.
//!
//! The server runs in the same pod; this backend forwards the processing
//! request to `/sdapi/v1/txt2img` and, while that call blocks, polls
//! `/sdapi/v1/progress` to drive the request's step hook. Raw latents are
//! not observable over HTTP, so with this backend the capture path exercises
//! its "no latent yet" branch every step unless the engine side is patched
//! to publish them; step/total progression still streams.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use fluxbridge_core::api::{
    EngineOptions, GenerationBackend, GenerationInfo, GenerationOutput, GenerationRequest,
    SessionState, WebUiConfig,
};

pub struct WebUiBackend {
    cfg: WebUiConfig,
    client: reqwest::Client,
}

impl WebUiBackend {
    pub fn new(cfg: WebUiConfig) -> anyhow::Result<Self> {
        if !cfg.base_url.starts_with("http") {
            anyhow::bail!("invalid webui url, make sure it starts with http");
        }
        let client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self {
            cfg: WebUiConfig {
                base_url: cfg.base_url.trim_end_matches('/').to_string(),
                ..cfg
            },
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.cfg.base_url, path)
    }

    /// Extra-network references travel inside the prompt for the HTTP API.
    fn prompt_with_loras(request: &GenerationRequest) -> String {
        let mut prompt = request.txt2img.prompt.clone();
        for lora in &request.loras {
            prompt.push_str(&format!(" <lora:{}:{}>", lora.name, lora.scale));
        }
        prompt
    }

    fn build_body(request: &GenerationRequest) -> anyhow::Result<serde_json::Value> {
        let mut body = serde_json::to_value(&request.txt2img)?;
        body["prompt"] = serde_json::Value::String(Self::prompt_with_loras(request));

        let modules: Vec<String> = request
            .additional_modules
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.clone())
            .collect();
        if !modules.is_empty() {
            body["forge_additional_modules"] = serde_json::json!(modules);
        }
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Default, Deserialize)]
struct ProgressResponse {
    #[serde(default)]
    state: ProgressState,
}

#[derive(Debug, Default, Deserialize)]
struct ProgressState {
    #[serde(default)]
    sampling_step: usize,
    #[serde(default)]
    sampling_steps: usize,
}

#[async_trait]
impl GenerationBackend for WebUiBackend {
    fn name(&self) -> &str {
        "webui"
    }

    async fn apply_options(&self, options: &EngineOptions) -> anyhow::Result<()> {
        let mut settings = BTreeMap::new();
        settings.insert("forge_preset", serde_json::json!(options.preset));
        settings.insert("sd_model_checkpoint", serde_json::json!(options.checkpoint));
        settings.insert(
            "forge_unet_storage_dtype",
            serde_json::json!(options.unet_storage_dtype),
        );
        settings.insert(
            "live_previews_enable",
            serde_json::json!(options.live_preview.enabled),
        );
        settings.insert(
            "show_progress_every_n_steps",
            serde_json::json!(options.live_preview.every_n_steps),
        );
        settings.insert(
            "live_preview_refresh_period",
            serde_json::json!(options.live_preview.refresh_period_ms),
        );
        settings.insert(
            "live_preview_fast_interrupt",
            serde_json::json!(options.live_preview.fast_interrupt),
        );
        settings.insert(
            "show_progress_grid",
            serde_json::json!(options.live_preview.show_progress_grid),
        );

        self.client
            .post(self.endpoint("sdapi/v1/options"))
            .json(&settings)
            .send()
            .await?
            .error_for_status()?;
        tracing::info!(options = settings.len(), "webui options applied");
        Ok(())
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        _state: &Arc<SessionState>,
    ) -> anyhow::Result<GenerationOutput> {
        let body = Self::build_body(request)?;

        // Progress poller: invokes the step hook whenever the sampler moves.
        let poller = request.step_hook.clone().map(|hook| {
            let client = self.client.clone();
            let url = self.endpoint("sdapi/v1/progress?skip_current_image=true");
            let interval = Duration::from_millis(self.cfg.poll_interval_ms.max(50));
            tokio::spawn(async move {
                let mut last_step = 0usize;
                let mut tick = tokio::time::interval(interval);
                loop {
                    tick.tick().await;
                    let progress: ProgressResponse = match client.get(&url).send().await {
                        Ok(resp) => resp.json().await.unwrap_or_default(),
                        Err(e) => {
                            tracing::debug!(error = %e, "progress poll failed");
                            continue;
                        }
                    };
                    let step = progress.state.sampling_step;
                    let total = progress.state.sampling_steps;
                    if step > last_step && total > 0 {
                        last_step = step;
                        hook(step, total);
                    }
                }
            })
        });

        let result = async {
            let resp: Txt2ImgResponse = self
                .client
                .post(self.endpoint("sdapi/v1/txt2img"))
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let info: GenerationInfo = if resp.info.trim().is_empty() {
                GenerationInfo::default()
            } else {
                serde_json::from_str(&resp.info).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "unparseable generation info blob");
                    GenerationInfo::default()
                })
            };

            anyhow::Ok(GenerationOutput {
                images: resp.images,
                info,
            })
        }
        .await;

        if let Some(handle) = poller {
            handle.abort();
        }

        result
    }
}
