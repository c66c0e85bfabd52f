//! Replays a recorded generation trajectory through the step hook.
//!
//! The trajectory is JSONL, one step per line, optionally carrying the
//! latent snapshot observed at that step:
//!
//! ```text
//! {"step": 1, "total": 10}
//! {"step": 3, "total": 10, "latent": {"shape": [1, 4, 8, 8], "data": [..]}}
//! ```
//!
//! Used for local development and tests: it exercises the full capture →
//! decode → emit pipeline without a GPU or a webui server behind it.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use fluxbridge_core::api::{
    capture_preview, strip_data_url_prefix, EngineOptions, GenerationBackend, GenerationInfo,
    GenerationOutput, GenerationRequest, Latent, SessionState,
};

use crate::decoder::LinearApproxDecoder;

#[derive(Debug, Deserialize)]
struct TrajectoryStep {
    step: usize,
    total: usize,
    #[serde(default)]
    latent: Option<LatentRecord>,
}

#[derive(Debug, Deserialize)]
struct LatentRecord {
    shape: [usize; 4],
    data: Vec<f32>,
}

pub struct ReplayBackend {
    trajectory: PathBuf,
}

impl ReplayBackend {
    pub fn new(trajectory: impl Into<PathBuf>) -> Self {
        Self {
            trajectory: trajectory.into(),
        }
    }
}

#[async_trait]
impl GenerationBackend for ReplayBackend {
    fn name(&self) -> &str {
        "replay"
    }

    async fn apply_options(&self, options: &EngineOptions) -> anyhow::Result<()> {
        tracing::debug!(preset = %options.preset, "replay backend ignores engine options");
        Ok(())
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        state: &Arc<SessionState>,
    ) -> anyhow::Result<GenerationOutput> {
        // Replay sessions decode through the cheap approximation unless the
        // request brought its own decoder.
        if state.decoder().is_none() && request.decoder.is_none() {
            state.set_decoder(LinearApproxDecoder::shared());
        }

        let raw = tokio::fs::read_to_string(&self.trajectory).await?;
        let mut steps = 0usize;
        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: TrajectoryStep = serde_json::from_str(line).map_err(|e| {
                anyhow::anyhow!(
                    "trajectory {} line {}: {e}",
                    self.trajectory.display(),
                    line_no + 1
                )
            })?;

            if let Some(latent) = record.latent {
                state.set_latent(Latent::new(latent.data, latent.shape)?);
            }
            if let Some(hook) = request.step_hook.as_ref() {
                hook(record.step, record.total);
            }
            steps += 1;
        }
        tracing::info!(steps, trajectory = %self.trajectory.display(), "trajectory replayed");

        // Final image: decode whatever latent the trajectory ended on.
        let images = match capture_preview(request.decoder.as_ref(), state) {
            Ok(Some(data_url)) => vec![strip_data_url_prefix(&data_url).to_string()],
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "final replay decode failed");
                Vec::new()
            }
        };

        Ok(GenerationOutput {
            images,
            info: GenerationInfo {
                all_seeds: vec![request.txt2img.seed],
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxbridge_core::api::Txt2ImgPayload;
    use std::io::Write as _;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn payload() -> Txt2ImgPayload {
        Txt2ImgPayload {
            prompt: "replay".into(),
            width: 8,
            height: 8,
            batch_size: 1,
            steps: 3,
            cfg_scale: 1.0,
            distilled_cfg_scale: 3.5,
            seed: 99,
            do_not_save_samples: true,
            sampler_name: "Euler".into(),
            scheduler: "Simple".into(),
            enable_hr: false,
            hr_upscaler: "Latent".into(),
            hr_second_pass_steps: 0,
            denoising_strength: None,
            hr_scale: 1.5,
            hr_additional_modules: vec![],
            enable_live_preview: Some(true),
            show_progress_every_n_steps: Some(1),
        }
    }

    fn write_trajectory(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("run.jsonl");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, r#"{{"step": 1, "total": 3}}"#).unwrap();
        let data = vec![0.1; 16];
        let latent = serde_json::json!({
            "step": 2,
            "total": 3,
            "latent": {"shape": [1, 4, 2, 2], "data": data}
        });
        writeln!(f, "{latent}").unwrap();
        writeln!(f, r#"{{"step": 3, "total": 3}}"#).unwrap();
        path
    }

    #[tokio::test]
    async fn replays_steps_and_returns_final_image() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ReplayBackend::new(write_trajectory(&dir));

        let hooked = Arc::new(AtomicUsize::new(0));
        let hooked_in = hooked.clone();
        let mut request = GenerationRequest::new(payload());
        request.step_hook = Some(Arc::new(move |_, _| {
            hooked_in.fetch_add(1, Ordering::SeqCst);
        }));

        let state = Arc::new(SessionState::new());
        let out = backend.generate(&request, &state).await.unwrap();

        assert_eq!(hooked.load(Ordering::SeqCst), 3);
        assert_eq!(out.info.all_seeds, vec![99]);
        assert_eq!(out.images.len(), 1);
        // The final image is a decodable PNG of the last latent.
        let png = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            &out.images[0],
        )
        .unwrap();
        assert!(image::load_from_memory(&png).is_ok());
    }

    #[tokio::test]
    async fn corrupt_trajectory_is_a_generation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "not json\n").unwrap();

        let backend = ReplayBackend::new(path);
        let request = GenerationRequest::new(payload());
        let state = Arc::new(SessionState::new());
        assert!(backend.generate(&request, &state).await.is_err());
    }
}
