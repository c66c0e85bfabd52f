//! Engine entrypoint: orchestrates one prediction as pre-run (LoRA staging,
//! payload marshal) → generation through the preview interceptor → post-run
//! (result images to disk).

mod post;
mod pre;
mod run;
mod setup;
mod types;

pub use post::post_run;
pub use pre::{pre_run, EngineContext, PreparedRequest};
pub use run::{run_generation, RunArgs};
pub use setup::{build_engine_options, ensure_setup, plan_memory_split};
pub use types::{PredictOutput, PredictRequest, HR_UPSCALERS, SAMPLERS, SCHEDULERS};

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::context::Services;
use crate::error::PredictError;
use crate::hook::PreviewRouter;
use crate::preview::SessionState;

pub struct PredictArgs {
    pub cfg: AppConfig,
    pub services: Services,
    pub router: Arc<PreviewRouter>,
    pub state: Arc<SessionState>,
    pub request: PredictRequest,
    pub output_dir: PathBuf,
    pub run_id: Option<String>,
}

pub async fn predict(args: PredictArgs) -> Result<PredictOutput, PredictError> {
    let PredictArgs {
        cfg,
        services,
        router,
        state,
        request,
        output_dir,
        run_id,
    } = args;

    let run_id = run_id.unwrap_or_else(|| format!("run-{}", uuid::Uuid::new_v4()));

    tracing::info!(
        run_id = %run_id,
        backend = services.backend.name(),
        steps = request.num_inference_steps,
        live_preview = request.enable_live_preview,
        "starting prediction"
    );

    ensure_setup(
        services.backend.as_ref(),
        &cfg,
        services.weights.as_deref(),
        request.checkpoint_url.as_deref(),
    )
    .await?;

    let engine_ctx = EngineContext {
        cfg: &cfg,
        weights: services.weights.as_deref(),
    };
    let prepared = pre_run(&engine_ctx, &request).await?;
    let mut generation_request = prepared.request;

    let run_args = RunArgs {
        backend: services.backend.as_ref(),
        router,
        state,
        run_id: run_id.clone(),
        preview: &cfg.preview,
        live_preview: request.enable_live_preview,
    };
    let (output, session) = run_generation(run_args, &mut generation_request).await?;

    let paths = post_run(&output, &output_dir).await?;

    tracing::info!(
        run_id = %run_id,
        outputs = paths.len(),
        steps_observed = session.steps_observed(),
        duration_ms = session.elapsed_ms(),
        "prediction completed"
    );

    Ok(PredictOutput {
        paths,
        seeds: output.info.all_seeds,
        duration_ms: session.elapsed_ms(),
        steps_observed: session.steps_observed(),
        completed_at: chrono::Local::now().to_rfc3339(),
    })
}
