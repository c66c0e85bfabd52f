use std::sync::Arc;

use crate::config::PreviewConfig;
use crate::emit::EmitSubscriber;
use crate::error::PredictError;
use crate::hook::{
    GenerationBackend, GenerationOutput, GenerationRequest, PreviewInterceptor, PreviewRouter,
};
use crate::preview::SessionState;
use crate::session::GenerationSession;

pub struct RunArgs<'a> {
    pub backend: &'a dyn GenerationBackend,
    pub router: Arc<PreviewRouter>,
    pub state: Arc<SessionState>,
    pub run_id: String,
    pub preview: &'a PreviewConfig,
    /// Per-request toggle from the platform schema; ANDed with the config.
    pub live_preview: bool,
}

/// Run one generation through the preview interceptor. When live preview is
/// on, the emit route is (re-)registered first — registration replaces any
/// previous preview route, so repeated predictions do not stack subscribers.
pub async fn run_generation(
    args: RunArgs<'_>,
    request: &mut GenerationRequest,
) -> Result<(GenerationOutput, GenerationSession), PredictError> {
    let RunArgs {
        backend,
        router,
        state,
        run_id,
        preview,
        live_preview,
    } = args;

    if live_preview && preview.enabled {
        let sink = if preview.mirror_stderr {
            EmitSubscriber::stdio()
        } else {
            EmitSubscriber::stdout_only()
        };
        router.register_preview(Arc::new(sink));
        tracing::info!(
            run_id = %run_id,
            subscribers = router.len(),
            "live preview route registered"
        );
    }

    let interceptor = PreviewInterceptor::new(router, state);
    let mut session = GenerationSession::new(run_id);

    let output = interceptor
        .generate(backend, request, &mut session)
        .await?;

    tracing::info!(
        run_id = session.run_id(),
        duration_ms = session.elapsed_ms(),
        steps = session.steps_observed(),
        images = output.images.len(),
        "generation finished"
    );

    Ok((output, session))
}
