use std::sync::Arc;

use crate::error::HookError;
use crate::preview::{capture_preview, LatentDecoder, PreviewFrame, SessionState};
use crate::session::{GenerationSession, SessionPhase};

use super::router::PreviewRouter;
use super::traits::GenerationBackend;
use super::types::{GenerationOutput, GenerationRequest, StepFn};

/// Wraps a generation call with the live-preview step hook.
///
/// Contract, in order: install a chained step hook on the request (original
/// callback invoked first), delegate to the backend with the request
/// otherwise unmodified, restore the original callback reference on every
/// exit path, and — if installation itself failed — invoke the backend
/// unwrapped exactly once instead of surfacing the wrapper's own failure.
/// Genuine generation failures propagate unchanged.
pub struct PreviewInterceptor {
    router: Arc<PreviewRouter>,
    state: Arc<SessionState>,
}

impl PreviewInterceptor {
    pub fn new(router: Arc<PreviewRouter>, state: Arc<SessionState>) -> Self {
        Self { router, state }
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn router(&self) -> &Arc<PreviewRouter> {
        &self.router
    }

    pub async fn generate(
        &self,
        backend: &dyn GenerationBackend,
        request: &mut GenerationRequest,
        session: &mut GenerationSession,
    ) -> Result<GenerationOutput, HookError> {
        let original = request.step_hook.clone();

        if let Err(install_err) = self.install(request, original.clone(), session) {
            tracing::warn!(
                error.kind = "hook.install_failed",
                run_id = session.run_id(),
                error = %install_err,
                "preview hook install failed, invoking backend unwrapped"
            );
            request.step_hook = original;
            session.force(SessionPhase::Fallback);
            let result = backend
                .generate(request, &self.state)
                .await
                .map_err(HookError::Generation);
            session.force(SessionPhase::Done);
            return result;
        }

        let result = backend.generate(request, &self.state).await;

        // Restoration invariant: the request's callback slot equals its
        // pre-call value on success and on failure alike.
        request.step_hook = original;

        let steps = self.state.steps_observed();
        session.note_steps(steps);
        if steps > 0 {
            let _ = session.transition(SessionPhase::Stepping);
        }
        let _ = session.transition(SessionPhase::Restored);

        match result {
            Ok(output) => {
                let _ = session.transition(SessionPhase::Done);
                tracing::debug!(
                    run_id = session.run_id(),
                    steps,
                    duration_ms = session.elapsed_ms(),
                    "generation completed with preview hook"
                );
                Ok(output)
            }
            Err(e) => {
                session.force(SessionPhase::Done);
                Err(HookError::Generation(e))
            }
        }
    }

    fn install(
        &self,
        request: &mut GenerationRequest,
        original: Option<StepFn>,
        session: &mut GenerationSession,
    ) -> Result<(), HookError> {
        // A session can only be wrapped once; re-running with a finished
        // session is the wrapper's own mistake and triggers the fallback.
        session.transition(SessionPhase::Wrapped)?;
        self.state.reset();
        request.step_hook = Some(chain_step_hook(
            original,
            request.decoder.clone(),
            self.state.clone(),
            self.router.clone(),
        ));
        Ok(())
    }
}

/// Build the chained hook: original callback first, then capture → decode →
/// fan-out. Decode failures are contained here; a broken preview must not
/// abort the generation.
fn chain_step_hook(
    original: Option<StepFn>,
    request_decoder: Option<Arc<dyn LatentDecoder>>,
    state: Arc<SessionState>,
    router: Arc<PreviewRouter>,
) -> StepFn {
    Arc::new(move |step, total| {
        if let Some(orig) = original.as_ref() {
            orig(step, total);
        }
        state.note_step();

        let data_url = match capture_preview(request_decoder.as_ref(), &state) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(
                    error.kind = "preview.decode_failed",
                    step,
                    total,
                    error = %e,
                    "preview decode failed, step yields no frame"
                );
                None
            }
        };

        let frame = data_url.map(|url| PreviewFrame::new(step, total, url));
        router.notify(step, total, frame.as_ref());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::types::Txt2ImgPayload;
    use crate::preview::{DecodedTensor, Device, Latent};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn payload() -> Txt2ImgPayload {
        Txt2ImgPayload {
            prompt: "a lighthouse".into(),
            width: 16,
            height: 16,
            batch_size: 1,
            steps: 4,
            cfg_scale: 1.0,
            distilled_cfg_scale: 3.5,
            seed: 7,
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

    struct UnitDecoder;

    impl LatentDecoder for UnitDecoder {
        fn name(&self) -> &str {
            "unit"
        }

        fn device(&self) -> Device {
            Device::Cpu
        }

        fn decode_first_stage(&self, _latent: &Latent) -> Result<DecodedTensor, crate::error::DecodeError> {
            Ok(DecodedTensor {
                data: vec![0.0; 12],
                shape: vec![1, 3, 2, 2],
            })
        }

        fn decode_approx(&self, _latent: &Latent) -> Result<DecodedTensor, crate::error::DecodeError> {
            Ok(DecodedTensor {
                data: vec![0.5; 12],
                shape: vec![1, 3, 2, 2],
            })
        }
    }

    /// Drives `total` steps, publishing a latent from `latent_from` onward.
    struct ScriptedBackend {
        total: usize,
        latent_from: usize,
        fail: bool,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(total: usize, latent_from: usize) -> Self {
            Self {
                total,
                latent_from,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                total: 2,
                latent_from: 1,
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn apply_options(
            &self,
            _options: &crate::hook::EngineOptions,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn generate(
            &self,
            request: &GenerationRequest,
            state: &Arc<SessionState>,
        ) -> anyhow::Result<GenerationOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for step in 1..=self.total {
                if step >= self.latent_from {
                    state.set_latent(Latent::new(vec![0.0; 16], [1, 4, 2, 2]).unwrap());
                }
                if let Some(hook) = request.step_hook.as_ref() {
                    hook(step, self.total);
                }
            }
            if self.fail {
                anyhow::bail!("engine exploded");
            }
            Ok(GenerationOutput::default())
        }
    }

    struct CountingSubscriber {
        with_frame: AtomicUsize,
        without_frame: AtomicUsize,
    }

    impl CountingSubscriber {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                with_frame: AtomicUsize::new(0),
                without_frame: AtomicUsize::new(0),
            })
        }
    }

    impl crate::hook::PreviewSubscriber for CountingSubscriber {
        fn name(&self) -> &str {
            "counting"
        }

        fn on_step(
            &self,
            _step: usize,
            _total: usize,
            frame: Option<&PreviewFrame>,
        ) -> anyhow::Result<()> {
            if frame.is_some() {
                self.with_frame.fetch_add(1, Ordering::SeqCst);
            } else {
                self.without_frame.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    fn interceptor() -> (PreviewInterceptor, Arc<PreviewRouter>, Arc<SessionState>) {
        let router = Arc::new(PreviewRouter::new());
        let state = Arc::new(SessionState::new());
        (
            PreviewInterceptor::new(router.clone(), state.clone()),
            router,
            state,
        )
    }

    #[tokio::test]
    async fn steps_without_latent_never_deliver_frames() {
        let (icp, router, state) = interceptor();
        state.set_decoder(Arc::new(UnitDecoder));
        let sub = CountingSubscriber::new();
        router.register_preview(sub.clone());

        let backend = ScriptedBackend::new(10, 3);
        let mut request = GenerationRequest::new(payload());
        let mut session = GenerationSession::new("run-1");

        icp.generate(&backend, &mut request, &mut session)
            .await
            .unwrap();

        assert_eq!(sub.without_frame.load(Ordering::SeqCst), 2); // steps 1-2
        assert_eq!(sub.with_frame.load(Ordering::SeqCst), 8); // steps 3-10
        assert_eq!(session.phase(), SessionPhase::Done);
        assert_eq!(session.steps_observed(), 10);
    }

    #[tokio::test]
    async fn original_hook_is_chained_and_restored() {
        let (icp, _router, _state) = interceptor();
        let backend = ScriptedBackend::new(4, 1);

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_hook = seen.clone();
        let original: StepFn = Arc::new(move |_, _| {
            seen_in_hook.fetch_add(1, Ordering::SeqCst);
        });

        let mut request = GenerationRequest::new(payload());
        request.step_hook = Some(original.clone());
        let mut session = GenerationSession::new("run-2");

        icp.generate(&backend, &mut request, &mut session)
            .await
            .unwrap();

        // Original invoked per step, and the exact reference restored.
        assert_eq!(seen.load(Ordering::SeqCst), 4);
        assert!(Arc::ptr_eq(request.step_hook.as_ref().unwrap(), &original));
    }

    #[tokio::test]
    async fn hook_restored_to_none_after_failure() {
        let (icp, _router, _state) = interceptor();
        let backend = ScriptedBackend::failing();
        let mut request = GenerationRequest::new(payload());
        let mut session = GenerationSession::new("run-3");

        let err = icp
            .generate(&backend, &mut request, &mut session)
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::Generation(_)));
        assert!(request.step_hook.is_none());
        assert_eq!(session.phase(), SessionPhase::Done);
    }

    #[tokio::test]
    async fn install_failure_falls_back_to_single_unwrapped_call() {
        let (icp, router, _state) = interceptor();
        let sub = CountingSubscriber::new();
        router.register_preview(sub.clone());

        let backend = ScriptedBackend::new(5, 1);
        let mut request = GenerationRequest::new(payload());

        // A session that is already wrapped cannot be wrapped again.
        let mut session = GenerationSession::new("run-4");
        session.transition(SessionPhase::Wrapped).unwrap();

        let out = icp.generate(&backend, &mut request, &mut session).await;
        assert!(out.is_ok());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        // Fallback runs unwrapped: no hook, so no notifications at all.
        assert_eq!(sub.with_frame.load(Ordering::SeqCst), 0);
        assert_eq!(sub.without_frame.load(Ordering::SeqCst), 0);
        assert!(request.step_hook.is_none());
        assert_eq!(session.phase(), SessionPhase::Done);
    }

    #[tokio::test]
    async fn zero_step_run_still_restores_and_completes() {
        let (icp, _router, _state) = interceptor();
        let backend = ScriptedBackend::new(0, 1);
        let mut request = GenerationRequest::new(payload());
        let mut session = GenerationSession::new("run-5");

        icp.generate(&backend, &mut request, &mut session)
            .await
            .unwrap();
        assert_eq!(session.steps_observed(), 0);
        assert_eq!(session.phase(), SessionPhase::Done);
    }
}
