use std::sync::Arc;

use async_trait::async_trait;

use crate::preview::SessionState;

use super::types::{EngineOptions, GenerationOutput, GenerationRequest};

/// The seam in front of the image-generation engine.
///
/// A backend runs one generation to completion, invoking the request's step
/// hook synchronously after each denoising step and keeping the shared
/// session state's current latent up to date where it can observe one. The
/// hook must not block on anything that depends on the outer call finishing.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;

    /// One-time engine initialization. Idempotent; failures are setup
    /// errors, never generation errors.
    async fn apply_options(&self, options: &EngineOptions) -> anyhow::Result<()>;

    /// Run one generation to completion or failure. No cancellation.
    async fn generate(
        &self,
        request: &GenerationRequest,
        state: &Arc<SessionState>,
    ) -> anyhow::Result<GenerationOutput>;
}
