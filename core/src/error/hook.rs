use thiserror::Error;

use crate::session::TransitionError;

#[derive(Error, Debug)]
pub enum HookError {
    /// The wrapper itself could not be installed. Never surfaced to callers
    /// directly: the interceptor falls back to the unwrapped backend call.
    #[error("hook install failed: {0}")]
    Install(String),
    #[error("session transition rejected: {0}")]
    Session(#[from] TransitionError),
    /// The underlying generation call failed. Propagated unchanged; the
    /// wrapping never masks a genuine generation failure.
    #[error("generation failed: {0}")]
    Generation(#[source] anyhow::Error),
}
