//! The interception layer.
//!
//! The generation engine sits behind the [`GenerationBackend`] seam; the
//! [`PreviewInterceptor`] wraps a call through that seam, installing a step
//! hook on the request that chains to any pre-existing callback, fans frames
//! out through the [`PreviewRouter`], and restores the original callback on
//! every exit path. If the wrapper itself cannot be installed, the backend
//! is invoked unwrapped — the wrapping is never the proximate cause of a
//! failed generation.

mod interceptor;
mod router;
mod traits;
mod types;

pub use interceptor::PreviewInterceptor;
pub use router::{PreviewRouter, PreviewSubscriber};
pub use traits::GenerationBackend;
pub use types::{
    EngineOptions, GenerationInfo, GenerationOutput, GenerationRequest, LivePreviewOptions,
    LoraRef, MemorySplit, StepFn, Txt2ImgPayload,
};
