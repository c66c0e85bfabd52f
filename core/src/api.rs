//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `fluxbridge_core::api` instead of reaching into
//! internal modules.

pub use crate::config::{
    get_data_dir, load_default, AppConfig, BackendConfig, EngineConfig, LoggingConfig,
    PreviewConfig, ReplayConfig, WebUiConfig, WeightsConfig,
};
pub use crate::context::{AppContext, Services, ServicesFactory};
pub use crate::emit::{
    extract_frames, EmitSubscriber, FrameParser, FrameWriter, ParsedFrame, FRAME_BASE64_END,
    FRAME_BASE64_START, FRAME_END, FRAME_HEADER_PREFIX,
};
pub use crate::engine::{
    build_engine_options, ensure_setup, plan_memory_split, post_run, pre_run, predict,
    run_generation, EngineContext, PredictArgs, PredictOutput, PredictRequest, RunArgs,
    HR_UPSCALERS, SAMPLERS, SCHEDULERS,
};
pub use crate::error::{
    CliError, DecodeError, EmitError, HookError, PredictError, WeightsError,
};
pub use crate::hook::{
    EngineOptions, GenerationBackend, GenerationInfo, GenerationOutput, GenerationRequest,
    LivePreviewOptions, LoraRef, MemorySplit, PreviewInterceptor, PreviewRouter,
    PreviewSubscriber, StepFn, Txt2ImgPayload,
};
pub use crate::preview::{
    capture_preview, encode_data_url, strip_data_url_prefix, DecodedTensor, Device, Latent,
    LatentDecoder, PreviewFrame, SessionState, ValueRange, DATA_URL_PREFIX,
};
pub use crate::session::{GenerationSession, SessionPhase, TransitionError};
pub use crate::weights::WeightsProvider;
