use thiserror::Error;

use super::{EmitError, HookError, WeightsError};

#[derive(Error, Debug)]
pub enum CliError {
    #[error("predict failed: {0}")]
    Predict(#[from] PredictError),
    #[error("command failed: {0}")]
    Command(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("frame extraction failed: {0}")]
    Frames(#[from] EmitError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("weights error: {0}")]
    Weights(#[from] WeightsError),
    #[error("hook error: {0}")]
    Hook(#[from] HookError),
    #[error("engine setup failed: {0}")]
    Setup(String),
    #[error("output error: {0}")]
    Output(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
