use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid base64 payload: {0}")]
    Payload(#[from] base64::DecodeError),
    #[error("all frame channels failed")]
    AllChannelsFailed,
}
