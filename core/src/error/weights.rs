use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeightsError {
    #[error("unsupported weights url: {0}")]
    UnsupportedUrl(String),
    #[error("download failed: {0}")]
    Download(String),
    #[error("archive missing expected member: {0}")]
    MissingMember(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
