#[allow(clippy::module_inception)]
pub mod error;

pub mod decode;
pub mod emit;
pub mod hook;
pub mod weights;

pub use decode::DecodeError;
pub use emit::EmitError;
pub use error::{CliError, PredictError};
pub use hook::HookError;
pub use weights::WeightsError;
