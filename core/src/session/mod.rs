//! Per-generation session bookkeeping.
//!
//! One `GenerationSession` tracks a single run through the preview hook:
//! `Idle → Wrapped → Stepping → Restored → Done`, with `Wrapped → Fallback`
//! when the wrapper could not be installed. `Done` is the only terminal
//! phase; a failed generation still ends in `Done` (the failure surfaces
//! through the error channel, not through the phase machine).

mod transitions;
mod types;

pub use transitions::{next_phase, TransitionError};
pub use types::{GenerationSession, SessionPhase};
