//! Framed output emission and the matching line-oriented parser.
//!
//! One frame is a sentinel-framed record so a downstream consumer can pull
//! preview images out of a live log feed that also carries unrelated lines:
//!
//! ```text
//! [LIVE_PREVIEW] Step: 3/28
//! [LIVE_PREVIEW_BASE64_START]
//! <base64 payload>
//! [LIVE_PREVIEW_BASE64_END]
//! [LIVE_PREVIEW_END]
//! ```
//!
//! Writes are synchronous and flushed per frame: the consumer reads the
//! channel while the producing generation call is still blocked.

mod parser;
mod sink;
mod writer;

pub use parser::{extract_frames, FrameParser, ParsedFrame};
pub use sink::EmitSubscriber;
pub use writer::FrameWriter;

pub const FRAME_HEADER_PREFIX: &str = "[LIVE_PREVIEW] Step:";
pub const FRAME_BASE64_START: &str = "[LIVE_PREVIEW_BASE64_START]";
pub const FRAME_BASE64_END: &str = "[LIVE_PREVIEW_BASE64_END]";
pub const FRAME_END: &str = "[LIVE_PREVIEW_END]";
