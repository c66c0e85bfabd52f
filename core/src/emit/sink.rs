use std::sync::{Mutex, PoisonError};

use crate::hook::PreviewSubscriber;
use crate::preview::PreviewFrame;

use super::writer::FrameWriter;

/// The preview route that turns notifications into framed channel records.
/// Steps without a frame are silently skipped — absence of a preview is not
/// an event worth emitting.
pub struct EmitSubscriber {
    writer: Mutex<FrameWriter>,
}

impl EmitSubscriber {
    pub fn new(writer: FrameWriter) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn stdio() -> Self {
        Self::new(FrameWriter::stdio())
    }

    pub fn stdout_only() -> Self {
        Self::new(FrameWriter::stdout_only())
    }
}

impl PreviewSubscriber for EmitSubscriber {
    fn name(&self) -> &str {
        "live-preview-emit"
    }

    fn on_step(
        &self,
        _step: usize,
        _total: usize,
        frame: Option<&PreviewFrame>,
    ) -> anyhow::Result<()> {
        let Some(frame) = frame else {
            return Ok(());
        };
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .emit(frame)?;
        Ok(())
    }
}
