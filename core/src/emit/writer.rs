use std::io::Write;

use crate::error::EmitError;
use crate::preview::PreviewFrame;

use super::{FRAME_BASE64_END, FRAME_BASE64_START, FRAME_END, FRAME_HEADER_PREFIX};

/// Writes framed preview records to one or more text channels.
///
/// Channels receive byte-identical records. A single failing channel is
/// logged and skipped; emission fails only when every channel failed.
pub struct FrameWriter {
    channels: Vec<Box<dyn Write + Send>>,
}

impl FrameWriter {
    pub fn new(channels: Vec<Box<dyn Write + Send>>) -> Self {
        Self { channels }
    }

    /// Stdout only.
    pub fn stdout_only() -> Self {
        Self::new(vec![Box::new(std::io::stdout())])
    }

    /// Stdout plus a stderr mirror for redundancy.
    pub fn stdio() -> Self {
        Self::new(vec![
            Box::new(std::io::stdout()),
            Box::new(std::io::stderr()),
        ])
    }

    pub fn emit(&mut self, frame: &PreviewFrame) -> Result<(), EmitError> {
        let payload = frame.payload_base64();
        let mut wrote_any = false;

        for channel in self.channels.iter_mut() {
            match write_record(channel.as_mut(), frame.step, frame.total, payload) {
                Ok(()) => wrote_any = true,
                Err(e) => {
                    tracing::warn!(
                        error.kind = "emit.channel_failed",
                        error = %e,
                        "frame channel write failed"
                    );
                }
            }
        }

        if wrote_any {
            Ok(())
        } else {
            Err(EmitError::AllChannelsFailed)
        }
    }
}

fn write_record(
    w: &mut dyn Write,
    step: usize,
    total: usize,
    payload: &str,
) -> std::io::Result<()> {
    // Blank lines around the record keep it visually separable in a feed
    // that also carries ordinary log output.
    writeln!(w)?;
    writeln!(w, "{FRAME_HEADER_PREFIX} {step}/{total}")?;
    writeln!(w, "{FRAME_BASE64_START}")?;
    writeln!(w, "{payload}")?;
    writeln!(w, "{FRAME_BASE64_END}")?;
    writeln!(w, "{FRAME_END}")?;
    writeln!(w)?;
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct FailingChannel;

    impl Write for FailingChannel {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "down"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "down"))
        }
    }

    fn frame() -> PreviewFrame {
        PreviewFrame::new(3, 28, "data:image/png;base64,QUJD".to_string())
    }

    #[test]
    fn record_carries_all_sentinels_and_bare_payload() {
        let buf = SharedBuf::default();
        let mut w = FrameWriter::new(vec![Box::new(buf.clone())]);
        w.emit(&frame()).unwrap();

        let out = buf.contents();
        assert!(out.contains("[LIVE_PREVIEW] Step: 3/28\n"));
        assert!(out.contains("[LIVE_PREVIEW_BASE64_START]\nQUJD\n[LIVE_PREVIEW_BASE64_END]\n"));
        assert!(out.contains("[LIVE_PREVIEW_END]\n"));
        // The media-type prefix never reaches the wire.
        assert!(!out.contains("data:image/png"));
    }

    #[test]
    fn channels_receive_identical_records() {
        let a = SharedBuf::default();
        let b = SharedBuf::default();
        let mut w = FrameWriter::new(vec![Box::new(a.clone()), Box::new(b.clone())]);
        w.emit(&frame()).unwrap();
        assert_eq!(a.contents(), b.contents());
    }

    #[test]
    fn one_dead_channel_does_not_fail_emission() {
        let buf = SharedBuf::default();
        let mut w = FrameWriter::new(vec![Box::new(FailingChannel), Box::new(buf.clone())]);
        w.emit(&frame()).unwrap();
        assert!(buf.contents().contains("QUJD"));
    }

    #[test]
    fn all_dead_channels_fail_emission() {
        let mut w = FrameWriter::new(vec![Box::new(FailingChannel)]);
        assert!(matches!(
            w.emit(&frame()),
            Err(EmitError::AllChannelsFailed)
        ));
    }
}
