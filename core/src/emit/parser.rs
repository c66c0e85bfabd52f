use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::EmitError;
use crate::preview::strip_data_url_prefix;

use super::{FRAME_BASE64_END, FRAME_BASE64_START, FRAME_END, FRAME_HEADER_PREFIX};

/// One frame recovered from a log feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame {
    pub step: usize,
    pub total: usize,
    pub payload: String,
}

impl ParsedFrame {
    /// Decode the payload back to PNG bytes. Accepts payloads with or
    /// without the `data:image/png;base64,` prefix.
    pub fn decode_png(&self) -> Result<Vec<u8>, EmitError> {
        Ok(STANDARD.decode(strip_data_url_prefix(self.payload.trim()))?)
    }
}

enum ParserState {
    /// Looking for a frame header.
    Scanning,
    /// Header seen; waiting for the payload start sentinel.
    AwaitStart { step: usize, total: usize },
    /// Inside the payload block, collecting lines until the end sentinel.
    Payload {
        step: usize,
        total: usize,
        lines: Vec<String>,
    },
}

/// Line-oriented streaming extractor for framed preview records.
///
/// Feed it every line of the combined output feed; unrelated log lines are
/// ignored, truncated records are abandoned when the next header appears.
pub struct FrameParser {
    state: ParserState,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Scanning,
        }
    }

    pub fn push_line(&mut self, line: &str) -> Option<ParsedFrame> {
        let trimmed = line.trim_end_matches(['\r', '\n']);

        // A header line restarts recognition from any state, which drops
        // truncated records instead of corrupting the next one.
        if let Some(rest) = trimmed.strip_prefix(FRAME_HEADER_PREFIX) {
            match parse_header(rest) {
                Some((step, total)) => {
                    self.state = ParserState::AwaitStart { step, total };
                }
                None => {
                    tracing::debug!(
                        error.kind = "frames.malformed_header",
                        line = %trimmed,
                        "ignoring malformed frame header"
                    );
                    self.state = ParserState::Scanning;
                }
            }
            return None;
        }

        match &mut self.state {
            ParserState::Scanning => None,
            ParserState::AwaitStart { step, total } => {
                if trimmed == FRAME_BASE64_START {
                    self.state = ParserState::Payload {
                        step: *step,
                        total: *total,
                        lines: Vec::new(),
                    };
                }
                // Anything else between header and start is unrelated noise.
                None
            }
            ParserState::Payload { step, total, lines } => {
                if trimmed == FRAME_BASE64_END {
                    let frame = ParsedFrame {
                        step: *step,
                        total: *total,
                        payload: lines.concat(),
                    };
                    self.state = ParserState::Scanning;
                    return Some(frame);
                }
                if trimmed == FRAME_END {
                    // End marker before the payload closed: malformed record.
                    tracing::debug!(
                        error.kind = "frames.truncated_record",
                        "dropping record with unterminated payload"
                    );
                    self.state = ParserState::Scanning;
                    return None;
                }
                if !trimmed.is_empty() {
                    lines.push(trimmed.to_string());
                }
                None
            }
        }
    }
}

fn parse_header(rest: &str) -> Option<(usize, usize)> {
    let (step, total) = rest.trim().split_once('/')?;
    Some((
        step.trim().parse::<usize>().ok()?,
        total.trim().parse::<usize>().ok()?,
    ))
}

/// Parse a complete feed in one go.
pub fn extract_frames(input: &str) -> Vec<ParsedFrame> {
    let mut parser = FrameParser::new();
    input
        .lines()
        .filter_map(|line| parser.push_line(line))
        .collect()
}
