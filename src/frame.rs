use crate::sse::SseEvent;

/// Payload of the terminal frame.
pub const DONE_MARKER: &str = "[DONE]";
/// SSE event name carrying a mid-stream failure.
pub const ERROR_EVENT: &str = "error";
/// Explicit name for chunk events that would otherwise read as the end marker.
pub const MESSAGE_EVENT: &str = "message";

/// One unit of the relay wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Chunk(String),
    Done,
    /// Provider failed mid-stream; no `Done` follows.
    Error(String),
}

impl StreamFrame {
    /// Encode as a complete SSE event (`data: ...\n\n`).
    ///
    /// Multi-line payloads become several `data:` lines of the same event.
    /// Line endings are normalised: a `\r` ending a line is dropped, so `\r\n`
    /// decodes as `\n` even when the two bytes arrive in separate chunks.
    /// A chunk whose text is exactly the end marker is sent as a named
    /// `message` event so it cannot end the stream.
    pub fn encode(&self) -> String {
        match self {
            StreamFrame::Chunk(text) if text.strip_suffix('\r').unwrap_or(text) == DONE_MARKER => {
                format!("event: {MESSAGE_EVENT}\n{}", data_lines(text))
            }
            StreamFrame::Chunk(text) => data_lines(text),
            StreamFrame::Done => data_lines(DONE_MARKER),
            StreamFrame::Error(message) => format!("event: {ERROR_EVENT}\n{}", data_lines(message)),
        }
    }

    /// Interpret a decoded SSE event. Events with an unknown name are ignored.
    ///
    /// Only an unnamed event carries the end marker.
    pub fn from_event(event: SseEvent) -> Option<Self> {
        match event.event.as_deref() {
            None if event.data == DONE_MARKER => Some(StreamFrame::Done),
            None | Some(MESSAGE_EVENT) => Some(StreamFrame::Chunk(event.data)),
            Some(ERROR_EVENT) => Some(StreamFrame::Error(event.data)),
            Some(other) => {
                log::debug!("Ignoring unknown event type: {other}");
                None
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamFrame::Chunk(_))
    }
}

fn data_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for line in text.split('\n') {
        out.push_str("data: ");
        out.push_str(line.strip_suffix('\r').unwrap_or(line));
        out.push('\n');
    }
    out.push('\n');
    out
}
