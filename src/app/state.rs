use crate::frame::StreamFrame;
use crate::languages::{AUTO, DEFAULT_LANGUAGE};
use crate::prompt::{Mode, Style};

/// Identifies one submission; events from older ids are stale.
pub type RequestId = u64;

/// Shown after the result while chunks are still arriving.
pub const CURSOR: char = '▍';

/// Generic message for read, decode and status failures.
pub const FAILURE_MESSAGE: &str = "Failed to process text";

/// Shown when the connection closed before the terminal frame.
pub const INCOMPLETE_MESSAGE: &str = "The response ended before it was complete";

/// Events sent from the relay reader task to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Frame(RequestId, StreamFrame),
    /// Transport, status or decode failure.
    Failed(RequestId, String),
    /// Body ended without a terminal frame.
    Closed(RequestId),
}

impl ClientEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            ClientEvent::Frame(id, _) | ClientEvent::Failed(id, _) | ClientEvent::Closed(id) => *id,
        }
    }
}

/// User-chosen options.
#[derive(Debug, Clone, PartialEq)]
pub struct Selections {
    pub mode: Mode,
    pub source_lang: String,
    pub target_lang: String,
    pub style: Style,
}

impl Default for Selections {
    fn default() -> Self {
        Self {
            mode: Mode::Translate,
            source_lang: AUTO.into(),
            target_lang: DEFAULT_LANGUAGE.into(),
            style: Style::Formal,
        }
    }
}

impl Selections {
    /// Target actually sent: Paraphrase always stays in the source language.
    pub fn effective_target(&self) -> &str {
        match self.mode {
            Mode::Paraphrase if self.source_lang == AUTO => DEFAULT_LANGUAGE,
            Mode::Paraphrase => self.source_lang.as_str(),
            Mode::Translate => self.target_lang.as_str(),
        }
    }
}

/// Everything the frontend renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiState {
    pub input: String,
    /// Concatenation of the current request's chunks, in arrival order.
    pub result: String,
    pub loading: bool,
    pub streaming: bool,
    pub error: Option<String>,
    /// Set when the stream closed without `[DONE]`.
    pub incomplete: bool,
    pub char_count: usize,
    pub selections: Selections,
}

impl UiState {
    /// The result as displayed, with a cursor while streaming.
    pub fn render(&self) -> String {
        let mut out = self.result.clone();
        if self.streaming {
            out.push(CURSOR);
        }
        out
    }
}
