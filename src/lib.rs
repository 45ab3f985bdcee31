//! Translate or paraphrase text through Gemini and relay the output as a
//! live event stream.
//!
//! The relay side lives in [`relay`] and [`gemini`]; the client side, which
//! decodes the stream into an incrementally updated [`app::UiState`], lives
//! in [`app`]. Both speak the framing defined in [`frame`].

pub mod app;
pub mod clipboard;
pub mod config;
pub mod frame;
pub mod gemini;
pub mod languages;
pub mod prompt;
pub mod relay;
pub mod sse;
#[cfg(test)]
mod testing;
pub mod ui;
