mod controller;
mod error;
mod event_handler;
mod pipeline;
mod slot;
mod state;

pub use controller::Controller;
pub use error::ClientError;
pub use pipeline::RelayClient;
pub use state::{RequestId, Selections, UiState};
