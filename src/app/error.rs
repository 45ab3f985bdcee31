use super::state::RequestId;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Superseded or cleared; never shown to the user.
    #[error("request {0} was cancelled")]
    Cancelled(RequestId),
    #[error("relay responded with {0}")]
    Status(reqwest::StatusCode),
    #[error("relay transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("relay stream is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),
    #[error("nothing to process: input is empty")]
    EmptyInput,
    #[error("unknown language code: {0}")]
    UnknownLanguage(String),
}
