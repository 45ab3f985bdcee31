use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use super::error::ClientError;
use super::state::{ClientEvent, RequestId, FAILURE_MESSAGE};
use crate::frame::StreamFrame;
use crate::prompt::TransformRequest;
use crate::sse::SseDecoder;

/// HTTP handle on the relay endpoint.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    url: String,
}

impl RelayClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Spawn the reader task for request `id` on the tokio runtime.
pub fn dispatch_transform(
    client: &RelayClient,
    request: TransformRequest,
    id: RequestId,
    token: CancellationToken,
    sender: async_channel::Sender<ClientEvent>,
) -> tokio::task::JoinHandle<()> {
    let client = client.clone();

    tokio::spawn(async move {
        match stream_relay(&client, &request, id, &token, &sender).await {
            Ok(()) => {}
            Err(ClientError::Cancelled(id)) => {
                log::debug!("Request {id} aborted");
            }
            Err(e) => {
                log::error!("Error: {e}");
                let _ = sender
                    .send(ClientEvent::Failed(id, FAILURE_MESSAGE.to_string()))
                    .await;
            }
        }
    })
}

/// Read the relay response and forward each frame as it is decoded.
/// Stops at the first terminal frame.
async fn stream_relay(
    client: &RelayClient,
    request: &TransformRequest,
    id: RequestId,
    token: &CancellationToken,
    sender: &async_channel::Sender<ClientEvent>,
) -> Result<(), ClientError> {
    let send = client.http.post(&client.url).json(request).send();
    let resp = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(ClientError::Cancelled(id)),
        resp = send => resp?,
    };

    if !resp.status().is_success() {
        return Err(ClientError::Status(resp.status()));
    }

    let mut body = resp.bytes_stream();
    let mut decoder = SseDecoder::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ClientError::Cancelled(id)),
            next = body.next() => next,
        };
        let Some(bytes) = next else {
            break;
        };

        for event in decoder.push(&bytes?)? {
            if let Some(frame) = StreamFrame::from_event(event) {
                if forward(sender, id, frame).await {
                    return Ok(());
                }
            }
        }
    }

    if let Some(frame) = decoder.finish()?.and_then(StreamFrame::from_event) {
        if forward(sender, id, frame).await {
            return Ok(());
        }
    }

    let _ = sender.send(ClientEvent::Closed(id)).await;
    Ok(())
}

/// Returns true when reading should stop: terminal frame or controller gone.
async fn forward(sender: &async_channel::Sender<ClientEvent>, id: RequestId, frame: StreamFrame) -> bool {
    let terminal = frame.is_terminal();
    sender.send(ClientEvent::Frame(id, frame)).await.is_err() || terminal
}
