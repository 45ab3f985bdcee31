use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::net::TcpListener;

use crate::frame::StreamFrame;
use crate::gemini::{ChunkStream, TextGenerator};
use crate::languages::AUTO;
use crate::prompt::{Mode, TransformRequest};

/// Path of the streaming transform endpoint.
pub const TRANSFORM_PATH: &str = "/api/paraphrase";

/// Message sent in the error frame when the provider fails mid-stream.
pub const STREAM_FAILURE_MESSAGE: &str = "Generation failed before completion";

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("provider setup failed: {0:#}")]
    Provider(anyhow::Error),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            RelayError::InvalidRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            RelayError::Provider(e) => {
                log::error!("API error: {e:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to process".to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Shared handler state: the provider used for every request.
pub struct RelayState<G> {
    generator: Arc<G>,
}

impl<G> Clone for RelayState<G> {
    fn clone(&self) -> Self {
        Self {
            generator: self.generator.clone(),
        }
    }
}

pub fn router<G: TextGenerator>(generator: Arc<G>) -> Router {
    Router::new()
        .route(TRANSFORM_PATH, post(transform::<G>))
        .route("/health", get(health_check))
        .with_state(RelayState { generator })
}

/// Serve the relay on an already-bound listener until the process exits.
pub async fn serve<G: TextGenerator>(listener: TcpListener, generator: Arc<G>) -> anyhow::Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    log::info!("Relay listening on http://{addr}{TRANSFORM_PATH}");
    axum::serve(listener, router(generator))
        .await
        .context("Relay server stopped")
}

async fn health_check() -> &'static str {
    "OK"
}

async fn transform<G: TextGenerator>(
    State(state): State<RelayState<G>>,
    payload: Result<Json<TransformRequest>, JsonRejection>,
) -> Result<Response, RelayError> {
    let Json(request) = payload.map_err(|e| RelayError::InvalidRequest(e.body_text()))?;
    validate(&request)?;

    log::info!(
        "{} request: {} -> {}, style={}, {} chars",
        request.mode,
        request.source_lang,
        request.target_lang,
        request.style,
        request.text.chars().count()
    );

    let chunks = state
        .generator
        .generate_stream(request.instruction())
        .await
        .map_err(RelayError::Provider)?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(relay_frames(chunks)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

fn validate(request: &TransformRequest) -> Result<(), RelayError> {
    if request.text.trim().is_empty() {
        return Err(RelayError::InvalidRequest("text must not be empty".into()));
    }
    if request.mode == Mode::Translate && request.target_lang == AUTO {
        return Err(RelayError::InvalidRequest(
            "targetLang must name a language in Translate mode".into(),
        ));
    }
    Ok(())
}

/// Re-frame provider chunks one at a time; the next chunk is only pulled once
/// the body has taken the previous frame.
fn relay_frames(mut chunks: ChunkStream) -> impl Stream<Item = Result<String, Infallible>> {
    async_stream::stream! {
        let mut count = 0usize;
        while let Some(next) = chunks.next().await {
            match next {
                Ok(text) if text.is_empty() => {}
                Ok(text) => {
                    count += 1;
                    yield Ok(StreamFrame::Chunk(text).encode());
                }
                Err(e) => {
                    log::error!("Streaming error after {count} chunks: {e:#}");
                    yield Ok(StreamFrame::Error(STREAM_FAILURE_MESSAGE.to_string()).encode());
                    return;
                }
            }
        }
        log::info!("Stream complete ({count} chunks)");
        yield Ok(StreamFrame::Done.encode());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{spawn_relay, Script, ScriptedGenerator};
    use serde_json::{json, Value};

    async fn post(url: &str, body: Value) -> reqwest::Response {
        reqwest::Client::new().post(url).json(&body).send().await.unwrap()
    }

    #[tokio::test]
    async fn streams_chunks_then_done() {
        let generator = ScriptedGenerator::new().script("Hello", Script::chunks(["Hola", " mundo", "", "!"]));
        let (url, generator) = spawn_relay(generator).await;

        let resp = post(
            &url,
            json!({"text": "Hello world", "sourceLang": "auto", "targetLang": "es", "style": "Formal", "mode": "Translate"}),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(
            resp.text().await.unwrap(),
            "data: Hola\n\ndata:  mundo\n\ndata: !\n\ndata: [DONE]\n\n"
        );

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("from the original language to es"));
        assert!(prompts[0].contains("Use formal, polite, and refined language"));
    }

    #[tokio::test]
    async fn provider_failure_mid_stream_sends_error_frame_without_done() {
        let generator = ScriptedGenerator::new().script("Hello", Script::chunks(["Hola"]).fail_at_end());
        let (url, _) = spawn_relay(generator).await;

        let body = post(&url, json!({"text": "Hello", "targetLang": "es", "mode": "Translate"}))
            .await
            .text()
            .await
            .unwrap();
        assert_eq!(body, format!("data: Hola\n\nevent: error\ndata: {STREAM_FAILURE_MESSAGE}\n\n"));
        assert!(!body.contains("[DONE]"));
    }

    #[tokio::test]
    async fn setup_failure_is_a_plain_json_error() {
        let generator = ScriptedGenerator::new().script("Hello", Script::setup_error());
        let (url, _) = spawn_relay(generator).await;

        let resp = post(&url, json!({"text": "Hello", "targetLang": "es", "mode": "Translate"})).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"error": "Failed to process"}));
    }

    #[tokio::test]
    async fn invalid_payloads_never_reach_the_provider() {
        let (url, generator) = spawn_relay(ScriptedGenerator::new()).await;

        for body in [
            json!({"text": "Hello"}),
            json!({"mode": "Paraphrase"}),
            json!({"text": "   ", "mode": "Paraphrase"}),
            json!({"text": "Hello", "mode": "Translate", "targetLang": "auto"}),
        ] {
            let resp = post(&url, body).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let err: Value = resp.json().await.unwrap();
            assert!(err["error"].is_string());
        }
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn unknown_style_uses_neutral_clause() {
        let generator = ScriptedGenerator::new().script("Bonjour", Script::chunks(["Salut"]));
        let (url, generator) = spawn_relay(generator).await;

        let resp = post(
            &url,
            json!({"text": "Bonjour", "sourceLang": "fr", "targetLang": "fr", "style": "Pirate", "mode": "Paraphrase"}),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "data: Salut\n\ndata: [DONE]\n\n");
        assert!(generator.prompts()[0].contains("Rewrite the following text in fr. Use natural language."));
    }

    #[tokio::test]
    async fn health_check_answers() {
        let (url, _) = spawn_relay(ScriptedGenerator::new()).await;
        let health = url.replace(TRANSFORM_PATH, "/health");
        let body = reqwest::get(health).await.unwrap().text().await.unwrap();
        assert_eq!(body, "OK");
    }
}
