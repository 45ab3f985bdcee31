use std::future::Future;
use std::pin::Pin;

use anyhow::{anyhow, bail, Context, Result};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::sse::SseDecoder;

/// Lazy, finite sequence of generated text chunks in arrival order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A provider that can start an incremental generation from one instruction.
pub trait TextGenerator: Send + Sync + 'static {
    fn generate_stream(&self, instruction: String) -> impl Future<Output = Result<ChunkStream>> + Send;
}

/// Gemini request types
#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

/// One streamed Gemini response object.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct GeminiChunk {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<GeminiError>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CandidatePart {
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
}

/// Header carrying the API key, so the key never appears in a URL.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Streaming client for the Gemini `streamGenerateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.gemini_api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}:streamGenerateContent?alt=sse", self.base_url, self.model)
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl TextGenerator for GeminiClient {
    async fn generate_stream(&self, instruction: String) -> Result<ChunkStream> {
        if self.api_key.is_empty() {
            bail!("No Gemini API key configured");
        }

        let body = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part { text: instruction }],
            }],
        };

        let resp = self
            .http
            .post(self.url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!(e.without_url()))
            .context("Failed to send request to Gemini API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Gemini API error {status}: {text}");
        }

        let mut body = resp.bytes_stream();
        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            while let Some(next) = body.next().await {
                let bytes = match next {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(anyhow!(e.without_url()).context("Failed to read Gemini stream"));
                        return;
                    }
                };
                let events = match decoder.push(&bytes) {
                    Ok(events) => events,
                    Err(e) => {
                        yield Err(anyhow!(e).context("Gemini stream is not valid UTF-8"));
                        return;
                    }
                };
                for event in events {
                    match chunk_text(&event.data) {
                        Ok(Some(text)) => yield Ok(text),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
            match decoder.finish() {
                Ok(Some(event)) => match chunk_text(&event.data) {
                    Ok(Some(text)) => yield Ok(text),
                    Ok(None) => {}
                    Err(e) => yield Err(e),
                },
                Ok(None) => {}
                Err(e) => yield Err(anyhow!(e).context("Gemini stream is not valid UTF-8")),
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Extract the generated text from one streamed response object.
fn chunk_text(data: &str) -> Result<Option<String>> {
    let chunk: GeminiChunk =
        serde_json::from_str(data).context("Malformed Gemini stream event")?;

    if let Some(err) = chunk.error {
        bail!("Gemini stream error: {}", err.message);
    }
    if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
        bail!("Prompt blocked by Gemini: {reason}");
    }

    let text: String = chunk
        .candidates
        .into_iter()
        .next()
        .map(|c| c.content.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    Ok((!text.is_empty()).then_some(text))
}
