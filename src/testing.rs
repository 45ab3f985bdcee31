//! Scripted provider and relay harness shared by the test modules.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use crate::gemini::{ChunkStream, TextGenerator};
use crate::relay::{router, TRANSFORM_PATH};

/// What the scripted provider does for a matching instruction.
#[derive(Debug, Clone, Default)]
pub struct Script {
    chunks: Vec<String>,
    delay: Duration,
    fail_at_end: bool,
    setup_error: bool,
}

impl Script {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn setup_error() -> Self {
        Self {
            setup_error: true,
            ..Self::default()
        }
    }

    /// Pause before every chunk.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail after the last chunk instead of ending normally.
    pub fn fail_at_end(mut self) -> Self {
        self.fail_at_end = true;
        self
    }
}

/// Provider whose output is picked by a substring of the instruction.
#[derive(Default)]
pub struct ScriptedGenerator {
    scripts: Vec<(String, Script)>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, needle: &str, script: Script) -> Self {
        self.scripts.push((needle.to_string(), script));
        self
    }

    /// Every instruction received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl TextGenerator for ScriptedGenerator {
    async fn generate_stream(&self, instruction: String) -> Result<ChunkStream> {
        self.prompts.lock().unwrap().push(instruction.clone());

        let Some((_, script)) = self.scripts.iter().find(|(needle, _)| instruction.contains(needle.as_str())) else {
            bail!("no script for instruction");
        };
        if script.setup_error {
            bail!("provider unavailable");
        }

        let script = script.clone();
        Ok(Box::pin(async_stream::stream! {
            for chunk in script.chunks {
                if !script.delay.is_zero() {
                    tokio::time::sleep(script.delay).await;
                }
                yield Ok(chunk);
            }
            if script.fail_at_end {
                yield Err(anyhow!("provider exploded"));
            }
        }))
    }
}

/// Serve a relay backed by `generator` on an ephemeral port.
/// Returns the transform endpoint URL and a handle to the generator.
pub async fn spawn_relay(generator: ScriptedGenerator) -> (String, Arc<ScriptedGenerator>) {
    let generator = Arc::new(generator);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(generator.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}{TRANSFORM_PATH}"), generator)
}
