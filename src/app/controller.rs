use super::error::ClientError;
use super::event_handler::handle_client_event;
use super::pipeline::{dispatch_transform, RelayClient};
use super::slot::InFlight;
use super::state::{ClientEvent, RequestId, UiState};
use crate::languages;
use crate::prompt::{Mode, Style, TransformRequest};

/// Owns the UI state and the single in-flight relay request.
///
/// Must be used from within a tokio runtime; `submit` spawns the reader task.
pub struct Controller {
    state: UiState,
    slot: InFlight,
    client: RelayClient,
    sender: async_channel::Sender<ClientEvent>,
    receiver: async_channel::Receiver<ClientEvent>,
}

impl Controller {
    pub fn new(client: RelayClient) -> Self {
        let (sender, receiver) = async_channel::unbounded();
        Self {
            state: UiState::default(),
            slot: InFlight::default(),
            client,
            sender,
            receiver,
        }
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.state.input = text.into();
        self.state.char_count = self.state.input.chars().count();
    }

    pub fn set_style(&mut self, style: Style) {
        self.state.selections.style = style;
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.state.selections.mode = mode;
        self.sync_target();
    }

    pub fn set_source_language(&mut self, code: &str) -> Result<(), ClientError> {
        if !languages::is_valid_source(code) {
            return Err(ClientError::UnknownLanguage(code.to_string()));
        }
        self.state.selections.source_lang = code.to_string();
        self.sync_target();
        Ok(())
    }

    /// Ignored in Paraphrase mode, where the target follows the source.
    pub fn set_target_language(&mut self, code: &str) -> Result<(), ClientError> {
        if !languages::is_known(code) {
            return Err(ClientError::UnknownLanguage(code.to_string()));
        }
        if self.state.selections.mode == Mode::Paraphrase {
            log::debug!("Target language is locked to the source in Paraphrase mode");
            return Ok(());
        }
        self.state.selections.target_lang = code.to_string();
        Ok(())
    }

    fn sync_target(&mut self) {
        let sel = &mut self.state.selections;
        if sel.mode == Mode::Paraphrase {
            sel.target_lang = sel.effective_target().to_string();
        }
    }

    /// Start a relay request for the current input, replacing any request
    /// still in flight.
    pub fn submit(&mut self) -> Result<RequestId, ClientError> {
        if self.state.input.trim().is_empty() {
            return Err(ClientError::EmptyInput);
        }

        let (id, token) = self.slot.acquire();

        self.state.result.clear();
        self.state.error = None;
        self.state.incomplete = false;
        self.state.loading = true;
        self.state.streaming = true;

        let sel = &self.state.selections;
        let request = TransformRequest {
            text: self.state.input.clone(),
            source_lang: sel.source_lang.clone(),
            target_lang: sel.effective_target().to_string(),
            style: sel.style.clone(),
            mode: sel.mode,
        };
        log::info!("Submitting request {id} to {}", self.client.url());

        dispatch_transform(&self.client, request, id, token, self.sender.clone());
        Ok(id)
    }

    /// Abort the in-flight request and reset input, result, error and flags.
    /// Safe to call with nothing in flight.
    pub fn clear(&mut self) {
        self.slot.cancel();
        self.state.input.clear();
        self.state.char_count = 0;
        self.state.result.clear();
        self.state.error = None;
        self.state.incomplete = false;
        self.state.loading = false;
        self.state.streaming = false;
    }

    /// Stopping a request discards it entirely, input included.
    pub fn cancel(&mut self) {
        self.clear();
    }

    /// Wait for the next reader event and apply it.
    /// Returns false once no request is in flight.
    pub async fn pump(&mut self) -> bool {
        if !self.state.loading {
            return false;
        }
        match self.receiver.recv().await {
            Ok(event) => handle_client_event(&mut self.state, &mut self.slot, event),
            Err(_) => return false,
        }
        self.state.loading
    }

    /// Apply events until the current request finishes.
    pub async fn wait_until_settled(&mut self) {
        while self.pump().await {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::state::{FAILURE_MESSAGE, INCOMPLETE_MESSAGE};
    use crate::relay::STREAM_FAILURE_MESSAGE;
    use crate::testing::{spawn_relay, Script, ScriptedGenerator};
    use std::time::Duration;

    fn controller(url: &str) -> Controller {
        Controller::new(RelayClient::new(url))
    }

    #[tokio::test]
    async fn translate_end_to_end() {
        let generator = ScriptedGenerator::new().script("Hello world", Script::chunks(["Hola", " mundo"]));
        let (url, generator) = spawn_relay(generator).await;

        let mut ctl = controller(&url);
        ctl.set_input("Hello world");
        ctl.set_target_language("es").unwrap();
        ctl.set_style(Style::Formal);
        ctl.submit().unwrap();
        assert!(ctl.state().loading && ctl.state().streaming);

        let mut renders = Vec::new();
        while ctl.pump().await {
            renders.push(ctl.state().render());
        }
        renders.push(ctl.state().render());

        assert_eq!(renders, ["Hola▍", "Hola mundo▍", "Hola mundo"]);
        assert_eq!(ctl.state().result, "Hola mundo");
        assert_eq!(ctl.state().error, None);
        assert!(!ctl.state().loading && !ctl.state().streaming);

        let prompt = &generator.prompts()[0];
        assert!(prompt.contains("from the original language to es"));
        assert!(prompt.contains("formal"));
    }

    #[tokio::test]
    async fn resubmitting_discards_the_previous_request() {
        let generator = ScriptedGenerator::new()
            .script("first", Script::chunks(["A1", "A2", "A3"]).delay(Duration::from_millis(100)))
            .script("second", Script::chunks(["B1", "B2"]));
        let (url, _) = spawn_relay(generator).await;

        let mut ctl = controller(&url);
        ctl.set_target_language("es").unwrap();
        ctl.set_input("first");
        ctl.submit().unwrap();
        assert!(ctl.pump().await);
        assert_eq!(ctl.state().result, "A1");

        ctl.set_input("second");
        ctl.submit().unwrap();
        ctl.wait_until_settled().await;

        // give the superseded stream time to produce more chunks
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!ctl.pump().await);
        assert_eq!(ctl.state().result, "B1B2");
    }

    #[tokio::test]
    async fn clear_mid_stream_resets_everything() {
        let generator = ScriptedGenerator::new()
            .script("slow", Script::chunks(["x", "y"]).delay(Duration::from_millis(100)));
        let (url, _) = spawn_relay(generator).await;

        let mut ctl = controller(&url);
        ctl.set_target_language("de").unwrap();
        ctl.set_input("slow");
        ctl.submit().unwrap();
        assert!(ctl.pump().await);

        ctl.clear();
        assert_eq!(ctl.state().input, "");
        assert_eq!(ctl.state().char_count, 0);
        assert_eq!(ctl.state().result, "");
        assert!(!ctl.state().loading && !ctl.state().streaming);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!ctl.pump().await);
        assert_eq!(ctl.state().result, "");
        assert_eq!(ctl.state().error, None);
    }

    #[tokio::test]
    async fn cancel_and_clear_are_safe_when_idle() {
        let mut ctl = controller("http://127.0.0.1:9/api/paraphrase");
        ctl.clear();
        ctl.set_input("draft");
        ctl.cancel();
        assert_eq!(ctl.state(), &UiState::default());
        assert!(!ctl.pump().await);
    }

    #[tokio::test]
    async fn provider_error_frame_surfaces_and_keeps_partial_text() {
        let generator = ScriptedGenerator::new().script("Hello", Script::chunks(["Hol"]).fail_at_end());
        let (url, _) = spawn_relay(generator).await;

        let mut ctl = controller(&url);
        ctl.set_target_language("es").unwrap();
        ctl.set_input("Hello");
        ctl.submit().unwrap();
        ctl.wait_until_settled().await;

        assert_eq!(ctl.state().result, "Hol");
        assert_eq!(ctl.state().error.as_deref(), Some(STREAM_FAILURE_MESSAGE));
        assert!(!ctl.state().streaming);
    }

    #[tokio::test]
    async fn setup_failure_shows_generic_message() {
        let generator = ScriptedGenerator::new().script("Hello", Script::setup_error());
        let (url, _) = spawn_relay(generator).await;

        let mut ctl = controller(&url);
        ctl.set_target_language("es").unwrap();
        ctl.set_input("Hello");
        ctl.submit().unwrap();
        ctl.wait_until_settled().await;

        assert_eq!(ctl.state().error.as_deref(), Some(FAILURE_MESSAGE));
        assert_ne!(ctl.state().error.as_deref(), Some(INCOMPLETE_MESSAGE));
        assert!(!ctl.state().loading);
    }

    #[tokio::test]
    async fn paraphrase_sends_source_as_target() {
        let generator = ScriptedGenerator::new().script("Bonjour", Script::chunks(["Salut"]));
        let (url, generator) = spawn_relay(generator).await;

        let mut ctl = controller(&url);
        ctl.set_mode(Mode::Paraphrase);
        ctl.set_source_language("fr").unwrap();
        ctl.set_input("Bonjour");
        ctl.submit().unwrap();
        ctl.wait_until_settled().await;

        assert_eq!(ctl.state().result, "Salut");
        assert!(generator.prompts()[0].contains("Rewrite the following text in fr."));
    }

    #[test]
    fn paraphrase_locks_target_to_source() {
        let mut ctl = controller("http://unused");
        ctl.set_target_language("de").unwrap();
        ctl.set_source_language("fr").unwrap();

        ctl.set_mode(Mode::Paraphrase);
        assert_eq!(ctl.state().selections.target_lang, "fr");

        // target selector is frozen
        ctl.set_target_language("it").unwrap();
        assert_eq!(ctl.state().selections.target_lang, "fr");

        // follows the source
        ctl.set_source_language("ja").unwrap();
        assert_eq!(ctl.state().selections.target_lang, "ja");
        ctl.set_source_language("auto").unwrap();
        assert_eq!(ctl.state().selections.target_lang, "en");

        // Translate unfreezes it
        ctl.set_mode(Mode::Translate);
        ctl.set_target_language("it").unwrap();
        assert_eq!(ctl.state().selections.target_lang, "it");
    }

    #[test]
    fn rejects_unknown_languages_and_empty_input() {
        let mut ctl = controller("http://unused");
        assert!(matches!(ctl.set_source_language("xx"), Err(ClientError::UnknownLanguage(_))));
        assert!(matches!(ctl.set_target_language("auto"), Err(ClientError::UnknownLanguage(_))));
        ctl.set_input("   ");
        assert!(matches!(ctl.submit(), Err(ClientError::EmptyInput)));
        assert!(!ctl.state().loading);
    }

    #[test]
    fn char_count_tracks_input() {
        let mut ctl = controller("http://unused");
        ctl.set_input("héllo 世界");
        assert_eq!(ctl.state().char_count, 8);
    }
}
