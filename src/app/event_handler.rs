use super::slot::InFlight;
use super::state::{ClientEvent, RequestId, UiState, INCOMPLETE_MESSAGE};
use crate::frame::StreamFrame;

/// Apply a reader event to the UI state. This is the core state machine.
///
/// Events from any request other than the current holder of the slot are
/// dropped, so a cancelled request can never touch the state again.
pub fn handle_client_event(state: &mut UiState, slot: &mut InFlight, event: ClientEvent) {
    let id = event.request_id();
    if !slot.is_current(id) {
        log::debug!("Dropping event for superseded request {id}");
        return;
    }

    match event {
        ClientEvent::Frame(_, StreamFrame::Chunk(text)) => {
            state.result.push_str(&text);
        }
        ClientEvent::Frame(_, StreamFrame::Done) => {
            log::info!("Request {id} complete ({} chars)", state.result.chars().count());
            finish(state, slot, id);
        }
        ClientEvent::Frame(_, StreamFrame::Error(message)) => {
            log::warn!("Relay reported a failure: {message}");
            state.error = Some(message);
            finish(state, slot, id);
        }
        ClientEvent::Failed(_, message) => {
            state.error = Some(message);
            finish(state, slot, id);
        }
        ClientEvent::Closed(_) => {
            log::warn!("Request {id} closed without a terminal frame");
            state.incomplete = true;
            state.error = Some(INCOMPLETE_MESSAGE.to_string());
            finish(state, slot, id);
        }
    }
}

fn finish(state: &mut UiState, slot: &mut InFlight, id: RequestId) {
    state.loading = false;
    state.streaming = false;
    slot.release(id);
}
