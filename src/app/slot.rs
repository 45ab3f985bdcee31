use tokio_util::sync::CancellationToken;

use super::state::RequestId;

/// Holder for the single in-flight relay request.
///
/// Acquiring a new request cancels and replaces the previous holder.
#[derive(Debug, Default)]
pub struct InFlight {
    last_id: RequestId,
    current: Option<(RequestId, CancellationToken)>,
}

impl InFlight {
    pub fn acquire(&mut self) -> (RequestId, CancellationToken) {
        self.cancel();
        self.last_id += 1;
        let token = CancellationToken::new();
        self.current = Some((self.last_id, token.clone()));
        (self.last_id, token)
    }

    /// Cancel the current holder, if any. Returns whether one existed.
    pub fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some((id, token)) => {
                log::debug!("Cancelling request {id}");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Free the slot after request `id` finished on its own.
    pub fn release(&mut self, id: RequestId) {
        if self.is_current(id) {
            self.current = None;
        }
    }

    pub fn is_current(&self, id: RequestId) -> bool {
        matches!(self.current, Some((current, _)) if current == id)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.cancel();
    }
}
