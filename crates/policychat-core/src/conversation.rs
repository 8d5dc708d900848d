//! Synchronous conversation state machine
//!
//! A submission is split in two phases. [`Conversation::begin_submit`]
//! applies the optimistic update (user message, cleared draft, busy) and
//! hands back a [`PendingSend`]. Whoever performs the request later calls
//! [`Conversation::complete_submit`] with the same token and the outcome.
//! Only the token of the request currently in flight is accepted, which is
//! what keeps at most one request outstanding.

use crate::error::SendFailure;
use crate::state::{Message, FALLBACK_TEXT, GREETING};

/// Result of one endpoint call
pub type SendOutcome = Result<String, SendFailure>;

/// Identifies one submission cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

/// A message accepted for sending, waiting for its outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub token: RequestToken,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    transcript: Vec<Message>,
    draft: String,
    in_flight: Option<RequestToken>,
    next_token: u64,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            transcript: vec![Message::assistant(GREETING)],
            draft: String::new(),
            in_flight: None,
            next_token: 0,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn update_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Accept the draft for sending.
    ///
    /// Returns `None` without touching any state when the draft is blank or
    /// a request is already outstanding. The draft is sent as typed; trimming
    /// only decides whether it counts as empty.
    pub fn begin_submit(&mut self) -> Option<PendingSend> {
        if self.is_busy() || self.draft.trim().is_empty() {
            return None;
        }

        let content = std::mem::take(&mut self.draft);
        self.transcript.push(Message::user(content.clone()));

        let token = RequestToken(self.next_token);
        self.next_token += 1;
        self.in_flight = Some(token);

        Some(PendingSend { token, content })
    }

    /// Reconcile the outcome of the request identified by `token`.
    ///
    /// Returns `false` and changes nothing if `token` is not the request in
    /// flight (already completed, or never issued by this conversation).
    pub fn complete_submit(&mut self, token: RequestToken, outcome: SendOutcome) -> bool {
        if self.in_flight != Some(token) {
            return false;
        }
        self.in_flight = None;

        let reply = match outcome {
            Ok(text) => Message::assistant(text),
            Err(_) => Message::assistant(FALLBACK_TEXT),
        };
        self.transcript.push(reply);
        true
    }
}
