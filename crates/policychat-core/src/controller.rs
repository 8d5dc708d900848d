//! Drives a [`Conversation`] against a [`ChatEndpoint`]
//!
//! `submit` applies the optimistic update synchronously and runs the
//! endpoint call on the tokio runtime. The outcome comes back over a
//! channel owned by the controller and is applied by `try_reconcile` (from a
//! UI tick) or `reconcile_next` (awaiting). If the controller is dropped
//! first, the receiver goes with it and the late outcome is discarded.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::conversation::{Conversation, RequestToken, SendOutcome};
use crate::endpoint::ChatEndpoint;
use crate::error::SendFailure;
use crate::state::Message;

struct Completion {
    token: RequestToken,
    outcome: SendOutcome,
}

pub struct ConversationController {
    conversation: Conversation,
    endpoint: Arc<dyn ChatEndpoint>,
    timeout: Option<Duration>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

impl ConversationController {
    pub fn new(endpoint: Arc<dyn ChatEndpoint>) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            conversation: Conversation::new(),
            endpoint,
            timeout: None,
            completion_tx,
            completion_rx,
        }
    }

    /// Fail requests that take longer than `timeout`. Without this a request
    /// that never resolves keeps the controller busy.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn transcript(&self) -> &[Message] {
        self.conversation.transcript()
    }

    pub fn draft(&self) -> &str {
        self.conversation.draft()
    }

    pub fn is_busy(&self) -> bool {
        self.conversation.is_busy()
    }

    pub fn update_draft(&mut self, text: impl Into<String>) {
        self.conversation.update_draft(text);
    }

    /// Submit the current draft. Returns whether it was accepted.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self) -> bool {
        let Some(pending) = self.conversation.begin_submit() else {
            tracing::debug!("submit ignored: draft empty or request in flight");
            return false;
        };
        tracing::debug!(chars = pending.content.chars().count(), "sending chat message");

        let endpoint = Arc::clone(&self.endpoint);
        let timeout = self.timeout;
        let tx = self.completion_tx.clone();
        let token = pending.token;
        let content = pending.content;

        tokio::spawn(async move {
            // Run the call in its own task so a panicking endpoint still
            // produces an outcome.
            let call = tokio::spawn(async move {
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, endpoint.send(&content))
                        .await
                        .unwrap_or_else(|_| {
                            Err(SendFailure::timeout(format!(
                                "no reply within {}s",
                                limit.as_secs_f32()
                            )))
                        }),
                    None => endpoint.send(&content).await,
                }
            });

            let outcome = match call.await {
                Ok(outcome) => outcome,
                Err(e) => Err(SendFailure::transport(format!("request task failed: {e}"))),
            };

            if tx.send(Completion { token, outcome }).is_err() {
                tracing::debug!("controller dropped before reply arrived; discarding");
            }
        });

        true
    }

    /// Apply any outcomes that have already arrived. Never blocks.
    pub fn try_reconcile(&mut self) -> bool {
        let mut applied = false;
        while let Ok(completion) = self.completion_rx.try_recv() {
            applied |= self.apply(completion);
        }
        applied
    }

    /// Wait for the outstanding request and apply its outcome.
    ///
    /// Returns `false` immediately when nothing is in flight.
    pub async fn reconcile_next(&mut self) -> bool {
        while self.is_busy() {
            match self.completion_rx.recv().await {
                Some(completion) => {
                    if self.apply(completion) {
                        return true;
                    }
                }
                None => return false,
            }
        }
        false
    }

    fn apply(&mut self, completion: Completion) -> bool {
        if let Err(failure) = &completion.outcome {
            tracing::warn!(kind = ?failure.kind, "chat request failed: {}", failure.message);
        }
        let applied = self
            .conversation
            .complete_submit(completion.token, completion.outcome);
        if !applied {
            tracing::debug!("ignoring outcome for a request that is no longer in flight");
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Role, FALLBACK_TEXT, GREETING};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    /// Endpoint whose replies are released by the test, one per call
    #[derive(Default)]
    struct ScriptedEndpoint {
        calls: AtomicUsize,
        sent: Mutex<Vec<String>>,
        gates: Mutex<Vec<oneshot::Receiver<SendOutcome>>>,
    }

    impl ScriptedEndpoint {
        fn gate(&self) -> oneshot::Sender<SendOutcome> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().push(rx);
            tx
        }
    }

    #[async_trait]
    impl ChatEndpoint for ScriptedEndpoint {
        async fn send(&self, message: &str) -> Result<String, SendFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sent.lock().unwrap().push(message.to_string());
            let gate = self.gates.lock().unwrap().remove(0);
            gate.await
                .unwrap_or_else(|_| Err(SendFailure::transport("gate dropped")))
        }
    }

    struct PanickingEndpoint;

    #[async_trait]
    impl ChatEndpoint for PanickingEndpoint {
        async fn send(&self, _message: &str) -> Result<String, SendFailure> {
            panic!("endpoint blew up");
        }
    }

    struct HangingEndpoint;

    #[async_trait]
    impl ChatEndpoint for HangingEndpoint {
        async fn send(&self, _message: &str) -> Result<String, SendFailure> {
            std::future::pending().await
        }
    }

    fn controller(endpoint: &Arc<ScriptedEndpoint>) -> ConversationController {
        ConversationController::new(endpoint.clone() as Arc<dyn ChatEndpoint>)
    }

    #[tokio::test]
    async fn test_fresh_controller_state() {
        let endpoint = Arc::new(ScriptedEndpoint::default());
        let ctrl = controller(&endpoint);

        assert_eq!(ctrl.transcript(), &[Message::assistant(GREETING)]);
        assert!(!ctrl.is_busy());
        assert_eq!(ctrl.draft(), "");
    }

    #[tokio::test]
    async fn test_success_scenario() {
        let endpoint = Arc::new(ScriptedEndpoint::default());
        let reply = endpoint.gate();
        let mut ctrl = controller(&endpoint);

        ctrl.update_draft("What is covered under policy X?");
        assert!(ctrl.submit());

        assert_eq!(ctrl.transcript().len(), 2);
        assert_eq!(
            ctrl.transcript()[1],
            Message::user("What is covered under policy X?")
        );
        assert!(ctrl.is_busy());
        assert_eq!(ctrl.draft(), "");

        reply.send(Ok("Policy X covers ...".to_string())).unwrap();
        assert!(ctrl.reconcile_next().await);

        assert_eq!(ctrl.transcript().len(), 3);
        assert_eq!(
            ctrl.transcript().last().unwrap(),
            &Message::assistant("Policy X covers ...")
        );
        assert!(!ctrl.is_busy());
        assert_eq!(
            endpoint.sent.lock().unwrap().as_slice(),
            ["What is covered under policy X?"]
        );
    }

    #[tokio::test]
    async fn test_failure_scenario() {
        let endpoint = Arc::new(ScriptedEndpoint::default());
        let reply = endpoint.gate();
        let mut ctrl = controller(&endpoint);

        ctrl.update_draft("What is covered under policy X?");
        ctrl.submit();
        reply
            .send(Err(SendFailure::transport("connection refused")))
            .unwrap();
        ctrl.reconcile_next().await;

        assert_eq!(ctrl.transcript().len(), 3);
        let last = ctrl.transcript().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, FALLBACK_TEXT);
        assert!(!ctrl.is_busy());
    }

    #[tokio::test]
    async fn test_submit_while_busy_is_noop() {
        let endpoint = Arc::new(ScriptedEndpoint::default());
        let reply = endpoint.gate();
        let mut ctrl = controller(&endpoint);

        ctrl.update_draft("first");
        assert!(ctrl.submit());
        ctrl.update_draft("second");
        assert!(!ctrl.submit());
        assert!(!ctrl.submit());

        assert_eq!(ctrl.transcript().len(), 2);
        assert_eq!(ctrl.draft(), "second");
        assert!(ctrl.is_busy());

        reply.send(Ok("done".into())).unwrap();
        ctrl.reconcile_next().await;
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctrl.draft(), "second");
    }

    #[tokio::test]
    async fn test_blank_draft_is_noop() {
        let endpoint = Arc::new(ScriptedEndpoint::default());
        let mut ctrl = controller(&endpoint);

        ctrl.update_draft("   ");
        assert!(!ctrl.submit());
        assert_eq!(ctrl.transcript().len(), 1);
        assert_eq!(ctrl.draft(), "   ");
        assert!(!ctrl.is_busy());
        assert!(!ctrl.reconcile_next().await);
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_try_reconcile_before_and_after_reply() {
        let endpoint = Arc::new(ScriptedEndpoint::default());
        let reply = endpoint.gate();
        let mut ctrl = controller(&endpoint);

        ctrl.update_draft("hello");
        ctrl.submit();
        assert!(!ctrl.try_reconcile());
        assert!(ctrl.is_busy());

        reply.send(Ok("hi there".into())).unwrap();
        // Give the request task a chance to deliver
        for _ in 0..100 {
            if ctrl.try_reconcile() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!ctrl.is_busy());
        assert_eq!(ctrl.transcript().last().unwrap(), &Message::assistant("hi there"));
    }

    #[tokio::test]
    async fn test_conversation_continues_after_failure() {
        let endpoint = Arc::new(ScriptedEndpoint::default());
        let first = endpoint.gate();
        let second = endpoint.gate();
        let mut ctrl = controller(&endpoint);

        ctrl.update_draft("one");
        ctrl.submit();
        first.send(Err(SendFailure::status("503"))).unwrap();
        ctrl.reconcile_next().await;

        ctrl.update_draft("two");
        assert!(ctrl.submit());
        second.send(Ok("answer two".into())).unwrap();
        ctrl.reconcile_next().await;

        let roles: Vec<Role> = ctrl.transcript().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::Assistant, Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(ctrl.transcript()[2].content, FALLBACK_TEXT);
        assert_eq!(ctrl.transcript()[4].content, "answer two");
    }

    #[tokio::test]
    async fn test_panicking_endpoint_clears_busy() {
        let mut ctrl = ConversationController::new(Arc::new(PanickingEndpoint));

        ctrl.update_draft("hello");
        ctrl.submit();
        assert!(ctrl.reconcile_next().await);

        assert!(!ctrl.is_busy());
        assert_eq!(ctrl.transcript().last().unwrap().content, FALLBACK_TEXT);
    }

    #[tokio::test]
    async fn test_timeout_takes_fallback_path() {
        let mut ctrl = ConversationController::new(Arc::new(HangingEndpoint))
            .with_timeout(Some(Duration::from_millis(20)));

        ctrl.update_draft("hello");
        ctrl.submit();
        assert!(ctrl.reconcile_next().await);

        assert!(!ctrl.is_busy());
        assert_eq!(ctrl.transcript().last().unwrap().content, FALLBACK_TEXT);
    }

    #[tokio::test]
    async fn test_reply_after_drop_is_discarded() {
        let endpoint = Arc::new(ScriptedEndpoint::default());
        let reply = endpoint.gate();
        let mut ctrl = controller(&endpoint);

        ctrl.update_draft("hello");
        ctrl.submit();
        drop(ctrl);

        // The request task finishes against a closed channel without panicking
        reply.send(Ok("too late".into())).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
    }
}
