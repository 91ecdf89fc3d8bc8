//! Scriptable in-memory transport for tests.
//!
//! [`MockTransport`] answers each `open` call from a queue of
//! [`OpenPlan`]s: fail with a given error, open a session that replays
//! scripted events, or hang until cancelled. Opened sessions record
//! everything sent through their sink and can have further events pushed
//! live via [`MockSessionDriver::emit`].
//!
//! Used by this crate's tests and by downstream engine tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use vox_core::tools::ToolResponse;

use crate::transport::{
    ConnectRequest, ReasoningTransport, TransportError, TransportEvent, TransportSession,
    TransportSink,
};

/// What one `open` call should do.
pub enum OpenPlan {
    /// Fail with this error.
    Fail(TransportError),
    /// Open a session, queueing these events for immediate delivery.
    /// The session then stays open until closed or driven further.
    Open(Vec<TransportEvent>),
    /// Never resolve — exercises cancellation of in-flight opens.
    Hang,
}

impl OpenPlan {
    /// An open that delivers no scripted events.
    #[must_use]
    pub fn open() -> Self {
        Self::Open(Vec::new())
    }

    /// An open that delivers the given events, in order.
    #[must_use]
    pub fn open_with(events: Vec<TransportEvent>) -> Self {
        Self::Open(events)
    }
}

/// Something the manager sent through a session's sink.
#[derive(Clone, Debug, PartialEq)]
pub enum SentItem {
    /// `send_text` payload.
    Text(String),
    /// `send_tool_responses` payload.
    ToolResponses(Vec<ToolResponse>),
}

/// Handle to a session the mock has opened; lets tests drive events and
/// inspect outbound traffic.
#[derive(Clone)]
pub struct MockSessionDriver {
    events: mpsc::Sender<TransportEvent>,
    sent: Arc<Mutex<Vec<SentItem>>>,
    closed: Arc<AtomicBool>,
}

impl MockSessionDriver {
    /// Push an event into the live session.
    pub async fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event).await;
    }

    /// Everything sent through the sink so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentItem> {
        self.sent.lock().clone()
    }

    /// Whether the sink was closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Yield until at least `n` items have been sent.
    pub async fn wait_for_sent(&self, n: usize) {
        while self.sent.lock().len() < n {
            tokio::task::yield_now().await;
        }
    }
}

#[derive(Default)]
struct MockInner {
    plans: Mutex<VecDeque<OpenPlan>>,
    requests: Mutex<Vec<ConnectRequest>>,
    sessions: Mutex<Vec<MockSessionDriver>>,
}

/// Scriptable transport.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

impl MockTransport {
    /// New transport with an empty plan queue. Unplanned opens succeed
    /// with no scripted events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plan for the next unplanned `open` call.
    pub fn plan(&self, plan: OpenPlan) {
        self.inner.plans.lock().push_back(plan);
    }

    /// Shareable trait-object view for handing to a manager.
    #[must_use]
    pub fn shared(&self) -> Arc<dyn ReasoningTransport> {
        Arc::new(self.clone())
    }

    /// How many times `open` was called.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.inner.requests.lock().len()
    }

    /// All connect requests seen, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.inner.requests.lock().clone()
    }

    /// Driver for the `i`-th opened session.
    ///
    /// # Panics
    ///
    /// Panics when fewer than `i + 1` sessions were opened.
    #[must_use]
    pub fn session(&self, i: usize) -> MockSessionDriver {
        self.inner.sessions.lock()[i].clone()
    }
}

struct MockSink {
    sent: Arc<Mutex<Vec<SentItem>>>,
    closed: Arc<AtomicBool>,
    // Keeps the event channel open for the session's lifetime.
    _events: mpsc::Sender<TransportEvent>,
}

#[async_trait]
impl TransportSink for MockSink {
    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.sent.lock().push(SentItem::Text(text.to_owned()));
        Ok(())
    }

    async fn send_tool_responses(
        &self,
        responses: Vec<ToolResponse>,
    ) -> Result<(), TransportError> {
        self.sent.lock().push(SentItem::ToolResponses(responses));
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReasoningTransport for MockTransport {
    async fn open(&self, request: ConnectRequest) -> Result<TransportSession, TransportError> {
        self.inner.requests.lock().push(request);
        let plan = self
            .inner
            .plans
            .lock()
            .pop_front()
            .unwrap_or_else(|| OpenPlan::Open(Vec::new()));
        match plan {
            OpenPlan::Fail(err) => Err(err),
            OpenPlan::Hang => {
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
            OpenPlan::Open(events) => {
                let (tx, rx) = mpsc::channel(events.len() + 16);
                for event in events {
                    let _ = tx.try_send(event);
                }
                let sent = Arc::new(Mutex::new(Vec::new()));
                let closed = Arc::new(AtomicBool::new(false));
                self.inner.sessions.lock().push(MockSessionDriver {
                    events: tx.clone(),
                    sent: Arc::clone(&sent),
                    closed: Arc::clone(&closed),
                });
                Ok(TransportSession {
                    sink: Box::new(MockSink {
                        sent,
                        closed,
                        _events: tx,
                    }),
                    events: rx,
                })
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ConnectRequest {
        ConnectRequest {
            persona: vox_core::session::PersonaSpec {
                id: vox_core::ids::PersonaId::from("p"),
                display_name: "P".into(),
                system_prompt: String::new(),
                voice: "v".into(),
            },
            system_prompt: "s".into(),
            tool_declarations: vec![],
            resumption: None,
        }
    }

    #[tokio::test]
    async fn unplanned_open_succeeds() {
        let t = MockTransport::new();
        let session = t.open(request()).await.unwrap();
        assert_eq!(t.open_count(), 1);
        drop(session);
    }

    #[tokio::test]
    async fn fail_plan_fails() {
        let t = MockTransport::new();
        t.plan(OpenPlan::Fail(TransportError::connection("down")));
        let err = t.open(request()).await.unwrap_err();
        assert_eq!(err, TransportError::connection("down"));
    }

    #[tokio::test]
    async fn scripted_events_delivered_in_order() {
        let t = MockTransport::new();
        t.plan(OpenPlan::open_with(vec![
            TransportEvent::Transcript {
                text: "a".into(),
                is_user: false,
            },
            TransportEvent::Closed { reason: None },
        ]));
        let mut session = t.open(request()).await.unwrap();
        assert_eq!(
            session.events.recv().await,
            Some(TransportEvent::Transcript {
                text: "a".into(),
                is_user: false
            })
        );
        assert_eq!(
            session.events.recv().await,
            Some(TransportEvent::Closed { reason: None })
        );
    }

    #[tokio::test]
    async fn sink_records_and_closes() {
        let t = MockTransport::new();
        let session = t.open(request()).await.unwrap();
        session.sink.send_text("hello").await.unwrap();
        session.sink.close().await;

        let driver = t.session(0);
        assert_eq!(driver.sent(), vec![SentItem::Text("hello".into())]);
        assert!(driver.is_closed());
    }
}
