//! Connection manager: owns the duplex stream to the remote reasoning
//! service.
//!
//! One supervisor task per connected stream drives the state machine
//!
//! ```text
//! Idle -> Connecting -> Connected -> (Reconnecting -> Connecting)* -> Terminated
//! ```
//!
//! `Connected -> Reconnecting` happens on any close or error that is not
//! a user-initiated disconnect and not an auth rejection. Reconnects are
//! scheduled with capped exponential backoff and replay a condensed
//! resumption context so the remote model regains continuity. Auth
//! errors are never retried; exceeding the attempt cap reports
//! `ConnectionExhausted` upward and terminates.
//!
//! Every update published to the engine carries the fencing token that
//! was current when `connect` was called, so the engine's dispatch loop
//! can drop anything from a superseded stream.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use vox_core::errors::StreamError;
use vox_core::fencing::FencingToken;
use vox_core::retry::backoff_delay_ms;
use vox_core::session::{PersonaSpec, SessionMode};
use vox_core::tools::{ToolCall, ToolDeclaration, ToolResponse};
use vox_core::transcript::{Role, TranscriptLog};

use crate::transport::{
    ConnectRequest, ReasoningTransport, ResumptionContext, TransportError, TransportErrorKind,
    TransportEvent, TransportSession,
};

// ─────────────────────────────────────────────────────────────────────────────
// Policy and spec
// ─────────────────────────────────────────────────────────────────────────────

/// Reconnect behavior knobs.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    /// Base backoff delay in ms.
    pub base_delay_ms: u64,
    /// Backoff delay cap in ms.
    pub max_delay_ms: u64,
    /// Reconnect attempts before giving up.
    pub max_attempts: u32,
    /// Transcript turns replayed as resumption context.
    pub resumption_tail_turns: usize,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: vox_core::retry::DEFAULT_BASE_DELAY_MS,
            max_delay_ms: vox_core::retry::DEFAULT_MAX_DELAY_MS,
            max_attempts: vox_core::retry::DEFAULT_MAX_ATTEMPTS,
            resumption_tail_turns: 6,
        }
    }
}

/// Everything the manager needs to open (and reopen) a stream.
#[derive(Clone, Debug)]
pub struct ConnectSpec {
    /// Remote model configuration.
    pub persona: PersonaSpec,
    /// System prompt for the session.
    pub system_prompt: String,
    /// Capabilities advertised to the model.
    pub tool_declarations: Vec<ToolDeclaration>,
    /// Session mode, included in resumption context.
    pub mode: SessionMode,
}

// ─────────────────────────────────────────────────────────────────────────────
// State and updates
// ─────────────────────────────────────────────────────────────────────────────

/// Connection state machine position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnState {
    /// No stream yet.
    Idle,
    /// Opening the transport.
    Connecting,
    /// Stream live.
    Connected,
    /// Waiting out a backoff delay.
    Reconnecting,
    /// Stream is gone for good (disconnect, auth failure, exhaustion).
    Terminated,
}

/// One update published to the engine, tagged with the fencing token
/// captured at `connect` time.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamUpdate {
    /// Token current when the stream was initiated.
    pub token: FencingToken,
    /// What happened.
    pub kind: StreamUpdateKind,
}

/// What a [`StreamUpdate`] reports.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamUpdateKind {
    /// Stream opened. `attempt` is 0 for the initial connect, else the
    /// 1-based count of reconnects it took.
    Opened {
        /// Reconnect count for this open.
        attempt: u32,
    },
    /// Incremental transcript text.
    TranscriptDelta {
        /// Who authored it.
        role: Role,
        /// Text fragment.
        text: String,
    },
    /// The remote model requested local capabilities.
    ToolCalls {
        /// Requested calls, in arrival order.
        calls: Vec<ToolCall>,
    },
    /// A reconnect was scheduled after a drop.
    Reconnecting {
        /// Zero-based reconnect attempt index.
        attempt: u32,
        /// Backoff delay preceding the attempt.
        delay_ms: u64,
        /// Why the stream dropped.
        reason: String,
    },
    /// User-initiated teardown finished.
    Disconnected,
    /// Unrecoverable stream failure (auth or exhaustion).
    Fatal {
        /// The failure.
        error: StreamError,
    },
}

/// Commands from the handle to the supervisor.
enum Command {
    SendText(String),
    SendToolResponses(Vec<ToolResponse>),
}

// ─────────────────────────────────────────────────────────────────────────────
// StreamHandle
// ─────────────────────────────────────────────────────────────────────────────

/// Caller-facing handle to a connected stream.
///
/// Cheap to clone. All operations are safe on a dead stream — they
/// degrade to no-ops, matching the fencing model where a stale handle
/// must never corrupt anything.
#[derive(Clone)]
pub struct StreamHandle {
    token: FencingToken,
    cmd_tx: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    state: watch::Receiver<ConnState>,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("token", &self.token)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl StreamHandle {
    /// The fencing token captured when this stream was initiated.
    #[must_use]
    pub fn token(&self) -> FencingToken {
        self.token
    }

    /// Current state machine position.
    #[must_use]
    pub fn state(&self) -> ConnState {
        *self.state.borrow()
    }

    /// Watch state transitions (for hosts showing a liveness indicator).
    #[must_use]
    pub fn state_watch(&self) -> watch::Receiver<ConnState> {
        self.state.clone()
    }

    /// Inject a user-authored message. No-op when the stream is not live.
    pub fn send_text(&self, text: impl Into<String>) {
        if self.state() == ConnState::Terminated {
            debug!("send_text on terminated stream, dropping");
            return;
        }
        let _ = self.cmd_tx.send(Command::SendText(text.into()));
    }

    /// Return results for previously received tool calls.
    pub fn send_tool_responses(&self, responses: Vec<ToolResponse>) {
        if self.state() == ConnState::Terminated {
            debug!("send_tool_responses on terminated stream, dropping");
            return;
        }
        let _ = self.cmd_tx.send(Command::SendToolResponses(responses));
    }

    /// Tear down the stream. Idempotent; always wins over any pending
    /// reconnect.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConnectionManager
// ─────────────────────────────────────────────────────────────────────────────

/// Opens streams and supervises their lifetime.
pub struct ConnectionManager {
    transport: Arc<dyn ReasoningTransport>,
    policy: ReconnectPolicy,
}

impl ConnectionManager {
    /// Create a manager over a transport collaborator.
    #[must_use]
    pub fn new(transport: Arc<dyn ReasoningTransport>, policy: ReconnectPolicy) -> Self {
        Self { transport, policy }
    }

    /// Open a stream and spawn its supervisor.
    ///
    /// The initial open is awaited here: an auth rejection or transport
    /// failure surfaces as an error to the caller (auth is never
    /// retried; the caller re-invokes `connect` after re-authorizing).
    /// Once open, drops are handled by the supervisor's backoff loop and
    /// reported through `updates`.
    #[instrument(skip(self, spec, updates), fields(persona = %spec.persona.id, %token))]
    pub async fn connect(
        &self,
        spec: ConnectSpec,
        token: FencingToken,
        updates: mpsc::Sender<StreamUpdate>,
    ) -> Result<StreamHandle, StreamError> {
        let request = ConnectRequest {
            persona: spec.persona.clone(),
            system_prompt: spec.system_prompt.clone(),
            tool_declarations: spec.tool_declarations.clone(),
            resumption: None,
        };
        let session = self.transport.open(request).await.map_err(|e| {
            warn!(error = %e, "initial connect failed");
            StreamError::from(e)
        })?;
        info!("stream connected");

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(ConnState::Connected);

        let supervisor = Supervisor {
            transport: Arc::clone(&self.transport),
            policy: self.policy.clone(),
            spec,
            token,
            updates,
            commands: cmd_rx,
            cancel: cancel.clone(),
            state: state_tx,
            transcript: TranscriptLog::new(),
        };
        drop(tokio::spawn(supervisor.run(session)));

        Ok(StreamHandle {
            token,
            cmd_tx,
            cancel,
            state: state_rx,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Supervisor
// ─────────────────────────────────────────────────────────────────────────────

/// Why a pump loop ended.
enum PumpOutcome {
    /// `disconnect()` or handle dropped.
    UserDisconnect,
    /// Stream dropped; reconnect is allowed.
    Lost(String),
    /// Auth rejection mid-stream; never retried.
    AuthFatal(String),
}

struct Supervisor {
    transport: Arc<dyn ReasoningTransport>,
    policy: ReconnectPolicy,
    spec: ConnectSpec,
    token: FencingToken,
    updates: mpsc::Sender<StreamUpdate>,
    commands: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
    state: watch::Sender<ConnState>,
    /// Local fold of the transcript, kept for resumption context only —
    /// the engine owns the authoritative log.
    transcript: TranscriptLog,
}

impl Supervisor {
    async fn run(mut self, first: TransportSession) {
        if !self.publish(StreamUpdateKind::Opened { attempt: 0 }).await {
            self.finish();
            return;
        }

        let mut session = first;
        let mut attempt: u32 = 0;
        loop {
            match self.pump(session).await {
                PumpOutcome::UserDisconnect => {
                    let _ = self.publish(StreamUpdateKind::Disconnected).await;
                    self.finish();
                    return;
                }
                PumpOutcome::AuthFatal(message) => {
                    warn!(%message, "auth rejected mid-stream, not retrying");
                    let _ = self
                        .publish(StreamUpdateKind::Fatal {
                            error: StreamError::Auth { message },
                        })
                        .await;
                    self.finish();
                    return;
                }
                PumpOutcome::Lost(mut reason) => {
                    counter!("vox_stream_drops_total").increment(1);
                    // Reconnect loop: schedule backoff, reopen, repeat on
                    // failed reopens until the cap or a success.
                    let resumption = self.resumption_context();
                    session = loop {
                        if attempt >= self.policy.max_attempts {
                            info!(attempts = attempt, "reconnect attempts exhausted");
                            let _ = self
                                .publish(StreamUpdateKind::Fatal {
                                    error: StreamError::Exhausted { attempts: attempt },
                                })
                                .await;
                            self.finish();
                            return;
                        }
                        let delay_ms = backoff_delay_ms(
                            attempt,
                            self.policy.base_delay_ms,
                            self.policy.max_delay_ms,
                        );
                        counter!("vox_stream_reconnects_total").increment(1);
                        debug!(attempt, delay_ms, %reason, "scheduling reconnect");
                        if !self
                            .publish(StreamUpdateKind::Reconnecting {
                                attempt,
                                delay_ms,
                                reason: reason.clone(),
                            })
                            .await
                        {
                            self.finish();
                            return;
                        }
                        self.set_state(ConnState::Reconnecting);
                        if !self.backoff_wait(delay_ms).await {
                            let _ = self.publish(StreamUpdateKind::Disconnected).await;
                            self.finish();
                            return;
                        }
                        attempt += 1;

                        self.set_state(ConnState::Connecting);
                        let request = ConnectRequest {
                            persona: self.spec.persona.clone(),
                            system_prompt: self.spec.system_prompt.clone(),
                            tool_declarations: self.spec.tool_declarations.clone(),
                            resumption: Some(resumption.clone()),
                        };
                        // Disconnect wins over an in-flight reopen.
                        let opened = tokio::select! {
                            () = self.cancel.cancelled() => {
                                let _ = self.publish(StreamUpdateKind::Disconnected).await;
                                self.finish();
                                return;
                            }
                            opened = self.transport.open(request) => opened,
                        };
                        match opened {
                            Ok(s) => {
                                info!(attempt, "stream reconnected");
                                self.set_state(ConnState::Connected);
                                if !self.publish(StreamUpdateKind::Opened { attempt }).await {
                                    self.finish();
                                    return;
                                }
                                attempt = 0;
                                break s;
                            }
                            Err(e) if e.kind == TransportErrorKind::Auth => {
                                warn!(error = %e, "auth rejected on reconnect, not retrying");
                                let _ = self
                                    .publish(StreamUpdateKind::Fatal {
                                        error: StreamError::from(e),
                                    })
                                    .await;
                                self.finish();
                                return;
                            }
                            Err(e) => {
                                debug!(error = %e, attempt, "reconnect attempt failed");
                                reason = e.message;
                            }
                        }
                    };
                }
            }
        }
    }

    /// Forward events and commands for one live session until it ends.
    async fn pump(&mut self, session: TransportSession) -> PumpOutcome {
        let TransportSession { sink, mut events } = session;
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    sink.close().await;
                    return PumpOutcome::UserDisconnect;
                }
                cmd = self.commands.recv() => match cmd {
                    Some(Command::SendText(text)) => {
                        if let Err(e) = sink.send_text(&text).await {
                            warn!(error = %e, "send_text failed");
                        }
                    }
                    Some(Command::SendToolResponses(responses)) => {
                        if let Err(e) = sink.send_tool_responses(responses).await {
                            warn!(error = %e, "send_tool_responses failed");
                        }
                    }
                    None => {
                        // Every handle dropped — same as disconnect.
                        sink.close().await;
                        return PumpOutcome::UserDisconnect;
                    }
                },
                event = events.recv() => match event {
                    Some(TransportEvent::Transcript { text, is_user }) => {
                        let role = if is_user { Role::User } else { Role::Agent };
                        self.transcript.append(role, &text);
                        if !self
                            .publish(StreamUpdateKind::TranscriptDelta { role, text })
                            .await
                        {
                            return PumpOutcome::UserDisconnect;
                        }
                    }
                    Some(TransportEvent::ToolCalls(calls)) => {
                        if !self.publish(StreamUpdateKind::ToolCalls { calls }).await {
                            return PumpOutcome::UserDisconnect;
                        }
                    }
                    Some(TransportEvent::Closed { reason }) => {
                        return PumpOutcome::Lost(
                            reason.unwrap_or_else(|| "stream closed".to_owned()),
                        );
                    }
                    Some(TransportEvent::Error(e)) => {
                        return if e.kind == TransportErrorKind::Auth {
                            PumpOutcome::AuthFatal(e.message)
                        } else {
                            PumpOutcome::Lost(e.message)
                        };
                    }
                    None => return PumpOutcome::Lost("event channel ended".to_owned()),
                },
            }
        }
    }

    /// Sleep out a backoff delay. Commands arriving meanwhile are
    /// dropped; the stream is down and they must not replay after the
    /// reconnect. Returns `false` when cancelled.
    async fn backoff_wait(&mut self, delay_ms: u64) -> bool {
        let sleep = tokio::time::sleep(Duration::from_millis(delay_ms));
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return false,
                () = &mut sleep => return true,
                cmd = self.commands.recv() => match cmd {
                    Some(Command::SendText(_)) => {
                        debug!("dropping send_text while reconnecting");
                    }
                    Some(Command::SendToolResponses(_)) => {
                        debug!("dropping tool responses while reconnecting");
                    }
                    None => return false,
                },
            }
        }
    }

    fn resumption_context(&self) -> ResumptionContext {
        ResumptionContext {
            mode: self.spec.mode,
            turns: self.transcript.tail(self.policy.resumption_tail_turns).to_vec(),
        }
    }

    /// Publish an update. Returns `false` when the engine is gone.
    async fn publish(&self, kind: StreamUpdateKind) -> bool {
        self.updates
            .send(StreamUpdate {
                token: self.token,
                kind,
            })
            .await
            .is_ok()
    }

    fn set_state(&self, state: ConnState) {
        let _ = self.state.send_replace(state);
    }

    fn finish(&self) {
        self.set_state(ConnState::Terminated);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockTransport, OpenPlan, SentItem};
    use assert_matches::assert_matches;
    use vox_core::fencing::FencingUnit;
    use vox_core::ids::{PersonaId, ToolCallId};

    fn spec() -> ConnectSpec {
        ConnectSpec {
            persona: PersonaSpec {
                id: PersonaId::from("interviewer"),
                display_name: "Interviewer".into(),
                system_prompt: String::new(),
                voice: "aria".into(),
            },
            system_prompt: "You are a technical interviewer.".into(),
            tool_declarations: vec![ToolDeclaration::no_args(
                "get_current_code",
                "Read the editor buffer",
            )],
            mode: SessionMode::Assessment,
        }
    }

    fn token() -> FencingToken {
        FencingUnit::new().issue()
    }

    async fn next_kind(rx: &mut mpsc::Receiver<StreamUpdate>) -> StreamUpdateKind {
        rx.recv().await.expect("update stream ended").kind
    }

    #[tokio::test(start_paused = true)]
    async fn connect_publishes_opened() {
        let transport = MockTransport::new();
        transport.plan(OpenPlan::open());
        let manager = ConnectionManager::new(transport.shared(), ReconnectPolicy::default());
        let (tx, mut rx) = mpsc::channel(64);

        let handle = manager.connect(spec(), token(), tx).await.unwrap();
        assert_matches!(
            next_kind(&mut rx).await,
            StreamUpdateKind::Opened { attempt: 0 }
        );
        assert_eq!(handle.state(), ConnState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn initial_auth_error_is_not_retried() {
        let transport = MockTransport::new();
        transport.plan(OpenPlan::Fail(TransportError::auth("key expired")));
        let manager = ConnectionManager::new(transport.shared(), ReconnectPolicy::default());
        let (tx, _rx) = mpsc::channel(64);

        let err = manager.connect(spec(), token(), tx).await.unwrap_err();
        assert_matches!(err, StreamError::Auth { .. });
        assert_eq!(transport.open_count(), 1, "auth must not trigger a retry");
    }

    #[tokio::test(start_paused = true)]
    async fn initial_connection_error_surfaces() {
        let transport = MockTransport::new();
        transport.plan(OpenPlan::Fail(TransportError::connection("unreachable")));
        let manager = ConnectionManager::new(transport.shared(), ReconnectPolicy::default());
        let (tx, _rx) = mpsc::channel(64);

        let err = manager.connect(spec(), token(), tx).await.unwrap_err();
        assert_matches!(err, StreamError::Connection { .. });
    }

    #[tokio::test(start_paused = true)]
    async fn transcript_deltas_forwarded_with_roles() {
        let transport = MockTransport::new();
        transport.plan(OpenPlan::open_with(vec![
            TransportEvent::Transcript {
                text: "Tell me".into(),
                is_user: false,
            },
            TransportEvent::Transcript {
                text: " about yourself.".into(),
                is_user: false,
            },
            TransportEvent::Transcript {
                text: "I build ".into(),
                is_user: true,
            },
        ]));
        let manager = ConnectionManager::new(transport.shared(), ReconnectPolicy::default());
        let (tx, mut rx) = mpsc::channel(64);
        let _handle = manager.connect(spec(), token(), tx).await.unwrap();

        assert_matches!(next_kind(&mut rx).await, StreamUpdateKind::Opened { .. });
        assert_matches!(
            next_kind(&mut rx).await,
            StreamUpdateKind::TranscriptDelta { role: Role::Agent, text } if text == "Tell me"
        );
        assert_matches!(
            next_kind(&mut rx).await,
            StreamUpdateKind::TranscriptDelta { role: Role::Agent, .. }
        );
        assert_matches!(
            next_kind(&mut rx).await,
            StreamUpdateKind::TranscriptDelta { role: Role::User, .. }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn tool_calls_forwarded() {
        let call = ToolCall {
            id: ToolCallId::from("tc-1"),
            name: "get_current_code".into(),
            arguments: serde_json::Map::new(),
        };
        let transport = MockTransport::new();
        transport.plan(OpenPlan::open_with(vec![TransportEvent::ToolCalls(vec![
            call.clone(),
        ])]));
        let manager = ConnectionManager::new(transport.shared(), ReconnectPolicy::default());
        let (tx, mut rx) = mpsc::channel(64);
        let _handle = manager.connect(spec(), token(), tx).await.unwrap();

        assert_matches!(next_kind(&mut rx).await, StreamUpdateKind::Opened { .. });
        assert_matches!(
            next_kind(&mut rx).await,
            StreamUpdateKind::ToolCalls { calls } if calls == vec![call]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_close_with_resumption_context() {
        let transport = MockTransport::new();
        transport.plan(OpenPlan::open_with(vec![
            TransportEvent::Transcript {
                text: "First question.".into(),
                is_user: false,
            },
            TransportEvent::Closed {
                reason: Some("server hiccup".into()),
            },
        ]));
        transport.plan(OpenPlan::open());
        let manager = ConnectionManager::new(transport.shared(), ReconnectPolicy::default());
        let (tx, mut rx) = mpsc::channel(64);
        let _handle = manager.connect(spec(), token(), tx).await.unwrap();

        assert_matches!(
            next_kind(&mut rx).await,
            StreamUpdateKind::Opened { attempt: 0 }
        );
        assert_matches!(next_kind(&mut rx).await, StreamUpdateKind::TranscriptDelta { .. });
        assert_matches!(
            next_kind(&mut rx).await,
            StreamUpdateKind::Reconnecting { attempt: 0, delay_ms: 2000, reason } if reason == "server hiccup"
        );
        assert_matches!(
            next_kind(&mut rx).await,
            StreamUpdateKind::Opened { attempt: 1 }
        );

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].resumption.is_none());
        let resumption = requests[1].resumption.as_ref().expect("resumption context");
        assert_eq!(resumption.mode, SessionMode::Assessment);
        assert_eq!(resumption.turns.len(), 1);
        assert_eq!(resumption.turns[0].text, "First question.");
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_schedule_and_exhaustion() {
        let transport = MockTransport::new();
        transport.plan(OpenPlan::open_with(vec![TransportEvent::Closed {
            reason: None,
        }]));
        for _ in 0..5 {
            transport.plan(OpenPlan::Fail(TransportError::connection("still down")));
        }
        let manager = ConnectionManager::new(transport.shared(), ReconnectPolicy::default());
        let (tx, mut rx) = mpsc::channel(64);
        let _handle = manager.connect(spec(), token(), tx).await.unwrap();

        assert_matches!(next_kind(&mut rx).await, StreamUpdateKind::Opened { .. });

        // min(2000 * 2^n, 10000) for n = 0..5; attempt 5 is never made.
        let mut delays = Vec::new();
        loop {
            match next_kind(&mut rx).await {
                StreamUpdateKind::Reconnecting { attempt, delay_ms, .. } => {
                    assert_eq!(attempt as usize, delays.len());
                    delays.push(delay_ms);
                }
                StreamUpdateKind::Fatal { error } => {
                    assert_eq!(error, StreamError::Exhausted { attempts: 5 });
                    break;
                }
                other => panic!("unexpected update: {other:?}"),
            }
        }
        assert_eq!(delays, vec![2000, 4000, 8000, 10_000, 10_000]);
        // Initial open + 5 reconnect attempts, never a 6th.
        assert_eq!(transport.open_count(), 6);
        assert!(rx.recv().await.is_none(), "supervisor ended");
    }

    #[tokio::test(start_paused = true)]
    async fn auth_error_mid_session_is_fatal_without_reconnect() {
        let transport = MockTransport::new();
        transport.plan(OpenPlan::open_with(vec![TransportEvent::Error(
            TransportError::auth("token revoked"),
        )]));
        let manager = ConnectionManager::new(transport.shared(), ReconnectPolicy::default());
        let (tx, mut rx) = mpsc::channel(64);
        let handle = manager.connect(spec(), token(), tx).await.unwrap();

        assert_matches!(next_kind(&mut rx).await, StreamUpdateKind::Opened { .. });
        assert_matches!(
            next_kind(&mut rx).await,
            StreamUpdateKind::Fatal { error: StreamError::Auth { .. } }
        );
        assert!(rx.recv().await.is_none(), "no reconnect scheduled");
        assert_eq!(transport.open_count(), 1);

        // Wait for the supervisor's final state write to land.
        let mut state = handle.state_watch();
        while *state.borrow() != ConnState::Terminated {
            state.changed().await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_is_idempotent() {
        let transport = MockTransport::new();
        transport.plan(OpenPlan::open());
        let manager = ConnectionManager::new(transport.shared(), ReconnectPolicy::default());
        let (tx, mut rx) = mpsc::channel(64);
        let handle = manager.connect(spec(), token(), tx).await.unwrap();
        assert_matches!(next_kind(&mut rx).await, StreamUpdateKind::Opened { .. });

        handle.disconnect();
        handle.disconnect();

        assert_matches!(next_kind(&mut rx).await, StreamUpdateKind::Disconnected);
        assert!(rx.recv().await.is_none());
        assert!(transport.session(0).is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_wins_over_pending_reconnect() {
        let transport = MockTransport::new();
        transport.plan(OpenPlan::open_with(vec![TransportEvent::Closed {
            reason: None,
        }]));
        // The reopen hangs forever; only cancellation can finish it.
        transport.plan(OpenPlan::Hang);
        let manager = ConnectionManager::new(transport.shared(), ReconnectPolicy::default());
        let (tx, mut rx) = mpsc::channel(64);
        let handle = manager.connect(spec(), token(), tx).await.unwrap();

        assert_matches!(next_kind(&mut rx).await, StreamUpdateKind::Opened { .. });
        assert_matches!(next_kind(&mut rx).await, StreamUpdateKind::Reconnecting { .. });

        handle.disconnect();
        assert_matches!(next_kind(&mut rx).await, StreamUpdateKind::Disconnected);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn send_text_reaches_sink() {
        let transport = MockTransport::new();
        transport.plan(OpenPlan::open());
        let manager = ConnectionManager::new(transport.shared(), ReconnectPolicy::default());
        let (tx, mut rx) = mpsc::channel(64);
        let handle = manager.connect(spec(), token(), tx).await.unwrap();
        assert_matches!(next_kind(&mut rx).await, StreamUpdateKind::Opened { .. });

        handle.send_text("I think the answer is O(n log n).");
        let session = transport.session(0);
        session.wait_for_sent(1).await;
        assert_eq!(
            session.sent(),
            vec![SentItem::Text("I think the answer is O(n log n).".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn tool_responses_reach_sink() {
        let transport = MockTransport::new();
        transport.plan(OpenPlan::open());
        let manager = ConnectionManager::new(transport.shared(), ReconnectPolicy::default());
        let (tx, mut rx) = mpsc::channel(64);
        let handle = manager.connect(spec(), token(), tx).await.unwrap();
        assert_matches!(next_kind(&mut rx).await, StreamUpdateKind::Opened { .. });

        let response = ToolResponse::ok(
            ToolCallId::from("tc-1"),
            "get_current_code",
            serde_json::json!("print('hi')"),
        );
        handle.send_tool_responses(vec![response.clone()]);
        let session = transport.session(0);
        session.wait_for_sent(1).await;
        assert_eq!(session.sent(), vec![SentItem::ToolResponses(vec![response])]);
    }

    #[tokio::test(start_paused = true)]
    async fn handle_ops_after_termination_are_noops() {
        let transport = MockTransport::new();
        transport.plan(OpenPlan::open());
        let manager = ConnectionManager::new(transport.shared(), ReconnectPolicy::default());
        let (tx, mut rx) = mpsc::channel(64);
        let handle = manager.connect(spec(), token(), tx).await.unwrap();
        assert_matches!(next_kind(&mut rx).await, StreamUpdateKind::Opened { .. });

        handle.disconnect();
        assert_matches!(next_kind(&mut rx).await, StreamUpdateKind::Disconnected);

        let mut state = handle.state_watch();
        while *state.borrow() != ConnState::Terminated {
            state.changed().await.unwrap();
        }
        // Must not panic or resurrect anything.
        handle.send_text("anyone there?");
        handle.send_tool_responses(vec![]);
        handle.disconnect();
    }

    #[tokio::test(start_paused = true)]
    async fn updates_carry_the_connect_token() {
        let transport = MockTransport::new();
        transport.plan(OpenPlan::open());
        let manager = ConnectionManager::new(transport.shared(), ReconnectPolicy::default());
        let (tx, mut rx) = mpsc::channel(64);
        let unit = FencingUnit::new();
        let tok = unit.issue();
        let handle = manager.connect(spec(), tok, tx).await.unwrap();

        let update = rx.recv().await.unwrap();
        assert_eq!(update.token, tok);
        assert_eq!(handle.token(), tok);
    }
}
