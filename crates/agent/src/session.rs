//! Conversation session: the turn-taking state machine.
//!
//! Each session is an actor task that owns its state, history and pending
//! queue. Callers talk to it through a cloneable [`SessionHandle`].
//!
//! ```text
//! Idle --start--> Connecting --ready--> Active/Listening
//! Active/Listening --input--> Active/Generating --reply--> Active/Speaking
//! Active/Speaking --spoken--> Active/Listening
//! any --stop--> Ended
//! ```
//!
//! At most one generation is in flight. Input that arrives while the
//! session is busy (or before it is active) is queued or rejected per
//! [`InterruptPolicy`]. Generation and playback run as child tasks under a
//! [`CancellationToken`]; `stop` cancels them and the actor exits, so a
//! late completion can never move the state or reach the output channel.

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::sync::Arc;

use parley_core::channel::{OutputChannel, UserInput};
use parley_core::error::{ChannelError, SessionError};
use parley_core::event::{DomainEvent, EventBus, UtteranceKind, preview};
use parley_core::message::{History, SessionId};
use parley_core::session::{
    ActivePhase, InterruptPolicy, QueueOrdering, SessionMode, SessionState,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{TurnEngine, TurnError, TurnReply};

const COMMAND_BUFFER: usize = 32;

const LISTENING: SessionState = SessionState::Active(ActivePhase::Listening);
const GENERATING: SessionState = SessionState::Active(ActivePhase::Generating);
const SPEAKING: SessionState = SessionState::Active(ActivePhase::Speaking);

/// Turn-taking behaviour for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub mode: SessionMode,
    pub interrupt_policy: InterruptPolicy,
    pub ordering: QueueOrdering,
    /// Queue bound under FIFO ordering.
    pub max_pending: usize,
    pub greet_on_voice: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            mode: SessionMode::Text,
            interrupt_policy: InterruptPolicy::Queue,
            ordering: QueueOrdering::Fifo,
            max_pending: 8,
            greet_on_voice: true,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &parley_config::SessionConfig, mode: SessionMode) -> Self {
        Self {
            mode,
            interrupt_policy: config.interrupt_policy,
            ordering: config.ordering,
            max_pending: config.max_pending,
            greet_on_voice: config.greet_on_voice,
        }
    }
}

/// What happened to a submitted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDisposition {
    /// Generation started immediately.
    Processing,
    /// Waiting behind the current turn.
    Queued { pending: usize },
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub state: SessionState,
    pub history: History,
    pub pending: usize,
}

enum Command {
    Start(oneshot::Sender<Result<(), SessionError>>),
    Ready(oneshot::Sender<Result<(), SessionError>>),
    Input(UserInput, oneshot::Sender<Result<InputDisposition, SessionError>>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Stop(oneshot::Sender<History>),
}

enum TaskEvent {
    Generated {
        turn: u64,
        outcome: Result<TurnReply, TurnError>,
    },
    Spoken {
        turn: u64,
        result: Result<(), ChannelError>,
    },
}

/// The turn currently occupying the session.
struct Turn {
    id: u64,
    /// `None` for the greeting.
    user: Option<String>,
}

/// Spawns session actors.
pub struct ConversationSession;

impl ConversationSession {
    /// Spawn a session in `Idle`. It runs until stopped or until every
    /// handle is dropped.
    pub fn spawn(
        engine: Arc<TurnEngine>,
        output: Arc<dyn OutputChannel>,
        options: SessionOptions,
        events: Arc<EventBus>,
    ) -> SessionHandle {
        let id = SessionId::new();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let actor = SessionActor {
            id: id.clone(),
            engine,
            output,
            options,
            events: events.clone(),
            state: SessionState::Idle,
            state_tx,
            history: History::new(),
            pending: VecDeque::new(),
            next_turn: 0,
            current: None,
            root: CancellationToken::new(),
            tasks: task_tx,
        };
        tokio::spawn(actor.run(command_rx, task_rx));

        info!(session = %id, "Session spawned");
        SessionHandle {
            id,
            commands: command_tx,
            state: state_rx,
            events,
        }
    }
}

/// Cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
    events: Arc<EventBus>,
}

impl SessionHandle {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// `Idle → Connecting`.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.request(Command::Start).await?
    }

    /// `Connecting → Active/Listening`; voice sessions then greet.
    pub async fn ready(&self) -> Result<(), SessionError> {
        self.request(Command::Ready).await?
    }

    /// Submit typed text.
    pub async fn user_message(
        &self,
        text: impl Into<String>,
    ) -> Result<InputDisposition, SessionError> {
        self.submit(UserInput::typed(text)).await
    }

    pub async fn submit(&self, input: UserInput) -> Result<InputDisposition, SessionError> {
        self.request(|reply| Command::Input(input, reply)).await?
    }

    /// End the session and return its final history.
    pub async fn stop(&self) -> Result<History, SessionError> {
        self.request(Command::Stop).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(Command::Snapshot).await
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until the session reaches a state matching `predicate`.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SessionState) -> bool,
    ) -> Result<SessionState, SessionError> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| SessionError::Ended)?;
        Ok(*state)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| SessionError::Ended)?;
        rx.await.map_err(|_| SessionError::Ended)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

struct SessionActor {
    id: SessionId,
    engine: Arc<TurnEngine>,
    output: Arc<dyn OutputChannel>,
    options: SessionOptions,
    events: Arc<EventBus>,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    history: History,
    pending: VecDeque<UserInput>,
    next_turn: u64,
    current: Option<Turn>,
    root: CancellationToken,
    tasks: mpsc::UnboundedSender<TaskEvent>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut tasks: mpsc::UnboundedReceiver<TaskEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let flow = match command {
                        Some(command) => self.handle(command),
                        None => {
                            debug!(session = %self.id, "All handles dropped");
                            self.stop();
                            ControlFlow::Break(())
                        }
                    };
                    if flow.is_break() {
                        break;
                    }
                }
                Some(event) = tasks.recv() => self.on_task_event(event),
            }
        }
        debug!(session = %self.id, "Session task finished");
    }

    fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Start(reply) => {
                let _ = reply.send(self.start());
            }
            Command::Ready(reply) => {
                let _ = reply.send(self.ready());
            }
            Command::Input(input, reply) => {
                let _ = reply.send(self.on_input(input));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(SessionSnapshot {
                    id: self.id.clone(),
                    state: self.state,
                    history: self.history.clone(),
                    pending: self.pending.len(),
                });
            }
            Command::Stop(reply) => {
                let history = self.stop();
                let _ = reply.send(history);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // ── Lifecycle ──────────────────────────────────────────────────────

    fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(self.invalid("start"));
        }
        self.transition(SessionState::Connecting);
        Ok(())
    }

    fn ready(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Connecting {
            return Err(self.invalid("ready"));
        }
        self.transition(LISTENING);

        if self.options.mode == SessionMode::Voice && self.options.greet_on_voice {
            let greeting = self.engine.persona().greeting.clone();
            match self.history.greet(greeting.clone()) {
                Ok(()) => {
                    let turn = self.begin_turn(None);
                    self.speak(turn, greeting, UtteranceKind::Greeting);
                    return Ok(());
                }
                Err(e) => warn!(session = %self.id, error = %e, "Greeting skipped"),
            }
        }
        self.next_pending();
        Ok(())
    }

    fn stop(&mut self) -> History {
        self.root.cancel();
        self.current = None;
        let dropped = self.pending.len();
        self.pending.clear();
        self.transition(SessionState::Ended);
        info!(
            session = %self.id,
            turns = self.history.len(),
            dropped_pending = dropped,
            "Session ended"
        );
        std::mem::take(&mut self.history)
    }

    fn invalid(&self, action: &str) -> SessionError {
        SessionError::InvalidTransition {
            action: action.into(),
            state: self.state.to_string(),
        }
    }

    // ── Input ──────────────────────────────────────────────────────────

    fn on_input(&mut self, input: UserInput) -> Result<InputDisposition, SessionError> {
        let text = input.text.trim();
        if text.is_empty() {
            return Err(SessionError::InputRejected("empty message".into()));
        }
        let input = UserInput {
            text: text.to_string(),
            origin: input.origin,
        };

        match self.state {
            SessionState::Ended => Err(SessionError::Ended),
            LISTENING if self.pending.is_empty() => {
                self.generate(input.text);
                Ok(InputDisposition::Processing)
            }
            _ => self.enqueue(input),
        }
    }

    fn enqueue(&mut self, input: UserInput) -> Result<InputDisposition, SessionError> {
        if self.state.is_busy() && self.options.interrupt_policy == InterruptPolicy::Reject {
            return Err(self.reject(&input, "session is busy"));
        }

        match self.options.ordering {
            QueueOrdering::Fifo => {
                if self.pending.len() >= self.options.max_pending {
                    return Err(self.reject(&input, "input queue is full"));
                }
                self.pending.push_back(input);
            }
            QueueOrdering::LatestWins => {
                for old in self.pending.drain(..) {
                    debug!(session = %self.id, "Queued input superseded");
                    self.events.publish(DomainEvent::InputSuperseded {
                        session_id: self.id.to_string(),
                        content_preview: preview(&old.text),
                        timestamp: chrono::Utc::now(),
                    });
                }
                self.pending.push_back(input);
            }
        }

        let pending = self.pending.len();
        debug!(session = %self.id, pending, state = %self.state, "Input queued");
        self.events.publish(DomainEvent::InputQueued {
            session_id: self.id.to_string(),
            pending,
            timestamp: chrono::Utc::now(),
        });
        Ok(InputDisposition::Queued { pending })
    }

    fn reject(&self, input: &UserInput, reason: &str) -> SessionError {
        warn!(session = %self.id, reason, "Input rejected");
        self.events.publish(DomainEvent::InputRejected {
            session_id: self.id.to_string(),
            reason: reason.into(),
            content_preview: preview(&input.text),
            timestamp: chrono::Utc::now(),
        });
        SessionError::InputRejected(reason.into())
    }

    fn next_pending(&mut self) {
        if self.state != LISTENING {
            return;
        }
        if let Some(next) = self.pending.pop_front() {
            self.generate(next.text);
        }
    }

    // ── Turns ──────────────────────────────────────────────────────────

    fn begin_turn(&mut self, user: Option<String>) -> u64 {
        self.next_turn += 1;
        self.current = Some(Turn {
            id: self.next_turn,
            user,
        });
        self.next_turn
    }

    fn generate(&mut self, text: String) {
        let turn = self.begin_turn(Some(text.clone()));
        self.transition(GENERATING);

        let engine = self.engine.clone();
        let history = self.history.clone();
        let token = self.root.child_token();
        let tasks = self.tasks.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                outcome = engine.respond(&text, &history) => {
                    let _ = tasks.send(TaskEvent::Generated { turn, outcome });
                }
            }
        });
    }

    fn speak(&mut self, turn: u64, text: String, kind: UtteranceKind) {
        self.transition(SPEAKING);
        self.events.publish(DomainEvent::UtteranceDispatched {
            session_id: self.id.to_string(),
            kind,
            text: text.clone(),
            timestamp: chrono::Utc::now(),
        });

        let output = self.output.clone();
        let token = self.root.child_token();
        let tasks = self.tasks.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = output.speak(&text) => {
                    let _ = tasks.send(TaskEvent::Spoken { turn, result });
                }
            }
        });
    }

    fn on_task_event(&mut self, event: TaskEvent) {
        let turn = match &event {
            TaskEvent::Generated { turn, .. } | TaskEvent::Spoken { turn, .. } => *turn,
        };
        let user = match &self.current {
            Some(current) if current.id == turn => current.user.clone(),
            _ => {
                debug!(session = %self.id, turn, "Discarding stale task result");
                return;
            }
        };

        match event {
            TaskEvent::Generated { outcome, .. } => self.on_generated(turn, user, outcome),
            TaskEvent::Spoken { result, .. } => self.on_spoken(result),
        }
    }

    fn on_generated(
        &mut self,
        turn: u64,
        user: Option<String>,
        outcome: Result<TurnReply, TurnError>,
    ) {
        let (text, kind) = match outcome {
            Ok(reply) => (reply.text, UtteranceKind::Reply),
            Err(e) => {
                warn!(session = %self.id, error = %e, "Generation failed, speaking fallback");
                self.events.publish(DomainEvent::GenerationFailed {
                    session_id: self.id.to_string(),
                    error_message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                (self.engine.persona().error_reply.clone(), UtteranceKind::Fallback)
            }
        };

        if let Some(user) = user
            && let Err(e) = self.history.push_exchange(user, text.clone())
        {
            warn!(session = %self.id, error = %e, "History rejected exchange");
        }
        self.speak(turn, text, kind);
    }

    fn on_spoken(&mut self, result: Result<(), ChannelError>) {
        if let Err(e) = result {
            warn!(session = %self.id, channel = self.output.name(), error = %e, "Output failed");
            self.events.publish(DomainEvent::OutputFailed {
                session_id: self.id.to_string(),
                error_message: e.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
        self.current = None;
        self.transition(LISTENING);
        self.next_pending();
    }

    fn transition(&mut self, to: SessionState) {
        if self.state == to {
            return;
        }
        let from = std::mem::replace(&mut self.state, to);
        self.state_tx.send_replace(to);
        debug!(session = %self.id, %from, %to, "Session transition");
        self.events.publish(DomainEvent::SessionStateChanged {
            session_id: self.id.to_string(),
            from,
            to,
            timestamp: chrono::Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{RecordingOutput, ScriptedProvider, indexed};
    use parley_core::persona::Persona;
    use parley_knowledge::{RetrievalPolicy, Retriever, Source};
    use std::time::Duration;

    fn corpus() -> Vec<Source> {
        vec![
            Source::fact("funding", "Michael Brown funding is pending treasury posting."),
            Source::fact("passport", "John Kim passport upload needs notary attestation."),
            Source::fact("w9", "Emily Davis is missing a signed W-9 form."),
        ]
    }

    async fn engine(provider: Arc<ScriptedProvider>) -> Arc<TurnEngine> {
        let retriever = Retriever::new(indexed(corpus()).await, RetrievalPolicy::default());
        Arc::new(
            TurnEngine::new(retriever, provider, Persona::default())
                .with_timeout(Duration::from_secs(5)),
        )
    }

    async fn active_session(
        provider: Arc<ScriptedProvider>,
        output: Arc<RecordingOutput>,
        options: SessionOptions,
    ) -> SessionHandle {
        let handle = ConversationSession::spawn(
            engine(provider).await,
            output,
            options,
            Arc::new(EventBus::default()),
        );
        handle.start().await.unwrap();
        handle.ready().await.unwrap();
        handle
    }

    /// Poll until the session is listening with nothing queued.
    async fn settle(handle: &SessionHandle) -> SessionSnapshot {
        loop {
            let snapshot = handle.snapshot().await.unwrap();
            if snapshot.state == LISTENING && snapshot.pending == 0 {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn contents(history: &History) -> Vec<String> {
        history.turns().iter().map(|t| t.content.clone()).collect()
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let provider = Arc::new(ScriptedProvider::replying(&["ok"]));
        let handle = ConversationSession::spawn(
            engine(provider).await,
            Arc::new(RecordingOutput::new()),
            SessionOptions::default(),
            Arc::new(EventBus::default()),
        );

        assert_eq!(handle.state(), SessionState::Idle);
        assert!(matches!(
            handle.ready().await,
            Err(SessionError::InvalidTransition { .. })
        ));

        handle.start().await.unwrap();
        assert_eq!(handle.state(), SessionState::Connecting);
        assert!(handle.start().await.is_err());

        handle.ready().await.unwrap();
        assert_eq!(handle.state(), LISTENING);

        handle.stop().await.unwrap();
        assert_eq!(
            handle.wait_for(SessionState::is_ended).await.unwrap(),
            SessionState::Ended
        );
        assert!(matches!(
            handle.user_message("hello").await,
            Err(SessionError::Ended)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn reply_flows_through_speaking_back_to_listening() {
        let provider = Arc::new(ScriptedProvider::replying(&[
            "Treasury posting is pending.\n\nUser: and then?",
        ]));
        let output = Arc::new(RecordingOutput::new().with_playback(Duration::from_secs(2)));
        let handle = active_session(provider, output.clone(), SessionOptions::default()).await;
        let mut events = handle.subscribe();

        let disposition = handle.user_message("Michael Brown funding?").await.unwrap();
        assert_eq!(disposition, InputDisposition::Processing);
        let snapshot = settle(&handle).await;

        let mut path = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let DomainEvent::SessionStateChanged { to, .. } = event.as_ref() {
                path.push(*to);
            }
        }
        assert_eq!(path, vec![GENERATING, SPEAKING, LISTENING]);

        assert_eq!(output.spoken(), vec!["Treasury posting is pending."]);
        assert_eq!(
            contents(&snapshot.history),
            vec!["Michael Brown funding?", "Treasury posting is pending."]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn voice_session_greets_before_any_input() {
        let provider = Arc::new(ScriptedProvider::replying(&["ok"]));
        let output = Arc::new(RecordingOutput::new().with_playback(Duration::from_secs(1)));
        let options = SessionOptions {
            mode: SessionMode::Voice,
            ..SessionOptions::default()
        };
        let handle = active_session(provider.clone(), output.clone(), options).await;

        assert_eq!(handle.state(), SPEAKING);
        let snapshot = settle(&handle).await;

        let greeting = Persona::default().greeting;
        assert_eq!(output.spoken(), vec![greeting.clone()]);
        assert_eq!(contents(&snapshot.history), vec![greeting]);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_inputs_are_single_flight_and_fifo() {
        let provider = Arc::new(
            ScriptedProvider::replying(&["First.", "Second.", "Third."])
                .with_delay(Duration::from_secs(1)),
        );
        let output = Arc::new(RecordingOutput::new());
        let handle =
            active_session(provider.clone(), output.clone(), SessionOptions::default()).await;

        assert_eq!(
            handle.user_message("funding status").await.unwrap(),
            InputDisposition::Processing
        );
        assert_eq!(
            handle.user_message("passport status").await.unwrap(),
            InputDisposition::Queued { pending: 1 }
        );
        assert_eq!(
            handle.user_message("w9 status").await.unwrap(),
            InputDisposition::Queued { pending: 2 }
        );

        let snapshot = settle(&handle).await;

        assert_eq!(provider.calls(), 3);
        assert_eq!(provider.max_in_flight(), 1);
        assert_eq!(output.spoken(), vec!["First.", "Second.", "Third."]);
        assert_eq!(
            contents(&snapshot.history),
            vec![
                "funding status",
                "First.",
                "passport status",
                "Second.",
                "w9 status",
                "Third."
            ]
        );
        let prompts = provider.prompts();
        assert!(prompts[0].ends_with("User: funding status. Assistant:"));
        assert!(prompts[2].contains("User: passport status\nAssistant: Second."));
    }

    #[tokio::test(start_paused = true)]
    async fn latest_wins_supersedes_queued_input() {
        let provider = Arc::new(
            ScriptedProvider::replying(&["One.", "Two."]).with_delay(Duration::from_secs(1)),
        );
        let output = Arc::new(RecordingOutput::new());
        let options = SessionOptions {
            ordering: QueueOrdering::LatestWins,
            ..SessionOptions::default()
        };
        let handle = active_session(provider.clone(), output.clone(), options).await;
        let mut events = handle.subscribe();

        handle.user_message("funding status").await.unwrap();
        handle.user_message("passport status").await.unwrap();
        assert_eq!(
            handle.user_message("w9 status").await.unwrap(),
            InputDisposition::Queued { pending: 1 }
        );

        let snapshot = settle(&handle).await;
        assert_eq!(provider.calls(), 2);
        assert_eq!(
            contents(&snapshot.history),
            vec!["funding status", "One.", "w9 status", "Two."]
        );

        let mut superseded = 0;
        while let Ok(event) = events.try_recv() {
            if let DomainEvent::InputSuperseded { content_preview, .. } = event.as_ref() {
                assert_eq!(content_preview, "passport status");
                superseded += 1;
            }
        }
        assert_eq!(superseded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reject_policy_refuses_input_while_busy() {
        let provider =
            Arc::new(ScriptedProvider::replying(&["Done."]).with_delay(Duration::from_secs(1)));
        let options = SessionOptions {
            interrupt_policy: InterruptPolicy::Reject,
            ..SessionOptions::default()
        };
        let handle =
            active_session(provider.clone(), Arc::new(RecordingOutput::new()), options).await;

        handle.user_message("funding status").await.unwrap();
        assert!(matches!(
            handle.user_message("passport status").await,
            Err(SessionError::InputRejected(_))
        ));

        settle(&handle).await;
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_fifo_queue_rejects_overflow() {
        let provider =
            Arc::new(ScriptedProvider::replying(&["Done."]).with_delay(Duration::from_secs(1)));
        let options = SessionOptions {
            max_pending: 1,
            ..SessionOptions::default()
        };
        let handle = active_session(provider, Arc::new(RecordingOutput::new()), options).await;
        let mut events = handle.subscribe();

        handle.user_message("a question").await.unwrap();
        handle.user_message("b question").await.unwrap();
        assert!(handle.user_message("c question").await.is_err());

        let rejected = loop {
            let event = events.recv().await.unwrap();
            if let DomainEvent::InputRejected { reason, .. } = event.as_ref() {
                break reason.clone();
            }
        };
        assert_eq!(rejected, "input queue is full");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_speaks_exactly_one_fallback() {
        let provider = Arc::new(
            ScriptedProvider::replying(&["too late"]).with_delay(Duration::from_secs(3600)),
        );
        let output = Arc::new(RecordingOutput::new());
        let handle =
            active_session(provider.clone(), output.clone(), SessionOptions::default()).await;
        let mut events = handle.subscribe();

        let started = tokio::time::Instant::now();
        handle.user_message("funding status").await.unwrap();
        let snapshot = settle(&handle).await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(6));

        let fallback = Persona::default().error_reply;
        assert_eq!(output.spoken(), vec![fallback.clone()]);
        assert_eq!(contents(&snapshot.history), vec!["funding status".to_string(), fallback]);

        let mut failures = 0;
        let mut fallbacks = 0;
        while let Ok(event) = events.try_recv() {
            match event.as_ref() {
                DomainEvent::GenerationFailed { .. } => failures += 1,
                DomainEvent::UtteranceDispatched {
                    kind: UtteranceKind::Fallback,
                    ..
                } => fallbacks += 1,
                _ => {}
            }
        }
        assert_eq!(failures, 1);
        assert_eq!(fallbacks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_error_recovers_to_listening() {
        let provider = Arc::new(ScriptedProvider::failing());
        let output = Arc::new(RecordingOutput::new());
        let handle = active_session(provider, output.clone(), SessionOptions::default()).await;

        handle.user_message("funding status").await.unwrap();
        settle(&handle).await;
        assert_eq!(output.spoken(), vec![Persona::default().error_reply]);

        // Still accepting input afterwards.
        assert_eq!(
            handle.user_message("passport status").await.unwrap(),
            InputDisposition::Processing
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_in_flight_generation() {
        let provider =
            Arc::new(ScriptedProvider::replying(&["Late."]).with_delay(Duration::from_secs(2)));
        let output = Arc::new(RecordingOutput::new());
        let handle =
            active_session(provider.clone(), output.clone(), SessionOptions::default()).await;

        handle.user_message("funding status").await.unwrap();
        handle.user_message("queued status").await.unwrap();
        let history = handle.stop().await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(history.is_empty());
        assert!(output.spoken().is_empty());
        // The queued input never reaches the backend.
        assert!(provider.calls() <= 1);
        assert_eq!(handle.state(), SessionState::Ended);
        assert!(handle.snapshot().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn input_before_active_is_processed_after_ready() {
        let provider = Arc::new(ScriptedProvider::replying(&["Here you go."]));
        let output = Arc::new(RecordingOutput::new());
        let handle = ConversationSession::spawn(
            engine(provider.clone()).await,
            output.clone(),
            SessionOptions::default(),
            Arc::new(EventBus::default()),
        );
        handle.start().await.unwrap();

        assert_eq!(
            handle.user_message("funding status").await.unwrap(),
            InputDisposition::Queued { pending: 1 }
        );
        assert_eq!(provider.calls(), 0);

        handle.ready().await.unwrap();
        settle(&handle).await;
        assert_eq!(output.spoken(), vec!["Here you go."]);
    }

    #[tokio::test(start_paused = true)]
    async fn output_failure_is_reported_and_session_continues() {
        let provider = Arc::new(ScriptedProvider::replying(&["Done."]));
        let output = Arc::new(RecordingOutput::failing());
        let handle = active_session(provider, output, SessionOptions::default()).await;
        let mut events = handle.subscribe();

        handle.user_message("funding status").await.unwrap();
        let snapshot = settle(&handle).await;
        assert_eq!(snapshot.history.len(), 2);

        let reported = loop {
            let event = events.recv().await.unwrap();
            if let DomainEvent::OutputFailed { error_message, .. } = event.as_ref() {
                break error_message.clone();
            }
        };
        assert!(reported.contains("speaker unplugged"));
    }

    #[tokio::test]
    async fn blank_input_is_rejected() {
        let provider = Arc::new(ScriptedProvider::replying(&["ok"]));
        let handle = active_session(
            provider,
            Arc::new(RecordingOutput::new()),
            SessionOptions::default(),
        )
        .await;
        assert!(matches!(
            handle.user_message("   ").await,
            Err(SessionError::InputRejected(_))
        ));
    }

    #[test]
    fn options_follow_config() {
        let config = parley_config::SessionConfig {
            interrupt_policy: InterruptPolicy::Reject,
            ordering: QueueOrdering::LatestWins,
            max_pending: 2,
            greet_on_voice: false,
            ..parley_config::SessionConfig::default()
        };
        let options = SessionOptions::from_config(&config, SessionMode::Voice);
        assert_eq!(options.mode, SessionMode::Voice);
        assert_eq!(options.interrupt_policy, InterruptPolicy::Reject);
        assert_eq!(options.max_pending, 2);
        assert!(!options.greet_on_voice);
    }
}
