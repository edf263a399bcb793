//! The request broker.
//!
//! One producer runs input sessions back to back on a blocking thread and
//! publishes each result to a bounded queue. Every HTTP request becomes a
//! responder that takes the next message, drains whatever else is already
//! queued, and turns it into a [`Reply`]. Waiting responders are counted so
//! the running session can show the countdown only while someone waits.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use whats_next_tui::{
    collect_input, session_channel, SessionControls, SessionError, SessionHandle, SessionOptions,
    SessionOutcome,
};

use crate::compose::{thinking_text, Composer};
use crate::config::BrokerConfig;
use crate::error::BrokerError;

/// How often an idle responder rechecks while the operator has text in the editor.
const IDLE_RECHECK: Duration = Duration::from_secs(1);
/// Pause after a failed session so a broken stdin does not spin the producer.
const FAILURE_BACKOFF: Duration = Duration::from_secs(1);

/// Result of one input session, consumed by exactly one responder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputMessage {
    pub content: String,
    pub working_dir: Option<PathBuf>,
    pub error: Option<String>,
    pub exit: bool,
}

impl InputMessage {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            working_dir: env::current_dir().ok(),
            ..Self::default()
        }
    }

    pub fn failure(error: impl fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            working_dir: env::current_dir().ok(),
            ..Self::default()
        }
    }

    pub fn exit() -> Self {
        Self {
            exit: true,
            ..Self::default()
        }
    }
}

/// Where follow-ups come from. Implementations block until the session ends.
pub trait InputSource: Send + Sync + 'static {
    fn collect(
        &self,
        controls: &SessionControls,
        on_input: &mut dyn FnMut(bool),
    ) -> Result<SessionOutcome, SessionError>;
}

/// The operator's terminal, or stdin lines when it is not a terminal.
#[derive(Debug, Clone)]
pub struct TerminalInput {
    options: SessionOptions,
}

impl TerminalInput {
    pub fn new(idle_timeout: Duration) -> Self {
        Self::with_options(
            SessionOptions::from_env()
                .with_timeout(idle_timeout)
                .with_caller_status(true),
        )
    }

    pub fn with_options(options: SessionOptions) -> Self {
        Self { options }
    }
}

impl InputSource for TerminalInput {
    fn collect(
        &self,
        controls: &SessionControls,
        on_input: &mut dyn FnMut(bool),
    ) -> Result<SessionOutcome, SessionError> {
        collect_input(&self.options, controls, on_input)
    }
}

/// What a responder sends back with status 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The operator ended the conversation.
    Exit,
    /// Nothing was typed before the idle deadline.
    Thinking,
    Answer(String),
}

impl Reply {
    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Self::Exit => "exit\n".to_string(),
            Self::Thinking => format!("{}\n", thinking_text()),
            Self::Answer(text) => format!("{text}\n"),
        }
    }
}

#[derive(Debug)]
struct BrokerState {
    callers: usize,
    idle_deadline: Instant,
    last_input_empty: Option<Instant>,
    active_session: Option<SessionHandle>,
    shutdown_requested: bool,
}

#[derive(Debug)]
pub struct Broker {
    config: BrokerConfig,
    composer: Arc<Composer>,
    state: Mutex<BrokerState>,
    // Written on every edit from the session thread; read without the state lock.
    has_typed: AtomicBool,
    receiver: AsyncMutex<mpsc::Receiver<InputMessage>>,
    shutdown: CancellationToken,
}

/// Publishing end of the queue; closing it ends every pending wait with 500.
#[derive(Debug)]
pub struct Producer {
    broker: Arc<Broker>,
    sender: mpsc::Sender<InputMessage>,
}

impl Broker {
    pub fn new(config: BrokerConfig, composer: Composer) -> (Arc<Self>, Producer) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let broker = Arc::new(Self {
            config,
            composer: Arc::new(composer),
            state: Mutex::new(BrokerState {
                callers: 0,
                idle_deadline: Instant::now(),
                last_input_empty: None,
                active_session: None,
                shutdown_requested: false,
            }),
            has_typed: AtomicBool::new(false),
            receiver: AsyncMutex::new(receiver),
            shutdown: CancellationToken::new(),
        });
        let producer = Producer {
            broker: Arc::clone(&broker),
            sender,
        };
        (broker, producer)
    }

    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Cancelled once the broker is shutting down.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        lock_unpoisoned(&self.state).shutdown_requested
    }

    #[must_use]
    pub fn callers(&self) -> usize {
        lock_unpoisoned(&self.state).callers
    }

    /// Refuses new requests but lets waiting ones finish.
    pub fn request_shutdown(&self) {
        lock_unpoisoned(&self.state).shutdown_requested = true;
    }

    /// Stops the server and the producer. Safe to call repeatedly.
    pub fn shutdown(&self) {
        {
            let mut state = lock_unpoisoned(&self.state);
            state.shutdown_requested = true;
            if let Some(session) = state.active_session.as_ref() {
                session.cancel();
            }
        }
        if !self.shutdown.is_cancelled() {
            info!("broker shutting down");
            self.shutdown.cancel();
        }
    }

    /// Waits for the next follow-up on behalf of one HTTP caller.
    pub async fn respond(&self, working_dir: Option<PathBuf>) -> Result<Reply, BrokerError> {
        if self.is_shutdown_requested() {
            return Err(BrokerError::ShuttingDown);
        }
        let _caller = CallerGuard::enter(self);

        let result = self.await_reply(working_dir).await;
        if self.is_shutdown_requested() {
            info!("request finished during shutdown");
            self.shutdown();
        }
        result
    }

    async fn await_reply(&self, working_dir: Option<PathBuf>) -> Result<Reply, BrokerError> {
        let hard_deadline = Instant::now() + self.config.hard_deadline;
        let mut idle_deadline = lock_unpoisoned(&self.state).idle_deadline;

        loop {
            tokio::select! {
                biased;

                (mut receiver, message) = self.next_message() => {
                    let Some(first) = message else {
                        error!("input queue closed");
                        return Err(BrokerError::QueueClosed);
                    };
                    if first.exit {
                        return Ok(Reply::Exit);
                    }
                    let mut messages = vec![first];
                    while let Ok(message) = receiver.try_recv() {
                        messages.push(message);
                    }
                    drop(receiver);
                    debug!(count = messages.len(), "caller received messages");
                    return self.reply_for(messages, working_dir).await;
                }
                () = sleep_until(hard_deadline) => {
                    warn!("caller timed out waiting for input");
                    return Err(BrokerError::Timeout);
                }
                () = sleep_until(idle_deadline) => {
                    match self.extended_idle_deadline(Instant::now()) {
                        Some(next) => idle_deadline = next,
                        None => {
                            info!(idle = ?self.config.idle_timeout, "operator idle, sending thinking reply");
                            return Ok(Reply::Thinking);
                        }
                    }
                }
            }
        }
    }

    /// Receives while holding the queue so the drain that follows sees a consistent tail.
    async fn next_message(
        &self,
    ) -> (
        AsyncMutexGuard<'_, mpsc::Receiver<InputMessage>>,
        Option<InputMessage>,
    ) {
        let mut receiver = self.receiver.lock().await;
        let message = receiver.recv().await;
        (receiver, message)
    }

    /// `None` when the caller should get the thinking reply now.
    fn extended_idle_deadline(&self, now: Instant) -> Option<Instant> {
        if self.has_typed.load(Ordering::Acquire) {
            return Some(now + IDLE_RECHECK);
        }
        let state = lock_unpoisoned(&self.state);
        let mut deadline = state.idle_deadline;
        if let Some(empty_at) = state.last_input_empty {
            deadline = deadline.max(empty_at + self.config.idle_timeout);
        }
        (deadline > now).then_some(deadline)
    }

    async fn reply_for(
        &self,
        messages: Vec<InputMessage>,
        working_dir: Option<PathBuf>,
    ) -> Result<Reply, BrokerError> {
        if messages.iter().any(|message| message.exit) {
            return Ok(Reply::Exit);
        }

        let errors: Vec<&str> = messages
            .iter()
            .filter_map(|message| message.error.as_deref())
            .collect();
        if !errors.is_empty() {
            return Err(BrokerError::Session(errors.join("\n")));
        }

        let working_dir =
            working_dir.or_else(|| messages.iter().find_map(|message| message.working_dir.clone()));
        let content = messages
            .iter()
            .map(|message| message.content.as_str())
            .filter(|content| !content.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if content.is_empty() {
            return Ok(Reply::Thinking);
        }
        debug!(len = content.len(), "composing reply");

        // Matching may shell out to git.
        let composer = Arc::clone(&self.composer);
        let text = tokio::task::spawn_blocking(move || composer.compose(&content, working_dir.as_deref()))
            .await
            .map_err(|error| BrokerError::Compose(error.to_string()))?;
        Ok(Reply::Answer(text))
    }

    fn caller_arrived(&self) {
        let mut state = lock_unpoisoned(&self.state);
        state.callers += 1;
        state.idle_deadline = Instant::now() + self.config.idle_timeout;
        if let Some(session) = state.active_session.as_ref() {
            session.set_callers(state.callers);
            if state.callers == 1 {
                session.enable_timer();
            }
        }
        info!(callers = state.callers, "client connected");
    }

    fn caller_left(&self) {
        let mut state = lock_unpoisoned(&self.state);
        state.callers = state.callers.saturating_sub(1);
        if let Some(session) = state.active_session.as_ref() {
            session.set_callers(state.callers);
            if state.callers == 0 {
                session.disable_timer();
            }
        }
        info!(callers = state.callers, "client finished");
    }

    fn begin_session(&self, session: SessionHandle) {
        self.has_typed.store(false, Ordering::Release);
        let mut state = lock_unpoisoned(&self.state);
        state.last_input_empty = None;
        if state.shutdown_requested {
            session.cancel();
        }
        session.set_callers(state.callers);
        if state.callers > 0 {
            session.enable_timer();
        }
        state.active_session = Some(session);
    }

    fn end_session(&self) {
        lock_unpoisoned(&self.state).active_session = None;
    }

    fn note_input(&self, has_input: bool) {
        self.has_typed.store(has_input, Ordering::Release);
        if !has_input {
            lock_unpoisoned(&self.state).last_input_empty = Some(Instant::now());
        }
    }
}

impl Producer {
    /// Runs the producer loop on the blocking pool of the current runtime.
    pub fn spawn(self, source: impl InputSource) -> JoinHandle<()> {
        let runtime = Handle::current();
        tokio::task::spawn_blocking(move || self.run(&source, &runtime))
    }

    /// Runs input sessions until shutdown. Blocks the calling thread.
    pub fn run(self, source: &dyn InputSource, runtime: &Handle) {
        let Producer { broker, sender } = self;
        info!("producer started");

        loop {
            if broker.is_shutdown_requested() {
                deliver_exits(&broker, &sender);
                break;
            }

            let (session, controls) = session_channel();
            broker.begin_session(session);
            let result = source.collect(&controls, &mut |has_input| broker.note_input(has_input));
            broker.end_session();

            match result {
                Ok(SessionOutcome::Submitted(text)) => {
                    info!(len = text.len(), "follow-up submitted");
                    if !publish(&broker, &sender, InputMessage::content(text), runtime) {
                        break;
                    }
                }
                Ok(SessionOutcome::Aborted) => {
                    if broker.callers() > 0 {
                        debug!("session aborted, releasing one caller");
                        if !publish(&broker, &sender, InputMessage::content(""), runtime) {
                            break;
                        }
                    }
                }
                Ok(SessionOutcome::Exit) => {
                    info!("operator ended the conversation");
                    broker.request_shutdown();
                    if broker.callers() == 0 {
                        broker.shutdown();
                    }
                }
                Err(SessionError::Cancelled) => debug!("input session cancelled"),
                Err(error) => {
                    error!(%error, "input session failed");
                    if broker.callers() > 0
                        && !publish(&broker, &sender, InputMessage::failure(&error), runtime)
                    {
                        break;
                    }
                    thread::sleep(FAILURE_BACKOFF);
                }
            }
        }

        info!("producer stopped");
    }
}

/// Sends without blocking when there is room; otherwise waits for room or shutdown.
fn publish(
    broker: &Broker,
    sender: &mpsc::Sender<InputMessage>,
    message: InputMessage,
    runtime: &Handle,
) -> bool {
    match sender.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Closed(_)) => false,
        Err(TrySendError::Full(message)) => {
            warn!("input queue full, waiting for a caller");
            let shutdown = broker.shutdown_token();
            runtime.block_on(async {
                tokio::select! {
                    sent = sender.send(message) => sent.is_ok(),
                    () = shutdown.cancelled() => false,
                }
            })
        }
    }
}

/// One `exit` per waiting caller. A full queue drops the rest.
fn deliver_exits(broker: &Broker, sender: &mpsc::Sender<InputMessage>) {
    let waiting = broker.callers();
    for _ in 0..waiting {
        if let Err(error) = sender.try_send(InputMessage::exit()) {
            warn!(%error, waiting, "dropping exit for waiting caller");
            break;
        }
    }
}

/// Counts one caller for as long as its request is in flight.
struct CallerGuard<'a> {
    broker: &'a Broker,
}

impl<'a> CallerGuard<'a> {
    fn enter(broker: &'a Broker) -> Self {
        broker.caller_arrived();
        Self { broker }
    }
}

impl Drop for CallerGuard<'_> {
    fn drop(&mut self) {
        self.broker.caller_left();
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio::runtime::Handle;
    use tokio::time::Instant;
    use whats_next_tui::session_channel;

    use super::{deliver_exits, publish, Broker, InputMessage, Reply};
    use crate::compose::{thinking_text, Composer, NoProfile};
    use crate::config::BrokerConfig;

    fn broker(idle: Duration) -> std::sync::Arc<Broker> {
        let config = BrokerConfig::default()
            .with_idle_timeout(idle)
            .with_hard_deadline(Duration::from_secs(5));
        Broker::new(config, Composer::new(NoProfile)).0
    }

    #[test]
    fn reply_bodies_end_with_newline() {
        assert_eq!(Reply::Exit.body(), "exit\n");
        assert_eq!(Reply::Thinking.body(), format!("{}\n", thinking_text()));
        assert_eq!(Reply::Answer("x".to_string()).body(), "x\n");
    }

    #[test]
    fn message_constructors() {
        assert!(InputMessage::exit().exit);
        assert_eq!(InputMessage::failure("boom").error.as_deref(), Some("boom"));
        assert_eq!(InputMessage::content("hi").content, "hi");
    }

    #[tokio::test]
    async fn typed_text_keeps_idle_responder_waiting() {
        let broker = broker(Duration::from_millis(50));
        let now = Instant::now();
        broker.note_input(true);
        let next = broker.extended_idle_deadline(now).expect("keeps waiting");
        assert!(next > now);

        broker.note_input(false);
        let until = broker
            .extended_idle_deadline(Instant::now())
            .expect("recent clear extends the wait");
        assert!(until > Instant::now());
    }

    #[tokio::test]
    async fn idle_deadline_expires_without_input() {
        let broker = broker(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(broker.extended_idle_deadline(Instant::now()), None);
    }

    fn congested(capacity: usize) -> (std::sync::Arc<Broker>, super::Producer) {
        let config = BrokerConfig::default().with_queue_capacity(capacity);
        Broker::new(config, Composer::new(NoProfile))
    }

    #[tokio::test]
    async fn exits_beyond_queue_capacity_are_dropped_without_blocking() {
        let (broker, producer) = congested(1);
        broker.caller_arrived();
        broker.caller_arrived();

        deliver_exits(&broker, &producer.sender);

        let mut receiver = broker.receiver.try_lock().expect("queue unlocked");
        let delivered = receiver.try_recv().expect("one exit queued");
        assert!(delivered.exit);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn queued_content_leaves_no_room_for_exits() {
        let (broker, producer) = congested(1);
        producer
            .sender
            .try_send(InputMessage::content("pending"))
            .expect("room for one");
        broker.caller_arrived();

        deliver_exits(&broker, &producer.sender);

        let mut receiver = broker.receiver.try_lock().expect("queue unlocked");
        assert_eq!(receiver.try_recv().expect("queued content").content, "pending");
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_releases_producer_blocked_on_full_queue() {
        let (broker, producer) = congested(1);
        let sender = producer.sender.clone();
        sender
            .try_send(InputMessage::content("first"))
            .expect("room for one");

        let runtime = Handle::current();
        let blocked = {
            let broker = Arc::clone(&broker);
            tokio::task::spawn_blocking(move || {
                publish(&broker, &sender, InputMessage::content("second"), &runtime)
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!blocked.is_finished());

        broker.shutdown();
        let sent = tokio::time::timeout(Duration::from_secs(2), blocked)
            .await
            .expect("publish returns after shutdown")
            .expect("publish task");
        assert!(!sent);
        drop(producer);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn full_queue_publish_completes_once_a_caller_takes_a_message() {
        let (broker, producer) = congested(1);
        let sender = producer.sender.clone();
        sender
            .try_send(InputMessage::content("first"))
            .expect("room for one");

        let runtime = Handle::current();
        let blocked = {
            let broker = Arc::clone(&broker);
            tokio::task::spawn_blocking(move || {
                publish(&broker, &sender, InputMessage::content("second"), &runtime)
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let first = broker.receiver.lock().await.recv().await.expect("first");
        assert_eq!(first.content, "first");

        let sent = tokio::time::timeout(Duration::from_secs(2), blocked)
            .await
            .expect("publish returns once room frees up")
            .expect("publish task");
        assert!(sent);
        let second = broker.receiver.lock().await.recv().await.expect("second");
        assert_eq!(second.content, "second");
        drop(producer);
    }

    #[tokio::test]
    async fn shutdown_cancels_running_session_and_new_sessions() {
        let broker = broker(Duration::from_secs(1));
        let (session, controls) = session_channel();
        broker.begin_session(session);
        broker.shutdown();
        assert!(controls.lifetime().is_cancelled());
        assert!(broker.shutdown_token().is_cancelled());
        broker.end_session();

        let (late, late_controls) = session_channel();
        broker.begin_session(late);
        assert!(late_controls.lifetime().is_cancelled());
    }
}
