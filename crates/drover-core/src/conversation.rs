// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use drover_config::Config;
use drover_model::{ContentPart, LlmClient, LlmMessage, MessageContent, Role};
use drover_tools::ToolRegistry;

use crate::bus::CallbackBus;
use crate::condenser::{Condenser, NoopCondenser};
use crate::engine::{model_tool_schemas, StepEngine, StepError};
use crate::error::ConversationError;
use crate::event::Event;
use crate::skills::AgentContext;
use crate::state::ConversationState;

/// System prompt used when the embedder does not provide one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an autonomous agent. Work on the user's task \
by calling the available tools; reply in plain text when the task is complete.";

/// Controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Running,
    Paused,
    Errored,
    /// Terminal.
    Cancelled,
}

/// State shared between the controller and the step engine.
pub(crate) struct Shared {
    pub(crate) state: Mutex<ConversationState>,
    pub(crate) bus: CallbackBus,
    /// Log position up to which events have been multicast.
    emit_cursor: Mutex<usize>,
}

impl Shared {
    fn new(bus: CallbackBus) -> Self {
        Self {
            state: Mutex::new(ConversationState::new()),
            bus,
            emit_cursor: Mutex::new(0),
        }
    }

    /// Multicast events appended since the last flush, in log order.
    ///
    /// Events are already persisted in the state when subscribers see them.
    /// The cursor lock is held across dispatch so concurrent flushes cannot
    /// interleave deliveries; the state lock is taken only to snapshot the
    /// pending range.  Lock order is always cursor → state.
    pub(crate) async fn flush_events(&self) {
        let mut cursor = self.emit_cursor.lock().await;
        let pending: Vec<Event> = {
            let state = self.state.lock().await;
            state.events()[*cursor..].to_vec()
        };
        for event in &pending {
            self.bus.emit(event);
        }
        *cursor += pending.len();
    }
}

pub struct ConversationBuilder {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    condenser: Arc<dyn Condenser>,
    config: Config,
    context: AgentContext,
    system_prompt: String,
    bus: CallbackBus,
}

impl ConversationBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn condenser(mut self, condenser: impl Condenser + 'static) -> Self {
        self.condenser = Arc::new(condenser);
        self
    }

    pub fn context(mut self, context: AgentContext) -> Self {
        self.context = context;
        self
    }

    pub fn system_prompt(mut self, text: impl Into<String>) -> Self {
        self.system_prompt = text.into();
        self
    }

    /// Register an event subscriber.  Subscribers are invoked in registration
    /// order, after the event has been appended to the state.
    pub fn subscribe(mut self, callback: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.bus.subscribe(callback);
        self
    }

    pub fn build(self) -> Conversation {
        let config = Arc::new(self.config);
        let engine = StepEngine::new(
            Arc::clone(&self.llm),
            Arc::clone(&self.tools),
            self.condenser,
            Arc::clone(&config),
        );
        let (paused_tx, paused_rx) = watch::channel(false);
        Conversation {
            shared: Arc::new(Shared::new(self.bus)),
            engine,
            config,
            context: self.context,
            system_prompt: self.system_prompt,
            tools: self.tools,
            status: StdMutex::new(Status::Idle),
            paused_tx,
            paused_rx,
            cancel: CancellationToken::new(),
            running: AtomicBool::new(false),
        }
    }
}

/// The conversation controller: owns the state and drives the step loop.
///
/// One driver task calls [`Conversation::run`]; other tasks may call
/// [`Conversation::send_message`], [`Conversation::pause`],
/// [`Conversation::resume`] and [`Conversation::cancel`] concurrently.  The
/// state lock is released across the model call and tool execution, so
/// control commands never wait on long I/O.
pub struct Conversation {
    shared: Arc<Shared>,
    engine: StepEngine,
    config: Arc<Config>,
    context: AgentContext,
    system_prompt: String,
    tools: Arc<ToolRegistry>,
    status: StdMutex<Status>,
    paused_tx: watch::Sender<bool>,
    paused_rx: watch::Receiver<bool>,
    cancel: CancellationToken,
    running: AtomicBool,
}

impl Conversation {
    pub fn builder(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> ConversationBuilder {
        ConversationBuilder {
            llm,
            tools,
            condenser: Arc::new(NoopCondenser),
            config: Config::default(),
            context: AgentContext::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            bus: CallbackBus::new(),
        }
    }

    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        Self::builder(llm, tools).build()
    }

    pub fn status(&self) -> Status {
        *self.status.lock().unwrap()
    }

    fn set_status(&self, status: Status) {
        *self.status.lock().unwrap() = status;
    }

    /// Convenience wrapper around [`Conversation::send_message`].
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), ConversationError> {
        self.send_message(LlmMessage::user(text.into())).await
    }

    /// Append a user message to the conversation.
    ///
    /// The first message also injects the system prompt (with the frozen tool
    /// declarations), the optional environment context, and any triggered
    /// knowledge skills.  Clears the finished flag so a subsequent `run()`
    /// proceeds.  While a step is in flight this call blocks on the state
    /// lock and lands after the step's current critical section — unless
    /// `reentrant_send_message` is disabled, in which case it is rejected.
    pub async fn send_message(&self, message: LlmMessage) -> Result<(), ConversationError> {
        if message.role != Role::User {
            return Err(ConversationError::Rejected(
                "only user messages may be sent to the agent".into(),
            ));
        }
        match self.status() {
            Status::Cancelled => {
                return Err(ConversationError::Rejected("conversation is cancelled".into()))
            }
            Status::Errored => {
                return Err(ConversationError::Rejected(
                    "conversation is errored; start a new one".into(),
                ))
            }
            Status::Running | Status::Paused
                if !self.config.conversation.reentrant_send_message =>
            {
                return Err(ConversationError::Busy)
            }
            _ => {}
        }

        if let Err(error) = self.append_user_message(message).await {
            if matches!(error, ConversationError::Invariant(_)) {
                self.set_status(Status::Errored);
            }
            return Err(error);
        }
        self.shared.flush_events().await;
        Ok(())
    }

    async fn append_user_message(&self, message: LlmMessage) -> Result<(), ConversationError> {
        let mut state = self.shared.state.lock().await;

        if !state.initial_context_sent {
            state.append(Event::system_prompt(
                self.system_prompt.clone(),
                model_tool_schemas(&self.tools),
            ))?;
            if let Some(env) = &self.context.environment_context {
                state.append(Event::environment_message(env.clone()))?;
            }
            state.initial_context_sent = true;
        }

        let text = message.content.to_text();
        let mut parts: Vec<ContentPart> = match message.content {
            MessageContent::Text(t) => vec![ContentPart::text(t)],
            MessageContent::Parts(p) => p,
        };
        let mut activated = Vec::new();
        if let Some((extra, names)) = self.context.augment(&text, &state.activated_skills) {
            debug!(skills = ?names, "knowledge skills triggered");
            parts.extend(extra);
            state.activated_skills.extend(names.iter().cloned());
            activated = names;
        }
        state.append(Event::user_message(parts, activated))?;
        state.finished = false;
        Ok(())
    }

    /// Drive the step loop until the model finishes, the iteration cap is
    /// reached, the conversation is cancelled, or a fatal error surfaces.
    ///
    /// Between steps the loop observes the pause flag and the cancel token;
    /// an in-flight model call is never interrupted by pause.
    pub async fn run(&self) -> Result<(), ConversationError> {
        match self.status() {
            Status::Cancelled => {
                return Err(ConversationError::Rejected("conversation is cancelled".into()))
            }
            Status::Errored => {
                return Err(ConversationError::Rejected(
                    "conversation is errored; start a new one".into(),
                ))
            }
            _ => {}
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ConversationError::Busy);
        }
        let result = self.drive().await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn drive(&self) -> Result<(), ConversationError> {
        self.set_status(Status::Running);
        let mut iteration: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return self.finish_cancelled().await;
            }
            if self.wait_if_paused().await {
                return self.finish_cancelled().await;
            }
            {
                let state = self.shared.state.lock().await;
                if state.finished {
                    break;
                }
            }
            if iteration >= self.config.conversation.max_iter_per_run {
                debug!(iteration, "iteration cap reached; returning control");
                break;
            }
            match self.engine.step(&self.shared, &self.cancel).await {
                Ok(()) => {}
                Err(StepError::Cancelled) => return self.finish_cancelled().await,
                Err(StepError::Fatal(message)) => {
                    self.set_status(Status::Errored);
                    return Err(ConversationError::TransportFatal(message));
                }
                Err(StepError::Invariant(error)) => {
                    self.set_status(Status::Errored);
                    return Err(error.into());
                }
            }
            iteration += 1;
        }
        self.set_status(Status::Idle);
        Ok(())
    }

    /// Block while the pause flag is set.  Returns true when the wait ended
    /// because the conversation was cancelled.
    async fn wait_if_paused(&self) -> bool {
        if !*self.paused_tx.borrow() {
            return false;
        }
        self.set_status(Status::Paused);
        let mut rx = self.paused_rx.clone();
        loop {
            if !*rx.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return true,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        self.set_status(Status::Running);
        false
    }

    async fn finish_cancelled(&self) -> Result<(), ConversationError> {
        {
            let mut state = self.shared.state.lock().await;
            if let Err(error) = state.append(Event::environment_message("cancelled")) {
                warn!(%error, "failed to record cancellation marker");
            }
        }
        self.shared.flush_events().await;
        self.set_status(Status::Cancelled);
        Ok(())
    }

    /// Request that the loop stop before the next step.  An in-flight model
    /// call is not interrupted; no new step begins while paused.
    pub fn pause(&self) {
        let _ = self.paused_tx.send(true);
    }

    /// Clear the pause flag; a paused `run()` resumes its loop.
    pub fn resume(&self) {
        let _ = self.paused_tx.send(false);
    }

    /// Cooperative hard stop: cancels the in-flight model call and signals
    /// running tools via their cancel token.  Terminal.
    pub fn cancel(&self) {
        self.cancel.cancel();
        // With no active run loop there is nobody else to record the
        // transition; an active loop appends the cancellation marker and
        // transitions itself.
        if !self.running.load(Ordering::SeqCst) {
            self.set_status(Status::Cancelled);
        }
    }

    // ── State snapshots ───────────────────────────────────────────────────────

    /// Snapshot of the event log.
    pub async fn events(&self) -> Vec<Event> {
        self.shared.state.lock().await.events().to_vec()
    }

    pub async fn is_finished(&self) -> bool {
        self.shared.state.lock().await.finished
    }

    pub async fn steps_taken(&self) -> u64 {
        self.shared.state.lock().await.steps_taken
    }

    pub async fn activated_skills(&self) -> Vec<String> {
        self.shared.state.lock().await.activated_skills.clone()
    }
}
