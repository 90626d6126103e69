// Chat session orchestration
//
// ChatSession drives one playground conversation:
// - keeps the message list and writes it through to session storage
// - streams assistant replies from the chat endpoint
// - hands tool calls to the ToolExecutionBridge and attaches their results
// - auto-continues until the step budget is used or a step ends without tools
//
// Status: Ready -> Submitted -> Streaming -> Ready | Error
//
// State lives behind a std Mutex that is never held across an await. The
// tool outcome receiver sits behind an async Mutex owned by the running turn.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ChatConfig, ToolBridgeConfig};
use crate::error::{PortalError, Result};
use crate::message::{ToolInvocation, ToolInvocationState, UiMessage};
use crate::persist::{load_chat_history, save_chat_history};
use crate::selection::{PlaygroundStore, SessionReset};
use crate::storage::SessionStorage;
use crate::stream::{ChatRequest, ChatStreamEvent, ClientMessage};
use crate::tool_bridge::{ToolExecutionBridge, ToolOutcome};
use crate::traits::{ChatApi, ChatEventStream, FunctionsApi};

/// Request lifecycle of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    Ready,
    Submitted,
    Streaming,
    Error,
}

impl ChatStatus {
    /// True while a request is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, ChatStatus::Submitted | ChatStatus::Streaming)
    }
}

impl std::fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatStatus::Ready => write!(f, "ready"),
            ChatStatus::Submitted => write!(f, "submitted"),
            ChatStatus::Streaming => write!(f, "streaming"),
            ChatStatus::Error => write!(f, "error"),
        }
    }
}

/// How a user turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Last step finished without tool calls
    Completed,
    /// `stop()` was called; streamed content is kept
    Stopped,
    /// Tool results are attached but the step budget is used up
    StepLimitReached,
    /// A tool call could not be executed
    ToolFailed {
        tool_call_id: String,
        message: String,
    },
    /// The backend reported an error in the stream
    Failed { message: String },
}

/// Incremental updates for front ends rendering the conversation
#[derive(Debug, Clone, PartialEq)]
pub enum ChatUpdate {
    Status(ChatStatus),
    TextDelta(String),
    ReasoningDelta(String),
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    ToolResult {
        tool_call_id: String,
        result: Value,
    },
    ToolError {
        tool_call_id: String,
        message: String,
    },
    Cleared,
}

/// Per-request inputs taken from the selection store
#[derive(Debug, Clone, PartialEq)]
pub struct ChatContext {
    pub api_key: String,
    pub linked_account_owner_id: String,
    pub selected_apps: Vec<String>,
    pub selected_functions: Vec<String>,
}

impl ChatContext {
    pub fn from_store(store: &PlaygroundStore, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            linked_account_owner_id: store.selected_linked_account_owner_id().to_string(),
            selected_apps: store.selected_apps().to_vec(),
            selected_functions: store.selected_functions().to_vec(),
        }
    }
}

#[derive(Debug)]
struct ChatState {
    messages: Vec<UiMessage>,
    status: ChatStatus,
    stop: Option<CancellationToken>,
    last_error: Option<String>,
}

struct ChatInner {
    id: String,
    chat: Arc<dyn ChatApi>,
    storage: Arc<dyn SessionStorage>,
    config: ChatConfig,
    bridge: ToolExecutionBridge,
    outcomes: tokio::sync::Mutex<mpsc::UnboundedReceiver<ToolOutcome>>,
    updates: broadcast::Sender<ChatUpdate>,
    state: Mutex<ChatState>,
}

enum StreamEnd {
    Finished,
    Stopped,
    Failed(String),
}

/// One playground conversation
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<ChatInner>,
}

impl ChatSession {
    /// Create the session and restore stored history
    pub fn mount(
        chat: Arc<dyn ChatApi>,
        functions: Arc<dyn FunctionsApi>,
        storage: Arc<dyn SessionStorage>,
        config: ChatConfig,
        tools: ToolBridgeConfig,
    ) -> Self {
        let mut messages = load_chat_history(storage.as_ref());
        trim_history(&mut messages, config.max_history_messages);
        info!(messages = messages.len(), "Chat session mounted");

        let (bridge, outcomes) = ToolExecutionBridge::new(functions, tools);
        let (updates, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(ChatInner {
                id: Uuid::now_v7().to_string(),
                chat,
                storage,
                config,
                bridge,
                outcomes: tokio::sync::Mutex::new(outcomes),
                updates,
                state: Mutex::new(ChatState {
                    messages,
                    status: ChatStatus::Ready,
                    stop: None,
                    last_error: None,
                }),
            }),
        }
    }

    /// Mount with one backend serving chat and function execution
    pub fn with_backend<B>(
        backend: Arc<B>,
        storage: Arc<dyn SessionStorage>,
        config: ChatConfig,
        tools: ToolBridgeConfig,
    ) -> Self
    where
        B: ChatApi + FunctionsApi + 'static,
    {
        Self::mount(backend.clone(), backend, storage, config, tools)
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn messages(&self) -> Vec<UiMessage> {
        self.lock().messages.clone()
    }

    pub fn status(&self) -> ChatStatus {
        self.lock().status
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Failure recorded by the tool bridge for a call
    pub fn tool_error(&self, tool_call_id: &str) -> Option<String> {
        self.inner.bridge.error(tool_call_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatUpdate> {
        self.inner.updates.subscribe()
    }

    fn emit(&self, update: ChatUpdate) {
        // No subscribers is fine
        let _ = self.inner.updates.send(update);
    }

    /// Bound the history and write it to storage
    fn commit(&self, state: &mut ChatState) {
        trim_history(&mut state.messages, self.inner.config.max_history_messages);
        if let Err(e) = save_chat_history(self.inner.storage.as_ref(), &state.messages) {
            warn!(error = %e, "Failed to persist chat history");
        }
    }

    fn set_status(&self, status: ChatStatus) {
        self.lock().status = status;
        self.emit(ChatUpdate::Status(status));
    }

    fn update_message(&self, id: &str, f: impl FnOnce(&mut UiMessage)) {
        let mut state = self.lock();
        if let Some(msg) = state.messages.iter_mut().rev().find(|m| m.id == id) {
            f(msg);
            self.commit(&mut state);
        }
    }

    fn push_message(&self, message: UiMessage) {
        let mut state = self.lock();
        state.messages.push(message);
        self.commit(&mut state);
    }

    // ========================================================================
    // Turn lifecycle
    // ========================================================================

    /// Send a user message and run the turn to completion
    pub async fn submit(&self, input: &str, ctx: &ChatContext) -> Result<TurnOutcome> {
        if input.trim().is_empty() {
            return Err(PortalError::EmptyInput);
        }
        if ctx.linked_account_owner_id.is_empty() {
            return Err(PortalError::NoLinkedAccountOwner);
        }

        let token = {
            let mut state = self.lock();
            if state.status.is_busy() {
                return Err(PortalError::ChatBusy);
            }
            let token = CancellationToken::new();
            state.stop = Some(token.clone());
            state.status = ChatStatus::Submitted;
            state.last_error = None;
            state.messages.push(UiMessage::user(input));
            self.commit(&mut state);
            token
        };
        self.emit(ChatUpdate::Status(ChatStatus::Submitted));
        info!(chat_id = %self.inner.id, apps = ctx.selected_apps.len(), "Chat turn submitted");

        let result = {
            let mut outcomes = self.inner.outcomes.lock().await;
            self.run_turn(ctx, &token, &mut outcomes).await
        };

        let status = {
            let mut state = self.lock();
            state.stop = None;
            match &result {
                Ok(TurnOutcome::Failed { message }) => {
                    state.status = ChatStatus::Error;
                    state.last_error = Some(message.clone());
                }
                Ok(TurnOutcome::ToolFailed { message, .. }) => {
                    state.status = ChatStatus::Ready;
                    state.last_error = Some(message.clone());
                }
                Ok(_) => state.status = ChatStatus::Ready,
                Err(e) => {
                    state.status = ChatStatus::Error;
                    state.last_error = Some(e.to_string());
                }
            }
            state.status
        };
        self.emit(ChatUpdate::Status(status));

        match &result {
            Ok(outcome) => info!(chat_id = %self.inner.id, outcome = ?outcome, "Chat turn finished"),
            Err(e) => warn!(chat_id = %self.inner.id, error = %e, "Chat turn failed"),
        }
        result
    }

    async fn run_turn(
        &self,
        ctx: &ChatContext,
        token: &CancellationToken,
        outcomes: &mut mpsc::UnboundedReceiver<ToolOutcome>,
    ) -> Result<TurnOutcome> {
        let mut assistant_id: Option<String> = None;

        for step in 0..self.inner.config.max_steps.max(1) {
            let request = self.build_request(ctx);
            let stream = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(TurnOutcome::Stopped),
                stream = self.inner.chat.chat_stream(&ctx.api_key, &request) => stream?,
            };
            self.set_status(ChatStatus::Streaming);

            // Later steps continue the same assistant message
            let id = match &assistant_id {
                Some(id) => id.clone(),
                None => {
                    let message = UiMessage::assistant();
                    let id = message.id.clone();
                    self.push_message(message);
                    assistant_id = Some(id.clone());
                    id
                }
            };

            match self.consume_stream(stream, &id, step, token).await {
                StreamEnd::Finished => {}
                StreamEnd::Stopped => return Ok(TurnOutcome::Stopped),
                StreamEnd::Failed(message) => return Ok(TurnOutcome::Failed { message }),
            }

            let pending = self.pending_tool_calls(&id);
            if pending.is_empty() {
                return Ok(TurnOutcome::Completed);
            }
            debug!(step, tools = pending.len(), "Waiting for tool results");
            self.set_status(ChatStatus::Submitted);

            if let Some(outcome) = self
                .execute_tools(&id, &pending, ctx, token, outcomes)
                .await
            {
                return Ok(outcome);
            }
        }

        Ok(TurnOutcome::StepLimitReached)
    }

    fn build_request(&self, ctx: &ChatContext) -> ChatRequest {
        let state = self.lock();
        ChatRequest {
            id: self.inner.id.clone(),
            messages: state.messages.iter().map(ClientMessage::from).collect(),
            linked_account_owner_id: ctx.linked_account_owner_id.clone(),
            selected_apps: ctx.selected_apps.clone(),
            selected_functions: ctx.selected_functions.clone(),
        }
    }

    fn pending_tool_calls(&self, id: &str) -> Vec<ToolInvocation> {
        self.lock()
            .messages
            .iter()
            .rev()
            .find(|m| m.id == id)
            .map(|m| m.pending_tool_invocations())
            .unwrap_or_default()
    }

    async fn consume_stream(
        &self,
        mut stream: ChatEventStream,
        id: &str,
        step: u32,
        token: &CancellationToken,
    ) -> StreamEnd {
        let mut error: Option<String> = None;
        loop {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => return StreamEnd::Stopped,
                event = stream.next() => event,
            };
            let Some(event) = event else { break };

            match event {
                ChatStreamEvent::Error(message) => {
                    warn!(error = %message, "Chat stream reported an error");
                    error = Some(message);
                }
                event => {
                    let terminal = event.is_terminal();
                    self.apply_event(id, step, event);
                    if terminal {
                        break;
                    }
                }
            }
        }
        match error {
            Some(message) => StreamEnd::Failed(message),
            None => StreamEnd::Finished,
        }
    }

    fn apply_event(&self, id: &str, step: u32, event: ChatStreamEvent) {
        match event {
            ChatStreamEvent::TextDelta(delta) => {
                self.update_message(id, |m| m.append_text(&delta));
                self.emit(ChatUpdate::TextDelta(delta));
            }
            ChatStreamEvent::ReasoningDelta(delta) => {
                self.update_message(id, |m| m.append_reasoning(&delta));
                self.emit(ChatUpdate::ReasoningDelta(delta));
            }
            ChatStreamEvent::ToolCallStreamingStart {
                tool_call_id,
                tool_name,
            } => {
                let mut invocation = ToolInvocation::call(tool_call_id, tool_name, Value::Null, step);
                invocation.state = ToolInvocationState::PartialCall;
                self.update_message(id, |m| m.upsert_tool_invocation(invocation));
            }
            ChatStreamEvent::ToolCallDelta {
                tool_call_id,
                args_text_delta,
            } => {
                self.update_message(id, |m| {
                    if let Some(invocation) = m.tool_invocation_mut(&tool_call_id) {
                        invocation.args_text.push_str(&args_text_delta);
                    }
                });
            }
            ChatStreamEvent::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => {
                debug!(tool_call_id = %tool_call_id, tool_name = %tool_name, "Tool call received");
                let invocation =
                    ToolInvocation::call(tool_call_id.clone(), tool_name.clone(), args.clone(), step);
                self.update_message(id, |m| m.upsert_tool_invocation(invocation));
                self.emit(ChatUpdate::ToolCall {
                    tool_call_id,
                    tool_name,
                    args,
                });
            }
            ChatStreamEvent::ToolResult {
                tool_call_id,
                result,
            } => {
                self.update_message(id, |m| {
                    m.set_tool_result(&tool_call_id, result.clone());
                });
                self.emit(ChatUpdate::ToolResult {
                    tool_call_id,
                    result,
                });
            }
            ChatStreamEvent::StartStep { .. } => {
                self.update_message(id, |m| m.start_step());
            }
            ChatStreamEvent::FinishStep {
                finish_reason,
                usage,
                ..
            } => {
                debug!(step, finish_reason = ?finish_reason, usage = ?usage, "Step finished");
            }
            ChatStreamEvent::FinishMessage {
                finish_reason,
                usage,
            } => {
                debug!(finish_reason = ?finish_reason, usage = ?usage, "Message finished");
            }
            ChatStreamEvent::Error(_) => {}
        }
    }

    /// Schedule pending calls and wait for all results. Returns Some when the
    /// turn has to end early.
    async fn execute_tools(
        &self,
        message_id: &str,
        pending: &[ToolInvocation],
        ctx: &ChatContext,
        token: &CancellationToken,
        outcomes: &mut mpsc::UnboundedReceiver<ToolOutcome>,
    ) -> Option<TurnOutcome> {
        let bridge = &self.inner.bridge;
        let mut waiting: HashSet<String> = HashSet::new();
        for invocation in pending {
            if bridge.schedule(invocation, &ctx.linked_account_owner_id, &ctx.api_key) {
                waiting.insert(invocation.tool_call_id.clone());
            }
        }

        while !waiting.is_empty() {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    for id in &waiting {
                        bridge.cancel(id);
                    }
                    return Some(TurnOutcome::Stopped);
                }
                outcome = outcomes.recv() => outcome,
            };
            let Some(outcome) = outcome else {
                return Some(TurnOutcome::Failed {
                    message: "Tool execution channel closed".to_string(),
                });
            };
            if !waiting.remove(outcome.tool_call_id()) {
                debug!(tool_call_id = %outcome.tool_call_id(), "Ignoring stale tool outcome");
                continue;
            }

            match outcome {
                ToolOutcome::Result {
                    tool_call_id,
                    result,
                } => {
                    self.update_message(message_id, |m| {
                        m.set_tool_result(&tool_call_id, result.clone());
                    });
                    self.emit(ChatUpdate::ToolResult {
                        tool_call_id,
                        result,
                    });
                }
                ToolOutcome::Error {
                    tool_call_id,
                    message,
                } => {
                    for id in &waiting {
                        bridge.cancel(id);
                    }
                    self.emit(ChatUpdate::ToolError {
                        tool_call_id: tool_call_id.clone(),
                        message: message.clone(),
                    });
                    return Some(TurnOutcome::ToolFailed {
                        tool_call_id,
                        message,
                    });
                }
            }
        }
        None
    }

    /// Cancel the in-flight request. Returns false when nothing is running.
    pub fn stop(&self) -> bool {
        let token = self.lock().stop.clone();
        match token {
            Some(token) => {
                info!(chat_id = %self.inner.id, "Stopping chat turn");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop the whole conversation, including stored history
    pub fn clear(&self) {
        self.stop();
        self.inner.bridge.cancel_all();
        {
            let mut state = self.lock();
            state.messages.clear();
            state.last_error = None;
            self.commit(&mut state);
        }
        self.emit(ChatUpdate::Cleared);
    }

    /// React to an agent or owner change in the selection store
    pub fn apply_reset(&self, reset: SessionReset) {
        debug!(reason = ?reset.reason, "Clearing chat for session reset");
        self.clear();
    }
}

/// Drop the oldest messages beyond `max`
fn trim_history(messages: &mut Vec<UiMessage>, max: usize) {
    if max > 0 && messages.len() > max {
        let excess = messages.len() - max;
        messages.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryPortal, ScriptedTurn};
    use crate::persist::CHAT_HISTORY_STORAGE_KEY;
    use crate::storage::InMemorySessionStorage;
    use crate::message::ChatRole;
    use serde_json::json;
    use std::time::Duration;

    fn ctx() -> ChatContext {
        ChatContext {
            api_key: "key-1".to_string(),
            linked_account_owner_id: "owner-1".to_string(),
            selected_apps: vec!["GMAIL".to_string()],
            selected_functions: vec![],
        }
    }

    fn session_with(
        portal: &Arc<InMemoryPortal>,
        storage: &InMemorySessionStorage,
        config: ChatConfig,
    ) -> ChatSession {
        ChatSession::with_backend(
            portal.clone(),
            Arc::new(storage.clone()),
            config,
            ToolBridgeConfig::default(),
        )
    }

    fn session(portal: &Arc<InMemoryPortal>) -> (ChatSession, InMemorySessionStorage) {
        let storage = InMemorySessionStorage::new();
        (session_with(portal, &storage, ChatConfig::default()), storage)
    }

    #[tokio::test]
    async fn test_text_turn_completes_and_persists() {
        let portal = Arc::new(InMemoryPortal::new());
        portal.push_turn(ScriptedTurn::text("Hello there"));
        let (chat, storage) = session(&portal);

        let outcome = chat.submit("hi", &ctx()).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(chat.status(), ChatStatus::Ready);

        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[1].content, "Hello there");

        let stored: Vec<UiMessage> =
            serde_json::from_str(&storage.get(CHAT_HISTORY_STORAGE_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, messages);

        let request = &portal.chat_requests()[0];
        assert_eq!(request.id, chat.id());
        assert_eq!(request.linked_account_owner_id, "owner-1");
        assert_eq!(request.selected_apps, vec!["GMAIL".to_string()]);
        assert_eq!(request.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_invalid_submissions() {
        let portal = Arc::new(InMemoryPortal::new());
        let (chat, _) = session(&portal);

        assert!(matches!(
            chat.submit("   ", &ctx()).await,
            Err(PortalError::EmptyInput)
        ));

        let mut no_owner = ctx();
        no_owner.linked_account_owner_id.clear();
        assert!(matches!(
            chat.submit("hi", &no_owner).await,
            Err(PortalError::NoLinkedAccountOwner)
        ));
        assert!(chat.messages().is_empty());
        assert!(portal.chat_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_call_executes_and_continues() {
        let portal = Arc::new(InMemoryPortal::new());
        portal.push_turn(ScriptedTurn::tool_call(
            "call-1",
            "GMAIL__SEND_EMAIL",
            json!({"to": "a@b.c"}),
        ));
        portal.push_turn(ScriptedTurn::text("Email sent"));
        let (chat, _) = session(&portal);

        let outcome = chat.submit("send an email", &ctx()).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(portal.execute_count(), 1);

        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        let assistant = &messages[1];
        let invocation = assistant.tool_invocations().next().unwrap();
        assert_eq!(invocation.state, ToolInvocationState::Result);
        assert_eq!(invocation.result.as_ref().unwrap()["success"], true);
        assert!(assistant.content.ends_with("Email sent"));
        assert_eq!(assistant.step_count(), 2);

        let requests = portal.chat_requests();
        assert_eq!(requests.len(), 2);
        let continued = serde_json::to_value(&requests[1].messages[1]).unwrap();
        assert_eq!(continued["toolInvocations"][0]["state"], "result");
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failure_result_is_still_a_tool_result() {
        let portal = Arc::new(InMemoryPortal::new());
        portal.set_execute_result(
            "GMAIL__SEND_EMAIL",
            crate::function::FunctionExecutionResult::failed("Linked account disabled"),
        );
        portal.push_turn(ScriptedTurn::tool_call("call-1", "GMAIL__SEND_EMAIL", json!({})));
        portal.push_turn(ScriptedTurn::text("Could not send"));
        let (chat, _) = session(&portal);

        let outcome = chat.submit("send", &ctx()).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);
        let messages = chat.messages();
        let result = messages[1].tool_invocations().next().unwrap().result.clone().unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(result["error"], "Linked account disabled");
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_budget_limits_round_trips() {
        let portal = Arc::new(InMemoryPortal::new());
        for i in 0..4 {
            portal.push_turn(ScriptedTurn::tool_call(
                &format!("call-{}", i),
                "GMAIL__LIST",
                json!({}),
            ));
        }
        let (chat, _) = session(&portal);

        let outcome = chat.submit("loop", &ctx()).await.unwrap();
        assert_eq!(outcome, TurnOutcome::StepLimitReached);
        assert_eq!(portal.chat_requests().len(), 3);
        assert_eq!(portal.execute_count(), 3);
        assert_eq!(chat.status(), ChatStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_transport_failure_ends_turn() {
        let portal = Arc::new(InMemoryPortal::new());
        portal.fail_next_execute("connection refused");
        portal.push_turn(ScriptedTurn::tool_call("call-1", "GMAIL__SEND_EMAIL", json!({})));
        let (chat, _) = session(&portal);

        let outcome = chat.submit("send", &ctx()).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::ToolFailed { ref tool_call_id, .. } if tool_call_id == "call-1"));
        assert!(chat.tool_error("call-1").unwrap().contains("connection refused"));
        assert_eq!(chat.status(), ChatStatus::Ready);
        assert_eq!(portal.chat_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_error_sets_error_status() {
        let portal = Arc::new(InMemoryPortal::new());
        portal.push_turn(ScriptedTurn::new(vec![
            ChatStreamEvent::TextDelta("partial".into()),
            ChatStreamEvent::Error("model overloaded".into()),
        ]));
        let (chat, _) = session(&portal);

        let outcome = chat.submit("hi", &ctx()).await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Failed {
                message: "model overloaded".into()
            }
        );
        assert_eq!(chat.status(), ChatStatus::Error);
        assert_eq!(chat.last_error().as_deref(), Some("model overloaded"));
        assert_eq!(chat.messages()[1].content, "partial");

        // Error status does not block the next turn
        portal.push_turn(ScriptedTurn::text("ok"));
        assert_eq!(chat.submit("again", &ctx()).await.unwrap(), TurnOutcome::Completed);
    }

    #[tokio::test]
    async fn test_transport_failure_is_error() {
        let portal = Arc::new(InMemoryPortal::new());
        portal.fail_next("chat_stream", "connection refused");
        let (chat, _) = session(&portal);

        assert!(matches!(
            chat.submit("hi", &ctx()).await,
            Err(PortalError::Transport(_))
        ));
        assert_eq!(chat.status(), ChatStatus::Error);
        assert_eq!(chat.messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_and_stop() {
        let portal = Arc::new(InMemoryPortal::new());
        portal.push_turn(ScriptedTurn::new(vec![ChatStreamEvent::TextDelta("Thinking".into())]).hanging());
        let (chat, _) = session(&portal);

        let running = {
            let chat = chat.clone();
            tokio::spawn(async move { chat.submit("hi", &ctx()).await })
        };
        let streamed = |chat: &ChatSession| {
            chat.messages()
                .get(1)
                .map(|m| m.content == "Thinking")
                .unwrap_or(false)
        };
        while !streamed(&chat) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(chat.status(), ChatStatus::Streaming);

        assert!(matches!(
            chat.submit("again", &ctx()).await,
            Err(PortalError::ChatBusy)
        ));

        assert!(chat.stop());
        let outcome = running.await.unwrap().unwrap();
        assert_eq!(outcome, TurnOutcome::Stopped);
        assert_eq!(chat.status(), ChatStatus::Ready);
        assert_eq!(chat.messages()[1].content, "Thinking");
        assert!(!chat.stop());
    }

    #[tokio::test]
    async fn test_mount_restores_history() {
        let portal = Arc::new(InMemoryPortal::new());
        portal.push_turn(ScriptedTurn::text("first reply"));
        let (chat, storage) = session(&portal);
        chat.submit("hi", &ctx()).await.unwrap();

        let remounted = session_with(&portal, &storage, ChatConfig::default());
        assert_eq!(remounted.messages(), chat.messages());
    }

    #[tokio::test]
    async fn test_mount_with_corrupt_history_is_empty() {
        let portal = Arc::new(InMemoryPortal::new());
        let storage = InMemorySessionStorage::new();
        storage.set(CHAT_HISTORY_STORAGE_KEY, "[{broken").unwrap();

        let chat = session_with(&portal, &storage, ChatConfig::default());
        assert!(chat.messages().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let portal = Arc::new(InMemoryPortal::new());
        portal.push_turn(ScriptedTurn::text("one"));
        portal.push_turn(ScriptedTurn::text("two"));
        let storage = InMemorySessionStorage::new();
        let config = ChatConfig {
            max_history_messages: 3,
            ..Default::default()
        };
        let chat = session_with(&portal, &storage, config);

        chat.submit("first", &ctx()).await.unwrap();
        chat.submit("second", &ctx()).await.unwrap();

        let messages = chat.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "one");
        assert_eq!(messages[2].content, "two");
        assert_eq!(crate::persist::load_chat_history(&storage).len(), 3);
    }

    #[tokio::test]
    async fn test_reset_clears_history_and_storage() {
        let portal = Arc::new(InMemoryPortal::new());
        portal.push_turn(ScriptedTurn::text("reply"));
        let (chat, storage) = session(&portal);
        chat.submit("hi", &ctx()).await.unwrap();
        let mut updates = chat.subscribe();

        chat.apply_reset(SessionReset {
            reason: crate::selection::ResetReason::OwnerChanged,
        });
        assert!(chat.messages().is_empty());
        assert_eq!(storage.get(CHAT_HISTORY_STORAGE_KEY).unwrap().as_deref(), Some("[]"));
        assert_eq!(updates.recv().await.unwrap(), ChatUpdate::Cleared);
    }

    #[test]
    fn test_trim_history() {
        let mut messages: Vec<UiMessage> = (0..5).map(|i| UiMessage::user(i.to_string())).collect();
        trim_history(&mut messages, 2);
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["3", "4"]);
    }
}
