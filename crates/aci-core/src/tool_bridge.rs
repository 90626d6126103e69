// Tool execution bridge
//
// Tool calls requested by the model are executed on the client against the
// backend's function execute endpoint. Each call ID goes through:
//
//   Pending (debounce) -> Executing -> Succeeded | Failed
//
// Re-scheduling an ID while it is pending restarts the debounce window
// instead of queueing a second execution. Cancelled timers never execute.
// Once executing, a call runs to completion. Outcomes are delivered through
// the channel returned by `ToolExecutionBridge::new`.
//
// Per-call state and errors live exactly as long as the call's dedup entry:
// when the table evicts an ID (TTL or capacity), its state goes with it and
// the ID may be scheduled again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ToolBridgeConfig;
use crate::dedup::DedupTable;
use crate::function::FunctionExecute;
use crate::message::ToolInvocation;
use crate::traits::FunctionsApi;

/// Execution state of one tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallState {
    Pending,
    Executing,
    Succeeded,
    Failed,
}

/// Result of a scheduled tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The backend answered; `result` is the execution result object
    Result { tool_call_id: String, result: Value },
    /// The call could not be executed
    Error {
        tool_call_id: String,
        message: String,
    },
}

impl ToolOutcome {
    pub fn tool_call_id(&self) -> &str {
        match self {
            ToolOutcome::Result { tool_call_id, .. } | ToolOutcome::Error { tool_call_id, .. } => {
                tool_call_id
            }
        }
    }
}

#[derive(Debug, Default)]
struct BridgeState {
    states: HashMap<String, ToolCallState>,
    errors: HashMap<String, String>,
    /// Pending debounce timers: generation and cancellation token
    timers: HashMap<String, (u64, CancellationToken)>,
    dedup: DedupTable,
    generation: u64,
}

impl BridgeState {
    /// Forget calls whose dedup entries were evicted, unless re-scheduled
    fn purge_evicted(&mut self) {
        for id in self.dedup.take_evicted() {
            if self.timers.contains_key(&id) {
                continue;
            }
            self.states.remove(&id);
            self.errors.remove(&id);
        }
    }

    fn sweep(&mut self) {
        self.dedup.sweep();
        self.purge_evicted();
    }
}

/// Debounced, deduplicated tool executor
pub struct ToolExecutionBridge {
    functions: Arc<dyn FunctionsApi>,
    config: ToolBridgeConfig,
    state: Arc<Mutex<BridgeState>>,
    outcomes: mpsc::UnboundedSender<ToolOutcome>,
    shutdown: CancellationToken,
}

impl ToolExecutionBridge {
    pub fn new(
        functions: Arc<dyn FunctionsApi>,
        config: ToolBridgeConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ToolOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = BridgeState {
            dedup: DedupTable::new(config.dedup_ttl, config.dedup_capacity),
            ..Default::default()
        };
        let bridge = Self {
            functions,
            config,
            state: Arc::new(Mutex::new(state)),
            outcomes: tx,
            shutdown: CancellationToken::new(),
        };
        (bridge, rx)
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        lock_state(&self.state)
    }

    /// Schedule a tool call for execution after the debounce window
    ///
    /// Returns false when the call ID is already executing or completed.
    pub fn schedule(
        &self,
        invocation: &ToolInvocation,
        linked_account_owner_id: &str,
        api_key: &str,
    ) -> bool {
        let id = invocation.tool_call_id.clone();
        let (generation, token) = {
            let mut state = self.lock();
            state.sweep();
            if state.dedup.contains(&id) {
                debug!(tool_call_id = %id, "Tool call already handled, not scheduling");
                return false;
            }
            if let Some((_, previous)) = state.timers.remove(&id) {
                debug!(tool_call_id = %id, "Restarting debounce window");
                previous.cancel();
            }
            state.generation += 1;
            let generation = state.generation;
            let token = self.shutdown.child_token();
            state.timers.insert(id.clone(), (generation, token.clone()));
            state.states.insert(id.clone(), ToolCallState::Pending);
            state.errors.remove(&id);
            (generation, token)
        };

        let task = PendingCall {
            tool_call_id: id,
            tool_name: invocation.tool_name.clone(),
            body: FunctionExecute {
                function_input: invocation.args.clone(),
                linked_account_owner_id: linked_account_owner_id.to_string(),
            },
            api_key: api_key.to_string(),
            generation,
        };
        tokio::spawn(task.run(
            token,
            self.config.debounce,
            Arc::clone(&self.functions),
            Arc::clone(&self.state),
            self.outcomes.clone(),
        ));
        true
    }

    /// Abort a pending timer. Executing calls are not affected.
    pub fn cancel(&self, tool_call_id: &str) -> bool {
        let mut state = self.lock();
        match state.timers.remove(tool_call_id) {
            Some((_, token)) => {
                token.cancel();
                state.states.remove(tool_call_id);
                debug!(tool_call_id = %tool_call_id, "Cancelled pending tool call");
                true
            }
            None => false,
        }
    }

    /// Abort every pending timer
    pub fn cancel_all(&self) {
        let mut state = self.lock();
        let ids: Vec<String> = state.timers.keys().cloned().collect();
        for id in ids {
            if let Some((_, token)) = state.timers.remove(&id) {
                token.cancel();
                state.states.remove(&id);
            }
        }
    }

    pub fn state(&self, tool_call_id: &str) -> Option<ToolCallState> {
        let mut state = self.lock();
        state.sweep();
        state.states.get(tool_call_id).copied()
    }

    /// Human-readable failure of a tool call, if it failed
    pub fn error(&self, tool_call_id: &str) -> Option<String> {
        let mut state = self.lock();
        state.sweep();
        state.errors.get(tool_call_id).cloned()
    }

    /// Number of calls waiting for their debounce window
    pub fn pending_count(&self) -> usize {
        self.lock().timers.len()
    }
}

impl Drop for ToolExecutionBridge {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn lock_state(state: &Mutex<BridgeState>) -> MutexGuard<'_, BridgeState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

struct PendingCall {
    tool_call_id: String,
    tool_name: String,
    body: FunctionExecute,
    api_key: String,
    generation: u64,
}

impl PendingCall {
    async fn run(
        self,
        token: CancellationToken,
        debounce: std::time::Duration,
        functions: Arc<dyn FunctionsApi>,
        state: Arc<Mutex<BridgeState>>,
        outcomes: mpsc::UnboundedSender<ToolOutcome>,
    ) {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(debounce) => {}
        }

        {
            let mut guard = lock_state(&state);
            match guard.timers.get(&self.tool_call_id) {
                Some((generation, _)) if *generation == self.generation => {
                    guard.timers.remove(&self.tool_call_id);
                }
                _ => return,
            }
            if !guard.dedup.try_begin(&self.tool_call_id) {
                debug!(tool_call_id = %self.tool_call_id, "Tool call already executing");
                return;
            }
            guard
                .states
                .insert(self.tool_call_id.clone(), ToolCallState::Executing);
            guard.purge_evicted();
        }

        info!(
            tool_call_id = %self.tool_call_id,
            tool_name = %self.tool_name,
            "Executing tool call"
        );
        let result = functions
            .execute_function(&self.tool_name, &self.body, &self.api_key)
            .await
            .and_then(|r| {
                serde_json::to_value(r).map_err(|e| crate::error::PortalError::tool(e.to_string()))
            });

        let outcome = {
            let mut guard = lock_state(&state);
            match result {
                Ok(value) => {
                    guard.dedup.complete(&self.tool_call_id);
                    guard
                        .states
                        .insert(self.tool_call_id.clone(), ToolCallState::Succeeded);
                    ToolOutcome::Result {
                        tool_call_id: self.tool_call_id,
                        result: value,
                    }
                }
                Err(e) => {
                    warn!(
                        tool_call_id = %self.tool_call_id,
                        tool_name = %self.tool_name,
                        error = %e,
                        "Tool execution failed"
                    );
                    let message = e.to_string();
                    guard.dedup.fail(&self.tool_call_id);
                    guard
                        .states
                        .insert(self.tool_call_id.clone(), ToolCallState::Failed);
                    guard
                        .errors
                        .insert(self.tool_call_id.clone(), message.clone());
                    ToolOutcome::Error {
                        tool_call_id: self.tool_call_id,
                        message,
                    }
                }
            }
        };

        lock_state(&state).purge_evicted();
        if outcomes.send(outcome).is_err() {
            debug!("Tool outcome receiver dropped");
        }
    }
}
