// ACI developer portal core
//
// This crate holds the playground session logic and the portal domain types,
// independent of any HTTP transport.
//
// Key design decisions:
// - Backend access goes through traits (AppsApi, FunctionsApi, ChatApi, ...)
//   implemented by aci-client over reqwest and by InMemoryPortal for tests
// - PlaygroundStore owns the selection; changes that invalidate the
//   conversation return a SessionReset the chat session must apply
// - ChatSession streams replies and runs client-side tool calls through the
//   ToolExecutionBridge (debounced, deduplicated by tool-call ID)
// - Session state (selection, chat history) is written through a
//   SessionStorage trait; the CLI uses a file per session directory

// Domain entity types
pub mod analytics;
pub mod app;
pub mod billing;
pub mod function;
pub mod linked_account;
pub mod message;
pub mod project;

pub mod config;
pub mod error;
pub mod stream;
pub mod traits;

// Session state
pub mod persist;
pub mod selection;
pub mod storage;

// Orchestration
pub mod chat;
pub mod dedup;
pub mod playground;
pub mod tool_bridge;

// Portal flows and views
pub mod table;
pub mod toggle;
pub mod wizard;

// In-memory backend for tests and offline use
pub mod memory;

// Re-exports for convenience
pub use chat::{ChatContext, ChatSession, ChatStatus, ChatUpdate, TurnOutcome};
pub use config::{ChatConfig, PortalConfig, PortalConfigBuilder, ToolBridgeConfig};
pub use error::{PortalError, Result};
pub use message::{ChatRole, MessagePart, ToolInvocation, ToolInvocationState, UiMessage};
pub use playground::Playground;
pub use selection::{PlaygroundStore, ResetReason, SessionReset, MAX_SELECTED_APPS};
pub use storage::{FileSessionStorage, InMemorySessionStorage, SessionStorage};
pub use stream::{ChatRequest, ChatStreamEvent, LineDecoder};
pub use tool_bridge::{ToolCallState, ToolExecutionBridge, ToolOutcome};
pub use traits::{
    AccessToken, AgentsApi, AppConfigsApi, AppsApi, ChatApi, ChatEventStream, FunctionsApi,
    LinkedAccountsApi, PortalApi,
};
