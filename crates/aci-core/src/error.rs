// Error types for the portal client and playground

use thiserror::Error;

/// Result type alias for portal operations
pub type Result<T> = std::result::Result<T, PortalError>;

/// Errors that can occur while talking to the backend or driving the playground
#[derive(Debug, Error)]
pub enum PortalError {
    /// Backend answered with a non-success status
    #[error("HTTP {status} {status_text}: {message}")]
    Http {
        status: u16,
        status_text: String,
        message: String,
    },

    /// Request never produced a response (DNS, connect, body decode)
    #[error("Transport error: {0}")]
    Transport(String),

    /// App configuration already exists (HTTP 409 on create)
    #[error("App configuration already exists for app: {0}")]
    AppAlreadyConfigured(String),

    /// Backend response did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Project has no usable API key
    #[error("No API key available in project: {project_id} {project_name}")]
    NoApiKey {
        project_id: String,
        project_name: String,
    },

    /// Agent is not part of the project
    #[error("Agent {agent_id} not found in project {project_id}")]
    AgentNotFound {
        agent_id: String,
        project_id: String,
    },

    /// Too many apps selected for a playground session
    #[error("You can only select up to {0} apps at a time")]
    SelectionLimitExceeded(usize),

    /// A chat request is already submitted or streaming
    #[error("Please wait for the previous request to complete")]
    ChatBusy,

    /// Chat requires a linked account owner
    #[error("Please select a linked account owner")]
    NoLinkedAccountOwner,

    /// Nothing to send
    #[error("Message is empty")]
    EmptyInput,

    /// Operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Session storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configure-app flow rejected an input or step
    #[error("Configure app: {0}")]
    Wizard(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PortalError {
    /// Create an HTTP status error
    pub fn http(status: u16, status_text: impl Into<String>, message: impl Into<String>) -> Self {
        PortalError::Http {
            status,
            status_text: status_text.into(),
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        PortalError::Transport(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        PortalError::InvalidResponse(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        PortalError::ToolExecution(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        PortalError::Storage(msg.into())
    }

    /// Create a configure-app flow error
    pub fn wizard(msg: impl Into<String>) -> Self {
        PortalError::Wizard(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        PortalError::Configuration(msg.into())
    }

    /// HTTP status code, if the error came from a backend response
    pub fn status(&self) -> Option<u16> {
        match self {
            PortalError::Http { status, .. } => Some(*status),
            PortalError::AppAlreadyConfigured(_) => Some(409),
            _ => None,
        }
    }

    /// True when the backend reported the resource as already existing
    pub fn is_conflict(&self) -> bool {
        matches!(self, PortalError::AppAlreadyConfigured(_)) || self.status() == Some(409)
    }
}
