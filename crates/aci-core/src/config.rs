// Portal and playground configuration
//
// PortalConfig can be:
// - Read from the environment via `from_env` (the CLI loads `.env` first)
// - Built directly with PortalConfigBuilder for tests and embedding

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dedup::{DEFAULT_DEDUP_CAPACITY, DEFAULT_DEDUP_TTL};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_SESSION_DIR: &str = ".aci-session";

/// Chat orchestration limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Model round trips per user turn
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Messages kept in memory and in session storage
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,
}

fn default_max_steps() -> u32 {
    3
}

fn default_max_history_messages() -> usize {
    200
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_history_messages: default_max_history_messages(),
        }
    }
}

/// Tool execution bridge timing
#[derive(Debug, Clone, PartialEq)]
pub struct ToolBridgeConfig {
    /// Quiet period before a scheduled tool call executes
    pub debounce: Duration,
    /// How long a completed call ID stays blocked
    pub dedup_ttl: Duration,
    pub dedup_capacity: usize,
}

impl Default for ToolBridgeConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1000),
            dedup_ttl: DEFAULT_DEDUP_TTL,
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
        }
    }
}

impl ToolBridgeConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PortalConfig {
    /// Backend base URL without trailing slash
    pub api_url: String,
    /// Agent API key for playground and project-scoped endpoints
    pub api_key: Option<String>,
    /// Identity token for organization-scoped endpoints
    pub access_token: Option<String>,
    pub org_id: Option<String>,
    /// Directory holding the session storage file
    pub session_dir: PathBuf,
    pub chat: ChatConfig,
    pub tools: ToolBridgeConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            access_token: None,
            org_id: None,
            session_dir: PathBuf::from(DEFAULT_SESSION_DIR),
            chat: ChatConfig::default(),
            tools: ToolBridgeConfig::default(),
        }
    }
}

impl PortalConfig {
    /// Read configuration from `ACI_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let debounce = non_empty("ACI_TOOL_DEBOUNCE_MS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.tools.debounce);

        let max_steps = non_empty("ACI_CHAT_MAX_STEPS")
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.chat.max_steps);

        let max_history_messages = non_empty("ACI_CHAT_MAX_HISTORY")
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.chat.max_history_messages);

        Self {
            api_url: non_empty("ACI_API_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            api_key: non_empty("ACI_API_KEY"),
            access_token: non_empty("ACI_ACCESS_TOKEN"),
            org_id: non_empty("ACI_ORG_ID"),
            session_dir: non_empty("ACI_SESSION_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_dir),
            chat: ChatConfig {
                max_steps,
                max_history_messages,
            },
            tools: ToolBridgeConfig {
                debounce,
                ..defaults.tools
            },
        }
    }

    pub fn builder() -> PortalConfigBuilder {
        PortalConfigBuilder::new()
    }
}

/// Builder for PortalConfig with fluent API
#[derive(Debug, Default)]
pub struct PortalConfigBuilder {
    config: PortalConfig,
}

impl PortalConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = Some(token.into());
        self
    }

    pub fn org_id(mut self, org_id: impl Into<String>) -> Self {
        self.config.org_id = Some(org_id.into());
        self
    }

    pub fn session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.session_dir = dir.into();
        self
    }

    pub fn max_steps(mut self, steps: u32) -> Self {
        self.config.chat.max_steps = steps;
        self
    }

    pub fn max_history_messages(mut self, max: usize) -> Self {
        self.config.chat.max_history_messages = max;
        self
    }

    pub fn tool_debounce(mut self, debounce: Duration) -> Self {
        self.config.tools.debounce = debounce;
        self
    }

    pub fn build(self) -> PortalConfig {
        self.config
    }
}
