// Backend seams
//
// The playground, the configure-app flow and the CLI talk to the backend
// only through these traits:
// - aci-client implements them over HTTP
// - memory::InMemoryPortal implements them for tests
//
// Playground endpoints authenticate with an agent API key, which changes with
// the selected agent, so the key is passed per call. Agent management uses the
// identity token instead.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::app::{App, AppConfig, CreateAppConfigRequest};
use crate::error::Result;
use crate::function::{AppFunction, FunctionExecute, FunctionExecutionResult, FunctionsSearchParams};
use crate::linked_account::{CreateApiKeyLinkedAccount, CreateNoAuthLinkedAccount, LinkedAccount};
use crate::project::{Agent, AgentUpdate};
use crate::stream::{ChatRequest, ChatStreamEvent};

/// Identity token for organization-scoped endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub org_id: Option<String>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            org_id: None,
        }
    }

    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[async_trait]
pub trait AppsApi: Send + Sync {
    /// Fetch apps by name; an empty slice returns the whole catalog
    async fn get_apps(&self, app_names: &[String], api_key: &str) -> Result<Vec<App>>;
}

#[async_trait]
pub trait AppConfigsApi: Send + Sync {
    /// Create an app configuration. A 409 surfaces as `PortalError::AppAlreadyConfigured`.
    async fn create_app_config(
        &self,
        request: &CreateAppConfigRequest,
        api_key: &str,
    ) -> Result<AppConfig>;
}

// ============================================================================
// Linked accounts
// ============================================================================

#[async_trait]
pub trait LinkedAccountsApi: Send + Sync {
    async fn get_all_linked_accounts(&self, api_key: &str) -> Result<Vec<LinkedAccount>>;

    async fn create_no_auth_linked_account(
        &self,
        request: &CreateNoAuthLinkedAccount,
        api_key: &str,
    ) -> Result<LinkedAccount>;

    async fn create_api_key_linked_account(
        &self,
        request: &CreateApiKeyLinkedAccount,
        api_key: &str,
    ) -> Result<LinkedAccount>;

    /// URL the owner visits to complete the OAuth2 link
    async fn get_oauth2_link_url(
        &self,
        app_name: &str,
        linked_account_owner_id: &str,
        after_link_redirect_url: Option<&str>,
        api_key: &str,
    ) -> Result<String>;
}

// ============================================================================
// Functions
// ============================================================================

#[async_trait]
pub trait FunctionsApi: Send + Sync {
    async fn search_functions(
        &self,
        params: &FunctionsSearchParams,
        api_key: &str,
    ) -> Result<Vec<AppFunction>>;

    /// Execute a function. Backend rejections come back as
    /// `FunctionExecutionResult { success: false, .. }`; only transport
    /// failures are errors.
    async fn execute_function(
        &self,
        function_name: &str,
        body: &FunctionExecute,
        api_key: &str,
    ) -> Result<FunctionExecutionResult>;
}

// ============================================================================
// Agents
// ============================================================================

#[async_trait]
pub trait AgentsApi: Send + Sync {
    async fn update_agent(
        &self,
        project_id: &str,
        agent_id: &str,
        update: &AgentUpdate,
        token: &AccessToken,
    ) -> Result<Agent>;
}

// ============================================================================
// Chat
// ============================================================================

/// Decoded events of one chat response
pub type ChatEventStream = Pin<Box<dyn Stream<Item = ChatStreamEvent> + Send>>;

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Open one streaming chat request
    async fn chat_stream(&self, api_key: &str, request: &ChatRequest) -> Result<ChatEventStream>;
}

/// Everything the playground and configure-app flow need from the backend
pub trait PortalApi:
    AppsApi + AppConfigsApi + LinkedAccountsApi + FunctionsApi + AgentsApi + ChatApi
{
}

impl<T> PortalApi for T where
    T: AppsApi + AppConfigsApi + LinkedAccountsApi + FunctionsApi + AgentsApi + ChatApi
{
}
