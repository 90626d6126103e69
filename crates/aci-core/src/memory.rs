// In-memory backend for tests and offline demos
//
// InMemoryPortal implements every backend seam from `traits` on plain
// collections. Chat responses are scripted: each `chat_stream` call pops the
// next queued turn. Failures can be injected per operation.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::app::{App, AppConfig, CreateAppConfigRequest, SecurityScheme};
use crate::error::{PortalError, Result};
use crate::function::{
    function_belongs_to, AppFunction, FunctionExecute, FunctionExecutionResult,
    FunctionsSearchParams,
};
use crate::linked_account::{CreateApiKeyLinkedAccount, CreateNoAuthLinkedAccount, LinkedAccount};
use crate::project::{Agent, AgentUpdate};
use crate::stream::{ChatRequest, ChatStreamEvent};
use crate::traits::{
    AccessToken, AgentsApi, AppConfigsApi, AppsApi, ChatApi, ChatEventStream, FunctionsApi,
    LinkedAccountsApi,
};

/// A recorded function execution
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedCall {
    pub function_name: String,
    pub body: FunctionExecute,
    pub api_key: String,
}

/// One scripted chat response
#[derive(Debug, Clone, Default)]
pub struct ScriptedTurn {
    pub events: Vec<ChatStreamEvent>,
    /// Keep the stream open after the events instead of ending it
    pub hang: bool,
}

impl ScriptedTurn {
    pub fn new(events: Vec<ChatStreamEvent>) -> Self {
        Self {
            events,
            hang: false,
        }
    }

    /// Text reply that finishes the message
    pub fn text(text: &str) -> Self {
        Self::new(vec![
            ChatStreamEvent::StartStep { message_id: None },
            ChatStreamEvent::TextDelta(text.to_string()),
            ChatStreamEvent::FinishStep {
                finish_reason: Some("stop".to_string()),
                is_continued: false,
                usage: None,
            },
            ChatStreamEvent::FinishMessage {
                finish_reason: Some("stop".to_string()),
                usage: None,
            },
        ])
    }

    /// Reply that requests one tool call and stops for its result
    pub fn tool_call(tool_call_id: &str, tool_name: &str, args: serde_json::Value) -> Self {
        Self::new(vec![
            ChatStreamEvent::StartStep { message_id: None },
            ChatStreamEvent::ToolCall {
                tool_call_id: tool_call_id.to_string(),
                tool_name: tool_name.to_string(),
                args,
            },
            ChatStreamEvent::FinishStep {
                finish_reason: Some("tool-calls".to_string()),
                is_continued: false,
                usage: None,
            },
            ChatStreamEvent::FinishMessage {
                finish_reason: Some("tool-calls".to_string()),
                usage: None,
            },
        ])
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }
}

#[derive(Debug, Default)]
struct PortalData {
    apps: Vec<App>,
    functions: Vec<AppFunction>,
    linked_accounts: Vec<LinkedAccount>,
    app_configs: Vec<AppConfig>,
    agents: Vec<Agent>,
    agent_updates: Vec<(String, AgentUpdate)>,
    executed: Vec<ExecutedCall>,
    execute_results: HashMap<String, FunctionExecutionResult>,
    chat_turns: VecDeque<ScriptedTurn>,
    chat_requests: Vec<ChatRequest>,
    failures: HashMap<String, String>,
    search_count: usize,
}

/// In-memory implementation of the backend
#[derive(Debug, Default)]
pub struct InMemoryPortal {
    data: Mutex<PortalData>,
}

impl InMemoryPortal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PortalData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return an injected failure for `operation`, consuming it
    fn take_failure(&self, operation: &str) -> Result<()> {
        match self.lock().failures.remove(operation) {
            Some(message) => Err(PortalError::transport(message)),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------------

    pub fn with_apps(self, apps: Vec<App>) -> Self {
        self.lock().apps = apps;
        self
    }

    pub fn with_functions(self, functions: Vec<AppFunction>) -> Self {
        self.lock().functions = functions;
        self
    }

    pub fn with_linked_accounts(self, accounts: Vec<LinkedAccount>) -> Self {
        self.lock().linked_accounts = accounts;
        self
    }

    pub fn with_app_configs(self, configs: Vec<AppConfig>) -> Self {
        self.lock().app_configs = configs;
        self
    }

    pub fn with_agents(self, agents: Vec<Agent>) -> Self {
        self.lock().agents = agents;
        self
    }

    /// Queue a scripted chat response
    pub fn push_turn(&self, turn: ScriptedTurn) {
        self.lock().chat_turns.push_back(turn);
    }

    /// Make the next call of `operation` fail with a transport error
    pub fn fail_next(&self, operation: &str, message: &str) {
        self.lock()
            .failures
            .insert(operation.to_string(), message.to_string());
    }

    pub fn fail_next_execute(&self, message: &str) {
        self.fail_next("execute_function", message);
    }

    /// Fixed result for a function instead of the default success
    pub fn set_execute_result(&self, function_name: &str, result: FunctionExecutionResult) {
        self.lock()
            .execute_results
            .insert(function_name.to_string(), result);
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn execute_count(&self) -> usize {
        self.lock().executed.len()
    }

    pub fn executed_calls(&self) -> Vec<ExecutedCall> {
        self.lock().executed.clone()
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.lock().chat_requests.clone()
    }

    pub fn search_count(&self) -> usize {
        self.lock().search_count
    }

    pub fn linked_accounts(&self) -> Vec<LinkedAccount> {
        self.lock().linked_accounts.clone()
    }

    pub fn app_configs(&self) -> Vec<AppConfig> {
        self.lock().app_configs.clone()
    }

    pub fn agents(&self) -> Vec<Agent> {
        self.lock().agents.clone()
    }

    pub fn agent_updates(&self) -> Vec<(String, AgentUpdate)> {
        self.lock().agent_updates.clone()
    }

    fn add_linked_account(
        &self,
        app_name: &str,
        owner_id: &str,
        security_scheme: SecurityScheme,
    ) -> LinkedAccount {
        let mut data = self.lock();
        let account = LinkedAccount {
            id: format!("la-{}", data.linked_accounts.len() + 1),
            project_id: "proj-1".to_string(),
            app_name: app_name.to_string(),
            linked_account_owner_id: owner_id.to_string(),
            security_scheme,
            enabled: true,
            created_at: chrono::Utc::now().to_rfc3339(),
            updated_at: chrono::Utc::now().to_rfc3339(),
            last_used_at: None,
        };
        data.linked_accounts.push(account.clone());
        account
    }
}

#[async_trait]
impl AppsApi for InMemoryPortal {
    async fn get_apps(&self, app_names: &[String], _api_key: &str) -> Result<Vec<App>> {
        self.take_failure("get_apps")?;
        let data = self.lock();
        Ok(data
            .apps
            .iter()
            .filter(|a| app_names.is_empty() || app_names.contains(&a.name))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AppConfigsApi for InMemoryPortal {
    async fn create_app_config(
        &self,
        request: &CreateAppConfigRequest,
        _api_key: &str,
    ) -> Result<AppConfig> {
        self.take_failure("create_app_config")?;
        let mut data = self.lock();
        if data.app_configs.iter().any(|c| c.app_name == request.app_name) {
            return Err(PortalError::AppAlreadyConfigured(request.app_name.clone()));
        }
        let config = AppConfig {
            id: format!("cfg-{}", data.app_configs.len() + 1),
            project_id: "proj-1".to_string(),
            app_name: request.app_name.clone(),
            security_scheme: request.security_scheme.clone(),
            security_scheme_overrides: serde_json::to_value(&request.security_scheme_overrides)
                .unwrap_or_default(),
            enabled: true,
            all_functions_enabled: request.all_functions_enabled,
            enabled_functions: request.enabled_functions.clone(),
        };
        data.app_configs.push(config.clone());
        Ok(config)
    }
}

#[async_trait]
impl LinkedAccountsApi for InMemoryPortal {
    async fn get_all_linked_accounts(&self, _api_key: &str) -> Result<Vec<LinkedAccount>> {
        self.take_failure("get_all_linked_accounts")?;
        Ok(self.lock().linked_accounts.clone())
    }

    async fn create_no_auth_linked_account(
        &self,
        request: &CreateNoAuthLinkedAccount,
        _api_key: &str,
    ) -> Result<LinkedAccount> {
        self.take_failure("create_no_auth_linked_account")?;
        Ok(self.add_linked_account(
            &request.app_name,
            &request.linked_account_owner_id,
            SecurityScheme::NoAuth,
        ))
    }

    async fn create_api_key_linked_account(
        &self,
        request: &CreateApiKeyLinkedAccount,
        _api_key: &str,
    ) -> Result<LinkedAccount> {
        self.take_failure("create_api_key_linked_account")?;
        Ok(self.add_linked_account(
            &request.app_name,
            &request.linked_account_owner_id,
            SecurityScheme::ApiKey,
        ))
    }

    async fn get_oauth2_link_url(
        &self,
        app_name: &str,
        linked_account_owner_id: &str,
        after_link_redirect_url: Option<&str>,
        _api_key: &str,
    ) -> Result<String> {
        self.take_failure("get_oauth2_link_url")?;
        let mut url = format!(
            "https://auth.example.com/authorize?app_name={}&linked_account_owner_id={}",
            app_name, linked_account_owner_id
        );
        if let Some(redirect) = after_link_redirect_url {
            url.push_str("&redirect=");
            url.push_str(redirect);
        }
        Ok(url)
    }
}

#[async_trait]
impl FunctionsApi for InMemoryPortal {
    async fn search_functions(
        &self,
        params: &FunctionsSearchParams,
        _api_key: &str,
    ) -> Result<Vec<AppFunction>> {
        self.lock().search_count += 1;
        self.take_failure("search_functions")?;
        let data = self.lock();
        Ok(data
            .functions
            .iter()
            .filter(|f| {
                params.app_names.is_empty()
                    || params
                        .app_names
                        .iter()
                        .any(|app| function_belongs_to(&f.name, app))
            })
            .cloned()
            .collect())
    }

    async fn execute_function(
        &self,
        function_name: &str,
        body: &FunctionExecute,
        api_key: &str,
    ) -> Result<FunctionExecutionResult> {
        self.lock().executed.push(ExecutedCall {
            function_name: function_name.to_string(),
            body: body.clone(),
            api_key: api_key.to_string(),
        });
        self.take_failure("execute_function")?;
        let data = self.lock();
        Ok(data
            .execute_results
            .get(function_name)
            .cloned()
            .unwrap_or_else(|| FunctionExecutionResult {
                success: true,
                data: serde_json::json!({"function": function_name}),
                error: None,
            }))
    }
}

#[async_trait]
impl AgentsApi for InMemoryPortal {
    async fn update_agent(
        &self,
        project_id: &str,
        agent_id: &str,
        update: &AgentUpdate,
        _token: &AccessToken,
    ) -> Result<Agent> {
        self.take_failure("update_agent")?;
        let mut data = self.lock();
        data.agent_updates
            .push((agent_id.to_string(), update.clone()));
        let agent = data
            .agents
            .iter_mut()
            .find(|a| a.id == agent_id)
            .ok_or_else(|| PortalError::AgentNotFound {
                agent_id: agent_id.to_string(),
                project_id: project_id.to_string(),
            })?;
        if let Some(name) = &update.name {
            agent.name = name.clone();
        }
        if let Some(description) = &update.description {
            agent.description = description.clone();
        }
        if let Some(apps) = &update.allowed_apps {
            agent.allowed_apps = apps.clone();
        }
        if let Some(instructions) = &update.custom_instructions {
            agent.custom_instructions = instructions.clone();
        }
        Ok(agent.clone())
    }
}

#[async_trait]
impl ChatApi for InMemoryPortal {
    async fn chat_stream(&self, _api_key: &str, request: &ChatRequest) -> Result<ChatEventStream> {
        self.take_failure("chat_stream")?;
        let turn = {
            let mut data = self.lock();
            data.chat_requests.push(request.clone());
            data.chat_turns.pop_front()
        };
        let turn = turn.ok_or_else(|| PortalError::invalid_response("No scripted chat turn"))?;

        let events = futures::stream::iter(turn.events);
        if turn.hang {
            Ok(Box::pin(futures::StreamExt::chain(
                events,
                futures::stream::pending(),
            )))
        } else {
            Ok(Box::pin(events))
        }
    }
}
