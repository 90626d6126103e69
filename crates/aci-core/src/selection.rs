// Playground selection state
//
// PlaygroundStore holds what the playground is configured to use (agent,
// linked account owner, apps, functions) plus the collections fetched from
// the backend that those choices are made from. Selection changes are
// written through to session storage; collections are always refetched.
//
// Invariants:
// - at most MAX_SELECTED_APPS apps are selected
// - deselecting an app drops its selected functions
// - changing agent or owner clears apps, functions and chat history

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::app::App;
use crate::error::{PortalError, Result};
use crate::function::{function_belongs_to, AppFunction, FunctionsSearchParams};
use crate::linked_account::LinkedAccount;
use crate::persist::PersistedSelection;
use crate::project::{resolve_api_key, Agent, Project};
use crate::storage::SessionStorage;
use crate::traits::{AppsApi, FunctionsApi, LinkedAccountsApi};

/// Maximum number of apps selected at once
pub const MAX_SELECTED_APPS: usize = 6;

/// What triggered a full session reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetReason {
    AgentChanged,
    OwnerChanged,
}

/// Returned by selection changes that invalidate the conversation
///
/// The chat session must drop its history when it receives one.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "the chat history must be cleared on a session reset"]
pub struct SessionReset {
    pub reason: ResetReason,
}

/// Selection store for one playground session
pub struct PlaygroundStore {
    apps_api: Arc<dyn AppsApi>,
    accounts_api: Arc<dyn LinkedAccountsApi>,
    functions_api: Arc<dyn FunctionsApi>,
    storage: Arc<dyn SessionStorage>,

    selected_agent: String,
    selected_apps: Vec<String>,
    selected_functions: Vec<String>,
    selected_linked_account_owner_id: String,
    allowed_apps: Vec<String>,

    agents: Vec<Agent>,
    apps: Vec<App>,
    app_functions: Vec<AppFunction>,
    linked_accounts: Vec<LinkedAccount>,
    loading_functions: bool,
}

impl PlaygroundStore {
    pub fn new(
        apps_api: Arc<dyn AppsApi>,
        accounts_api: Arc<dyn LinkedAccountsApi>,
        functions_api: Arc<dyn FunctionsApi>,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        Self {
            apps_api,
            accounts_api,
            functions_api,
            storage,
            selected_agent: String::new(),
            selected_apps: Vec::new(),
            selected_functions: Vec::new(),
            selected_linked_account_owner_id: String::new(),
            allowed_apps: Vec::new(),
            agents: Vec::new(),
            apps: Vec::new(),
            app_functions: Vec::new(),
            linked_accounts: Vec::new(),
            loading_functions: false,
        }
    }

    /// Build a store whose seams are all served by one backend
    pub fn with_backend<B>(backend: Arc<B>, storage: Arc<dyn SessionStorage>) -> Self
    where
        B: AppsApi + LinkedAccountsApi + FunctionsApi + 'static,
    {
        Self::new(backend.clone(), backend.clone(), backend, storage)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn selected_agent(&self) -> &str {
        &self.selected_agent
    }

    pub fn selected_apps(&self) -> &[String] {
        &self.selected_apps
    }

    pub fn selected_functions(&self) -> &[String] {
        &self.selected_functions
    }

    pub fn selected_linked_account_owner_id(&self) -> &str {
        &self.selected_linked_account_owner_id
    }

    pub fn allowed_apps(&self) -> &[String] {
        &self.allowed_apps
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn apps(&self) -> &[App] {
        &self.apps
    }

    pub fn app_functions(&self) -> &[AppFunction] {
        &self.app_functions
    }

    pub fn linked_accounts(&self) -> &[LinkedAccount] {
        &self.linked_accounts
    }

    pub fn loading_functions(&self) -> bool {
        self.loading_functions
    }

    // ========================================================================
    // Setters
    // ========================================================================

    /// Replace the selected apps, dropping functions of deselected apps
    pub fn set_selected_apps(&mut self, apps: Vec<String>) -> Result<()> {
        if apps.len() > MAX_SELECTED_APPS {
            return Err(PortalError::SelectionLimitExceeded(MAX_SELECTED_APPS));
        }
        self.selected_apps = apps;
        let selected = &self.selected_apps;
        self.selected_functions
            .retain(|f| selected.iter().any(|app| function_belongs_to(f, app)));
        self.persist();
        Ok(())
    }

    /// Add the app if absent, remove it if present
    ///
    /// Returns whether the app is selected afterwards.
    pub fn toggle_app(&mut self, app_name: &str) -> Result<bool> {
        let mut apps = self.selected_apps.clone();
        let selected = if let Some(pos) = apps.iter().position(|a| a == app_name) {
            apps.remove(pos);
            false
        } else {
            if apps.len() >= MAX_SELECTED_APPS {
                return Err(PortalError::SelectionLimitExceeded(MAX_SELECTED_APPS));
            }
            apps.push(app_name.to_string());
            true
        };
        self.set_selected_apps(apps)?;
        Ok(selected)
    }

    pub fn set_selected_functions(&mut self, functions: Vec<String>) {
        self.selected_functions = functions;
        self.persist();
    }

    /// Add the function if absent, remove it if present
    pub fn toggle_function(&mut self, function_name: &str) -> bool {
        let mut functions = self.selected_functions.clone();
        let selected = if let Some(pos) = functions.iter().position(|f| f == function_name) {
            functions.remove(pos);
            false
        } else {
            functions.push(function_name.to_string());
            true
        };
        self.set_selected_functions(functions);
        selected
    }

    pub fn set_allowed_apps(&mut self, apps: Vec<String>) {
        self.allowed_apps = apps;
    }

    pub fn set_agents(&mut self, agents: Vec<Agent>) {
        self.agents = agents;
    }

    /// Switch agent. Clears the selection and takes `allowed_apps` from the
    /// agent (empty if unknown). Returns None when the agent is unchanged.
    pub fn set_selected_agent(&mut self, agent_id: &str) -> Option<SessionReset> {
        if self.selected_agent == agent_id {
            return None;
        }
        self.selected_agent = agent_id.to_string();
        self.allowed_apps = self
            .agents
            .iter()
            .find(|a| a.id == agent_id)
            .map(|a| a.allowed_apps.clone())
            .unwrap_or_default();
        info!(agent_id = %agent_id, "Selected agent changed");
        Some(self.reset(ResetReason::AgentChanged))
    }

    /// Switch linked account owner. Returns None when the owner is unchanged.
    pub fn set_selected_linked_account_owner_id(&mut self, owner_id: &str) -> Option<SessionReset> {
        if self.selected_linked_account_owner_id == owner_id {
            return None;
        }
        self.selected_linked_account_owner_id = owner_id.to_string();
        info!(owner_id = %owner_id, "Linked account owner changed");
        Some(self.reset(ResetReason::OwnerChanged))
    }

    fn reset(&mut self, reason: ResetReason) -> SessionReset {
        self.selected_apps.clear();
        self.selected_functions.clear();
        self.persist();
        SessionReset { reason }
    }

    // ========================================================================
    // Fetchers
    // ========================================================================

    pub async fn fetch_linked_accounts(&mut self, api_key: &str) -> Result<&[LinkedAccount]> {
        match self.accounts_api.get_all_linked_accounts(api_key).await {
            Ok(accounts) => {
                self.linked_accounts = accounts;
                Ok(&self.linked_accounts)
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch linked accounts");
                Err(e)
            }
        }
    }

    /// Load the full app catalog
    pub async fn fetch_apps(&mut self, api_key: &str) -> Result<&[App]> {
        match self.apps_api.get_apps(&[], api_key).await {
            Ok(apps) => {
                self.apps = apps;
                Ok(&self.apps)
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch apps");
                Err(e)
            }
        }
    }

    /// Load functions of the apps the agent may use, sorted by name
    pub async fn fetch_app_functions(&mut self, api_key: &str) -> Result<&[AppFunction]> {
        self.loading_functions = true;
        let result = self
            .functions_api
            .search_functions(&FunctionsSearchParams::allowed_apps_only(), api_key)
            .await;
        self.loading_functions = false;

        match result {
            Ok(mut functions) => {
                functions.sort_by(|a, b| a.name.cmp(&b.name));
                self.app_functions = functions;
                Ok(&self.app_functions)
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch functions");
                Err(e)
            }
        }
    }

    // ========================================================================
    // Derived views
    // ========================================================================

    /// One linked account per owner. The last account of an owner wins but
    /// keeps the position of that owner's first account.
    pub fn unique_linked_accounts(&self) -> Vec<LinkedAccount> {
        let mut unique: Vec<LinkedAccount> = Vec::new();
        for account in &self.linked_accounts {
            match unique
                .iter_mut()
                .find(|a| a.linked_account_owner_id == account.linked_account_owner_id)
            {
                Some(existing) => *existing = account.clone(),
                None => unique.push(account.clone()),
            }
        }
        unique
    }

    /// Apps the agent may use and that have a linked account (for the
    /// selected owner, if one is selected)
    pub fn available_apps(&self) -> Vec<&App> {
        let owner = self.selected_linked_account_owner_id.as_str();
        self.apps
            .iter()
            .filter(|app| self.allowed_apps.contains(&app.name))
            .filter(|app| {
                self.linked_accounts.iter().any(|account| {
                    account.app_name == app.name
                        && (owner.is_empty() || account.linked_account_owner_id == owner)
                })
            })
            .collect()
    }

    /// Functions of the selected apps; empty when no app is selected
    pub fn available_app_functions(&self) -> Vec<&AppFunction> {
        if self.selected_apps.is_empty() {
            return Vec::new();
        }
        self.app_functions
            .iter()
            .filter(|f| {
                self.selected_apps
                    .iter()
                    .any(|app| function_belongs_to(&f.name, app))
            })
            .collect()
    }

    // ========================================================================
    // Project and persistence
    // ========================================================================

    /// Seed agents from the project and pick the agent to use
    ///
    /// A restored agent that still exists in the project is kept; otherwise
    /// the first agent is selected. Projects without agents change nothing.
    /// This intentionally does not always reset to the first agent, so a
    /// reload keeps the agent the user was chatting with.
    pub fn initialize_from_project(&mut self, project: &Project) {
        let Some(first) = project.agents.first() else {
            warn!(project_id = %project.id, "Project has no agents");
            return;
        };
        self.agents = project.agents.clone();

        let agent = project
            .agent(&self.selected_agent)
            .unwrap_or(first);
        if agent.id != self.selected_agent && !self.selected_agent.is_empty() {
            info!(
                stale_agent = %self.selected_agent,
                "Restored agent no longer exists, using first agent"
            );
            self.selected_apps.clear();
            self.selected_functions.clear();
        }
        self.selected_agent = agent.id.clone();
        self.allowed_apps = agent.allowed_apps.clone();
        self.persist();
    }

    /// API key of the selected agent
    pub fn api_key(&self, project: &Project) -> Result<String> {
        resolve_api_key(project, Some(&self.selected_agent))
    }

    /// Restore the persisted selection, if a valid one is stored
    pub fn restore(&mut self) -> Result<bool> {
        let Some(saved) = PersistedSelection::load(self.storage.as_ref())? else {
            return Ok(false);
        };
        self.selected_apps = saved.selected_apps;
        self.selected_functions = saved.selected_functions;
        self.selected_linked_account_owner_id = saved.selected_linked_account_owner_id;
        self.selected_agent = saved.selected_agent;
        Ok(true)
    }

    pub fn persisted(&self) -> PersistedSelection {
        PersistedSelection {
            selected_apps: self.selected_apps.clone(),
            selected_linked_account_owner_id: self.selected_linked_account_owner_id.clone(),
            selected_functions: self.selected_functions.clone(),
            selected_agent: self.selected_agent.clone(),
        }
    }

    /// Write the selection to session storage. Storage failures are logged;
    /// the in-memory selection stays authoritative.
    pub fn persist(&self) {
        if let Err(e) = self.persisted().save(self.storage.as_ref()) {
            warn!(error = %e, "Failed to persist playground selection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::SecurityScheme;
    use crate::memory::InMemoryPortal;
    use crate::project::fixtures::{agent, api_key, project};
    use crate::storage::InMemorySessionStorage;
    use serde_json::Value;

    fn app(name: &str) -> App {
        serde_json::from_value(serde_json::json!({ "name": name })).unwrap()
    }

    fn function(name: &str) -> AppFunction {
        AppFunction {
            id: String::new(),
            app_name: name.split("__").next().unwrap_or_default().to_string(),
            name: name.to_string(),
            description: String::new(),
            tags: vec![],
            parameters: Value::Null,
        }
    }

    fn account(id: &str, app: &str, owner: &str) -> LinkedAccount {
        LinkedAccount {
            id: id.to_string(),
            project_id: "proj-1".to_string(),
            app_name: app.to_string(),
            linked_account_owner_id: owner.to_string(),
            security_scheme: SecurityScheme::ApiKey,
            enabled: true,
            created_at: String::new(),
            updated_at: String::new(),
            last_used_at: None,
        }
    }

    fn store_with(portal: InMemoryPortal) -> (PlaygroundStore, InMemorySessionStorage) {
        let storage = InMemorySessionStorage::new();
        let store = PlaygroundStore::with_backend(Arc::new(portal), Arc::new(storage.clone()));
        (store, storage)
    }

    fn store() -> PlaygroundStore {
        store_with(InMemoryPortal::new()).0
    }

    #[test]
    fn test_selection_cap() {
        let mut store = store();
        let six: Vec<String> = (0..6).map(|i| format!("APP{}", i)).collect();
        store.set_selected_apps(six).unwrap();

        let err = store.toggle_app("APP6").unwrap_err();
        assert!(matches!(err, PortalError::SelectionLimitExceeded(6)));
        assert_eq!(store.selected_apps().len(), 6);

        let seven: Vec<String> = (0..7).map(|i| format!("APP{}", i)).collect();
        assert!(store.set_selected_apps(seven).is_err());
        assert_eq!(store.selected_apps().len(), 6);

        assert!(!store.toggle_app("APP0").unwrap());
        assert!(store.toggle_app("APP6").unwrap());
    }

    #[test]
    fn test_deselecting_app_prunes_functions() {
        let mut store = store();
        store
            .set_selected_apps(vec!["GMAIL".into(), "SLACK".into()])
            .unwrap();
        store.set_selected_functions(vec![
            "GMAIL__SEND_EMAIL".into(),
            "SLACK__POST".into(),
        ]);

        store.toggle_app("GMAIL").unwrap();
        assert_eq!(store.selected_functions(), ["SLACK__POST".to_string()]);
    }

    #[test]
    fn test_toggle_function() {
        let mut store = store();
        assert!(store.toggle_function("GMAIL__SEND_EMAIL"));
        assert!(!store.toggle_function("GMAIL__SEND_EMAIL"));
        assert!(store.selected_functions().is_empty());
    }

    #[test]
    fn test_agent_change_resets_session() {
        let mut store = store();
        store.set_agents(vec![
            agent("a1", &["GMAIL"], vec![]),
            agent("a2", &["SLACK", "GITHUB"], vec![]),
        ]);
        store.set_selected_apps(vec!["GMAIL".into()]).unwrap();
        store.set_selected_functions(vec!["GMAIL__SEND_EMAIL".into()]);

        let reset = store.set_selected_agent("a2").unwrap();
        assert_eq!(reset.reason, ResetReason::AgentChanged);
        assert!(store.selected_apps().is_empty());
        assert!(store.selected_functions().is_empty());
        assert_eq!(store.allowed_apps(), ["SLACK".to_string(), "GITHUB".to_string()]);

        assert!(store.set_selected_agent("a2").is_none());

        let _ = store.set_selected_agent("ghost");
        assert!(store.allowed_apps().is_empty());
    }

    #[test]
    fn test_owner_change_resets_session() {
        let mut store = store();
        store.set_selected_apps(vec!["GMAIL".into()]).unwrap();
        let reset = store.set_selected_linked_account_owner_id("user-2").unwrap();
        assert_eq!(reset.reason, ResetReason::OwnerChanged);
        assert!(store.selected_apps().is_empty());
        assert_eq!(store.selected_linked_account_owner_id(), "user-2");
    }

    #[tokio::test]
    async fn test_unique_linked_accounts_last_wins_first_position() {
        let portal = InMemoryPortal::new().with_linked_accounts(vec![
            account("1", "GMAIL", "alice"),
            account("2", "GMAIL", "bob"),
            account("3", "SLACK", "alice"),
        ]);
        let (mut store, _) = store_with(portal);
        store.fetch_linked_accounts("k").await.unwrap();

        let unique = store.unique_linked_accounts();
        let ids: Vec<&str> = unique.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2"]);
    }

    #[tokio::test]
    async fn test_available_apps_filtered_by_allowed_and_owner() {
        let portal = InMemoryPortal::new()
            .with_apps(vec![app("GMAIL"), app("SLACK"), app("GITHUB")])
            .with_linked_accounts(vec![
                account("1", "GMAIL", "alice"),
                account("2", "SLACK", "bob"),
                account("3", "GITHUB", "alice"),
            ]);
        let (mut store, _) = store_with(portal);
        store.fetch_apps("k").await.unwrap();
        store.fetch_linked_accounts("k").await.unwrap();
        store.set_allowed_apps(vec!["GMAIL".into(), "SLACK".into()]);

        let names = |s: &PlaygroundStore| -> Vec<String> {
            s.available_apps().iter().map(|a| a.name.clone()).collect()
        };
        assert_eq!(names(&store), vec!["GMAIL", "SLACK"]);

        let _ = store.set_selected_linked_account_owner_id("alice");
        assert_eq!(names(&store), vec!["GMAIL"]);

        let _ = store.set_selected_linked_account_owner_id("carol");
        assert!(store.available_apps().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_functions_sorted_and_filtered_by_selection() {
        let portal = InMemoryPortal::new().with_functions(vec![
            function("SLACK__POST"),
            function("GMAIL__SEND_EMAIL"),
            function("GMAIL__LIST"),
        ]);
        let (mut store, _) = store_with(portal);
        store.fetch_app_functions("k").await.unwrap();
        assert!(!store.loading_functions());

        let names: Vec<&str> = store.app_functions().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["GMAIL__LIST", "GMAIL__SEND_EMAIL", "SLACK__POST"]);

        assert!(store.available_app_functions().is_empty());
        store.set_selected_apps(vec!["gmail".into()]).unwrap();
        assert_eq!(store.available_app_functions().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates_and_clears_loading() {
        let portal = InMemoryPortal::new();
        portal.fail_next("search_functions", "offline");
        portal.fail_next("get_all_linked_accounts", "offline");
        let (mut store, _) = store_with(portal);

        assert!(store.fetch_app_functions("k").await.is_err());
        assert!(!store.loading_functions());
        assert!(store.fetch_linked_accounts("k").await.is_err());
    }

    #[test]
    fn test_initialize_from_project() {
        let mut store = store();
        let project = project(vec![
            agent("a1", &["GMAIL"], vec![api_key("a1", "k1")]),
            agent("a2", &["SLACK"], vec![api_key("a2", "k2")]),
        ]);
        store.initialize_from_project(&project);
        assert_eq!(store.selected_agent(), "a1");
        assert_eq!(store.allowed_apps(), ["GMAIL".to_string()]);
        assert_eq!(store.api_key(&project).unwrap(), "k1");

        let _ = store.set_selected_agent("a2");
        assert_eq!(store.api_key(&project).unwrap(), "k2");
    }

    #[test]
    fn test_initialize_without_agents_is_noop() {
        let mut store = store();
        store.initialize_from_project(&project(vec![]));
        assert_eq!(store.selected_agent(), "");
        assert!(store.agents().is_empty());
    }

    #[test]
    fn test_restore_keeps_existing_agent() {
        let (mut store, storage) = store_with(InMemoryPortal::new());
        store.set_agents(vec![agent("a2", &["SLACK"], vec![])]);
        let _ = store.set_selected_agent("a2");
        let _ = store.set_selected_linked_account_owner_id("alice");
        store.set_selected_apps(vec!["SLACK".into()]).unwrap();

        let mut reloaded = PlaygroundStore::with_backend(
            Arc::new(InMemoryPortal::new()),
            Arc::new(storage.clone()),
        );
        assert!(reloaded.restore().unwrap());
        let project = project(vec![
            agent("a1", &["GMAIL"], vec![api_key("a1", "k1")]),
            agent("a2", &["SLACK"], vec![api_key("a2", "k2")]),
        ]);
        reloaded.initialize_from_project(&project);

        assert_eq!(reloaded.selected_agent(), "a2");
        assert_eq!(reloaded.selected_apps(), ["SLACK".to_string()]);
        assert_eq!(reloaded.selected_linked_account_owner_id(), "alice");
        assert_eq!(reloaded.allowed_apps(), ["SLACK".to_string()]);
        assert!(reloaded.apps().is_empty());
    }

    #[test]
    fn test_restore_drops_stale_agent_selection() {
        let (mut store, storage) = store_with(InMemoryPortal::new());
        store.set_agents(vec![agent("gone", &["SLACK"], vec![])]);
        let _ = store.set_selected_agent("gone");
        store.set_selected_apps(vec!["SLACK".into()]).unwrap();

        let mut reloaded =
            PlaygroundStore::with_backend(Arc::new(InMemoryPortal::new()), Arc::new(storage));
        reloaded.restore().unwrap();
        reloaded.initialize_from_project(&project(vec![agent("a1", &["GMAIL"], vec![])]));

        assert_eq!(reloaded.selected_agent(), "a1");
        assert!(reloaded.selected_apps().is_empty());
    }
}
