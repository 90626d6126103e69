// Playground session
//
// Ties a project, the selection store and the chat session together so that
// selection changes which invalidate the conversation also clear it.

use std::sync::Arc;

use tracing::{info, warn};

use crate::chat::{ChatContext, ChatSession, TurnOutcome};
use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use crate::project::Project;
use crate::selection::PlaygroundStore;
use crate::storage::SessionStorage;
use crate::traits::PortalApi;

pub struct Playground {
    project: Project,
    store: PlaygroundStore,
    chat: ChatSession,
}

impl Playground {
    /// Restore the stored selection and chat history, then bind the session
    /// to `project`
    pub fn open<B>(
        backend: Arc<B>,
        storage: Arc<dyn SessionStorage>,
        project: Project,
        config: &PortalConfig,
    ) -> Self
    where
        B: PortalApi + 'static,
    {
        let mut store = PlaygroundStore::with_backend(backend.clone(), storage.clone());
        if let Err(e) = store.restore() {
            warn!(error = %e, "Ignoring stored playground selection");
        }
        store.initialize_from_project(&project);

        let chat = ChatSession::with_backend(
            backend,
            storage,
            config.chat.clone(),
            config.tools.clone(),
        );
        info!(project_id = %project.id, agent = %store.selected_agent(), "Playground opened");

        Self {
            project,
            store,
            chat,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn store(&self) -> &PlaygroundStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PlaygroundStore {
        &mut self.store
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    /// API key of the selected agent
    pub fn api_key(&self) -> Result<String> {
        self.store.api_key(&self.project)
    }

    /// Refetch linked accounts, the app catalog and the agent's functions
    pub async fn refresh(&mut self) -> Result<()> {
        let api_key = self.api_key()?;
        self.store.fetch_linked_accounts(&api_key).await?;
        self.store.fetch_apps(&api_key).await?;
        self.store.fetch_app_functions(&api_key).await?;
        Ok(())
    }

    /// Switch agent. Returns true if the session was reset.
    pub async fn select_agent(&mut self, agent_id: &str) -> Result<bool> {
        if self.project.agent(agent_id).is_none() {
            return Err(PortalError::AgentNotFound {
                agent_id: agent_id.to_string(),
                project_id: self.project.id.clone(),
            });
        }
        let Some(reset) = self.store.set_selected_agent(agent_id) else {
            return Ok(false);
        };
        self.chat.apply_reset(reset);
        // The new agent has its own key and allowed apps
        self.refresh().await?;
        Ok(true)
    }

    /// Switch linked account owner. Returns true if the session was reset.
    pub fn select_owner(&mut self, owner_id: &str) -> bool {
        match self.store.set_selected_linked_account_owner_id(owner_id) {
            Some(reset) => {
                self.chat.apply_reset(reset);
                true
            }
            None => false,
        }
    }

    /// Send a message with the current selection
    pub async fn send(&self, input: &str) -> Result<TurnOutcome> {
        let ctx = ChatContext::from_store(&self.store, self.api_key()?);
        self.chat.submit(input, &ctx).await
    }
}
