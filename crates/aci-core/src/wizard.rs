// Configure-app flow
//
// Three steps, each gated on the previous one:
// 1. ConfigureApp: pick a supported security scheme and create the app config
// 2. SelectAgents: grant the app to the chosen agents (all preselected)
// 3. LinkAccount: link an account for an owner, or skip
//
// A failed step leaves the wizard where it was so the user can retry.

use std::sync::Arc;

use tracing::{debug, info};

use crate::app::{App, AppConfig, OAuth2Override, SecurityScheme, SecuritySchemeOverrides, CreateAppConfigRequest};
use crate::error::{PortalError, Result};
use crate::linked_account::{CreateApiKeyLinkedAccount, CreateNoAuthLinkedAccount, LinkedAccount};
use crate::project::{Agent, AgentUpdate, Project};
use crate::traits::{AccessToken, PortalApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    ConfigureApp,
    SelectAgents,
    LinkAccount,
    Done,
}

/// Credentials for the link step. Which field is needed depends on the
/// configured security scheme.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkCredentials {
    pub api_key: Option<String>,
    pub after_oauth2_link_redirect_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkResult {
    Linked(LinkedAccount),
    /// Owner must open this URL to finish the OAuth2 link
    OAuth2Url(String),
    Skipped,
}

pub struct ConfigureAppWizard {
    api: Arc<dyn PortalApi>,
    app: App,
    project: Project,
    api_key: String,
    token: AccessToken,
    step: WizardStep,
    app_config: Option<AppConfig>,
    selected_agents: Vec<String>,
}

impl ConfigureAppWizard {
    pub fn new(
        api: Arc<dyn PortalApi>,
        app: App,
        project: Project,
        api_key: impl Into<String>,
        token: AccessToken,
    ) -> Self {
        let selected_agents = project.agents.iter().map(|a| a.id.clone()).collect();
        Self {
            api,
            app,
            project,
            api_key: api_key.into(),
            token,
            step: WizardStep::ConfigureApp,
            app_config: None,
            selected_agents,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn app_config(&self) -> Option<&AppConfig> {
        self.app_config.as_ref()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.project.agents
    }

    pub fn selected_agents(&self) -> &[String] {
        &self.selected_agents
    }

    fn expect_step(&self, step: WizardStep) -> Result<()> {
        if self.step != step {
            return Err(PortalError::wizard(format!(
                "expected step {:?}, wizard is at {:?}",
                step, self.step
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Step 1
    // ========================================================================

    /// Create the app configuration. OAuth2 client credentials are optional
    /// but must be given together.
    pub async fn configure_app(
        &mut self,
        scheme: SecurityScheme,
        client_id: Option<&str>,
        client_secret: Option<&str>,
    ) -> Result<&AppConfig> {
        self.expect_step(WizardStep::ConfigureApp)?;

        if !self.app.supports(&scheme) {
            return Err(PortalError::wizard(format!(
                "{} does not support the {} security scheme",
                self.app.name, scheme
            )));
        }

        fn non_blank(s: Option<&str>) -> Option<&str> {
            s.map(str::trim).filter(|s| !s.is_empty())
        }
        let overrides = match (non_blank(client_id), non_blank(client_secret)) {
            (None, None) => None,
            (Some(client_id), Some(client_secret)) => {
                if scheme != SecurityScheme::OAuth2 {
                    return Err(PortalError::wizard(
                        "client credentials can only be overridden for oauth2",
                    ));
                }
                Some(SecuritySchemeOverrides {
                    oauth2: Some(OAuth2Override {
                        client_id: client_id.to_string(),
                        client_secret: client_secret.to_string(),
                    }),
                })
            }
            _ => {
                return Err(PortalError::wizard(
                    "client id and client secret must be provided together",
                ))
            }
        };

        let request = CreateAppConfigRequest::new(self.app.name.clone(), scheme, overrides);
        let config = self.api.create_app_config(&request, &self.api_key).await?;
        info!(app = %config.app_name, scheme = %config.security_scheme, "App configured");

        self.step = if self.selected_agents.is_empty() {
            WizardStep::LinkAccount
        } else {
            WizardStep::SelectAgents
        };
        Ok(&*self.app_config.insert(config))
    }

    // ========================================================================
    // Step 2
    // ========================================================================

    pub fn set_selected_agents(&mut self, agent_ids: Vec<String>) -> Result<()> {
        if let Some(unknown) = agent_ids.iter().find(|id| self.project.agent(id).is_none()) {
            return Err(PortalError::AgentNotFound {
                agent_id: unknown.clone(),
                project_id: self.project.id.clone(),
            });
        }
        self.selected_agents = agent_ids;
        Ok(())
    }

    /// Add or remove an agent from the selection. Returns true if now selected.
    pub fn toggle_agent(&mut self, agent_id: &str) -> bool {
        if let Some(pos) = self.selected_agents.iter().position(|a| a == agent_id) {
            self.selected_agents.remove(pos);
            false
        } else {
            self.selected_agents.push(agent_id.to_string());
            true
        }
    }

    /// Grant the app to every selected agent that does not have it yet.
    /// Returns the agents that were updated.
    pub async fn confirm_agents(&mut self) -> Result<Vec<Agent>> {
        self.expect_step(WizardStep::SelectAgents)?;

        let mut updated = Vec::new();
        for agent_id in self.selected_agents.clone() {
            let Some(agent) = self.project.agent(&agent_id) else {
                continue;
            };
            if agent.allowed_apps.contains(&self.app.name) {
                debug!(agent_id = %agent_id, "Agent already allows app");
                continue;
            }
            let mut allowed_apps = agent.allowed_apps.clone();
            allowed_apps.push(self.app.name.clone());

            let agent = self
                .api
                .update_agent(
                    &self.project.id,
                    &agent_id,
                    &AgentUpdate::allowed_apps(allowed_apps),
                    &self.token,
                )
                .await?;
            if let Some(slot) = self.project.agents.iter_mut().find(|a| a.id == agent.id) {
                *slot = agent.clone();
            }
            updated.push(agent);
        }

        info!(app = %self.app.name, agents = updated.len(), "Agents updated");
        self.step = WizardStep::LinkAccount;
        Ok(updated)
    }

    // ========================================================================
    // Step 3
    // ========================================================================

    pub async fn link_account(
        &mut self,
        linked_account_owner_id: &str,
        credentials: LinkCredentials,
    ) -> Result<LinkResult> {
        self.expect_step(WizardStep::LinkAccount)?;

        let owner = linked_account_owner_id.trim();
        if owner.is_empty() {
            return Err(PortalError::wizard("linked account owner id is required"));
        }
        let scheme = self
            .app_config
            .as_ref()
            .map(|c| c.security_scheme.clone())
            .ok_or_else(|| PortalError::wizard("app is not configured"))?;

        let result = match scheme {
            SecurityScheme::NoAuth => {
                let request = CreateNoAuthLinkedAccount {
                    app_name: self.app.name.clone(),
                    linked_account_owner_id: owner.to_string(),
                };
                LinkResult::Linked(
                    self.api
                        .create_no_auth_linked_account(&request, &self.api_key)
                        .await?,
                )
            }
            SecurityScheme::ApiKey => {
                let api_key = credentials
                    .api_key
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| PortalError::wizard("an API key is required"))?;
                let request = CreateApiKeyLinkedAccount {
                    app_name: self.app.name.clone(),
                    linked_account_owner_id: owner.to_string(),
                    api_key,
                };
                LinkResult::Linked(
                    self.api
                        .create_api_key_linked_account(&request, &self.api_key)
                        .await?,
                )
            }
            SecurityScheme::OAuth2 => LinkResult::OAuth2Url(
                self.api
                    .get_oauth2_link_url(
                        &self.app.name,
                        owner,
                        credentials.after_oauth2_link_redirect_url.as_deref(),
                        &self.api_key,
                    )
                    .await?,
            ),
            other => {
                return Err(PortalError::wizard(format!(
                    "linking {} accounts is not supported",
                    other
                )))
            }
        };

        info!(app = %self.app.name, owner = %owner, "Linked account step finished");
        self.step = WizardStep::Done;
        Ok(result)
    }

    /// Finish without linking an account
    pub fn skip_link(&mut self) -> Result<LinkResult> {
        self.expect_step(WizardStep::LinkAccount)?;
        self.step = WizardStep::Done;
        Ok(LinkResult::Skipped)
    }
}
