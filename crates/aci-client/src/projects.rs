// Project and agent fetchers
//
// These endpoints are organization scoped and authenticate with the
// identity token instead of an agent API key.

use aci_core::error::{PortalError, Result};
use aci_core::project::{Agent, AgentUpdate, CreateAgentRequest, CreateProjectRequest, Project};
use aci_core::traits::{AccessToken, AgentsApi};
use async_trait::async_trait;
use tracing::info;

use crate::client::{segment, Auth, PortalClient};

pub(crate) fn require_org(token: &AccessToken) -> Result<&str> {
    token
        .org_id
        .as_deref()
        .filter(|org| !org.is_empty())
        .ok_or_else(|| PortalError::config("organization ID is required (set ACI_ORG_ID)"))
}

impl PortalClient {
    pub async fn get_projects(&self, token: &AccessToken) -> Result<Vec<Project>> {
        require_org(token)?;
        self.get("/v1/projects", &[], Auth::Bearer(token)).await
    }

    pub async fn create_project(
        &self,
        name: &str,
        org_id: &str,
        token: &AccessToken,
    ) -> Result<Project> {
        let request = CreateProjectRequest {
            name: name.to_string(),
            org_id: org_id.to_string(),
        };
        let project: Project = self
            .post("/v1/projects", Some(&request), Auth::Bearer(token))
            .await?;
        info!(project_id = %project.id, "Project created");
        Ok(project)
    }

    pub async fn create_agent(
        &self,
        project_id: &str,
        request: &CreateAgentRequest,
        token: &AccessToken,
    ) -> Result<Agent> {
        let path = format!("/v1/projects/{}/agents", segment(project_id));
        self.post(&path, Some(request), Auth::Bearer(token)).await
    }

    /// Update an agent; only fields set in `update` are sent
    pub async fn update_agent(
        &self,
        project_id: &str,
        agent_id: &str,
        update: &AgentUpdate,
        token: &AccessToken,
    ) -> Result<Agent> {
        let path = format!(
            "/v1/projects/{}/agents/{}",
            segment(project_id),
            segment(agent_id)
        );
        self.patch(&path, update, Auth::Bearer(token)).await
    }

    pub async fn delete_agent(
        &self,
        project_id: &str,
        agent_id: &str,
        token: &AccessToken,
    ) -> Result<()> {
        let path = format!(
            "/v1/projects/{}/agents/{}",
            segment(project_id),
            segment(agent_id)
        );
        self.delete(&path, Auth::Bearer(token)).await
    }
}

#[async_trait]
impl AgentsApi for PortalClient {
    async fn update_agent(
        &self,
        project_id: &str,
        agent_id: &str,
        update: &AgentUpdate,
        token: &AccessToken,
    ) -> Result<Agent> {
        PortalClient::update_agent(self, project_id, agent_id, update, token).await
    }
}
