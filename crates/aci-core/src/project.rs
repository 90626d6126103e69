// Project and agent domain types
//
// A project owns agents; each agent is a credential/scope boundary with its own
// API keys and the list of apps it may use.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PortalError, Result};

/// Project as returned by `GET /v1/projects`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub visibility_access: String,
    #[serde(default)]
    pub daily_quota_used: i64,
    #[serde(default)]
    pub daily_quota_reset_at: String,
    #[serde(default)]
    pub total_quota_used: i64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub agents: Vec<Agent>,
}

/// Agent within a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Apps this agent may call
    #[serde(default)]
    pub allowed_apps: Vec<String>,
    /// Per-function custom instructions, keyed by function name
    #[serde(default)]
    pub custom_instructions: HashMap<String, String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
}

/// API key belonging to an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Body of `POST /v1/projects/{project_id}/agents`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub description: String,
    pub allowed_apps: Vec<String>,
    pub custom_instructions: HashMap<String, String>,
}

/// Body of `PATCH /v1/projects/{project_id}/agents/{agent_id}`; only set fields are sent
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_apps: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<HashMap<String, String>>,
}

impl AgentUpdate {
    pub fn allowed_apps(apps: Vec<String>) -> Self {
        Self {
            allowed_apps: Some(apps),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.allowed_apps.is_none()
            && self.custom_instructions.is_none()
    }
}

/// Body of `POST /v1/projects`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub org_id: String,
}

impl Project {
    /// Find an agent by ID
    pub fn agent(&self, agent_id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == agent_id)
    }
}

/// Resolve the API key to use for a project.
///
/// Without an agent ID the first agent's first key is returned. The project
/// must have at least one agent, and the first agent must carry a key, even
/// when a different agent is requested.
pub fn resolve_api_key(project: &Project, agent_id: Option<&str>) -> Result<String> {
    let no_key = || PortalError::NoApiKey {
        project_id: project.id.clone(),
        project_name: project.name.clone(),
    };

    let first = project.agents.first().ok_or_else(no_key)?;
    let first_key = first.api_keys.first().ok_or_else(no_key)?;

    match agent_id.filter(|id| !id.is_empty()) {
        Some(id) => {
            let agent = project
                .agent(id)
                .ok_or_else(|| PortalError::AgentNotFound {
                    agent_id: id.to_string(),
                    project_id: project.id.clone(),
                })?;
            agent
                .api_keys
                .first()
                .map(|k| k.key.clone())
                .ok_or_else(no_key)
        }
        None => Ok(first_key.key.clone()),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_first_agent_key_when_no_agent_given() {
        let project = project(vec![
            agent("a1", &[], vec![api_key("a1", "k1")]),
            agent("a2", &[], vec![api_key("a2", "k2")]),
        ]);
        assert_eq!(resolve_api_key(&project, None).unwrap(), "k1");
        assert_eq!(resolve_api_key(&project, Some("")).unwrap(), "k1");
    }

    #[test]
    fn test_selected_agent_key() {
        let project = project(vec![
            agent("a1", &[], vec![api_key("a1", "k1")]),
            agent("a2", &[], vec![api_key("a2", "k2")]),
        ]);
        assert_eq!(resolve_api_key(&project, Some("a2")).unwrap(), "k2");
    }

    #[test]
    fn test_no_agents_is_error() {
        let project = project(vec![]);
        let err = resolve_api_key(&project, None).unwrap_err();
        assert!(matches!(err, PortalError::NoApiKey { .. }));
    }

    #[test]
    fn test_agent_without_keys_is_error() {
        let project = project(vec![agent("a1", &[], vec![])]);
        assert!(matches!(
            resolve_api_key(&project, None),
            Err(PortalError::NoApiKey { .. })
        ));

        let project = project_with_keyless_second();
        assert!(matches!(
            resolve_api_key(&project, Some("a2")),
            Err(PortalError::NoApiKey { .. })
        ));
    }

    #[test]
    fn test_unknown_agent_is_error() {
        let project = project(vec![agent("a1", &[], vec![api_key("a1", "k1")])]);
        let err = resolve_api_key(&project, Some("ghost")).unwrap_err();
        assert!(matches!(err, PortalError::AgentNotFound { ref agent_id, .. } if agent_id == "ghost"));
    }

    fn project_with_keyless_second() -> Project {
        project(vec![
            agent("a1", &[], vec![api_key("a1", "k1")]),
            agent("a2", &[], vec![]),
        ])
    }

    #[test]
    fn test_agent_update_sends_only_set_fields() {
        let update = AgentUpdate::allowed_apps(vec!["GMAIL".to_string()]);
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body, serde_json::json!({"allowed_apps": ["GMAIL"]}));
        assert!(AgentUpdate::default().is_empty());
    }

    #[test]
    fn test_project_deserializes_with_missing_fields() {
        let json = r#"{"id":"p","name":"n","agents":[{"id":"a","name":"x","api_keys":[{"id":"k","key":"secret"}]}]}"#;
        let project: Project = serde_json::from_str(json).unwrap();
        assert_eq!(project.agents[0].api_keys[0].key, "secret");
        assert!(project.agents[0].allowed_apps.is_empty());
    }
}
