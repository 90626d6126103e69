// Linked account types
//
// A linked account is one external identity ("owner") connected to one app.
// The same owner ID may appear once per app.

use serde::{Deserialize, Serialize};

use crate::app::SecurityScheme;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    pub app_name: String,
    pub linked_account_owner_id: String,
    pub security_scheme: SecurityScheme,
    pub enabled: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub last_used_at: Option<String>,
}

/// Body of `POST /v1/linked-accounts/api-key`
#[derive(Debug, Clone, Serialize)]
pub struct CreateApiKeyLinkedAccount {
    pub app_name: String,
    pub linked_account_owner_id: String,
    pub api_key: String,
}

/// Body of `POST /v1/linked-accounts/no-auth`
#[derive(Debug, Clone, Serialize)]
pub struct CreateNoAuthLinkedAccount {
    pub app_name: String,
    pub linked_account_owner_id: String,
}

/// Response of `GET /v1/linked-accounts/oauth2`
#[derive(Debug, Clone, Deserialize)]
pub struct OAuth2LinkUrl {
    pub url: Option<serde_json::Value>,
}
