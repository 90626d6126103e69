// App catalog and app configuration types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::function::AppFunction;

/// Authentication scheme an app supports or a project configured
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SecurityScheme {
    NoAuth,
    ApiKey,
    HttpBasic,
    HttpBearer,
    OAuth2,
    /// Scheme unknown to this client, kept verbatim
    Other(String),
}

impl SecurityScheme {
    pub fn as_str(&self) -> &str {
        match self {
            SecurityScheme::NoAuth => "no_auth",
            SecurityScheme::ApiKey => "api_key",
            SecurityScheme::HttpBasic => "http_basic",
            SecurityScheme::HttpBearer => "http_bearer",
            SecurityScheme::OAuth2 => "oauth2",
            SecurityScheme::Other(s) => s,
        }
    }
}

impl From<String> for SecurityScheme {
    fn from(s: String) -> Self {
        SecurityScheme::from(s.as_str())
    }
}

impl From<&str> for SecurityScheme {
    fn from(s: &str) -> Self {
        match s {
            "no_auth" => SecurityScheme::NoAuth,
            "api_key" => SecurityScheme::ApiKey,
            "http_basic" => SecurityScheme::HttpBasic,
            "http_bearer" => SecurityScheme::HttpBearer,
            "oauth2" => SecurityScheme::OAuth2,
            other => SecurityScheme::Other(other.to_string()),
        }
    }
}

impl From<SecurityScheme> for String {
    fn from(s: SecurityScheme) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for SecurityScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheme details published in the catalog (OAuth2 scopes, mostly)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecuritySchemeInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl SecuritySchemeInfo {
    /// Scopes split on whitespace and commas
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .unwrap_or_default()
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// App in the backend catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub visibility: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub functions: Vec<AppFunction>,
    #[serde(default)]
    pub supported_security_schemes: BTreeMap<String, SecuritySchemeInfo>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

fn default_true() -> bool {
    true
}

impl App {
    /// Display name, falling back to the app name
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    pub fn supports(&self, scheme: &SecurityScheme) -> bool {
        self.supported_security_schemes
            .contains_key(scheme.as_str())
    }

    /// First supported scheme, used as the default selection
    pub fn default_security_scheme(&self) -> Option<SecurityScheme> {
        self.supported_security_schemes
            .keys()
            .next()
            .map(|s| SecurityScheme::from(s.as_str()))
    }
}

/// OAuth2 client credential override for an app configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth2Override {
    pub client_id: String,
    pub client_secret: String,
}

/// Scheme overrides sent when creating an app configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecuritySchemeOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth2: Option<OAuth2Override>,
}

/// Project-level configuration of an app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    pub app_name: String,
    pub security_scheme: SecurityScheme,
    #[serde(default)]
    pub security_scheme_overrides: Value,
    pub enabled: bool,
    #[serde(default)]
    pub all_functions_enabled: bool,
    #[serde(default)]
    pub enabled_functions: Vec<String>,
}

/// Body of `POST /v1/app-configurations`
#[derive(Debug, Clone, Serialize)]
pub struct CreateAppConfigRequest {
    pub app_name: String,
    pub security_scheme: SecurityScheme,
    pub security_scheme_overrides: SecuritySchemeOverrides,
    pub all_functions_enabled: bool,
    pub enabled_functions: Vec<String>,
}

impl CreateAppConfigRequest {
    /// All functions enabled, the portal default
    pub fn new(
        app_name: impl Into<String>,
        security_scheme: SecurityScheme,
        overrides: Option<SecuritySchemeOverrides>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            security_scheme,
            security_scheme_overrides: overrides.unwrap_or_default(),
            all_functions_enabled: true,
            enabled_functions: Vec::new(),
        }
    }
}
