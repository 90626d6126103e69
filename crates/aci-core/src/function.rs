// App function types
//
// Function names are namespaced by their app: `GMAIL__SEND_EMAIL` belongs to
// the `GMAIL` app. The separator is a double underscore.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Separator between app name and function name
pub const APP_FUNCTION_SEPARATOR: &str = "__";

/// Callable function of an app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppFunction {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub app_name: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parameters: Value,
}

impl AppFunction {
    /// True if this function is namespaced under `app_name`
    pub fn belongs_to(&self, app_name: &str) -> bool {
        function_belongs_to(&self.name, app_name)
    }
}

/// Namespace prefix for an app's functions, e.g. `GMAIL__`
pub fn app_function_prefix(app_name: &str) -> String {
    format!("{}{}", app_name.to_uppercase(), APP_FUNCTION_SEPARATOR)
}

/// True if `function_name` starts with the app's namespace prefix
pub fn function_belongs_to(function_name: &str, app_name: &str) -> bool {
    function_name.starts_with(&app_function_prefix(app_name))
}

/// Body of `POST /v1/functions/{name}/execute`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionExecute {
    pub function_input: Value,
    pub linked_account_owner_id: String,
}

/// Result of a function execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionExecutionResult {
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FunctionExecutionResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Object(Default::default()),
            error: Some(error.into()),
        }
    }
}

/// Output format for function definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionDefinitionFormat {
    Basic,
    Openai,
    Anthropic,
}

impl FunctionDefinitionFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionDefinitionFormat::Basic => "basic",
            FunctionDefinitionFormat::Openai => "openai",
            FunctionDefinitionFormat::Anthropic => "anthropic",
        }
    }
}

/// Query for `GET /v1/functions/search`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionsSearchParams {
    pub app_names: Vec<String>,
    pub intent: Option<String>,
    pub allowed_apps_only: bool,
    pub format: Option<FunctionDefinitionFormat>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl FunctionsSearchParams {
    /// Only functions of apps the calling agent may use
    pub fn allowed_apps_only() -> Self {
        Self {
            allowed_apps_only: true,
            ..Default::default()
        }
    }

    /// Query pairs; unset and falsy fields are omitted
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query: Vec<(&'static str, String)> = self
            .app_names
            .iter()
            .map(|name| ("app_names", name.clone()))
            .collect();
        if let Some(intent) = self.intent.as_ref().filter(|s| !s.is_empty()) {
            query.push(("intent", intent.clone()));
        }
        if self.allowed_apps_only {
            query.push(("allowed_apps_only", "true".to_string()));
        }
        if let Some(format) = self.format {
            query.push(("format", format.as_str().to_string()));
        }
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            query.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset.filter(|o| *o > 0) {
            query.push(("offset", offset.to_string()));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(name: &str) -> AppFunction {
        AppFunction {
            id: String::new(),
            app_name: String::new(),
            name: name.to_string(),
            description: String::new(),
            tags: vec![],
            parameters: Value::Null,
        }
    }

    #[test]
    fn test_namespace_matching() {
        assert!(func("GMAIL__SEND_EMAIL").belongs_to("gmail"));
        assert!(func("GMAIL__SEND_EMAIL").belongs_to("GMAIL"));
        assert!(!func("GMAIL_EXTRA__SEND").belongs_to("GMAIL"));
        assert!(!func("GMAILSEND").belongs_to("GMAIL"));
        assert_eq!(app_function_prefix("github"), "GITHUB__");
    }

    #[test]
    fn test_search_query_omits_unset() {
        assert!(FunctionsSearchParams::default().to_query().is_empty());

        let params = FunctionsSearchParams {
            app_names: vec!["GMAIL".into(), "SLACK".into()],
            intent: Some("send".into()),
            allowed_apps_only: true,
            format: Some(FunctionDefinitionFormat::Openai),
            limit: Some(10),
            offset: Some(0),
        };
        let query = params.to_query();
        assert_eq!(
            query,
            vec![
                ("app_names", "GMAIL".to_string()),
                ("app_names", "SLACK".to_string()),
                ("intent", "send".to_string()),
                ("allowed_apps_only", "true".to_string()),
                ("format", "openai".to_string()),
                ("limit", "10".to_string()),
            ]
        );
    }
}
