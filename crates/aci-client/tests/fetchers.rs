// Fetcher behavior against a mock backend

use aci_client::PortalClient;
use aci_core::app::{CreateAppConfigRequest, SecurityScheme};
use aci_core::billing::Interval;
use aci_core::function::{FunctionExecute, FunctionsSearchParams};
use aci_core::project::AgentUpdate;
use aci_core::{AccessToken, PortalError};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup() -> (MockServer, PortalClient) {
    let server = MockServer::start().await;
    let client = PortalClient::new(&server.uri());
    (server, client)
}

#[tokio::test]
async fn test_get_apps_sends_names_and_key() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/apps"))
        .and(query_param("app_names", "GMAIL"))
        .and(header("X-API-KEY", "key-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "GMAIL", "display_name": "Gmail", "supported_security_schemes": {"oauth2": {}}}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let app = client.get_app("GMAIL", "key-1").await.unwrap().unwrap();
    assert_eq!(app.label(), "Gmail");
    assert!(app.supports(&SecurityScheme::OAuth2));
}

#[tokio::test]
async fn test_http_error_carries_status_and_message() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/linked-accounts"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "bad key"})))
        .mount(&server)
        .await;

    let err = client.get_all_linked_accounts("nope").await.unwrap_err();
    match err {
        PortalError::Http {
            status,
            status_text,
            message,
        } => {
            assert_eq!(status, 401);
            assert_eq!(status_text, "Unauthorized");
            assert_eq!(message, "bad key");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_create_app_config_conflict() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/v1/app-configurations"))
        .and(body_json(json!({
            "app_name": "GMAIL",
            "security_scheme": "oauth2",
            "security_scheme_overrides": {},
            "all_functions_enabled": true,
            "enabled_functions": []
        })))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let request = CreateAppConfigRequest::new("GMAIL", SecurityScheme::OAuth2, None);
    let err = client.create_app_config(&request, "key-1").await.unwrap_err();
    assert!(matches!(err, PortalError::AppAlreadyConfigured(ref app) if app == "GMAIL"));
    assert!(err.is_conflict());
    assert_eq!(err.status(), Some(409));
}

#[tokio::test]
async fn test_oauth2_link_url_requires_string() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/linked-accounts/oauth2"))
        .and(query_param("linked_account_owner_id", "alice"))
        .and(query_param("after_oauth2_link_redirect_url", "https://portal/done"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"url": "https://auth/start"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/linked-accounts/oauth2"))
        .and(query_param("linked_account_owner_id", "bob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": 42})))
        .mount(&server)
        .await;

    let url = client
        .get_oauth2_link_url("GMAIL", "alice", Some("https://portal/done"), "key-1")
        .await
        .unwrap();
    assert_eq!(url, "https://auth/start");

    let err = client
        .get_oauth2_link_url("GMAIL", "bob", None, "key-1")
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::InvalidResponse(ref m) if m.contains("missing or invalid URL")));
}

#[tokio::test]
async fn test_execute_failure_is_folded_into_result() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/v1/functions/GMAIL__SEND_EMAIL/execute"))
        .and(body_json(json!({
            "function_input": {"to": "a@b.c"},
            "linked_account_owner_id": "alice"
        })))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "Linked account disabled"})),
        )
        .mount(&server)
        .await;

    let body = FunctionExecute {
        function_input: json!({"to": "a@b.c"}),
        linked_account_owner_id: "alice".to_string(),
    };
    let result = client
        .execute_function("GMAIL__SEND_EMAIL", &body, "key-1")
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.data, json!({}));
    assert_eq!(result.error.as_deref(), Some("Linked account disabled"));
}

#[tokio::test]
async fn test_search_functions_query() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/functions/search"))
        .and(query_param("allowed_apps_only", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "SLACK__POST_MESSAGE"},
            {"name": "GMAIL__SEND_EMAIL"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let functions = client
        .search_functions(&FunctionsSearchParams::allowed_apps_only(), "key-1")
        .await
        .unwrap();
    assert_eq!(functions.len(), 2);
}

#[tokio::test]
async fn test_update_agent_sends_only_set_fields() {
    let (server, client) = setup().await;
    Mock::given(method("PATCH"))
        .and(path("/v1/projects/proj-1/agents/agent-1"))
        .and(header("Authorization", "Bearer token-1"))
        .and(body_json(json!({"allowed_apps": ["GMAIL"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "agent-1",
            "name": "Support",
            "allowed_apps": ["GMAIL"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let agent = client
        .update_agent(
            "proj-1",
            "agent-1",
            &AgentUpdate::allowed_apps(vec!["GMAIL".to_string()]),
            &AccessToken::new("token-1"),
        )
        .await
        .unwrap();
    assert_eq!(agent.allowed_apps, vec!["GMAIL".to_string()]);
}

#[tokio::test]
async fn test_projects_need_org_header() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/projects"))
        .and(header("X-ACI-ORG-ID", "org-1"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "proj-1", "name": "Default", "agents": []}
        ])))
        .mount(&server)
        .await;

    let token = AccessToken::new("token-1");
    assert!(matches!(
        client.get_projects(&token).await,
        Err(PortalError::Configuration(_))
    ));

    let projects = client.get_projects(&token.with_org("org-1")).await.unwrap();
    assert_eq!(projects[0].name, "Default");
}

#[tokio::test]
async fn test_billing_checkout_returns_url() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/v1/billing/create-checkout-session"))
        .and(body_json(json!({"plan_name": "starter", "interval": "month"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("https://checkout/session")))
        .mount(&server)
        .await;

    let token = AccessToken::new("token-1").with_org("org-1");
    let url = client
        .create_checkout_session("starter", Interval::Month, &token)
        .await
        .unwrap();
    assert_eq!(url, "https://checkout/session");
}

#[tokio::test]
async fn test_delete_and_toggle_linked_account() {
    let (server, client) = setup().await;
    Mock::given(method("PATCH"))
        .and(path("/v1/linked-accounts/la-1"))
        .and(body_json(json!({"enabled": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "la-1",
            "project_id": "proj-1",
            "app_name": "GMAIL",
            "linked_account_owner_id": "alice",
            "security_scheme": "oauth2",
            "enabled": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/linked-accounts/la-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let account = client.update_linked_account("la-1", false, "key-1").await.unwrap();
    assert!(!account.enabled);
    client.delete_linked_account("la-1", "key-1").await.unwrap();
}
