// Linked account fetchers

use aci_core::error::{PortalError, Result};
use aci_core::linked_account::{
    CreateApiKeyLinkedAccount, CreateNoAuthLinkedAccount, LinkedAccount, OAuth2LinkUrl,
};
use aci_core::traits::LinkedAccountsApi;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::{segment, Auth, PortalClient};

impl PortalClient {
    pub async fn get_all_linked_accounts(&self, api_key: &str) -> Result<Vec<LinkedAccount>> {
        self.get("/v1/linked-accounts", &[], Auth::ApiKey(api_key))
            .await
    }

    pub async fn get_app_linked_accounts(
        &self,
        app_name: &str,
        api_key: &str,
    ) -> Result<Vec<LinkedAccount>> {
        self.get(
            "/v1/linked-accounts",
            &[("app_name", app_name.to_string())],
            Auth::ApiKey(api_key),
        )
        .await
    }

    pub async fn create_api_key_linked_account(
        &self,
        request: &CreateApiKeyLinkedAccount,
        api_key: &str,
    ) -> Result<LinkedAccount> {
        self.post("/v1/linked-accounts/api-key", Some(request), Auth::ApiKey(api_key))
            .await
    }

    pub async fn create_no_auth_linked_account(
        &self,
        request: &CreateNoAuthLinkedAccount,
        api_key: &str,
    ) -> Result<LinkedAccount> {
        self.post("/v1/linked-accounts/no-auth", Some(request), Auth::ApiKey(api_key))
            .await
    }

    /// URL that starts the OAuth2 flow for an owner
    pub async fn get_oauth2_link_url(
        &self,
        app_name: &str,
        linked_account_owner_id: &str,
        after_link_redirect_url: Option<&str>,
        api_key: &str,
    ) -> Result<String> {
        let mut query = vec![
            ("app_name", app_name.to_string()),
            ("linked_account_owner_id", linked_account_owner_id.to_string()),
        ];
        if let Some(redirect) = after_link_redirect_url.filter(|r| !r.is_empty()) {
            query.push(("after_oauth2_link_redirect_url", redirect.to_string()));
        }
        let response: OAuth2LinkUrl = self
            .get("/v1/linked-accounts/oauth2", &query, Auth::ApiKey(api_key))
            .await?;
        match response.url {
            Some(Value::String(url)) if !url.is_empty() => Ok(url),
            _ => Err(PortalError::invalid_response("missing or invalid URL")),
        }
    }

    pub async fn update_linked_account(
        &self,
        linked_account_id: &str,
        enabled: bool,
        api_key: &str,
    ) -> Result<LinkedAccount> {
        let path = format!("/v1/linked-accounts/{}", segment(linked_account_id));
        self.patch(&path, &json!({ "enabled": enabled }), Auth::ApiKey(api_key))
            .await
    }

    pub async fn delete_linked_account(&self, linked_account_id: &str, api_key: &str) -> Result<()> {
        let path = format!("/v1/linked-accounts/{}", segment(linked_account_id));
        self.delete(&path, Auth::ApiKey(api_key)).await
    }
}

#[async_trait]
impl LinkedAccountsApi for PortalClient {
    async fn get_all_linked_accounts(&self, api_key: &str) -> Result<Vec<LinkedAccount>> {
        PortalClient::get_all_linked_accounts(self, api_key).await
    }

    async fn create_no_auth_linked_account(
        &self,
        request: &CreateNoAuthLinkedAccount,
        api_key: &str,
    ) -> Result<LinkedAccount> {
        PortalClient::create_no_auth_linked_account(self, request, api_key).await
    }

    async fn create_api_key_linked_account(
        &self,
        request: &CreateApiKeyLinkedAccount,
        api_key: &str,
    ) -> Result<LinkedAccount> {
        PortalClient::create_api_key_linked_account(self, request, api_key).await
    }

    async fn get_oauth2_link_url(
        &self,
        app_name: &str,
        linked_account_owner_id: &str,
        after_link_redirect_url: Option<&str>,
        api_key: &str,
    ) -> Result<String> {
        PortalClient::get_oauth2_link_url(
            self,
            app_name,
            linked_account_owner_id,
            after_link_redirect_url,
            api_key,
        )
        .await
    }
}
