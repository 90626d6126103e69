// App configuration fetchers

use aci_core::app::{AppConfig, CreateAppConfigRequest};
use aci_core::error::{PortalError, Result};
use aci_core::traits::AppConfigsApi;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::json;
use tracing::info;

use crate::client::{decode, error_from_response, segment, Auth, PortalClient};

impl PortalClient {
    pub async fn get_all_app_configs(&self, api_key: &str) -> Result<Vec<AppConfig>> {
        self.get("/v1/app-configurations", &[], Auth::ApiKey(api_key))
            .await
    }

    pub async fn get_app_config(&self, app_name: &str, api_key: &str) -> Result<Option<AppConfig>> {
        let configs: Vec<AppConfig> = self
            .get(
                "/v1/app-configurations",
                &[("app_names", app_name.to_string())],
                Auth::ApiKey(api_key),
            )
            .await?;
        Ok(configs.into_iter().next())
    }

    /// Create an app configuration. A 409 means the app is already configured
    /// for the project.
    pub async fn create_app_config(
        &self,
        request: &CreateAppConfigRequest,
        api_key: &str,
    ) -> Result<AppConfig> {
        let builder = self
            .request(Method::POST, "/v1/app-configurations", Auth::ApiKey(api_key))
            .json(request);
        let response = self.send_raw(builder).await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(PortalError::AppAlreadyConfigured(request.app_name.clone()));
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let config: AppConfig = decode(response).await?;
        info!(app = %config.app_name, "App configuration created");
        Ok(config)
    }

    pub async fn update_app_config(
        &self,
        app_name: &str,
        enabled: bool,
        api_key: &str,
    ) -> Result<AppConfig> {
        let path = format!("/v1/app-configurations/{}", segment(app_name));
        self.patch(&path, &json!({ "enabled": enabled }), Auth::ApiKey(api_key))
            .await
    }

    pub async fn delete_app_config(&self, app_name: &str, api_key: &str) -> Result<()> {
        let path = format!("/v1/app-configurations/{}", segment(app_name));
        self.delete(&path, Auth::ApiKey(api_key)).await
    }
}

#[async_trait]
impl AppConfigsApi for PortalClient {
    async fn create_app_config(
        &self,
        request: &CreateAppConfigRequest,
        api_key: &str,
    ) -> Result<AppConfig> {
        PortalClient::create_app_config(self, request, api_key).await
    }
}
