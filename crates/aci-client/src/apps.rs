// App catalog fetchers

use aci_core::app::App;
use aci_core::error::Result;
use aci_core::traits::AppsApi;
use async_trait::async_trait;

use crate::client::{Auth, PortalClient};

impl PortalClient {
    pub async fn get_all_apps(&self, api_key: &str) -> Result<Vec<App>> {
        self.get("/v1/apps", &[], Auth::ApiKey(api_key)).await
    }

    /// Apps by name; an empty list returns the whole catalog
    pub async fn get_apps(&self, app_names: &[String], api_key: &str) -> Result<Vec<App>> {
        let query: Vec<(&str, String)> = app_names
            .iter()
            .map(|name| ("app_names", name.clone()))
            .collect();
        self.get("/v1/apps", &query, Auth::ApiKey(api_key)).await
    }

    pub async fn get_app(&self, app_name: &str, api_key: &str) -> Result<Option<App>> {
        let apps = self.get_apps(&[app_name.to_string()], api_key).await?;
        Ok(apps.into_iter().next())
    }
}

#[async_trait]
impl AppsApi for PortalClient {
    async fn get_apps(&self, app_names: &[String], api_key: &str) -> Result<Vec<App>> {
        PortalClient::get_apps(self, app_names, api_key).await
    }
}
