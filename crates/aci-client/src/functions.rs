// Function search and execution

use aci_core::error::Result;
use aci_core::function::{
    AppFunction, FunctionExecute, FunctionExecutionResult, FunctionsSearchParams,
};
use aci_core::traits::FunctionsApi;
use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, warn};

use crate::client::{decode, error_message, segment, Auth, PortalClient};

impl PortalClient {
    pub async fn search_functions(
        &self,
        params: &FunctionsSearchParams,
        api_key: &str,
    ) -> Result<Vec<AppFunction>> {
        self.get("/v1/functions/search", &params.to_query(), Auth::ApiKey(api_key))
            .await
    }

    /// Execute a function. A rejected execution is returned as a failed
    /// result, not as an error.
    pub async fn execute_function(
        &self,
        function_name: &str,
        body: &FunctionExecute,
        api_key: &str,
    ) -> Result<FunctionExecutionResult> {
        let path = format!("/v1/functions/{}/execute", segment(function_name));
        let builder = self
            .request(Method::POST, &path, Auth::ApiKey(api_key))
            .json(body);
        let response = self.send_raw(builder).await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let error = error_message(&text).unwrap_or_else(|| {
                format!(
                    "{} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default()
                )
            });
            warn!(function = %function_name, status = status.as_u16(), error = %error, "Function execution rejected");
            return Ok(FunctionExecutionResult::failed(error));
        }

        let result: FunctionExecutionResult = decode(response).await?;
        debug!(function = %function_name, success = result.success, "Function executed");
        Ok(result)
    }
}

#[async_trait]
impl FunctionsApi for PortalClient {
    async fn search_functions(
        &self,
        params: &FunctionsSearchParams,
        api_key: &str,
    ) -> Result<Vec<AppFunction>> {
        PortalClient::search_functions(self, params, api_key).await
    }

    async fn execute_function(
        &self,
        function_name: &str,
        body: &FunctionExecute,
        api_key: &str,
    ) -> Result<FunctionExecutionResult> {
        PortalClient::execute_function(self, function_name, body, api_key).await
    }
}
