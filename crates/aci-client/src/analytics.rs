// Usage analytics fetchers

use aci_core::analytics::{DistributionDatapoint, TimeSeriesDatapoint};
use aci_core::error::Result;

use crate::client::{Auth, PortalClient};

impl PortalClient {
    pub async fn app_usage_distribution(&self, api_key: &str) -> Result<Vec<DistributionDatapoint>> {
        self.get("/v1/analytics/app-usage-distribution", &[], Auth::ApiKey(api_key))
            .await
    }

    pub async fn function_usage_distribution(
        &self,
        api_key: &str,
    ) -> Result<Vec<DistributionDatapoint>> {
        self.get(
            "/v1/analytics/function-usage-distribution",
            &[],
            Auth::ApiKey(api_key),
        )
        .await
    }

    pub async fn app_usage_timeseries(&self, api_key: &str) -> Result<Vec<TimeSeriesDatapoint>> {
        self.get("/v1/analytics/app-usage-timeseries", &[], Auth::ApiKey(api_key))
            .await
    }

    pub async fn function_usage_timeseries(
        &self,
        api_key: &str,
    ) -> Result<Vec<TimeSeriesDatapoint>> {
        self.get(
            "/v1/analytics/function-usage-timeseries",
            &[],
            Auth::ApiKey(api_key),
        )
        .await
    }
}
