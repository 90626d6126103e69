// Billing fetchers

use aci_core::billing::{CheckoutSessionRequest, Interval, Subscription};
use aci_core::error::Result;
use aci_core::traits::AccessToken;

use crate::client::{Auth, PortalClient};
use crate::projects::require_org;

impl PortalClient {
    pub async fn get_subscription(&self, token: &AccessToken) -> Result<Subscription> {
        require_org(token)?;
        self.get("/v1/billing/get-subscription", &[], Auth::Bearer(token))
            .await
    }

    /// Returns the checkout URL
    pub async fn create_checkout_session(
        &self,
        plan_name: &str,
        interval: Interval,
        token: &AccessToken,
    ) -> Result<String> {
        require_org(token)?;
        let request = CheckoutSessionRequest {
            plan_name: plan_name.to_string(),
            interval,
        };
        self.post(
            "/v1/billing/create-checkout-session",
            Some(&request),
            Auth::Bearer(token),
        )
        .await
    }

    /// Returns the customer portal URL
    pub async fn create_customer_portal_session(&self, token: &AccessToken) -> Result<String> {
        require_org(token)?;
        self.post::<String, ()>(
            "/v1/billing/create-customer-portal-session",
            None,
            Auth::Bearer(token),
        )
        .await
    }
}
