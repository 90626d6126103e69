// Billing commands

use aci_core::billing::Interval;
use anyhow::{anyhow, Context as _, Result};
use clap::Subcommand;

use super::Context;
use crate::output::print_field;

#[derive(Subcommand)]
pub enum BillingCommand {
    /// Show the organization's subscription
    Subscription,

    /// Start a checkout for a plan and print its URL
    Checkout {
        /// Plan name
        plan: String,

        /// Billing interval: month or year
        #[arg(long, default_value = "month")]
        interval: String,
    },

    /// Print the customer portal URL
    Portal,
}

pub async fn run(command: BillingCommand, ctx: &Context) -> Result<()> {
    let token = ctx.access_token()?;
    match command {
        BillingCommand::Subscription => {
            let subscription = ctx
                .client
                .get_subscription(&token)
                .await
                .context("Failed to fetch subscription")?;
            if ctx.output.is_text() {
                print_field("Plan", &subscription.plan);
                print_field("Status", &subscription.status.to_string());
                Ok(())
            } else {
                ctx.output.print_value(&subscription)
            }
        }
        BillingCommand::Checkout { plan, interval } => {
            let interval: Interval = interval.parse().map_err(|e: String| anyhow!(e))?;
            let url = ctx
                .client
                .create_checkout_session(&plan, interval, &token)
                .await
                .context("Failed to create checkout session")?;
            print_url(ctx, &url)
        }
        BillingCommand::Portal => {
            let url = ctx
                .client
                .create_customer_portal_session(&token)
                .await
                .context("Failed to create customer portal session")?;
            print_url(ctx, &url)
        }
    }
}

fn print_url(ctx: &Context, url: &str) -> Result<()> {
    if ctx.output.is_text() {
        println!("{}", url);
        Ok(())
    } else {
        ctx.output.print_value(&serde_json::json!({ "url": url }))
    }
}
