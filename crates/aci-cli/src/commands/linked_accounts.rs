// Linked account commands

use aci_core::linked_account::{CreateApiKeyLinkedAccount, CreateNoAuthLinkedAccount, LinkedAccount};
use aci_core::toggle::OptimisticToggle;
use aci_core::PortalError;
use anyhow::{Context as _, Result};
use clap::Subcommand;

use super::{report_toggle, Context, ListArgs};
use crate::output::{print_field, print_table};

#[derive(Subcommand)]
pub enum LinkedAccountsCommand {
    /// List linked accounts
    List {
        /// Only accounts of this app
        #[arg(long)]
        app: Option<String>,

        #[command(flatten)]
        list: ListArgs,
    },

    /// Link an account to an app that needs no credentials
    LinkNoAuth {
        app: String,
        /// Linked account owner ID
        owner: String,
    },

    /// Link an account with the owner's API key
    LinkApiKey {
        app: String,
        /// Linked account owner ID
        owner: String,
        /// The owner's API key for the app
        #[arg(long, env = "ACI_LINKED_ACCOUNT_API_KEY", hide_env_values = true)]
        key: String,
    },

    /// Print the URL that completes an OAuth2 link
    Oauth2Url {
        app: String,
        /// Linked account owner ID
        owner: String,
        /// Where the backend redirects after linking
        #[arg(long)]
        redirect_url: Option<String>,
    },

    /// Enable a linked account
    Enable { id: String },

    /// Disable a linked account
    Disable { id: String },

    /// Delete a linked account
    Delete { id: String },
}

pub async fn run(command: LinkedAccountsCommand, ctx: &Context) -> Result<()> {
    match command {
        LinkedAccountsCommand::List { app, list } => list_accounts(ctx, app.as_deref(), &list).await,
        LinkedAccountsCommand::LinkNoAuth { app, owner } => {
            let request = CreateNoAuthLinkedAccount {
                app_name: app,
                linked_account_owner_id: owner,
            };
            let account = ctx
                .client
                .create_no_auth_linked_account(&request, ctx.api_key()?)
                .await
                .context("Failed to link account")?;
            print_linked(ctx, &account)
        }
        LinkedAccountsCommand::LinkApiKey { app, owner, key } => {
            let request = CreateApiKeyLinkedAccount {
                app_name: app,
                linked_account_owner_id: owner,
                api_key: key,
            };
            let account = ctx
                .client
                .create_api_key_linked_account(&request, ctx.api_key()?)
                .await
                .context("Failed to link account")?;
            print_linked(ctx, &account)
        }
        LinkedAccountsCommand::Oauth2Url {
            app,
            owner,
            redirect_url,
        } => {
            let url = ctx
                .client
                .get_oauth2_link_url(&app, &owner, redirect_url.as_deref(), ctx.api_key()?)
                .await
                .context("Failed to get OAuth2 link URL")?;
            if ctx.output.is_text() {
                println!("{}", url);
            } else {
                ctx.output.print_value(&serde_json::json!({ "url": url }))?;
            }
            Ok(())
        }
        LinkedAccountsCommand::Enable { id } => set_enabled(ctx, &id, true).await,
        LinkedAccountsCommand::Disable { id } => set_enabled(ctx, &id, false).await,
        LinkedAccountsCommand::Delete { id } => {
            ctx.client
                .delete_linked_account(&id, ctx.api_key()?)
                .await
                .context("Failed to delete linked account")?;
            if ctx.output.is_text() {
                if !ctx.quiet {
                    println!("Deleted linked account: {}", id);
                }
            } else {
                ctx.output
                    .print_value(&serde_json::json!({ "id": id, "deleted": true }))?;
            }
            Ok(())
        }
    }
}

async fn list_accounts(ctx: &Context, app: Option<&str>, list: &ListArgs) -> Result<()> {
    let api_key = ctx.api_key()?;
    let accounts = match app {
        Some(app) => ctx.client.get_app_linked_accounts(app, api_key).await,
        None => ctx.client.get_all_linked_accounts(api_key).await,
    }
    .context("Failed to fetch linked accounts")?;
    let view = list.view(accounts)?;

    if ctx.output.is_text() {
        print_table(&view, "No linked accounts found");
    } else {
        ctx.output.print_value(&view.page_rows())?;
    }
    Ok(())
}

fn print_linked(ctx: &Context, account: &LinkedAccount) -> Result<()> {
    if ctx.output.is_text() {
        if ctx.quiet {
            println!("{}", account.id);
        } else {
            println!("Linked account: {}", account.id);
            print_field("App", &account.app_name);
            print_field("Owner", &account.linked_account_owner_id);
            print_field("Scheme", account.security_scheme.as_str());
        }
        Ok(())
    } else {
        ctx.output.print_value(account)
    }
}

async fn set_enabled(ctx: &Context, id: &str, enabled: bool) -> Result<()> {
    let api_key = ctx.api_key()?;
    let current = ctx
        .client
        .get_all_linked_accounts(api_key)
        .await
        .context("Failed to fetch linked accounts")?
        .into_iter()
        .find(|a| a.id == id)
        .with_context(|| format!("Linked account not found: {}", id))?;

    let toggle = OptimisticToggle::new(current.enabled);
    let outcome = toggle
        .run(enabled, async {
            let updated = ctx.client.update_linked_account(id, enabled, api_key).await?;
            Ok::<_, PortalError>(updated.enabled == enabled)
        })
        .await;
    report_toggle(ctx.output, ctx.quiet, id, outcome)
}
