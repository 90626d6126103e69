// App configuration commands

use aci_core::app::{CreateAppConfigRequest, OAuth2Override, SecurityScheme, SecuritySchemeOverrides};
use aci_core::toggle::OptimisticToggle;
use aci_core::PortalError;
use anyhow::{bail, Context as _, Result};
use clap::Subcommand;

use super::{report_toggle, Context, ListArgs};
use crate::output::{print_field, print_table};

#[derive(Subcommand)]
pub enum AppConfigsCommand {
    /// List configured apps
    List {
        #[command(flatten)]
        list: ListArgs,
    },

    /// Configure an app for the project
    Create {
        /// App name
        name: String,

        /// Security scheme; defaults to the app's first supported scheme
        #[arg(long)]
        scheme: Option<String>,

        /// OAuth2 client ID override
        #[arg(long, requires = "client_secret")]
        client_id: Option<String>,

        /// OAuth2 client secret override
        #[arg(long, requires = "client_id")]
        client_secret: Option<String>,
    },

    /// Enable a configured app
    Enable { name: String },

    /// Disable a configured app
    Disable { name: String },

    /// Remove an app configuration
    Delete { name: String },
}

pub async fn run(command: AppConfigsCommand, ctx: &Context) -> Result<()> {
    match command {
        AppConfigsCommand::List { list } => list_configs(ctx, &list).await,
        AppConfigsCommand::Create {
            name,
            scheme,
            client_id,
            client_secret,
        } => create(ctx, &name, scheme, client_id, client_secret).await,
        AppConfigsCommand::Enable { name } => set_enabled(ctx, &name, true).await,
        AppConfigsCommand::Disable { name } => set_enabled(ctx, &name, false).await,
        AppConfigsCommand::Delete { name } => delete(ctx, &name).await,
    }
}

async fn list_configs(ctx: &Context, list: &ListArgs) -> Result<()> {
    let configs = ctx
        .client
        .get_all_app_configs(ctx.api_key()?)
        .await
        .context("Failed to fetch app configurations")?;
    let view = list.view(configs)?;

    if ctx.output.is_text() {
        print_table(&view, "No apps configured");
    } else {
        ctx.output.print_value(&view.page_rows())?;
    }
    Ok(())
}

async fn create(
    ctx: &Context,
    name: &str,
    scheme: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
) -> Result<()> {
    let api_key = ctx.api_key()?;
    let app = ctx
        .client
        .get_app(name, api_key)
        .await
        .context("Failed to fetch app")?
        .with_context(|| format!("App not found: {}", name))?;

    let scheme = match scheme {
        Some(s) => SecurityScheme::from(s.as_str()),
        None => app
            .default_security_scheme()
            .with_context(|| format!("{} declares no security schemes", name))?,
    };
    if !app.supports(&scheme) {
        bail!("{} does not support {}", name, scheme);
    }

    let overrides = match (client_id, client_secret) {
        (Some(client_id), Some(client_secret)) => {
            if scheme != SecurityScheme::OAuth2 {
                bail!("Client credentials only apply to oauth2");
            }
            Some(SecuritySchemeOverrides {
                oauth2: Some(OAuth2Override {
                    client_id,
                    client_secret,
                }),
            })
        }
        _ => None,
    };

    let request = CreateAppConfigRequest::new(&app.name, scheme, overrides);
    let config = match ctx.client.create_app_config(&request, api_key).await {
        Ok(config) => config,
        Err(e) if e.is_conflict() => bail!("{} is already configured", name),
        Err(e) => return Err(e).context("Failed to configure app"),
    };

    if ctx.output.is_text() {
        if ctx.quiet {
            println!("{}", config.id);
        } else {
            println!("Configured {}", config.app_name);
            print_field("Scheme", config.security_scheme.as_str());
            print_field("Enabled", &config.enabled.to_string());
        }
    } else {
        ctx.output.print_value(&config)?;
    }
    Ok(())
}

async fn set_enabled(ctx: &Context, name: &str, enabled: bool) -> Result<()> {
    let api_key = ctx.api_key()?;
    let current = ctx
        .client
        .get_app_config(name, api_key)
        .await
        .context("Failed to fetch app configuration")?
        .with_context(|| format!("{} is not configured", name))?;

    let toggle = OptimisticToggle::new(current.enabled);
    let outcome = toggle
        .run(enabled, async {
            let updated = ctx.client.update_app_config(name, enabled, api_key).await?;
            Ok::<_, PortalError>(updated.enabled == enabled)
        })
        .await;
    report_toggle(ctx.output, ctx.quiet, name, outcome)
}

async fn delete(ctx: &Context, name: &str) -> Result<()> {
    ctx.client
        .delete_app_config(name, ctx.api_key()?)
        .await
        .with_context(|| format!("Failed to delete configuration of {}", name))?;

    if ctx.output.is_text() {
        if !ctx.quiet {
            println!("Deleted configuration of {}", name);
        }
    } else {
        ctx.output
            .print_value(&serde_json::json!({ "app_name": name, "deleted": true }))?;
    }
    Ok(())
}
