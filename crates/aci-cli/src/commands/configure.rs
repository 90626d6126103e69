// configure-app: configure an app, grant it to agents, link an account

use std::sync::Arc;

use aci_core::app::SecurityScheme;
use aci_core::project::resolve_api_key;
use aci_core::wizard::{ConfigureAppWizard, LinkCredentials, LinkResult, WizardStep};
use aci_core::PortalApi;
use anyhow::{bail, Context as _, Result};
use clap::Args;

use super::Context;
use crate::output::print_field;

#[derive(Args, Debug)]
pub struct ConfigureAppArgs {
    /// App name
    pub name: String,

    /// Project ID; defaults to the organization's first project
    #[arg(long)]
    pub project: Option<String>,

    /// Security scheme; defaults to the app's first supported scheme
    #[arg(long)]
    pub scheme: Option<String>,

    /// OAuth2 client ID override
    #[arg(long)]
    pub client_id: Option<String>,

    /// OAuth2 client secret override
    #[arg(long)]
    pub client_secret: Option<String>,

    /// Agents to grant the app (repeatable); all agents when omitted
    #[arg(long = "agent", conflicts_with = "no_agents")]
    pub agents: Vec<String>,

    /// Do not grant the app to any agent
    #[arg(long)]
    pub no_agents: bool,

    /// Linked account owner ID; the link step is skipped when omitted
    #[arg(long)]
    pub owner: Option<String>,

    /// The owner's API key, for api_key apps
    #[arg(long, env = "ACI_LINKED_ACCOUNT_API_KEY", hide_env_values = true)]
    pub link_api_key: Option<String>,

    /// Where the backend redirects after an OAuth2 link
    #[arg(long)]
    pub redirect_url: Option<String>,
}

pub async fn run(args: ConfigureAppArgs, ctx: &Context) -> Result<()> {
    let token = ctx.access_token()?;
    let project = ctx.project(args.project.as_deref()).await?;
    let api_key = match ctx.config.api_key.clone() {
        Some(key) => key,
        None => resolve_api_key(&project, None)?,
    };

    let app = ctx
        .client
        .get_app(&args.name, &api_key)
        .await
        .context("Failed to fetch app")?
        .with_context(|| format!("App not found: {}", args.name))?;
    let scheme = match args.scheme.as_deref() {
        Some(s) => SecurityScheme::from(s),
        None => app
            .default_security_scheme()
            .with_context(|| format!("{} declares no security schemes", args.name))?,
    };

    let api: Arc<dyn PortalApi> = Arc::new(ctx.client.clone());
    let mut wizard = ConfigureAppWizard::new(api, app, project, api_key, token);
    if args.no_agents {
        wizard.set_selected_agents(Vec::new())?;
    } else if !args.agents.is_empty() {
        wizard.set_selected_agents(args.agents.clone())?;
    }

    // Step 1
    let config = match wizard
        .configure_app(
            scheme,
            args.client_id.as_deref(),
            args.client_secret.as_deref(),
        )
        .await
    {
        Ok(config) => config.clone(),
        Err(e) if e.is_conflict() => bail!(
            "{} is already configured; manage it with `aci app-configs`",
            args.name
        ),
        Err(e) => return Err(e).context("Failed to configure app"),
    };
    if ctx.output.is_text() && !ctx.quiet {
        println!("Configured {} ({})", config.app_name, config.security_scheme);
    }

    // Step 2
    let mut granted = Vec::new();
    if wizard.step() == WizardStep::SelectAgents {
        granted = wizard
            .confirm_agents()
            .await
            .context("Failed to grant the app to agents")?;
        if ctx.output.is_text() && !ctx.quiet {
            for agent in &granted {
                println!("Granted to agent {} ({})", agent.name, agent.id);
            }
        }
    }

    // Step 3
    let link = match args.owner.as_deref() {
        Some(owner) => wizard
            .link_account(
                owner,
                LinkCredentials {
                    api_key: args.link_api_key.clone(),
                    after_oauth2_link_redirect_url: args.redirect_url.clone(),
                },
            )
            .await
            .context("Failed to link account")?,
        None => wizard.skip_link()?,
    };

    if ctx.output.is_text() {
        match &link {
            LinkResult::Linked(account) => {
                if ctx.quiet {
                    println!("{}", account.id);
                } else {
                    print_field("Linked", &account.id);
                    print_field("Owner", &account.linked_account_owner_id);
                }
            }
            LinkResult::OAuth2Url(url) => {
                if ctx.quiet {
                    println!("{}", url);
                } else {
                    println!("Open this URL to finish linking:\n{}", url);
                }
            }
            LinkResult::Skipped => {
                if !ctx.quiet {
                    println!("No account linked");
                }
            }
        }
        Ok(())
    } else {
        let (linked_account, oauth2_url) = match link {
            LinkResult::Linked(account) => (Some(account), None),
            LinkResult::OAuth2Url(url) => (None, Some(url)),
            LinkResult::Skipped => (None, None),
        };
        ctx.output.print_value(&serde_json::json!({
            "app_config": config,
            "updated_agents": granted,
            "linked_account": linked_account,
            "oauth2_url": oauth2_url,
        }))
    }
}
