// ACI CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Configuration comes from ACI_* variables (and .env); flags override them.

mod commands;
mod output;

use aci_core::PortalConfig;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use commands::Context;

#[derive(Parser)]
#[command(name = "aci")]
#[command(about = "ACI CLI - Manage apps, linked accounts and agents, and chat in the playground")]
#[command(version)]
pub struct Cli {
    /// API base URL
    #[arg(long, env = "ACI_API_URL")]
    pub api_url: Option<String>,

    /// Agent API key for project-scoped endpoints
    #[arg(long, env = "ACI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Access token for organization-scoped endpoints
    #[arg(long, env = "ACI_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Organization ID sent with the access token
    #[arg(long, env = "ACI_ORG_ID")]
    pub org_id: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Browse the app catalog
    Apps {
        #[command(subcommand)]
        command: commands::apps::AppsCommand,
    },

    /// Search and execute functions
    Functions {
        #[command(subcommand)]
        command: commands::functions::FunctionsCommand,
    },

    /// Manage app configurations
    AppConfigs {
        #[command(subcommand)]
        command: commands::app_configs::AppConfigsCommand,
    },

    /// Manage linked accounts
    LinkedAccounts {
        #[command(subcommand)]
        command: commands::linked_accounts::LinkedAccountsCommand,
    },

    /// Manage agents
    Agents {
        #[command(subcommand)]
        command: commands::agents::AgentsCommand,
    },

    /// Manage projects
    Projects {
        #[command(subcommand)]
        command: commands::projects::ProjectsCommand,
    },

    /// Show function call usage
    Usage {
        /// Group by app or function
        #[arg(long, value_enum, default_value = "app")]
        by: commands::analytics::UsageBy,

        #[arg(long, value_enum, default_value = "distribution")]
        view: commands::analytics::UsageView,
    },

    /// Subscription and billing
    Billing {
        #[command(subcommand)]
        command: commands::billing::BillingCommand,
    },

    /// Configure an app, grant it to agents and link an account
    ConfigureApp(commands::configure::ConfigureAppArgs),

    /// Chat with an agent interactively
    Playground(commands::playground::PlaygroundArgs),
}

impl Cli {
    /// Environment configuration with command-line overrides applied
    fn config(&self) -> PortalConfig {
        let mut config = PortalConfig::from_env();
        if let Some(url) = &self.api_url {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(token) = &self.access_token {
            config.access_token = Some(token.clone());
        }
        if let Some(org_id) = &self.org_id {
            config.org_id = Some(org_id.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aci=info,aci_core=info,aci_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let ctx = Context::new(
        cli.config(),
        output::OutputFormat::from_str(&cli.output),
        cli.quiet,
    );
    tracing::debug!(api_url = %ctx.config.api_url, "CLI starting");

    match cli.command {
        Commands::Apps { command } => commands::apps::run(command, &ctx).await,
        Commands::Functions { command } => commands::functions::run(command, &ctx).await,
        Commands::AppConfigs { command } => commands::app_configs::run(command, &ctx).await,
        Commands::LinkedAccounts { command } => {
            commands::linked_accounts::run(command, &ctx).await
        }
        Commands::Agents { command } => commands::agents::run(command, &ctx).await,
        Commands::Projects { command } => commands::projects::run(command, &ctx).await,
        Commands::Usage { by, view } => commands::analytics::run(&ctx, by, view).await,
        Commands::Billing { command } => commands::billing::run(command, &ctx).await,
        Commands::ConfigureApp(args) => commands::configure::run(args, &ctx).await,
        Commands::Playground(args) => commands::playground::run(args, &ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_environment_config() {
        let cli = Cli::try_parse_from([
            "aci",
            "--api-url",
            "http://localhost:9000/",
            "--api-key",
            "key-1",
            "apps",
            "list",
            "--sort",
            "name",
            "--desc",
        ])
        .unwrap();
        let config = cli.config();
        assert_eq!(config.api_url, "http://localhost:9000");
        assert_eq!(config.api_key.as_deref(), Some("key-1"));
        match cli.command {
            Commands::Apps {
                command: commands::apps::AppsCommand::List { list },
            } => {
                assert_eq!(list.sort.as_deref(), Some("name"));
                assert!(list.desc);
                assert_eq!(list.page, 1);
            }
            _ => panic!("expected apps list"),
        }
    }

    #[test]
    fn test_client_credentials_come_in_pairs() {
        let result = Cli::try_parse_from([
            "aci",
            "app-configs",
            "create",
            "GITHUB",
            "--client-id",
            "abc",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_configure_app_agents_conflict_with_no_agents() {
        let result = Cli::try_parse_from([
            "aci",
            "configure-app",
            "GMAIL",
            "--agent",
            "a1",
            "--no-agents",
        ]);
        assert!(result.is_err());
    }
}
