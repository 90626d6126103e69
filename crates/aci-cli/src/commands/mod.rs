// CLI subcommands and the state they share

pub mod agents;
pub mod analytics;
pub mod app_configs;
pub mod apps;
pub mod billing;
pub mod configure;
pub mod functions;
pub mod linked_accounts;
pub mod playground;
pub mod projects;

use aci_client::PortalClient;
use aci_core::project::Project;
use aci_core::table::{SortDirection, TableRow, TableView, DEFAULT_PAGE_SIZE};
use aci_core::toggle::ToggleOutcome;
use aci_core::{AccessToken, PortalConfig};
use anyhow::{bail, Context as _, Result};
use clap::Args;

use crate::output::OutputFormat;

/// Client, resolved configuration and output settings for one invocation
pub struct Context {
    pub client: PortalClient,
    pub config: PortalConfig,
    pub output: OutputFormat,
    pub quiet: bool,
}

impl Context {
    pub fn new(config: PortalConfig, output: OutputFormat, quiet: bool) -> Self {
        Self {
            client: PortalClient::from_config(&config),
            config,
            output,
            quiet,
        }
    }

    /// Agent API key for project-scoped endpoints
    pub fn api_key(&self) -> Result<&str> {
        match self.config.api_key.as_deref() {
            Some(key) => Ok(key),
            None => bail!("An agent API key is required: pass --api-key or set ACI_API_KEY"),
        }
    }

    /// Identity token for organization-scoped endpoints
    pub fn access_token(&self) -> Result<AccessToken> {
        let Some(token) = self.config.access_token.as_deref() else {
            bail!("An access token is required: pass --access-token or set ACI_ACCESS_TOKEN");
        };
        let token = AccessToken::new(token);
        Ok(match self.config.org_id.as_deref() {
            Some(org_id) => token.with_org(org_id),
            None => token,
        })
    }

    /// Project by ID, or the first project of the organization
    pub async fn project(&self, project_id: Option<&str>) -> Result<Project> {
        let token = self.access_token()?;
        let projects = self
            .client
            .get_projects(&token)
            .await
            .context("Failed to fetch projects")?;
        pick_project(projects, project_id)
    }
}

fn pick_project(projects: Vec<Project>, project_id: Option<&str>) -> Result<Project> {
    match project_id {
        Some(id) => projects
            .into_iter()
            .find(|p| p.id == id)
            .with_context(|| format!("Project not found: {}", id)),
        None => projects
            .into_iter()
            .next()
            .context("The organization has no projects"),
    }
}

/// Sorting, filtering and paging flags shared by list commands
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Keep rows where any column contains this text
    #[arg(long)]
    pub filter: Option<String>,

    /// Keep rows whose column contains a value, as column=value (repeatable)
    #[arg(long = "where", value_name = "COLUMN=VALUE")]
    pub column_filters: Vec<String>,

    /// Column to sort by
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort descending
    #[arg(long)]
    pub desc: bool,

    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    /// Rows per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
}

impl ListArgs {
    pub fn view<T: TableRow>(&self, rows: Vec<T>) -> Result<TableView<T>> {
        let mut view = TableView::new(rows)
            .with_page_size(self.page_size)
            .with_page(self.page);

        if let Some(filter) = &self.filter {
            view = view.with_global_filter(filter.as_str());
        }
        for spec in &self.column_filters {
            let Some((column, value)) = spec.split_once('=') else {
                bail!("Invalid --where '{}': expected column=value", spec);
            };
            check_column::<T>(column)?;
            view = view.with_column_filter(column, value);
        }
        if let Some(column) = &self.sort {
            check_column::<T>(column)?;
            let direction = if self.desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            view = view.sort_by(column.as_str(), direction);
        }
        Ok(view)
    }
}

fn check_column<T: TableRow>(column: &str) -> Result<()> {
    if !T::COLUMNS.contains(&column) {
        bail!(
            "Unknown column '{}'; expected one of: {}",
            column,
            T::COLUMNS.join(", ")
        );
    }
    Ok(())
}

/// Report an enable/disable toggle result; rollbacks become errors
pub fn report_toggle(output: OutputFormat, quiet: bool, what: &str, outcome: ToggleOutcome) -> Result<()> {
    match outcome {
        ToggleOutcome::Committed(enabled) => {
            let state = if enabled { "enabled" } else { "disabled" };
            if output.is_text() {
                if !quiet {
                    println!("{} {}", what, state);
                }
            } else {
                output.print_value(&serde_json::json!({ "name": what, "enabled": enabled }))?;
            }
            Ok(())
        }
        ToggleOutcome::RolledBack { value, reason } => bail!(
            "{} left {}: {}",
            what,
            if value { "enabled" } else { "disabled" },
            reason.unwrap_or_else(|| "the backend did not confirm the change".to_string())
        ),
        ToggleOutcome::Rejected => bail!("{} is already being updated", what),
    }
}
