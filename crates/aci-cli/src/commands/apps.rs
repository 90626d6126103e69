// App catalog commands

use anyhow::{Context as _, Result};
use clap::Subcommand;

use super::{Context, ListArgs};
use crate::output::{print_field, print_table};

#[derive(Subcommand)]
pub enum AppsCommand {
    /// List apps in the catalog
    List {
        #[command(flatten)]
        list: ListArgs,
    },

    /// Show one app
    Get {
        /// App name, e.g. GMAIL
        name: String,
    },
}

pub async fn run(command: AppsCommand, ctx: &Context) -> Result<()> {
    match command {
        AppsCommand::List { list } => list_apps(ctx, &list).await,
        AppsCommand::Get { name } => get(ctx, &name).await,
    }
}

async fn list_apps(ctx: &Context, list: &ListArgs) -> Result<()> {
    let apps = ctx
        .client
        .get_all_apps(ctx.api_key()?)
        .await
        .context("Failed to fetch apps")?;
    let view = list.view(apps)?;

    if ctx.output.is_text() {
        print_table(&view, "No apps found");
    } else {
        ctx.output.print_value(&view.page_rows())?;
    }
    Ok(())
}

async fn get(ctx: &Context, name: &str) -> Result<()> {
    let app = ctx
        .client
        .get_app(name, ctx.api_key()?)
        .await
        .context("Failed to fetch app")?
        .with_context(|| format!("App not found: {}", name))?;

    if ctx.output.is_text() {
        print_field("Name", &app.name);
        print_field("Display name", app.label());
        if !app.provider.is_empty() {
            print_field("Provider", &app.provider);
        }
        if !app.description.is_empty() {
            print_field("Description", &app.description);
        }
        if !app.categories.is_empty() {
            print_field("Categories", &app.categories.join(", "));
        }
        let schemes: Vec<&str> = app
            .supported_security_schemes
            .keys()
            .map(String::as_str)
            .collect();
        print_field("Auth", &schemes.join(", "));
        print_field("Functions", &app.functions.len().to_string());
        for function in &app.functions {
            println!("  {}", function.name);
        }
    } else {
        ctx.output.print_value(&app)?;
    }
    Ok(())
}
