// Project commands

use anyhow::{Context as _, Result};
use clap::Subcommand;

use super::Context;
use crate::output::{print_field, print_table_header, print_table_row};

#[derive(Subcommand)]
pub enum ProjectsCommand {
    /// List projects of the organization
    List,

    /// Create a project
    Create {
        /// Project name
        name: String,
    },
}

pub async fn run(command: ProjectsCommand, ctx: &Context) -> Result<()> {
    match command {
        ProjectsCommand::List => list(ctx).await,
        ProjectsCommand::Create { name } => create(ctx, &name).await,
    }
}

async fn list(ctx: &Context) -> Result<()> {
    let projects = ctx
        .client
        .get_projects(&ctx.access_token()?)
        .await
        .context("Failed to fetch projects")?;

    if ctx.output.is_text() {
        if projects.is_empty() {
            println!("No projects found");
            return Ok(());
        }

        print_table_header(&[("ID", 36), ("NAME", 24), ("AGENTS", 6), ("QUOTA USED", 10)]);
        for project in &projects {
            print_table_row(&[
                (&project.id, 36),
                (&project.name, 24),
                (&project.agents.len().to_string(), 6),
                (&project.daily_quota_used.to_string(), 10),
            ]);
        }
    } else {
        ctx.output.print_value(&projects)?;
    }
    Ok(())
}

async fn create(ctx: &Context, name: &str) -> Result<()> {
    let token = ctx.access_token()?;
    let org_id = token
        .org_id
        .clone()
        .context("An organization is required: pass --org-id or set ACI_ORG_ID")?;
    let project = ctx
        .client
        .create_project(name, &org_id, &token)
        .await
        .context("Failed to create project")?;

    if ctx.output.is_text() {
        if ctx.quiet {
            println!("{}", project.id);
        } else {
            println!("Created project: {}", project.id);
            print_field("Name", &project.name);
            for agent in &project.agents {
                print_field("Agent", &format!("{} ({})", agent.name, agent.id));
            }
        }
    } else {
        ctx.output.print_value(&project)?;
    }
    Ok(())
}
