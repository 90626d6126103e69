// Agent management commands

use std::collections::HashMap;

use aci_core::project::{AgentUpdate, CreateAgentRequest};
use anyhow::{bail, Context as _, Result};
use clap::Subcommand;

use super::Context;
use crate::output::print_field;

#[derive(Subcommand)]
pub enum AgentsCommand {
    /// Create an agent in a project
    Create {
        /// Project ID
        #[arg(long)]
        project: String,

        /// Agent name
        #[arg(long)]
        name: String,

        /// Agent description
        #[arg(long, default_value = "")]
        description: String,

        /// Allowed apps (repeatable)
        #[arg(long = "app")]
        apps: Vec<String>,

        /// Custom instruction for a function, as FUNCTION=TEXT (repeatable)
        #[arg(long = "instruction", value_name = "FUNCTION=TEXT")]
        instructions: Vec<String>,
    },

    /// Update an agent; only given fields change
    Update {
        /// Agent ID
        agent_id: String,

        /// Project ID
        #[arg(long)]
        project: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Replace the allowed apps (repeatable)
        #[arg(long = "app")]
        apps: Vec<String>,

        /// Replace the custom instructions, as FUNCTION=TEXT (repeatable)
        #[arg(long = "instruction", value_name = "FUNCTION=TEXT")]
        instructions: Vec<String>,
    },

    /// Delete an agent
    Delete {
        /// Agent ID
        agent_id: String,

        /// Project ID
        #[arg(long)]
        project: String,
    },
}

pub async fn run(command: AgentsCommand, ctx: &Context) -> Result<()> {
    let token = ctx.access_token()?;
    match command {
        AgentsCommand::Create {
            project,
            name,
            description,
            apps,
            instructions,
        } => {
            let request = CreateAgentRequest {
                name,
                description,
                allowed_apps: apps,
                custom_instructions: parse_instructions(&instructions)?,
            };
            let agent = ctx
                .client
                .create_agent(&project, &request, &token)
                .await
                .context("Failed to create agent")?;

            if ctx.output.is_text() {
                if ctx.quiet {
                    println!("{}", agent.id);
                } else {
                    println!("Created agent: {}", agent.id);
                    print_field("Name", &agent.name);
                    if !agent.allowed_apps.is_empty() {
                        print_field("Apps", &agent.allowed_apps.join(", "));
                    }
                    if let Some(key) = agent.api_keys.first() {
                        print_field("API key", &key.key);
                    }
                }
            } else {
                ctx.output.print_value(&agent)?;
            }
            Ok(())
        }
        AgentsCommand::Update {
            agent_id,
            project,
            name,
            description,
            apps,
            instructions,
        } => {
            let update = AgentUpdate {
                name,
                description,
                allowed_apps: (!apps.is_empty()).then_some(apps),
                custom_instructions: if instructions.is_empty() {
                    None
                } else {
                    Some(parse_instructions(&instructions)?)
                },
            };
            if update.is_empty() {
                bail!("Nothing to update");
            }
            let agent = ctx
                .client
                .update_agent(&project, &agent_id, &update, &token)
                .await
                .context("Failed to update agent")?;

            if ctx.output.is_text() {
                if !ctx.quiet {
                    println!("Updated agent: {}", agent.id);
                    print_field("Name", &agent.name);
                    print_field("Apps", &agent.allowed_apps.join(", "));
                }
            } else {
                ctx.output.print_value(&agent)?;
            }
            Ok(())
        }
        AgentsCommand::Delete { agent_id, project } => {
            ctx.client
                .delete_agent(&project, &agent_id, &token)
                .await
                .context("Failed to delete agent")?;

            if ctx.output.is_text() {
                if !ctx.quiet {
                    println!("Deleted agent: {}", agent_id);
                }
            } else {
                ctx.output
                    .print_value(&serde_json::json!({ "id": agent_id, "deleted": true }))?;
            }
            Ok(())
        }
    }
}

fn parse_instructions(pairs: &[String]) -> Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((function, text)) if !function.trim().is_empty() => {
                Ok((function.trim().to_string(), text.to_string()))
            }
            _ => bail!("Invalid instruction '{}': expected FUNCTION=TEXT", pair),
        })
        .collect()
}
