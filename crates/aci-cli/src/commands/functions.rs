// Function search and execution commands

use aci_core::function::{FunctionExecute, FunctionsSearchParams};
use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use serde_json::Value;

use super::{Context, ListArgs};
use crate::output::print_table;

#[derive(Subcommand)]
pub enum FunctionsCommand {
    /// Search functions
    Search {
        /// Restrict to these apps (repeatable)
        #[arg(long = "app")]
        apps: Vec<String>,

        /// Natural-language description of the task
        #[arg(long)]
        intent: Option<String>,

        /// Only functions of apps the agent may use
        #[arg(long)]
        allowed_only: bool,

        /// Maximum results requested from the backend
        #[arg(long)]
        limit: Option<u32>,

        /// Results to skip on the backend
        #[arg(long)]
        offset: Option<u32>,

        #[command(flatten)]
        list: ListArgs,
    },

    /// Execute a function on behalf of a linked account owner
    Execute {
        /// Function name, e.g. GMAIL__SEND_EMAIL
        name: String,

        /// Linked account owner ID
        #[arg(long)]
        owner: String,

        /// Function input as a JSON object
        #[arg(long, conflicts_with = "input_file")]
        input: Option<String>,

        /// File holding the function input as JSON
        #[arg(long)]
        input_file: Option<String>,
    },
}

pub async fn run(command: FunctionsCommand, ctx: &Context) -> Result<()> {
    match command {
        FunctionsCommand::Search {
            apps,
            intent,
            allowed_only,
            limit,
            offset,
            list,
        } => {
            let params = FunctionsSearchParams {
                app_names: apps,
                intent,
                allowed_apps_only: allowed_only,
                format: None,
                limit,
                offset,
            };
            search(ctx, &params, &list).await
        }
        FunctionsCommand::Execute {
            name,
            owner,
            input,
            input_file,
        } => {
            let input = match (input, input_file) {
                (Some(text), _) => parse_input(&text)?,
                (None, Some(path)) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read file: {}", path))?;
                    parse_input(&text).with_context(|| format!("Invalid input in {}", path))?
                }
                (None, None) => Value::Object(Default::default()),
            };
            execute(ctx, &name, &owner, input).await
        }
    }
}

async fn search(ctx: &Context, params: &FunctionsSearchParams, list: &ListArgs) -> Result<()> {
    let functions = ctx
        .client
        .search_functions(params, ctx.api_key()?)
        .await
        .context("Failed to search functions")?;
    let view = list.view(functions)?;

    if ctx.output.is_text() {
        print_table(&view, "No functions found");
    } else {
        ctx.output.print_value(&view.page_rows())?;
    }
    Ok(())
}

async fn execute(ctx: &Context, name: &str, owner: &str, input: Value) -> Result<()> {
    let body = FunctionExecute {
        function_input: input,
        linked_account_owner_id: owner.to_string(),
    };
    let result = ctx
        .client
        .execute_function(name, &body, ctx.api_key()?)
        .await
        .context("Failed to execute function")?;

    if ctx.output.is_text() {
        if result.success {
            println!("{}", serde_json::to_string_pretty(&result.data)?);
        } else {
            bail!(
                "{} failed: {}",
                name,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    } else {
        ctx.output.print_value(&result)?;
    }
    Ok(())
}

/// Function input must be a JSON object
fn parse_input(text: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(text).context("Function input is not valid JSON")?;
    if !value.is_object() {
        bail!("Function input must be a JSON object");
    }
    Ok(value)
}
