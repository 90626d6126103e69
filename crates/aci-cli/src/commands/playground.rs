// Interactive playground
//
// Reads lines from stdin. Slash commands change the selection; anything else
// is sent as a chat message. While a reply streams, `/stop` or Ctrl-C
// cancels the turn.

use std::io::Write;
use std::sync::Arc;

use aci_core::{
    ChatStatus, ChatUpdate, FileSessionStorage, Playground, PortalError, SessionStorage,
    TurnOutcome,
};
use anyhow::{Context as _, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::debug;

use super::Context;
use crate::output::truncate;

/// Longest tool result echoed to the terminal
const RESULT_PREVIEW_CHARS: usize = 200;

#[derive(Args, Debug)]
pub struct PlaygroundArgs {
    /// Project ID; defaults to the organization's first project
    #[arg(long)]
    pub project: Option<String>,

    /// Agent to start with; defaults to the stored or first agent
    #[arg(long)]
    pub agent: Option<String>,

    /// Linked account owner to start with
    #[arg(long)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplCommand {
    Agent(Option<String>),
    Owner(Option<String>),
    Apps(Vec<String>),
    Functions(Vec<String>),
    Stop,
    Clear,
    Status,
    Help,
    Quit,
    Message(String),
    Empty,
    Unknown(String),
}

fn parse_line(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ReplCommand::Message(line.to_string());
    };

    let mut words = rest.split_whitespace();
    let command = words.next().unwrap_or_default();
    let args: Vec<String> = words.map(str::to_string).collect();
    match command {
        "agent" => ReplCommand::Agent(args.into_iter().next()),
        "owner" => ReplCommand::Owner(args.into_iter().next()),
        "apps" => ReplCommand::Apps(args),
        "functions" => ReplCommand::Functions(args),
        "stop" => ReplCommand::Stop,
        "clear" => ReplCommand::Clear,
        "status" => ReplCommand::Status,
        "help" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => ReplCommand::Unknown(other.to_string()),
    }
}

const HELP: &str = "\
/agent [ID]            list agents, or switch agent (clears the conversation)
/owner [ID]            list linked account owners, or switch owner (clears the conversation)
/apps [NAME...]        list available apps, or toggle apps
/functions [NAME...]   list functions of the selected apps, or toggle functions
/stop                  cancel the streaming reply
/clear                 clear the conversation
/status                show the current selection
/quit                  leave the playground";

pub async fn run(args: PlaygroundArgs, ctx: &Context) -> Result<()> {
    let project = ctx.project(args.project.as_deref()).await?;
    let storage: Arc<dyn SessionStorage> =
        Arc::new(FileSessionStorage::new(&ctx.config.session_dir));
    let backend = Arc::new(ctx.client.clone());
    let mut playground = Playground::open(backend, storage, project, &ctx.config);

    match args.agent.as_deref() {
        Some(agent) if agent != playground.store().selected_agent() => {
            playground
                .select_agent(agent)
                .await
                .context("Failed to select agent")?;
        }
        _ => {
            if let Err(e) = playground.refresh().await {
                eprintln!("Could not load apps and accounts: {}", e);
            }
        }
    }
    if let Some(owner) = args.owner.as_deref() {
        playground.select_owner(owner);
    }

    if !ctx.quiet {
        println!(
            "Playground for project {} (agent {}). Type /help for commands.",
            playground.project().name,
            playground.store().selected_agent()
        );
        let history = playground.chat().messages().len();
        if history > 0 {
            println!("Restored {} messages from {}", history, ctx.config.session_dir.display());
        }
    }

    let mut updates = playground.chat().subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };

        match parse_line(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Unknown(command) => println!("Unknown command /{}; try /help", command),
            ReplCommand::Stop => println!("Nothing to stop"),
            ReplCommand::Clear => {
                playground.chat().clear();
                drain(&mut updates);
                println!("Conversation cleared");
            }
            ReplCommand::Status => print_status(&playground),
            ReplCommand::Agent(None) => {
                let selected = playground.store().selected_agent().to_string();
                for agent in &playground.project().agents {
                    let mark = if agent.id == selected { "*" } else { " " };
                    println!("{} {}  {}", mark, agent.id, agent.name);
                }
            }
            ReplCommand::Agent(Some(id)) => match playground.select_agent(&id).await {
                Ok(true) => {
                    drain(&mut updates);
                    println!("Switched to agent {}; conversation cleared", id);
                }
                Ok(false) => println!("Agent {} is already selected", id),
                Err(e) => println!("Error: {}", e),
            },
            ReplCommand::Owner(None) => {
                let selected = playground.store().selected_linked_account_owner_id();
                let accounts = playground.store().unique_linked_accounts();
                if accounts.is_empty() {
                    println!("No linked accounts");
                }
                for account in accounts {
                    let mark = if account.linked_account_owner_id == selected { "*" } else { " " };
                    println!("{} {}", mark, account.linked_account_owner_id);
                }
            }
            ReplCommand::Owner(Some(owner)) => {
                if playground.select_owner(&owner) {
                    drain(&mut updates);
                    println!("Switched to owner {}; conversation cleared", owner);
                } else {
                    println!("Owner {} is already selected", owner);
                }
            }
            ReplCommand::Apps(names) if names.is_empty() => {
                let store = playground.store();
                let apps = store.available_apps();
                if apps.is_empty() {
                    println!("No apps available; link an account for this agent's apps");
                }
                for app in apps {
                    let mark = if store.selected_apps().contains(&app.name) { "x" } else { " " };
                    println!("[{}] {}", mark, app.name);
                }
            }
            ReplCommand::Apps(names) => {
                for name in names {
                    let store = playground.store();
                    let available: Vec<&str> =
                        store.available_apps().iter().map(|a| a.name.as_str()).collect();
                    if !can_toggle_app(&available, store.selected_apps(), &name) {
                        println!("{} is not available; see /apps", name);
                        continue;
                    }
                    match playground.store_mut().toggle_app(&name) {
                        Ok(true) => println!("+ {}", name),
                        Ok(false) => println!("- {}", name),
                        Err(e) => println!("Error: {}", e),
                    }
                }
            }
            ReplCommand::Functions(names) if names.is_empty() => {
                let store = playground.store();
                let functions = store.available_app_functions();
                if functions.is_empty() {
                    println!("No functions; select apps with /apps first");
                }
                for function in functions {
                    let mark = if store.selected_functions().contains(&function.name) {
                        "x"
                    } else {
                        " "
                    };
                    println!("[{}] {}", mark, function.name);
                }
            }
            ReplCommand::Functions(names) => {
                for name in names {
                    if playground.store_mut().toggle_function(&name) {
                        println!("+ {}", name);
                    } else {
                        println!("- {}", name);
                    }
                }
            }
            ReplCommand::Message(text) => {
                drain(&mut updates);
                let stdin_open = run_turn(&playground, &text, &mut updates, &mut lines).await?;
                if !stdin_open {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Send one message and render its updates until the turn ends.
/// Returns false if stdin closed meanwhile.
async fn run_turn<R>(
    playground: &Playground,
    text: &str,
    updates: &mut broadcast::Receiver<ChatUpdate>,
    lines: &mut tokio::io::Lines<R>,
) -> Result<bool>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let turn = playground.send(text);
    tokio::pin!(turn);
    let mut stdin_open = true;

    let result = loop {
        tokio::select! {
            result = &mut turn => break result,
            update = updates.recv() => match update {
                Ok(update) => render(&update),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Playground output lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {}
            },
            _ = tokio::signal::ctrl_c() => {
                playground.chat().stop();
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if parse_line(&line) == ReplCommand::Stop => {
                    playground.chat().stop();
                }
                Ok(Some(_)) => println!("\n(a reply is streaming; /stop to cancel)"),
                Ok(None) | Err(_) => {
                    stdin_open = false;
                    playground.chat().stop();
                }
            },
        }
    };

    // Updates sent before the turn resolved
    while let Ok(update) = updates.try_recv() {
        render(&update);
    }
    println!();

    match result {
        Ok(TurnOutcome::Completed) => {}
        Ok(TurnOutcome::Stopped) => println!("(stopped)"),
        Ok(TurnOutcome::StepLimitReached) => println!("(stopped after the step limit)"),
        Ok(TurnOutcome::ToolFailed {
            tool_call_id,
            message,
        }) => println!("Tool call {} failed: {}", tool_call_id, message),
        Ok(TurnOutcome::Failed { message }) => println!("Error: {}", message),
        Err(PortalError::NoLinkedAccountOwner) => {
            println!("Select a linked account owner first with /owner")
        }
        Err(e) => println!("Error: {}", e),
    }
    Ok(stdin_open)
}

fn render(update: &ChatUpdate) {
    match update {
        ChatUpdate::TextDelta(text) => {
            print!("{}", text);
            flush();
        }
        ChatUpdate::ToolCall {
            tool_name, args, ..
        } => println!("\n[tool] {}({})", tool_name, args),
        ChatUpdate::ToolResult {
            tool_call_id,
            result,
        } => println!(
            "[tool] {} -> {}",
            tool_call_id,
            truncate(&result.to_string(), RESULT_PREVIEW_CHARS)
        ),
        ChatUpdate::ToolError {
            tool_call_id,
            message,
        } => println!("[tool] {} failed: {}", tool_call_id, message),
        ChatUpdate::Status(ChatStatus::Error) => debug!("Chat entered error state"),
        ChatUpdate::Status(_) | ChatUpdate::ReasoningDelta(_) | ChatUpdate::Cleared => {}
    }
}

fn drain(updates: &mut broadcast::Receiver<ChatUpdate>) {
    while updates.try_recv().is_ok() {}
}

fn print_status(playground: &Playground) {
    let store = playground.store();
    let chat = playground.chat();
    let or_none = |s: String| if s.is_empty() { "-".to_string() } else { s };

    println!("Agent:     {}", store.selected_agent());
    println!("Owner:     {}", or_none(store.selected_linked_account_owner_id().to_string()));
    println!("Apps:      {}", or_none(store.selected_apps().join(", ")));
    println!("Functions: {}", or_none(store.selected_functions().join(", ")));
    println!("Chat:      {} ({} messages)", chat.status(), chat.messages().len());
    if let Some(error) = chat.last_error() {
        println!("Last error: {}", error);
    }
}

fn prompt() {
    print!("> ");
    flush();
}

fn flush() {
    let _ = std::io::stdout().flush();
}

/// Apps can be selected only when available; selected apps can always be removed
fn can_toggle_app(available: &[&str], selected: &[String], name: &str) -> bool {
    selected.iter().any(|s| s == name) || available.contains(&name)
}
