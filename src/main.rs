//! Eventflow - event planning agents
//!
//! Main entry point for the CLI application.

use clap::Parser;
use eventflow::agent::{AgentKind, SessionContext};
use eventflow::{Config, Repl};
use tracing_subscriber::EnvFilter;

/// Eventflow - plan an event's menu and licenses with a local model
#[derive(Parser, Debug)]
#[command(name = "eventflow")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Agent to talk to (food or license)
    #[arg(long, short = 'a', default_value = "food")]
    agent: AgentKind,

    /// Event the agent plans for
    #[arg(long, short = 'e', default_value = "default-event")]
    event: String,

    /// User recorded as the owner of new records
    #[arg(long, short = 'u', default_value = "local-user")]
    user: String,

    /// Conversation thread; a new one is created when omitted
    #[arg(long, short = 't')]
    thread: Option<String>,

    /// Chat model (tool calling)
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Search model (structured output)
    #[arg(long)]
    search_model: Option<String>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,
}

fn init_tracing(debug: bool) {
    let default = if debug { "eventflow=debug" } else { "eventflow=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(ref model) = args.model {
        config.models.chat = model.clone();
    }

    if let Some(ref model) = args.search_model {
        config.models.search = model.clone();
    }

    if args.debug {
        config.agent.debug = true;
    }

    init_tracing(config.agent.debug);
    config.validate()?;

    let thread_id = args
        .thread
        .unwrap_or_else(|| format!("{}-{}", args.agent, uuid::Uuid::new_v4().simple()));
    let session = SessionContext::new(args.event, args.user);

    let mut repl = Repl::with_config(config, args.agent, session, thread_id)?;

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        repl.initialize().await?;
        repl.ask(&prompt).await?;
        return Ok(());
    }

    // Interactive REPL mode
    repl.run().await?;

    Ok(())
}
