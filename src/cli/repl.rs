//! Interactive REPL for Eventflow
//!
//! Drives one conversation thread and asks for approval whenever the agent
//! proposes a mutation.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use futures::StreamExt;

use crate::agent::{
    AgentKind, AgentService, FeedEvent, ResumeDecision, RunOutcome, RunStatus, SessionContext,
};
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Config, Result};
use crate::llm::OllamaClient;
use crate::store::MemoryStore;

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    config: Config,
    ollama: OllamaClient,
    service: AgentService,
    agent: AgentKind,
    session: SessionContext,
    thread_id: String,
}

impl Repl {
    /// Create a REPL for one thread
    pub fn with_config(
        config: Config,
        agent: AgentKind,
        session: SessionContext,
        thread_id: impl Into<String>,
    ) -> Result<Self> {
        let ollama = OllamaClient::from_config(&config)?;
        let service = AgentService::from_config(
            &config,
            Arc::new(ollama.clone()),
            Arc::new(MemoryStore::new()),
        );

        Ok(Self {
            config,
            ollama,
            service,
            agent,
            session,
            thread_id: thread_id.into(),
        })
    }

    /// Check the configured models and open the thread
    pub async fn initialize(&self) -> Result<()> {
        let models = [
            self.config.models.chat.as_str(),
            self.config.models.search.as_str(),
        ];
        self.ollama.ensure_models(&models).await?;

        let state = self
            .service
            .start(&self.thread_id, self.agent, self.session.clone())
            .await?;
        tracing::debug!(
            thread = %state.thread_id,
            messages = state.messages().len(),
            "thread ready"
        );
        Ok(())
    }

    /// Answer a single prompt, asking for approval on stdin if needed
    pub async fn ask(&self, prompt: &str) -> Result<()> {
        let outcome = self.service.send(&self.thread_id, prompt).await?;
        self.drive(outcome).await
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        print!("Initializing...");
        io::stdout().flush()?;

        match self.initialize().await {
            Ok(()) => println!(" Ready!\n"),
            Err(e) => {
                println!("\n\nInitialization error: {}\n", e);
                return Ok(());
            }
        }

        let progress = self.spawn_progress_printer();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("You: ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            match handle_command(&input, &self.service, &self.thread_id).await {
                Ok(CommandResult::Exit) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(CommandResult::Handled(output)) => println!("{}\n", output),
                Ok(CommandResult::None) => continue,
                Ok(CommandResult::Retry) => {
                    let result = match self.service.retry(&self.thread_id).await {
                        Ok(outcome) => self.drive(outcome).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = result {
                        eprintln!("\nError: {}\n", e);
                    }
                }
                Ok(CommandResult::Continue(input)) => {
                    if let Err(e) = self.ask(&input).await {
                        eprintln!("\nError: {}\n", e);
                    }
                }
                Err(e) => eprintln!("Command error: {}\n", e),
            }
        }

        progress.abort();
        Ok(())
    }

    /// Follow a run through its interrupts and print the final reply
    async fn drive(&self, mut outcome: RunOutcome) -> Result<()> {
        loop {
            match &outcome.status {
                RunStatus::Interrupted { call, .. } => {
                    println!("\nThe agent wants to run {}:", call.name);
                    println!("{}", serde_json::to_string_pretty(&call.arguments)?);
                    let decision = if confirm("Approve? [Y/n]: ")? {
                        ResumeDecision::Approve
                    } else {
                        ResumeDecision::Cancel
                    };
                    outcome = self.service.resume(&self.thread_id, decision).await?;
                }
                RunStatus::Failed { node, .. } => {
                    let reply = outcome.reply().unwrap_or("The run failed.");
                    println!("\nAssistant:\n{}\n", reply);
                    println!(
                        "({} failed; type 'retry' to run it again)\n",
                        node.name(self.agent)
                    );
                    return Ok(());
                }
                RunStatus::Completed => {
                    if let Some(reply) = outcome.reply() {
                        println!("\nAssistant:\n{}\n", reply);
                    }
                    return Ok(());
                }
            }
        }
    }

    fn spawn_progress_printer(&self) -> tokio::task::JoinHandle<()> {
        let mut events = Box::pin(self.service.stream(&self.thread_id));
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let FeedEvent::State(state) = event {
                    for progress in state.search_progress.iter().filter(|p| !p.done) {
                        println!("  searching: {}", progress.query);
                    }
                }
            }
        })
    }

    /// Print the startup banner
    fn print_banner(&self) {
        println!();
        println!("Eventflow - event planning assistant");
        println!("─────────────────────────────────────────────");
        println!("Ollama:  {}", self.config.ollama_url());
        println!("Agent:   {}", self.agent);
        println!("Event:   {}", self.session.event_id);
        println!("Thread:  {}", self.thread_id);
        println!("Models:");
        println!("  Chat:   {}", self.config.models.chat);
        println!("  Search: {}", self.config.models.search);
        println!();
        println!("Commands: help, state, reset, retry, exit");
        println!("─────────────────────────────────────────────");
    }
}

/// Ask a yes/no question; empty input means yes
fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut choice = String::new();
    io::stdin().read_line(&mut choice)?;
    let choice = choice.trim().to_lowercase();
    Ok(choice.is_empty() || choice == "y" || choice == "yes")
}
