//! Eventflow - event planning agents
//!
//! A conversation graph that helps plan an event's menu and licenses. A
//! chat model proposes tool calls, a router dispatches them to search,
//! summary or mutation nodes, and every mutation waits for human approval
//! before anything is written.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **Domain**: Food and license records, search results, menu analytics
//! - **LLM**: Completion adapter with Ollama and scripted implementations
//! - **Tools**: Per-agent tool declarations
//! - **Store**: Document store boundary with an in-memory implementation
//! - **Agent**: Conversation state, router, nodes, checkpoints and executor
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use eventflow::agent::{AgentKind, AgentService, ResumeDecision, SessionContext};
//! use eventflow::llm::OllamaClient;
//! use eventflow::store::MemoryStore;
//! use eventflow::Config;
//!
//! #[tokio::main]
//! async fn main() -> eventflow::Result<()> {
//!     let config = Config::load();
//!     let service = AgentService::from_config(
//!         &config,
//!         Arc::new(OllamaClient::from_config(&config)?),
//!         Arc::new(MemoryStore::new()),
//!     );
//!
//!     let session = SessionContext::new("event-42", "user-7");
//!     service.start("thread-1", AgentKind::Food, session).await?;
//!
//!     let mut outcome = service.send("thread-1", "Add a vegan starter").await?;
//!     while outcome.is_interrupted() {
//!         outcome = service.resume("thread-1", ResumeDecision::Approve).await?;
//!     }
//!     println!("{}", outcome.reply().unwrap_or_default());
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod domain;
pub mod llm;
pub mod store;
pub mod tools;

// Re-export commonly used items
pub use agent::{AgentKind, AgentService};
pub use cli::Repl;
pub use core::{Config, EventflowError, Result};
