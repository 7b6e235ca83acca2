//! CLI commands
//!
//! Special commands that can be executed in the REPL.

use crate::agent::{AgentService, ConversationState};
use crate::core::Result;

/// Result of parsing a command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Continue processing as normal input
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
    /// Re-run the last failed step
    Retry,
    /// No output needed
    None,
}

/// Parse and handle special commands
pub async fn handle_command(
    input: &str,
    service: &AgentService,
    thread_id: &str,
) -> Result<CommandResult> {
    let input = input.trim();
    let cmd = input.split_whitespace().next().unwrap_or("").to_lowercase();

    match cmd.as_str() {
        "" => Ok(CommandResult::None),

        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "reset" | "clear" => {
            service.reset(thread_id).await?;
            Ok(CommandResult::Handled("Conversation cleared.".to_string()))
        }

        "state" => match service.snapshot(thread_id).await? {
            Some(state) => Ok(CommandResult::Handled(describe_state(&state))),
            None => Ok(CommandResult::Handled(format!(
                "No conversation for thread {}",
                thread_id
            ))),
        },

        "retry" => Ok(CommandResult::Retry),

        _ => {
            if input.starts_with('/') {
                Ok(CommandResult::Handled(format!(
                    "Unknown command: {}. Type 'help' for available commands.",
                    cmd
                )))
            } else {
                Ok(CommandResult::Continue(input.to_string()))
            }
        }
    }
}

/// Render the conversation state for the `state` command
pub fn describe_state(state: &ConversationState) -> String {
    let mut output = format!(
        "Thread:   {}\n\
         Agent:    {}\n\
         Event:    {}\n\
         User:     {}\n\
         Version:  {}\n\
         Messages: {}\n",
        state.thread_id,
        state.agent,
        state.session.event_id,
        state.session.user_id,
        state.version,
        state.messages().len()
    );

    if !state.foods.is_empty() {
        output.push_str("\nFoods:\n");
        for food in &state.foods {
            let dietary = food
                .dietary
                .map(|d| format!(" ({})", d.as_str()))
                .unwrap_or_default();
            output.push_str(&format!(
                "  - {} [{}]{}\n",
                food.name,
                food.course.as_str(),
                dietary
            ));
        }
    }

    if !state.licenses.is_empty() {
        output.push_str("\nLicenses:\n");
        for license in &state.licenses {
            output.push_str(&format!(
                "  - {} from {} ({:.2})\n",
                license.name, license.issuing_authority, license.cost
            ));
        }
    }

    if let Some(analytics) = &state.analytics {
        output.push_str(&format!(
            "\nMenu: {} items, {} dietary options\n",
            analytics.menu_item_count, analytics.dietary_options_count
        ));
    }

    if let Some(last) = state.last_message() {
        output.push_str(&format!("\nLast message ({}): {}", last.role(), last.content()));
    }

    output
}

/// Generate help text
fn help_text() -> String {
    r#"Eventflow Commands:
─────────────────────────────────────────────
  help, ?          Show this help message
  state            Show the conversation state
  reset            Clear the conversation (saved records stay)
  retry            Re-run the step that failed last
  exit, quit, q    Exit Eventflow

When the agent proposes to add foods or licenses you are asked to
approve. Answer 'n' to cancel; nothing is saved until you approve.
─────────────────────────────────────────────"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentKind, SessionContext};
    use crate::core::Config;
    use crate::llm::ScriptedCompletion;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    async fn service() -> AgentService {
        let service = AgentService::from_config(
            &Config::default(),
            Arc::new(ScriptedCompletion::new()),
            Arc::new(MemoryStore::new()),
        );
        service
            .start("t1", AgentKind::Food, SessionContext::new("e1", "u1"))
            .await
            .unwrap();
        service
    }

    #[tokio::test]
    async fn test_commands() {
        let service = service().await;
        assert_eq!(
            handle_command("exit", &service, "t1").await.unwrap(),
            CommandResult::Exit
        );
        assert_eq!(
            handle_command("vegan starters please", &service, "t1")
                .await
                .unwrap(),
            CommandResult::Continue("vegan starters please".into())
        );
        assert!(matches!(
            handle_command("/bogus", &service, "t1").await.unwrap(),
            CommandResult::Handled(msg) if msg.starts_with("Unknown command")
        ));
    }

    #[tokio::test]
    async fn test_state_command() {
        let service = service().await;
        match handle_command("state", &service, "t1").await.unwrap() {
            CommandResult::Handled(output) => {
                assert!(output.contains("Event:    e1"));
                assert!(output.contains("Agent:    food"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
