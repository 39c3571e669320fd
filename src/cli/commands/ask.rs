//! Ask command: a single agent turn.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::CampusError;
use crate::orchestrator::Orchestrator;
use console::style;
use futures::StreamExt;
use std::io::Write;

/// Run the ask command.
pub async fn run_ask(question: &str, thread: &str, stream: bool, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Chat, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'campus-admin doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let agent = orchestrator.agent();

    if stream {
        let mut chunks = agent.handle_turn_streaming(thread, question);
        let mut stdout = std::io::stdout();
        println!();
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(text) => {
                    print!("{}", text);
                    stdout.flush()?;
                }
                Err(CampusError::RoundLimitExceeded { rounds, partial }) => {
                    println!();
                    Output::warning(&format!("Stopped after {} tool rounds.", rounds));
                    println!("\n{}\n", partial);
                    return Ok(());
                }
                Err(e) => {
                    println!();
                    Output::error(&format!("{}", e));
                    return Err(e.into());
                }
            }
        }
        println!("\n");
        return Ok(());
    }

    let spinner = Output::spinner("Thinking...");
    let result = agent.handle_turn(thread, question).await;
    spinner.finish_and_clear();

    match result {
        Ok(response) => {
            if !response.tool_calls.is_empty() {
                println!("{}", style("Tools used:").dim());
                for call in &response.tool_calls {
                    Output::tool_call(&call.name, &call.arguments, call.is_error);
                }
            }
            println!("\n{}\n", response.content);
            Ok(())
        }
        Err(CampusError::RoundLimitExceeded { rounds, partial }) => {
            Output::warning(&format!("Stopped after {} tool rounds.", rounds));
            println!("\n{}\n", partial);
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("{}", e));
            Err(e.into())
        }
    }
}
