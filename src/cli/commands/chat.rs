//! Interactive chat command backed by a persisted thread.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::CampusError;
use crate::orchestrator::Orchestrator;
use console::style;
use futures::StreamExt;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
pub async fn run_chat(thread: Option<String>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Chat, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'campus-admin doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let agent = orchestrator.agent();
    let mut thread_id = thread.unwrap_or_else(new_thread_id);

    let previous = orchestrator.sessions().load(&thread_id).await?;

    println!("\n{}", style("Campus Admin Chat").bold().cyan());
    println!(
        "{}",
        style("Type your request, or 'exit' to quit. Use 'new' to start a fresh thread.").dim()
    );
    Output::kv("Thread", &thread_id);
    if !previous.is_empty() {
        Output::kv("History", &format!("{} earlier turns", previous.len()));
    }
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("new") {
            thread_id = new_thread_id();
            Output::info(&format!("Started thread {}", thread_id));
            continue;
        }

        print!("\n{} ", style("Agent:").cyan().bold());
        stdout.flush()?;

        let mut chunks = agent.handle_turn_streaming(&thread_id, input);
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(text) => {
                    print!("{}", text);
                    stdout.flush()?;
                }
                Err(CampusError::RoundLimitExceeded { rounds, partial }) => {
                    println!();
                    Output::warning(&format!("Stopped after {} tool rounds.", rounds));
                    print!("{}", partial);
                }
                Err(e) => {
                    println!();
                    Output::error(&format!("Error: {}", e));
                }
            }
        }
        println!("\n");
    }

    Ok(())
}

fn new_thread_id() -> String {
    format!("cli:{}", uuid::Uuid::new_v4().simple())
}
