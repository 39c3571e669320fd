//! CLI module for campus-admin.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Campus Admin - student records, analytics and an admin chat agent
///
/// Serves the admin HTTP API and lets you talk to the campus agent from the terminal.
#[derive(Parser, Debug)]
#[command(name = "campus-admin")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Start an interactive chat session with the campus agent
    Chat {
        /// Conversation thread to continue
        #[arg(short, long)]
        thread: Option<String>,
    },

    /// Ask the campus agent a single question
    Ask {
        /// The question to ask
        question: String,

        /// Conversation thread to use
        #[arg(short, long, default_value = "cli")]
        thread: String,

        /// Print the answer as it is generated
        #[arg(short, long)]
        stream: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check configuration, credentials and storage
    Doctor,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write a default configuration file if none exists
    Init,

    /// Show configuration file path
    Path,
}
