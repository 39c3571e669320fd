//! Campus Admin - student records and a tool-calling admin agent
//!
//! A backend for campus administrators: student record management, analytics, campus
//! FAQ answers and a conversational agent that performs those operations on request.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `store` - Student and admin records (SQLite and in-memory backends)
//! - `session` - Per-thread conversation history
//! - `agent` - Tool catalog, chat model contract and the tool-calling loop
//! - `openai` - OpenAI-compatible chat model adapter
//! - `analytics` - Dashboard aggregates
//! - `auth` - Admin signup, login and bearer tokens
//! - `api` - HTTP routes
//! - `orchestrator` - Component wiring
//!
//! # Example
//!
//! ```rust,no_run
//! use campus_admin::config::Settings;
//! use campus_admin::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let response = orchestrator
//!         .agent()
//!         .handle_turn("admin:dean@uni.edu", "How many students are in Computer Science?")
//!         .await?;
//!     println!("{}", response.content);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod analytics;
pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod session;
pub mod store;

pub use error::{CampusError, Result};
