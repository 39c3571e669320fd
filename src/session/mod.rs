//! Conversation history per thread.
//!
//! Turns are append-only: a thread's history is the ordered list of everything the admin
//! said, every tool the model invoked (with its result), and every answer.

mod memory;
mod sqlite;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

use crate::error::{CampusError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = CampusError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            other => Err(CampusError::Storage(format!("Unknown turn role: {}", other))),
        }
    }
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Call id assigned by the model (or generated when absent).
    pub id: String,
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool, or an error payload.
    pub result: String,
    /// Whether `result` is an error payload.
    pub is_error: bool,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

/// One entry in a thread's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallRecord>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call: None,
            created_at: Utc::now(),
        }
    }

    /// A tool turn carries both the model's request and the tool's result.
    pub fn tool(record: ToolCallRecord) -> Self {
        Self {
            role: Role::Tool,
            content: record.result.clone(),
            tool_call: Some(record),
            created_at: Utc::now(),
        }
    }
}

/// Trait for conversation history backends.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a thread's turns in append order. Unknown threads are empty.
    async fn load(&self, thread_id: &str) -> Result<Vec<Turn>>;

    /// Append a turn to the end of a thread, creating the thread if needed.
    async fn append(&self, thread_id: &str, turn: &Turn) -> Result<()>;

    /// List known thread ids, most recently active first.
    async fn list_threads(&self) -> Result<Vec<String>>;
}

pub(crate) fn check_thread_id(thread_id: &str) -> Result<&str> {
    let thread_id = thread_id.trim();
    if thread_id.is_empty() {
        return Err(CampusError::Validation("thread id must not be empty".to_string()));
    }
    Ok(thread_id)
}
