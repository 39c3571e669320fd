//! Agent system for campus administration with tool calling.
//!
//! Provides an LLM agent that manages student records, answers analytics and FAQ
//! questions, and sends notifications through a closed set of tools.

mod llm;
mod mailer;
mod runner;
mod tools;

pub use llm::{ChatModel, ModelDelta, ModelReply, ModelRequest, ModelStream, ModelToolCall};
pub use mailer::{EmailReceipt, Mailer, MockMailer, SentEmail};
pub use runner::{history_window, Agent, AgentResponse};
pub use tools::{parse_tool_call, tool_catalog, ToolCall, ToolSet, ToolSpec, ACTIVE_WINDOW_DAYS};
