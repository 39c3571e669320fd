//! Agent runner with tool calling loop.

use super::llm::{ChatModel, ModelDelta, ModelReply, ModelRequest, ModelToolCall};
use super::tools::{tool_catalog, ToolSet};
use crate::config::AgentSettings;
use crate::error::{CampusError, Result};
use crate::session::{SessionStore, ToolCallRecord, Turn};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument, warn};

/// Agent that answers admin requests by calling campus tools.
///
/// Cloning is cheap; all collaborators are shared.
#[derive(Clone)]
pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolSet>,
    sessions: Arc<dyn SessionStore>,
    max_rounds: usize,
    max_history_turns: usize,
    system_prompt: Arc<str>,
}

impl Agent {
    /// Create an agent with default loop settings.
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: Arc<ToolSet>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let defaults = AgentSettings::default();
        Self {
            model,
            tools,
            sessions,
            max_rounds: defaults.max_rounds,
            max_history_turns: defaults.max_history_turns,
            system_prompt: defaults.system_prompt.into(),
        }
    }

    /// Apply loop settings from configuration.
    pub fn with_settings(self, settings: &AgentSettings) -> Self {
        self.with_max_rounds(settings.max_rounds)
            .with_max_history_turns(settings.max_history_turns)
            .with_system_prompt(&settings.system_prompt)
    }

    /// Set a custom system prompt.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the maximum number of tool rounds per user turn (at least 1).
    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max.max(1);
        self
    }

    /// Set how many persisted turns are replayed to the model (at least 1).
    pub fn with_max_history_turns(mut self, max: usize) -> Self {
        self.max_history_turns = max.max(1);
        self
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    pub fn tools(&self) -> &Arc<ToolSet> {
        &self.tools
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Handle one admin utterance and return the final answer.
    #[instrument(skip(self, utterance))]
    pub async fn handle_turn(&self, thread_id: &str, utterance: &str) -> Result<AgentResponse> {
        self.run(thread_id, utterance, None).await
    }

    /// Handle one admin utterance, streaming answer text as it is produced.
    ///
    /// The stream ends after the final chunk, or with a single `Err` item when the turn fails.
    pub fn handle_turn_streaming(
        &self,
        thread_id: &str,
        utterance: &str,
    ) -> ReceiverStream<Result<String>> {
        let (tx, rx) = mpsc::channel(64);
        let agent = self.clone();
        let thread_id = thread_id.to_string();
        let utterance = utterance.to_string();

        tokio::spawn(async move {
            if let Err(e) = agent.run(&thread_id, &utterance, Some(&tx)).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        ReceiverStream::new(rx)
    }

    async fn run(
        &self,
        thread_id: &str,
        utterance: &str,
        sink: Option<&mpsc::Sender<Result<String>>>,
    ) -> Result<AgentResponse> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(CampusError::Validation("Message must not be empty".to_string()));
        }

        let mut history = self.sessions.load(thread_id).await?;
        self.record(thread_id, &mut history, Turn::user(utterance)).await?;

        let catalog = tool_catalog();
        let mut tool_calls = Vec::new();
        let mut rounds = 0;

        loop {
            debug!("Agent round {} on thread {}", rounds + 1, thread_id);

            let request = ModelRequest {
                system_prompt: &self.system_prompt,
                turns: history_window(&history, self.max_history_turns),
                tools: &catalog,
            };
            let reply = match sink {
                Some(tx) => self.stream_round(request, tx).await?,
                None => self.model.complete(request).await?,
            };

            let calls = match reply {
                ModelReply::ToolCalls(calls) if !calls.is_empty() => calls,
                ModelReply::ToolCalls(_) => {
                    return Err(CampusError::UpstreamModel(
                        "Model returned an empty tool call list".to_string(),
                    ))
                }
                ModelReply::Final(content) if content.trim().is_empty() => {
                    return Err(CampusError::UpstreamModel(
                        "Model returned neither text nor tool calls".to_string(),
                    ))
                }
                ModelReply::Final(content) => {
                    self.record(thread_id, &mut history, Turn::assistant(&content))
                        .await?;
                    info!(
                        "Answered on thread {} after {} tool round(s)",
                        thread_id, rounds
                    );
                    return Ok(AgentResponse {
                        content,
                        tool_calls,
                        rounds,
                    });
                }
            };

            if rounds == self.max_rounds {
                let partial = partial_answer(&tool_calls, rounds);
                warn!(
                    "Thread {} hit the round limit ({}); dropping {} pending tool call(s)",
                    thread_id,
                    rounds,
                    calls.len()
                );
                self.record(thread_id, &mut history, Turn::assistant(&partial))
                    .await?;
                return Err(CampusError::RoundLimitExceeded { rounds, partial });
            }

            rounds += 1;
            for call in &calls {
                let record = self.execute_tool_call(call).await?;
                self.record(thread_id, &mut history, Turn::tool(record.clone()))
                    .await?;
                tool_calls.push(record);
            }
        }
    }

    async fn record(&self, thread_id: &str, history: &mut Vec<Turn>, turn: Turn) -> Result<()> {
        self.sessions.append(thread_id, &turn).await?;
        history.push(turn);
        Ok(())
    }

    /// Consume one streamed reply.
    ///
    /// Text is held until the reply ends without requesting tools, so only the terminal
    /// answer reaches the caller. A reply that requests tools forwards nothing.
    async fn stream_round(
        &self,
        request: ModelRequest<'_>,
        tx: &mpsc::Sender<Result<String>>,
    ) -> Result<ModelReply> {
        let mut deltas = self.model.stream(request).await?;
        let mut held: Vec<String> = Vec::new();
        let mut wants_tools = false;
        let mut calls: Vec<ModelToolCall> = Vec::new();

        while let Some(delta) = deltas.next().await {
            match delta? {
                ModelDelta::Text(chunk) if chunk.is_empty() || wants_tools => {}
                ModelDelta::Text(chunk) => held.push(chunk),
                ModelDelta::ToolCallStarted => {
                    wants_tools = true;
                    held.clear();
                }
                ModelDelta::ToolCalls(mut more) => {
                    wants_tools = true;
                    held.clear();
                    calls.append(&mut more);
                }
            }
        }

        if wants_tools {
            return Ok(ModelReply::ToolCalls(calls));
        }

        let text = held.concat();
        if !text.trim().is_empty() {
            for chunk in held {
                // A closed receiver only means the client went away; the turn is still persisted.
                let _ = tx.send(Ok(chunk)).await;
            }
        }
        Ok(ModelReply::Final(text))
    }

    /// Execute a single tool call and return a record of it.
    ///
    /// Tool-level failures become error payloads the model can react to; storage
    /// failures abort the turn.
    async fn execute_tool_call(&self, call: &ModelToolCall) -> Result<ToolCallRecord> {
        info!("Agent calling tool: {} with args: {}", call.name, call.arguments);

        let (result, is_error) = match self.tools.invoke(&call.name, &call.arguments).await {
            Ok(value) => (value.to_string(), false),
            Err(e) if e.is_tool_error() => {
                warn!("Tool {} failed: {}", call.name, e);
                (error_payload(&e), true)
            }
            Err(e) => return Err(e),
        };

        Ok(ToolCallRecord {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
            is_error,
        })
    }
}

/// The most recent `max` turns of a thread.
pub fn history_window(history: &[Turn], max: usize) -> &[Turn] {
    &history[history.len().saturating_sub(max)..]
}

fn error_payload(error: &CampusError) -> String {
    serde_json::json!({
        "error": error.kind(),
        "message": error.to_string(),
    })
    .to_string()
}

fn partial_answer(tool_calls: &[ToolCallRecord], rounds: usize) -> String {
    match tool_calls.iter().rev().find(|record| !record.is_error) {
        Some(last) => format!(
            "I could not finish within {} tool round(s). The last result I got was from {}: {}",
            rounds, last.name, last.result
        ),
        None => format!(
            "I could not finish within {} tool round(s) and have no results to report.",
            rounds
        ),
    }
}

/// Response from an agent turn.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The final answer.
    pub content: String,
    /// Record of all tool calls made during the turn.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of tool rounds executed.
    pub rounds: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, result: &str, is_error: bool) -> ToolCallRecord {
        ToolCallRecord {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: "{}".to_string(),
            result: result.to_string(),
            is_error,
        }
    }

    #[test]
    fn test_history_window() {
        let history: Vec<Turn> = (0..5).map(|i| Turn::user(i.to_string())).collect();
        let window = history_window(&history, 3);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].content, "2");
        assert_eq!(history_window(&history, 10).len(), 5);
    }

    #[test]
    fn test_partial_answer_uses_last_success() {
        let calls = vec![
            record("get_total_students", r#"{"total_students":4}"#, false),
            record("get_student", r#"{"error":"not_found"}"#, true),
        ];
        let partial = partial_answer(&calls, 2);
        assert!(partial.contains("get_total_students"));
        assert!(partial.contains("total_students\":4"));
        assert!(partial_answer(&[], 1).contains("no results"));
    }

    #[test]
    fn test_error_payload_shape() {
        let payload = error_payload(&CampusError::ToolNotFound("nope".to_string()));
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["error"], "tool_not_found");
        assert!(value["message"].as_str().unwrap().contains("nope"));
    }
}
