//! The contract between the agent loop and a chat model.
//!
//! A model sees the system prompt, a window of persisted turns and the tool catalog, and
//! answers either with final text or with one or more tool calls.

use super::tools::ToolSpec;
use crate::error::Result;
use crate::session::Turn;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
}

/// A complete model reply for one round.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Final(String),
    ToolCalls(Vec<ModelToolCall>),
}

/// An incremental piece of a streamed reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelDelta {
    Text(String),
    /// The reply has started requesting tools; its text is not a final answer.
    ToolCallStarted,
    /// Fully assembled tool calls.
    ToolCalls(Vec<ModelToolCall>),
}

pub type ModelStream = BoxStream<'static, Result<ModelDelta>>;

/// Everything the model gets to see in one round.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub system_prompt: &'a str,
    pub turns: &'a [Turn],
    pub tools: &'a [ToolSpec],
}

/// A chat model capable of tool calling.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce a complete reply for one round.
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply>;

    /// Produce a reply as a stream of deltas.
    ///
    /// The default replays `complete` as a single burst, for models without native streaming.
    async fn stream(&self, request: ModelRequest<'_>) -> Result<ModelStream> {
        let deltas = match self.complete(request).await? {
            ModelReply::Final(text) => vec![Ok(ModelDelta::Text(text))],
            ModelReply::ToolCalls(calls) => vec![Ok(ModelDelta::ToolCalls(calls))],
        };
        Ok(stream::iter(deltas).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ChatModel for Echo {
        async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply> {
            let last = request.turns.last().map(|t| t.content.clone()).unwrap_or_default();
            Ok(ModelReply::Final(last))
        }
    }

    #[tokio::test]
    async fn test_default_stream_replays_complete() {
        let turns = vec![Turn::user("ping")];
        let request = ModelRequest {
            system_prompt: "",
            turns: &turns,
            tools: &[],
        };
        let deltas: Vec<_> = Echo.stream(request).await.unwrap().collect().await;
        assert_eq!(deltas.len(), 1);
        assert_eq!(
            deltas[0].as_ref().unwrap(),
            &ModelDelta::Text("ping".to_string())
        );
    }
}
