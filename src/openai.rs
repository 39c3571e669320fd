//! OpenAI-compatible chat model adapter.
//!
//! Works against any endpoint speaking the chat completions protocol (OpenAI, Gemini's
//! compatibility layer, local servers) via `async-openai`.

use crate::agent::{ChatModel, ModelDelta, ModelReply, ModelRequest, ModelStream, ModelToolCall, ToolSpec};
use crate::config::LlmSettings;
use crate::error::{CampusError, Result};
use crate::session::Role;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs, ChatCompletionTool,
    ChatCompletionToolType, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    FunctionCall, FunctionObject,
};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, instrument};

/// Create a chat client for the configured endpoint, with its request timeout.
pub fn create_client(settings: &LlmSettings) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()?;

    let mut config = OpenAIConfig::new().with_api_base(settings.base_url.trim_end_matches('/'));
    if let Some(key) = settings.api_key() {
        config = config.with_api_key(key);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}

fn upstream(e: OpenAIError) -> CampusError {
    CampusError::UpstreamModel(e.to_string())
}

/// Chat model backed by an OpenAI-compatible endpoint.
pub struct OpenAiChatModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        Ok(Self::with_client(create_client(settings)?, &settings.model))
    }

    pub fn with_client(client: Client<OpenAIConfig>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    fn build_request(&self, request: ModelRequest<'_>, stream: bool) -> Result<CreateChatCompletionRequest> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(build_messages(request)?);
        if !request.tools.is_empty() {
            args.tools(tool_definitions(request.tools));
        }
        if stream {
            args.stream(true);
        }
        args.build().map_err(upstream)
    }
}

/// Convert persisted turns into chat messages.
///
/// A tool turn expands to the assistant's tool-call message followed by the tool result,
/// so every window of turns is a valid conversation on its own.
pub fn build_messages(request: ModelRequest<'_>) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system_prompt.to_string())
            .build()
            .map_err(upstream)?
            .into(),
    ];

    for turn in request.turns {
        match (turn.role, &turn.tool_call) {
            (Role::User, _) => messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(upstream)?
                    .into(),
            ),
            (Role::Assistant, _) => messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(upstream)?
                    .into(),
            ),
            (Role::Tool, Some(call)) => {
                let arguments = if call.arguments.trim().is_empty() {
                    "{}".to_string()
                } else {
                    call.arguments.clone()
                };
                messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .tool_calls(vec![ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments,
                            },
                        }])
                        .build()
                        .map_err(upstream)?
                        .into(),
                );
                messages.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(call.id.clone())
                        .content(call.result.clone())
                        .build()
                        .map_err(upstream)?
                        .into(),
                );
            }
            (Role::Tool, None) => debug!("Skipping tool turn without a call record"),
        }
    }

    Ok(messages)
}

/// Convert the tool catalog into function definitions.
pub fn tool_definitions(tools: &[ToolSpec]) -> Vec<ChatCompletionTool> {
    tools
        .iter()
        .map(|spec| ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: spec.name.to_string(),
                description: Some(spec.description.to_string()),
                parameters: Some(spec.parameters.clone()),
                strict: None,
            },
        })
        .collect()
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    #[instrument(skip_all, fields(model = %self.model, turns = request.turns.len()))]
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply> {
        let request = self.build_request(request, false)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| CampusError::UpstreamModel(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CampusError::UpstreamModel("No response from model".to_string()))?;

        if let Some(tool_calls) = choice.message.tool_calls.filter(|calls| !calls.is_empty()) {
            return Ok(ModelReply::ToolCalls(
                tool_calls
                    .into_iter()
                    .map(|call| ModelToolCall {
                        id: call.id,
                        name: call.function.name,
                        arguments: call.function.arguments,
                    })
                    .collect(),
            ));
        }

        match choice.message.content {
            Some(content) if !content.trim().is_empty() => Ok(ModelReply::Final(content)),
            _ => Err(CampusError::UpstreamModel(
                "Model returned neither text nor tool calls".to_string(),
            )),
        }
    }

    async fn stream(&self, request: ModelRequest<'_>) -> Result<ModelStream> {
        let request = self.build_request(request, true)?;

        let mut chunks = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| CampusError::UpstreamModel(format!("Chat API error: {}", e)))?;

        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            // Tool calls arrive as fragments keyed by index.
            let mut pending: BTreeMap<u32, PendingToolCall> = BTreeMap::new();

            while let Some(chunk) = chunks.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(CampusError::UpstreamModel(format!("Chat stream error: {}", e))))
                            .await;
                        return;
                    }
                };

                for choice in chunk.choices {
                    if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                        if tx.send(Ok(ModelDelta::Text(text))).await.is_err() {
                            return;
                        }
                    }
                    let fragments = choice.delta.tool_calls.unwrap_or_default();
                    if !fragments.is_empty() && pending.is_empty() {
                        if tx.send(Ok(ModelDelta::ToolCallStarted)).await.is_err() {
                            return;
                        }
                    }
                    for fragment in fragments {
                        let entry = pending.entry(fragment.index).or_default();
                        if let Some(id) = fragment.id {
                            entry.id = id;
                        }
                        if let Some(function) = fragment.function {
                            if let Some(name) = function.name {
                                entry.name.push_str(&name);
                            }
                            if let Some(arguments) = function.arguments {
                                entry.arguments.push_str(&arguments);
                            }
                        }
                    }
                }
            }

            if !pending.is_empty() {
                let calls = pending.into_values().map(PendingToolCall::finish).collect();
                let _ = tx.send(Ok(ModelDelta::ToolCalls(calls))).await;
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PendingToolCall {
    fn finish(self) -> ModelToolCall {
        let id = if self.id.is_empty() {
            format!("call_{}", uuid::Uuid::new_v4().simple())
        } else {
            self.id
        };
        ModelToolCall {
            id,
            name: self.name,
            arguments: self.arguments,
        }
    }
}
