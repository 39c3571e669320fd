//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use campus_admin::agent::{
    Agent, ChatModel, MockMailer, ModelDelta, ModelReply, ModelRequest, ModelStream,
    ModelToolCall, ToolSet,
};
use campus_admin::config::FaqSettings;
use campus_admin::session::{MemorySessionStore, Role, SessionStore, Turn};
use campus_admin::store::{MemoryRecordStore, NewStudent, RecordStore, Student};
use campus_admin::{CampusError, Result};
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A chat model that plays back a fixed list of replies.
pub struct ScriptedModel {
    script: Mutex<VecDeque<ModelReply>>,
    repeat: Option<ModelReply>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            repeat: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// A model that gives the same reply forever.
    pub fn always(reply: ModelReply) -> Self {
        Self {
            repeat: Some(reply),
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The turns the model was shown, one entry per call.
    pub fn seen(&self) -> Vec<Vec<Turn>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.turns.to_vec());

        let next = self.script.lock().unwrap().pop_front();
        next.or_else(|| self.repeat.clone())
            .ok_or_else(|| CampusError::UpstreamModel("script exhausted".to_string()))
    }
}

/// A chat model that only streams, playing back one list of deltas per round.
pub struct StreamingModel {
    rounds: Mutex<VecDeque<Vec<ModelDelta>>>,
}

impl StreamingModel {
    pub fn new(rounds: Vec<Vec<ModelDelta>>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into()),
        }
    }
}

#[async_trait]
impl ChatModel for StreamingModel {
    async fn complete(&self, _request: ModelRequest<'_>) -> Result<ModelReply> {
        Err(CampusError::UpstreamModel("streaming only".to_string()))
    }

    async fn stream(&self, _request: ModelRequest<'_>) -> Result<ModelStream> {
        let deltas = self.rounds.lock().unwrap().pop_front().unwrap_or_default();
        Ok(stream::iter(deltas.into_iter().map(Ok)).boxed())
    }
}

pub fn text(chunk: &str) -> ModelDelta {
    ModelDelta::Text(chunk.to_string())
}

pub fn streamed_call(name: &str, arguments: &str) -> ModelDelta {
    match tool_call(name, arguments) {
        ModelReply::ToolCalls(calls) => ModelDelta::ToolCalls(calls),
        ModelReply::Final(_) => unreachable!(),
    }
}

/// Answers department questions by calling the counting tool, then reading its result.
pub struct DepartmentCountingModel;

#[async_trait]
impl ChatModel for DepartmentCountingModel {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply> {
        let last = request.turns.last().expect("at least the user turn");
        if last.role == Role::Tool {
            let result: serde_json::Value = serde_json::from_str(&last.content)?;
            return Ok(ModelReply::Final(format!(
                "There are {} students in the {} department.",
                result["count"], result["department"].as_str().unwrap_or_default()
            )));
        }
        Ok(tool_call(
            "get_students_by_department",
            r#"{"department": "Computer Science"}"#,
        ))
    }
}

pub fn tool_call(name: &str, arguments: &str) -> ModelReply {
    ModelReply::ToolCalls(vec![ModelToolCall {
        id: format!("call_{}", name),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }])
}

pub fn answer(text: &str) -> ModelReply {
    ModelReply::Final(text.to_string())
}

pub struct Fixture {
    pub agent: Agent,
    pub store: Arc<MemoryRecordStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub mailer: Arc<MockMailer>,
}

/// An agent over in-memory stores.
pub fn fixture(model: Arc<dyn ChatModel>) -> Fixture {
    let store = Arc::new(MemoryRecordStore::new());
    let sessions = Arc::new(MemorySessionStore::new());
    let mailer = Arc::new(MockMailer::new());
    let tools = Arc::new(ToolSet::new(
        store.clone(),
        mailer.clone(),
        FaqSettings::default(),
    ));
    let agent = Agent::new(model, tools, sessions.clone());
    Fixture {
        agent,
        store,
        sessions,
        mailer,
    }
}

pub async fn add_student(store: &dyn RecordStore, name: &str, department: &str, email: &str) {
    let student = Student::new(NewStudent {
        name: name.to_string(),
        department: department.to_string(),
        email: email.to_string(),
        student_id: None,
    })
    .unwrap();
    store.insert_student(&student).await.unwrap();
}

/// Three Computer Science students and two Electrical Engineering students.
pub async fn seed_departments(store: &dyn RecordStore) {
    add_student(store, "Ana", "Computer Science", "ana@uni.edu").await;
    add_student(store, "Ben", "Computer Science", "ben@uni.edu").await;
    add_student(store, "Cy", "Computer Science", "cy@uni.edu").await;
    add_student(store, "Dee", "Electrical Engineering", "dee@uni.edu").await;
    add_student(store, "Eli", "Electrical Engineering", "eli@uni.edu").await;
}

pub async fn history(sessions: &dyn SessionStore, thread_id: &str) -> Vec<Turn> {
    sessions.load(thread_id).await.unwrap()
}
