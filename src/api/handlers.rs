//! Route handlers.

use super::{ApiResult, AppState, CurrentAdmin};
use crate::agent::ToolCall;
use crate::analytics::{self, Dashboard};
use crate::auth::{AuthToken, SignupRequest};
use crate::error::CampusError;
use crate::session::Turn;
use crate::store::NewStudent;
use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::Utc;
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;

type SharedState = State<Arc<AppState>>;

// === Request/Response Types ===

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub struct SignupResponse {
    message: String,
    email: String,
    name: String,
}

#[derive(Deserialize)]
pub struct ChatQuery {
    q: String,
    #[serde(default)]
    thread_id: Option<String>,
}

#[derive(Deserialize)]
pub struct ThreadQuery {
    #[serde(default)]
    thread_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    response: String,
    thread_id: String,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    thread_id: String,
    turns: Vec<Turn>,
}

#[derive(Deserialize)]
pub struct StudentLookup {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    student_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct IdentifierQuery {
    identifier: String,
}

#[derive(Deserialize)]
pub struct UpdateRequest {
    field: String,
    new_value: Value,
}

#[derive(Deserialize)]
pub struct DepartmentQuery {
    #[serde(default)]
    department: Option<String>,
}

#[derive(Deserialize)]
pub struct RecentQuery {
    #[serde(default)]
    limit: Option<u32>,
}

/// The thread to use when the caller does not name one.
fn thread_for(admin: &CurrentAdmin, requested: Option<String>) -> String {
    requested
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("admin:{}", admin.0.email))
}

// === Handlers ===

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Campus Admin API is running" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn signup(
    State(state): SharedState,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    let admin = state.orchestrator.auth().signup(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "Admin registered successfully".to_string(),
            email: admin.email,
            name: admin.name,
        }),
    ))
}

pub async fn login(
    State(state): SharedState,
    Form(form): Form<LoginForm>,
) -> ApiResult<Json<AuthToken>> {
    let token = state
        .orchestrator
        .auth()
        .login(&form.username, &form.password)
        .await?;
    Ok(Json(token))
}

pub async fn chat(
    State(state): SharedState,
    admin: CurrentAdmin,
    Query(query): Query<ChatQuery>,
) -> ApiResult<Json<ChatResponse>> {
    let thread_id = thread_for(&admin, query.thread_id);
    let response = state
        .orchestrator
        .agent()
        .handle_turn(&thread_id, &query.q)
        .await?;
    Ok(Json(ChatResponse {
        response: response.content,
        thread_id,
    }))
}

pub async fn chat_stream(
    State(state): SharedState,
    admin: CurrentAdmin,
    Query(query): Query<ChatQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let thread_id = thread_for(&admin, query.thread_id);
    let chunks = state
        .orchestrator
        .agent()
        .handle_turn_streaming(&thread_id, &query.q)
        .flat_map(|chunk| {
            let mut events = Vec::new();
            match chunk {
                Ok(text) => events.push(Event::default().data(text)),
                Err(e) => {
                    // The partial answer goes out before the error that ends the stream.
                    if let CampusError::RoundLimitExceeded { partial, .. } = &e {
                        events.push(Event::default().data(partial.as_str()));
                    }
                    events.push(Event::default().data(format!("[STREAM ERROR] {}", e)));
                }
            }
            stream::iter(events.into_iter().map(Ok::<_, Infallible>))
        });

    Sse::new(chunks).keep_alive(KeepAlive::default())
}

pub async fn chat_history(
    State(state): SharedState,
    admin: CurrentAdmin,
    Query(query): Query<ThreadQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    let thread_id = thread_for(&admin, query.thread_id);
    let turns = state.orchestrator.sessions().load(&thread_id).await?;
    Ok(Json(HistoryResponse { thread_id, turns }))
}

pub async fn chat_threads(State(state): SharedState, _admin: CurrentAdmin) -> ApiResult<Json<Value>> {
    let threads = state.orchestrator.sessions().list_threads().await?;
    Ok(Json(json!({ "threads": threads })))
}

pub async fn create_student(
    State(state): SharedState,
    _admin: CurrentAdmin,
    Json(student): Json<NewStudent>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let result = state
        .orchestrator
        .tools()
        .execute(&ToolCall::AddStudent {
            name: student.name,
            department: student.department,
            email: student.email,
            student_id: student.student_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn get_student(
    State(state): SharedState,
    _admin: CurrentAdmin,
    Query(lookup): Query<StudentLookup>,
) -> ApiResult<Json<Value>> {
    let identifier = match (lookup.email, lookup.student_id) {
        (Some(email), _) if !email.trim().is_empty() => email,
        (_, Some(id)) => id.to_string(),
        _ => {
            return Err(CampusError::Validation("Provide email or student_id".to_string()).into())
        }
    };
    let result = state
        .orchestrator
        .tools()
        .execute(&ToolCall::GetStudent { identifier })
        .await?;
    Ok(Json(result))
}

pub async fn update_student(
    State(state): SharedState,
    _admin: CurrentAdmin,
    Query(query): Query<IdentifierQuery>,
    Json(req): Json<UpdateRequest>,
) -> ApiResult<Json<Value>> {
    let new_value = match req.new_value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => {
            return Err(CampusError::Validation(format!(
                "new_value must be a string or number, got {}",
                other
            ))
            .into())
        }
    };
    let result = state
        .orchestrator
        .tools()
        .execute(&ToolCall::UpdateStudent {
            identifier: query.identifier,
            field: req.field,
            new_value,
        })
        .await?;
    Ok(Json(result))
}

pub async fn delete_student(
    State(state): SharedState,
    _admin: CurrentAdmin,
    Query(query): Query<IdentifierQuery>,
) -> ApiResult<Json<Value>> {
    let result = state
        .orchestrator
        .tools()
        .execute(&ToolCall::DeleteStudent {
            identifier: query.identifier,
        })
        .await?;
    Ok(Json(result))
}

pub async fn list_students(State(state): SharedState, _admin: CurrentAdmin) -> ApiResult<Json<Value>> {
    let result = state
        .orchestrator
        .tools()
        .execute(&ToolCall::ListStudents {})
        .await?;
    Ok(Json(result))
}

pub async fn record_activity(
    State(state): SharedState,
    _admin: CurrentAdmin,
    Query(query): Query<IdentifierQuery>,
) -> ApiResult<Json<Value>> {
    let store = state.orchestrator.store();
    let student = store.require_student(&query.identifier).await?;
    let student = store.touch_student(&student.email, Utc::now()).await?;
    Ok(Json(json!({ "message": "Activity recorded", "student": student })))
}

pub async fn analytics_total(State(state): SharedState, _admin: CurrentAdmin) -> ApiResult<Json<Value>> {
    let result = state
        .orchestrator
        .tools()
        .execute(&ToolCall::GetTotalStudents {})
        .await?;
    Ok(Json(result))
}

pub async fn analytics_by_department(
    State(state): SharedState,
    _admin: CurrentAdmin,
    Query(query): Query<DepartmentQuery>,
) -> ApiResult<Json<Value>> {
    let result = state
        .orchestrator
        .tools()
        .execute(&ToolCall::GetStudentsByDepartment {
            department: query.department,
        })
        .await?;
    Ok(Json(result))
}

pub async fn analytics_recent(
    State(state): SharedState,
    _admin: CurrentAdmin,
    Query(query): Query<RecentQuery>,
) -> ApiResult<Json<Value>> {
    let result = state
        .orchestrator
        .tools()
        .execute(&ToolCall::GetRecentOnboardedStudents {
            limit: query.limit.unwrap_or(5),
        })
        .await?;
    Ok(Json(result))
}

pub async fn analytics_active(State(state): SharedState, _admin: CurrentAdmin) -> ApiResult<Json<Value>> {
    let result = state
        .orchestrator
        .tools()
        .execute(&ToolCall::GetActiveStudentsLast7Days {})
        .await?;
    Ok(Json(result))
}

pub async fn analytics_dashboard(
    State(state): SharedState,
    _admin: CurrentAdmin,
) -> ApiResult<Json<Dashboard>> {
    let store = state.orchestrator.store();
    let dashboard = analytics::dashboard(store.as_ref(), Utc::now()).await?;
    Ok(Json(dashboard))
}

pub async fn faq_cafeteria(State(state): SharedState, _admin: CurrentAdmin) -> ApiResult<Json<Value>> {
    let result = state
        .orchestrator
        .tools()
        .execute(&ToolCall::GetCafeteriaTimings {})
        .await?;
    Ok(Json(result))
}

pub async fn faq_library(State(state): SharedState, _admin: CurrentAdmin) -> ApiResult<Json<Value>> {
    let result = state
        .orchestrator
        .tools()
        .execute(&ToolCall::GetLibraryHours {})
        .await?;
    Ok(Json(result))
}

pub async fn faq_events(State(state): SharedState, _admin: CurrentAdmin) -> ApiResult<Json<Value>> {
    let result = state
        .orchestrator
        .tools()
        .execute(&ToolCall::GetEventSchedule {})
        .await?;
    Ok(Json(result))
}
