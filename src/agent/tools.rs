//! Tool catalog and implementations for the campus agent.
//!
//! The set of tools is closed: `tool_catalog` describes every tool to the model and
//! `parse_tool_call` maps a requested name plus JSON arguments onto a `ToolCall` variant.

use super::mailer::Mailer;
use crate::config::FaqSettings;
use crate::error::{CampusError, Result};
use crate::store::{NewStudent, RecordStore, Student, StudentUpdate};
use chrono::{Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Days of inactivity after which a student no longer counts as active.
pub const ACTIVE_WINDOW_DAYS: i64 = 7;

const MAX_RECENT_LIMIT: u32 = 100;

/// Available tools for the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    AddStudent {
        name: String,
        department: String,
        email: String,
        #[serde(default, deserialize_with = "optional_int")]
        student_id: Option<i64>,
    },
    GetStudent {
        #[serde(deserialize_with = "string_or_number")]
        identifier: String,
    },
    UpdateStudent {
        #[serde(deserialize_with = "string_or_number")]
        identifier: String,
        field: String,
        #[serde(deserialize_with = "string_or_number")]
        new_value: String,
    },
    DeleteStudent {
        #[serde(deserialize_with = "string_or_number")]
        identifier: String,
    },
    ListStudents {},
    GetTotalStudents {},
    GetStudentsByDepartment {
        #[serde(default)]
        department: Option<String>,
    },
    GetRecentOnboardedStudents {
        #[serde(default = "default_recent_limit")]
        limit: u32,
    },
    #[serde(rename = "get_active_students_last_7_days")]
    GetActiveStudentsLast7Days {},
    GetCafeteriaTimings {},
    GetLibraryHours {},
    GetEventSchedule {},
    SendEmail {
        #[serde(alias = "student_identifier", deserialize_with = "string_or_number")]
        identifier: String,
        message: String,
    },
}

fn default_recent_limit() -> u32 {
    5
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

fn optional_int<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let invalid = || serde::de::Error::custom("student_id must be an integer");
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(invalid),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// Model-facing description of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

fn no_arguments() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn identifier_only(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "identifier": {
                "type": "string",
                "description": description
            }
        },
        "required": ["identifier"]
    })
}

/// Describe every tool the agent may call.
pub fn tool_catalog() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "add_student",
            description: "Add a new student record. Fails if a student with the same email exists.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Full name" },
                    "department": { "type": "string", "description": "Department, e.g. Computer Science" },
                    "email": { "type": "string", "description": "Unique email address" },
                    "student_id": { "type": "integer", "description": "Optional numeric roll number" }
                },
                "required": ["name", "department", "email"]
            }),
        },
        ToolSpec {
            name: "get_student",
            description: "Fetch one student's full record.",
            parameters: identifier_only("Student email or numeric student id"),
        },
        ToolSpec {
            name: "update_student",
            description: "Change one field of a student record and return the updated record.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "identifier": { "type": "string", "description": "Student email or numeric student id" },
                    "field": {
                        "type": "string",
                        "enum": ["name", "department", "email", "student_id"],
                        "description": "Field to change"
                    },
                    "new_value": { "type": "string", "description": "New value for the field" }
                },
                "required": ["identifier", "field", "new_value"]
            }),
        },
        ToolSpec {
            name: "delete_student",
            description: "Delete a student record.",
            parameters: identifier_only("Student email or numeric student id"),
        },
        ToolSpec {
            name: "list_students",
            description: "List every student, most recently onboarded first.",
            parameters: no_arguments(),
        },
        ToolSpec {
            name: "get_total_students",
            description: "Count all students.",
            parameters: no_arguments(),
        },
        ToolSpec {
            name: "get_students_by_department",
            description: "Count students in one department, or in every department when none is given.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "department": {
                        "type": "string",
                        "description": "Department name, matched case-insensitively"
                    }
                }
            }),
        },
        ToolSpec {
            name: "get_recent_onboarded_students",
            description: "The most recently onboarded students.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "description": "How many students to return (1-100, default: 5)",
                        "default": 5
                    }
                }
            }),
        },
        ToolSpec {
            name: "get_active_students_last_7_days",
            description: "Students with recorded activity in the last 7 days.",
            parameters: no_arguments(),
        },
        ToolSpec {
            name: "get_cafeteria_timings",
            description: "Cafeteria opening hours.",
            parameters: no_arguments(),
        },
        ToolSpec {
            name: "get_library_hours",
            description: "Library opening hours.",
            parameters: no_arguments(),
        },
        ToolSpec {
            name: "get_event_schedule",
            description: "Upcoming campus events.",
            parameters: no_arguments(),
        },
        ToolSpec {
            name: "send_email",
            description: "Send a short message to a student's email address.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "identifier": { "type": "string", "description": "Student email or numeric student id" },
                    "message": { "type": "string", "description": "Message body" }
                },
                "required": ["identifier", "message"]
            }),
        },
    ]
}

/// Parse a tool call from a model-supplied name and JSON arguments.
///
/// Unknown names are `ToolNotFound`; malformed arguments are `Validation`.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<ToolCall> {
    if !tool_catalog().iter().any(|spec| spec.name == name) {
        return Err(CampusError::ToolNotFound(name.to_string()));
    }

    let args = if arguments.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str::<Value>(arguments)
            .map_err(|e| CampusError::Validation(format!("Invalid tool arguments: {}", e)))?
    };
    let args = match args {
        Value::Null => json!({}),
        Value::Object(map) => Value::Object(map),
        other => {
            return Err(CampusError::Validation(format!(
                "Tool arguments must be a JSON object, got {}",
                other
            )))
        }
    };

    serde_json::from_value(json!({ "name": name, "arguments": args }))
        .map_err(|e| CampusError::Validation(format!("Invalid arguments for {}: {}", name, e)))
}

/// Executes tool calls against the record store, mailer and FAQ data.
pub struct ToolSet {
    store: Arc<dyn RecordStore>,
    mailer: Arc<dyn Mailer>,
    faq: FaqSettings,
}

impl ToolSet {
    pub fn new(store: Arc<dyn RecordStore>, mailer: Arc<dyn Mailer>, faq: FaqSettings) -> Self {
        Self { store, mailer, faq }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Parse and execute a call in one step.
    pub async fn invoke(&self, name: &str, arguments: &str) -> Result<Value> {
        let call = parse_tool_call(name, arguments)?;
        self.execute(&call).await
    }

    /// Execute a tool call and return its JSON result.
    pub async fn execute(&self, tool: &ToolCall) -> Result<Value> {
        match tool {
            ToolCall::AddStudent {
                name,
                department,
                email,
                student_id,
            } => {
                self.add_student(NewStudent {
                    name: name.clone(),
                    department: department.clone(),
                    email: email.clone(),
                    student_id: *student_id,
                })
                .await
            }
            ToolCall::GetStudent { identifier } => {
                let student = self.store.require_student(identifier).await?;
                Ok(json!(student))
            }
            ToolCall::UpdateStudent {
                identifier,
                field,
                new_value,
            } => self.update_student(identifier, field, new_value).await,
            ToolCall::DeleteStudent { identifier } => self.delete_student(identifier).await,
            ToolCall::ListStudents {} => {
                let students = self.store.list_students().await?;
                Ok(json!({ "students": students }))
            }
            ToolCall::GetTotalStudents {} => {
                let total = self.store.count_students().await?;
                Ok(json!({ "total_students": total }))
            }
            ToolCall::GetStudentsByDepartment { department } => {
                self.students_by_department(department.as_deref()).await
            }
            ToolCall::GetRecentOnboardedStudents { limit } => self.recent_students(*limit).await,
            ToolCall::GetActiveStudentsLast7Days {} => {
                let students = self.active_students().await?;
                Ok(json!({ "active_last_7_days": students }))
            }
            ToolCall::GetCafeteriaTimings {} => {
                Ok(json!({ "cafeteria_timings": self.faq.cafeteria_timings }))
            }
            ToolCall::GetLibraryHours {} => Ok(json!({ "library_hours": self.faq.library_hours })),
            ToolCall::GetEventSchedule {} => Ok(json!({ "events": self.faq.events })),
            ToolCall::SendEmail {
                identifier,
                message,
            } => self.send_email(identifier, message).await,
        }
    }

    async fn add_student(&self, new: NewStudent) -> Result<Value> {
        let student = Student::new(new)?;
        self.store.insert_student(&student).await?;
        info!("Added student {} ({})", student.email, student.department);
        Ok(json!({ "message": "Student added successfully", "student": student }))
    }

    async fn update_student(&self, identifier: &str, field: &str, new_value: &str) -> Result<Value> {
        let update = StudentUpdate::parse(field, new_value)?;
        let current = self.store.require_student(identifier).await?;
        let student = self.store.update_student(&current.email, &update).await?;
        info!("Updated {} of student {}", update.field(), current.email);
        Ok(json!({ "message": "Student updated successfully", "student": student }))
    }

    async fn delete_student(&self, identifier: &str) -> Result<Value> {
        let student = self.store.require_student(identifier).await?;
        self.store.delete_student(&student.email).await?;
        info!("Deleted student {}", student.email);
        Ok(json!({ "message": "Student deleted successfully", "email": student.email }))
    }

    async fn students_by_department(&self, department: Option<&str>) -> Result<Value> {
        match department.map(str::trim).filter(|d| !d.is_empty()) {
            Some(department) => {
                let count = self.store.count_in_department(department).await?;
                Ok(json!({ "department": department, "count": count }))
            }
            None => {
                let counts = self.store.count_by_department().await?;
                Ok(json!({ "students_by_department": counts }))
            }
        }
    }

    async fn recent_students(&self, limit: u32) -> Result<Value> {
        if !(1..=MAX_RECENT_LIMIT).contains(&limit) {
            return Err(CampusError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_RECENT_LIMIT
            )));
        }
        let students = self.store.recent_students(limit as usize).await?;
        Ok(json!({ "recent_students": students }))
    }

    /// Students active within the last seven days.
    pub async fn active_students(&self) -> Result<Vec<Student>> {
        let since = Utc::now() - Duration::days(ACTIVE_WINDOW_DAYS);
        self.store.active_since(since).await
    }

    async fn send_email(&self, identifier: &str, message: &str) -> Result<Value> {
        if message.trim().is_empty() {
            return Err(CampusError::Validation("message must not be empty".to_string()));
        }
        let student = self.store.require_student(identifier).await?;
        let receipt = self.mailer.send(&student.email, message).await?;
        Ok(json!({
            "message": format!("Email sent to {}", receipt.to),
            "to": receipt.to,
            "status": receipt.status
        }))
    }
}
