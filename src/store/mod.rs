//! Record store for admin accounts and student records.
//!
//! Provides a trait-based interface over the document backends. Students are keyed by
//! their normalized email; admins by their normalized email as well.

mod memory;
mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;
pub(crate) use sqlite::{format_ts, parse_ts};

use crate::error::{CampusError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
        .expect("Invalid email pattern")
});

/// Trim and lower-case an email so it can be used as a key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalize an email and check its shape.
pub fn validate_email(email: &str) -> Result<String> {
    let email = normalize_email(email);
    if EMAIL_RE.is_match(&email) {
        Ok(email)
    } else {
        Err(CampusError::Validation(format!("'{}' is not a valid email address", email)))
    }
}

fn require_text(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CampusError::Validation(format!("{} must not be empty", field)));
    }
    Ok(value.to_string())
}

/// A student record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    /// Unique, normalized email.
    pub email: String,
    pub name: String,
    pub department: String,
    /// Optional numeric roll number assigned by the campus.
    pub student_id: Option<i64>,
    /// When the student was onboarded.
    pub created_at: DateTime<Utc>,
    /// Last recorded activity.
    pub last_active_at: Option<DateTime<Utc>>,
}

impl Student {
    /// Build a validated student record onboarded now.
    pub fn new(new: NewStudent) -> Result<Self> {
        Ok(Self {
            email: validate_email(&new.email)?,
            name: require_text("name", &new.name)?,
            department: require_text("department", &new.department)?,
            student_id: new.student_id,
            created_at: Utc::now(),
            last_active_at: None,
        })
    }
}

/// Input for creating a student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub department: String,
    pub email: String,
    #[serde(default)]
    pub student_id: Option<i64>,
}

/// A single-field change to a student record.
#[derive(Debug, Clone, PartialEq)]
pub enum StudentUpdate {
    Name(String),
    Department(String),
    Email(String),
    StudentId(i64),
}

impl StudentUpdate {
    /// Parse a `(field, new_value)` pair into a validated update.
    pub fn parse(field: &str, new_value: &str) -> Result<Self> {
        match field.trim() {
            "name" => Ok(StudentUpdate::Name(require_text("name", new_value)?)),
            "department" => Ok(StudentUpdate::Department(require_text("department", new_value)?)),
            "email" => Ok(StudentUpdate::Email(validate_email(new_value)?)),
            "student_id" => new_value
                .trim()
                .parse::<i64>()
                .map(StudentUpdate::StudentId)
                .map_err(|_| CampusError::Validation("student_id must be an integer".to_string())),
            other => Err(CampusError::Validation(format!(
                "Invalid field '{}': expected one of name, department, email, student_id",
                other
            ))),
        }
    }

    /// Column name of the updated field.
    pub fn field(&self) -> &'static str {
        match self {
            StudentUpdate::Name(_) => "name",
            StudentUpdate::Department(_) => "department",
            StudentUpdate::Email(_) => "email",
            StudentUpdate::StudentId(_) => "student_id",
        }
    }

    /// Apply the update to an in-memory record.
    pub fn apply(&self, student: &mut Student) {
        match self {
            StudentUpdate::Name(v) => student.name = v.clone(),
            StudentUpdate::Department(v) => student.department = v.clone(),
            StudentUpdate::Email(v) => student.email = v.clone(),
            StudentUpdate::StudentId(v) => student.student_id = Some(*v),
        }
    }
}

/// Number of students in one department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentCount {
    pub department: String,
    pub count: u64,
}

/// An administrator account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub email: String,
    pub name: String,
    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Trait for record store implementations.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a student. Fails with `Conflict` if the email is taken.
    async fn insert_student(&self, student: &Student) -> Result<()>;

    /// Get a student by normalized email.
    async fn get_student(&self, email: &str) -> Result<Option<Student>>;

    /// Get a student by numeric student id.
    async fn get_student_by_id(&self, student_id: i64) -> Result<Option<Student>>;

    /// Apply a single-field update and return the updated record.
    async fn update_student(&self, email: &str, update: &StudentUpdate) -> Result<Student>;

    /// Delete a student. Fails with `NotFound` if no record matches.
    async fn delete_student(&self, email: &str) -> Result<()>;

    /// Record activity for a student at the given instant.
    async fn touch_student(&self, email: &str, at: DateTime<Utc>) -> Result<Student>;

    /// List all students, most recently onboarded first.
    async fn list_students(&self) -> Result<Vec<Student>>;

    /// The `limit` most recently onboarded students.
    async fn recent_students(&self, limit: usize) -> Result<Vec<Student>>;

    /// Students active at or after `since`.
    async fn active_since(&self, since: DateTime<Utc>) -> Result<Vec<Student>>;

    /// Total number of students.
    async fn count_students(&self) -> Result<u64>;

    /// Student counts grouped by department, largest first.
    async fn count_by_department(&self) -> Result<Vec<DepartmentCount>>;

    /// Number of students in a department (case-insensitive match).
    async fn count_in_department(&self, department: &str) -> Result<u64>;

    /// Insert an admin. Fails with `Conflict` if the email is taken.
    async fn insert_admin(&self, admin: &Admin) -> Result<()>;

    /// Get an admin by normalized email.
    async fn get_admin(&self, email: &str) -> Result<Option<Admin>>;

    /// Resolve an identifier as an email first, then as a numeric student id.
    async fn find_student(&self, identifier: &str) -> Result<Option<Student>> {
        let identifier = identifier.trim();
        if let Some(student) = self.get_student(&normalize_email(identifier)).await? {
            return Ok(Some(student));
        }
        match identifier.parse::<i64>() {
            Ok(id) => self.get_student_by_id(id).await,
            Err(_) => Ok(None),
        }
    }

    /// Like `find_student`, but a miss is `NotFound`.
    async fn require_student(&self, identifier: &str) -> Result<Student> {
        self.find_student(identifier)
            .await?
            .ok_or_else(|| CampusError::NotFound(format!("Student '{}' not found", identifier.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalization() {
        assert_eq!(validate_email("  Anas@Gmail.COM ").unwrap(), "anas@gmail.com");
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
    }

    #[test]
    fn test_update_parsing() {
        assert_eq!(
            StudentUpdate::parse("department", "BS CS").unwrap(),
            StudentUpdate::Department("BS CS".to_string())
        );
        assert_eq!(
            StudentUpdate::parse("student_id", " 42 ").unwrap(),
            StudentUpdate::StudentId(42)
        );
        assert!(matches!(
            StudentUpdate::parse("student_id", "forty"),
            Err(CampusError::Validation(_))
        ));
        assert!(matches!(
            StudentUpdate::parse("password", "x"),
            Err(CampusError::Validation(_))
        ));
        assert!(matches!(
            StudentUpdate::parse("name", "   "),
            Err(CampusError::Validation(_))
        ));
    }

    #[test]
    fn test_new_student_validates() {
        let student = Student::new(NewStudent {
            name: " Anas ".to_string(),
            department: "BS SE".to_string(),
            email: "ANAS@gmail.com".to_string(),
            student_id: Some(1),
        })
        .unwrap();
        assert_eq!(student.name, "Anas");
        assert_eq!(student.email, "anas@gmail.com");
        assert!(student.last_active_at.is_none());
    }
}
