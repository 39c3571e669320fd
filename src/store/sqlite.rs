//! SQLite-based record store implementation.
//!
//! Each student and admin is a single row keyed by normalized email; every mutation is
//! one statement, so concurrent requests rely on SQLite's per-statement atomicity.

use super::{Admin, DepartmentCount, RecordStore, Student, StudentUpdate};
use crate::error::{CampusError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    email TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    department TEXT NOT NULL,
    student_id INTEGER,
    created_at TEXT NOT NULL,
    last_active_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_students_department ON students(department);
CREATE INDEX IF NOT EXISTS idx_students_created_at ON students(created_at);
CREATE INDEX IF NOT EXISTS idx_students_student_id ON students(student_id);

CREATE TABLE IF NOT EXISTS admins (
    email TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

const STUDENT_COLUMNS: &str =
    "email, name, department, student_id, created_at, last_active_at";

/// SQLite-based record store.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (or create) the store at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite record store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CampusError::Storage(format!("Failed to acquire lock: {}", e)))
    }

    fn query_students(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Student>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, row_to_student)?;
        let students = rows.collect::<rusqlite::Result<Vec<Student>>>()?;
        Ok(students)
    }
}

/// Fixed-width timestamps so text ordering matches time ordering.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_student(row: &Row<'_>) -> rusqlite::Result<Student> {
    let created_at: String = row.get(4)?;
    let last_active_at: Option<String> = row.get(5)?;
    Ok(Student {
        email: row.get(0)?,
        name: row.get(1)?,
        department: row.get(2)?,
        student_id: row.get(3)?,
        created_at: parse_ts(&created_at),
        last_active_at: last_active_at.map(|s| parse_ts(&s)),
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    #[instrument(skip(self, student), fields(email = %student.email))]
    async fn insert_student(&self, student: &Student) -> Result<()> {
        let conn = self.conn()?;

        let inserted = conn.execute(
            r#"
            INSERT INTO students (email, name, department, student_id, created_at, last_active_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                student.email,
                student.name,
                student.department,
                student.student_id,
                format_ts(&student.created_at),
                student.last_active_at.as_ref().map(format_ts),
            ],
        );

        match inserted {
            Ok(_) => {
                info!("Inserted student {}", student.email);
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => Err(CampusError::Conflict(format!(
                "Student with email {} already exists",
                student.email
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_student(&self, email: &str) -> Result<Option<Student>> {
        let conn = self.conn()?;
        let student = conn
            .query_row(
                &format!("SELECT {} FROM students WHERE email = ?1", STUDENT_COLUMNS),
                params![email],
                row_to_student,
            )
            .optional()?;
        Ok(student)
    }

    async fn get_student_by_id(&self, student_id: i64) -> Result<Option<Student>> {
        let conn = self.conn()?;
        let student = conn
            .query_row(
                &format!(
                    "SELECT {} FROM students WHERE student_id = ?1 ORDER BY created_at DESC LIMIT 1",
                    STUDENT_COLUMNS
                ),
                params![student_id],
                row_to_student,
            )
            .optional()?;
        Ok(student)
    }

    #[instrument(skip(self, update), fields(field = update.field()))]
    async fn update_student(&self, email: &str, update: &StudentUpdate) -> Result<Student> {
        let conn = self.conn()?;

        let result = match update {
            StudentUpdate::Name(v) => conn.execute(
                "UPDATE students SET name = ?1 WHERE email = ?2",
                params![v, email],
            ),
            StudentUpdate::Department(v) => conn.execute(
                "UPDATE students SET department = ?1 WHERE email = ?2",
                params![v, email],
            ),
            StudentUpdate::Email(v) => conn.execute(
                "UPDATE students SET email = ?1 WHERE email = ?2",
                params![v, email],
            ),
            StudentUpdate::StudentId(v) => conn.execute(
                "UPDATE students SET student_id = ?1 WHERE email = ?2",
                params![v, email],
            ),
        };

        let matched = match result {
            Ok(n) => n,
            Err(e) if is_unique_violation(&e) => {
                return Err(CampusError::Conflict(format!(
                    "Student with email {} already exists",
                    match update {
                        StudentUpdate::Email(v) => v.as_str(),
                        _ => email,
                    }
                )))
            }
            Err(e) => return Err(e.into()),
        };

        if matched == 0 {
            return Err(CampusError::NotFound(format!("Student '{}' not found", email)));
        }

        let key = match update {
            StudentUpdate::Email(v) => v.as_str(),
            _ => email,
        };
        let student = conn.query_row(
            &format!("SELECT {} FROM students WHERE email = ?1", STUDENT_COLUMNS),
            params![key],
            row_to_student,
        )?;

        info!("Updated {} for student {}", update.field(), key);
        Ok(student)
    }

    #[instrument(skip(self))]
    async fn delete_student(&self, email: &str) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM students WHERE email = ?1", params![email])?;
        if deleted == 0 {
            return Err(CampusError::NotFound(format!("Student '{}' not found", email)));
        }
        info!("Deleted student {}", email);
        Ok(())
    }

    async fn touch_student(&self, email: &str, at: DateTime<Utc>) -> Result<Student> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE students SET last_active_at = ?1 WHERE email = ?2",
            params![format_ts(&at), email],
        )?;
        if updated == 0 {
            return Err(CampusError::NotFound(format!("Student '{}' not found", email)));
        }
        let student = conn.query_row(
            &format!("SELECT {} FROM students WHERE email = ?1", STUDENT_COLUMNS),
            params![email],
            row_to_student,
        )?;
        Ok(student)
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        let conn = self.conn()?;
        let students = Self::query_students(
            &conn,
            &format!(
                "SELECT {} FROM students ORDER BY created_at DESC, email ASC",
                STUDENT_COLUMNS
            ),
            [],
        )?;
        debug!("Listed {} students", students.len());
        Ok(students)
    }

    async fn recent_students(&self, limit: usize) -> Result<Vec<Student>> {
        let conn = self.conn()?;
        Self::query_students(
            &conn,
            &format!(
                "SELECT {} FROM students ORDER BY created_at DESC, email ASC LIMIT ?1",
                STUDENT_COLUMNS
            ),
            params![limit as i64],
        )
    }

    async fn active_since(&self, since: DateTime<Utc>) -> Result<Vec<Student>> {
        let conn = self.conn()?;
        Self::query_students(
            &conn,
            &format!(
                "SELECT {} FROM students WHERE last_active_at >= ?1 ORDER BY last_active_at DESC",
                STUDENT_COLUMNS
            ),
            params![format_ts(&since)],
        )
    }

    async fn count_students(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    async fn count_by_department(&self) -> Result<Vec<DepartmentCount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT department, COUNT(*) AS count
            FROM students
            GROUP BY department
            ORDER BY count DESC, department ASC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let count: i64 = row.get(1)?;
            Ok(DepartmentCount {
                department: row.get(0)?,
                count: count as u64,
            })
        })?;

        let grouped = rows.collect::<rusqlite::Result<Vec<DepartmentCount>>>()?;
        Ok(grouped)
    }

    async fn count_in_department(&self, department: &str) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM students WHERE department = ?1 COLLATE NOCASE",
            params![department.trim()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    #[instrument(skip(self, admin), fields(email = %admin.email))]
    async fn insert_admin(&self, admin: &Admin) -> Result<()> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO admins (email, name, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                admin.email,
                admin.name,
                admin.password_hash,
                format_ts(&admin.created_at)
            ],
        );

        match inserted {
            Ok(_) => {
                info!("Created admin {}", admin.email);
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => Err(CampusError::Conflict(format!(
                "Admin with email {} already exists",
                admin.email
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_admin(&self, email: &str) -> Result<Option<Admin>> {
        let conn = self.conn()?;
        let admin = conn
            .query_row(
                "SELECT email, name, password_hash, created_at FROM admins WHERE email = ?1",
                params![email],
                |row| {
                    let created_at: String = row.get(3)?;
                    Ok(Admin {
                        email: row.get(0)?,
                        name: row.get(1)?,
                        password_hash: row.get(2)?,
                        created_at: parse_ts(&created_at),
                    })
                },
            )
            .optional()?;
        Ok(admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewStudent;
    use chrono::Duration;

    fn student(name: &str, email: &str, department: &str, onboarded: DateTime<Utc>) -> Student {
        let mut s = Student::new(NewStudent {
            name: name.to_string(),
            department: department.to_string(),
            email: email.to_string(),
            student_id: None,
        })
        .unwrap();
        s.created_at = onboarded;
        s
    }

    #[tokio::test]
    async fn test_sqlite_record_store() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let now = Utc::now();

        store
            .insert_student(&student("Ana", "ana@uni.edu", "Computer Science", now - Duration::days(2)))
            .await
            .unwrap();
        store
            .insert_student(&student("Ben", "ben@uni.edu", "Computer Science", now - Duration::days(1)))
            .await
            .unwrap();
        store
            .insert_student(&student("Cai", "cai@uni.edu", "Electrical Engineering", now))
            .await
            .unwrap();

        assert_eq!(store.count_students().await.unwrap(), 3);
        assert_eq!(store.count_in_department("computer science").await.unwrap(), 2);

        let grouped = store.count_by_department().await.unwrap();
        assert_eq!(grouped[0].department, "Computer Science");
        assert_eq!(grouped[0].count, 2);

        let recent = store.recent_students(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].email, "cai@uni.edu");
        assert_eq!(recent[1].email, "ben@uni.edu");

        store.delete_student("ben@uni.edu").await.unwrap();
        assert!(matches!(
            store.delete_student("ben@uni.edu").await,
            Err(CampusError::NotFound(_))
        ));
        assert_eq!(store.count_students().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unique_email_enforced() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let now = Utc::now();
        store.insert_student(&student("Ana", "ana@uni.edu", "CS", now)).await.unwrap();
        store.insert_student(&student("Ben", "ben@uni.edu", "CS", now)).await.unwrap();

        assert!(matches!(
            store.insert_student(&student("Copy", "ana@uni.edu", "EE", now)).await,
            Err(CampusError::Conflict(_))
        ));
        assert!(matches!(
            store
                .update_student("ben@uni.edu", &StudentUpdate::Email("ana@uni.edu".to_string()))
                .await,
            Err(CampusError::Conflict(_))
        ));

        let ana = store.get_student("ana@uni.edu").await.unwrap().unwrap();
        assert_eq!(ana.name, "Ana");
        assert_eq!(ana.department, "CS");
    }

    #[tokio::test]
    async fn test_email_rename_and_lookup_by_id() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let mut ana = student("Ana", "ana@uni.edu", "CS", Utc::now());
        ana.student_id = Some(7);
        store.insert_student(&ana).await.unwrap();

        let renamed = store
            .update_student("ana@uni.edu", &StudentUpdate::Email("ana.k@uni.edu".to_string()))
            .await
            .unwrap();
        assert_eq!(renamed.email, "ana.k@uni.edu");

        let by_id = store.find_student("7").await.unwrap().unwrap();
        assert_eq!(by_id.email, "ana.k@uni.edu");
        assert!(store.get_student("ana@uni.edu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_admin_roundtrip() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let admin = Admin {
            email: "root@uni.edu".to_string(),
            name: "Root".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            created_at: Utc::now(),
        };
        store.insert_admin(&admin).await.unwrap();
        assert!(matches!(
            store.insert_admin(&admin).await,
            Err(CampusError::Conflict(_))
        ));
        let loaded = store.get_admin("root@uni.edu").await.unwrap().unwrap();
        assert_eq!(loaded.password_hash, "$argon2id$placeholder");
    }

    #[tokio::test]
    async fn test_undecodable_rows_surface_as_errors() {
        let store = SqliteRecordStore::in_memory().unwrap();
        store
            .insert_student(&student("Ana", "ana@uni.edu", "CS", Utc::now()))
            .await
            .unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO students (email, name, department, created_at)
                 VALUES ('bad@uni.edu', 'Bad', X'FF', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();

        assert!(matches!(
            store.list_students().await,
            Err(CampusError::Database(_))
        ));
        assert!(matches!(
            store.count_by_department().await,
            Err(CampusError::Database(_))
        ));
    }
}
