//! In-memory record store implementation.
//!
//! Useful for testing and ephemeral runs.

use super::{Admin, DepartmentCount, RecordStore, Student, StudentUpdate};
use crate::error::{CampusError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// In-memory record store.
pub struct MemoryRecordStore {
    students: RwLock<HashMap<String, Student>>,
    admins: RwLock<HashMap<String, Admin>>,
}

impl MemoryRecordStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            students: RwLock::new(HashMap::new()),
            admins: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_err<T>(e: PoisonError<T>) -> CampusError {
    CampusError::Storage(format!("Failed to acquire lock: {}", e))
}

fn newest_first(students: &mut [Student]) {
    students.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.email.cmp(&b.email))
    });
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_student(&self, student: &Student) -> Result<()> {
        let mut students = self.students.write().map_err(lock_err)?;
        if students.contains_key(&student.email) {
            return Err(CampusError::Conflict(format!(
                "Student with email {} already exists",
                student.email
            )));
        }
        students.insert(student.email.clone(), student.clone());
        Ok(())
    }

    async fn get_student(&self, email: &str) -> Result<Option<Student>> {
        let students = self.students.read().map_err(lock_err)?;
        Ok(students.get(email).cloned())
    }

    async fn get_student_by_id(&self, student_id: i64) -> Result<Option<Student>> {
        let students = self.students.read().map_err(lock_err)?;
        let mut matches: Vec<Student> = students
            .values()
            .filter(|s| s.student_id == Some(student_id))
            .cloned()
            .collect();
        newest_first(&mut matches);
        Ok(matches.into_iter().next())
    }

    async fn update_student(&self, email: &str, update: &StudentUpdate) -> Result<Student> {
        let mut students = self.students.write().map_err(lock_err)?;

        if let StudentUpdate::Email(new_email) = update {
            if new_email != email && students.contains_key(new_email) {
                return Err(CampusError::Conflict(format!(
                    "Student with email {} already exists",
                    new_email
                )));
            }
        }

        let mut student = students
            .remove(email)
            .ok_or_else(|| CampusError::NotFound(format!("Student '{}' not found", email)))?;
        update.apply(&mut student);
        students.insert(student.email.clone(), student.clone());
        Ok(student)
    }

    async fn delete_student(&self, email: &str) -> Result<()> {
        let mut students = self.students.write().map_err(lock_err)?;
        students
            .remove(email)
            .map(|_| ())
            .ok_or_else(|| CampusError::NotFound(format!("Student '{}' not found", email)))
    }

    async fn touch_student(&self, email: &str, at: DateTime<Utc>) -> Result<Student> {
        let mut students = self.students.write().map_err(lock_err)?;
        let student = students
            .get_mut(email)
            .ok_or_else(|| CampusError::NotFound(format!("Student '{}' not found", email)))?;
        student.last_active_at = Some(at);
        Ok(student.clone())
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        let students = self.students.read().map_err(lock_err)?;
        let mut all: Vec<Student> = students.values().cloned().collect();
        newest_first(&mut all);
        Ok(all)
    }

    async fn recent_students(&self, limit: usize) -> Result<Vec<Student>> {
        let mut all = self.list_students().await?;
        all.truncate(limit);
        Ok(all)
    }

    async fn active_since(&self, since: DateTime<Utc>) -> Result<Vec<Student>> {
        let students = self.students.read().map_err(lock_err)?;
        let mut active: Vec<Student> = students
            .values()
            .filter(|s| s.last_active_at.is_some_and(|at| at >= since))
            .cloned()
            .collect();
        active.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        Ok(active)
    }

    async fn count_students(&self) -> Result<u64> {
        let students = self.students.read().map_err(lock_err)?;
        Ok(students.len() as u64)
    }

    async fn count_by_department(&self) -> Result<Vec<DepartmentCount>> {
        let students = self.students.read().map_err(lock_err)?;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for student in students.values() {
            *counts.entry(student.department.clone()).or_insert(0) += 1;
        }

        let mut grouped: Vec<DepartmentCount> = counts
            .into_iter()
            .map(|(department, count)| DepartmentCount { department, count })
            .collect();
        grouped.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.department.cmp(&b.department)));
        Ok(grouped)
    }

    async fn count_in_department(&self, department: &str) -> Result<u64> {
        let students = self.students.read().map_err(lock_err)?;
        let department = department.trim();
        Ok(students
            .values()
            .filter(|s| s.department.eq_ignore_ascii_case(department))
            .count() as u64)
    }

    async fn insert_admin(&self, admin: &Admin) -> Result<()> {
        let mut admins = self.admins.write().map_err(lock_err)?;
        if admins.contains_key(&admin.email) {
            return Err(CampusError::Conflict(format!(
                "Admin with email {} already exists",
                admin.email
            )));
        }
        admins.insert(admin.email.clone(), admin.clone());
        Ok(())
    }

    async fn get_admin(&self, email: &str) -> Result<Option<Admin>> {
        let admins = self.admins.read().map_err(lock_err)?;
        Ok(admins.get(email).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewStudent;
    use chrono::Duration;

    fn student(name: &str, email: &str, department: &str) -> Student {
        Student::new(NewStudent {
            name: name.to_string(),
            department: department.to_string(),
            email: email.to_string(),
            student_id: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_add_then_get_returns_last_written_fields() {
        let store = MemoryRecordStore::new();
        store.insert_student(&student("Ana", "ana@uni.edu", "CS")).await.unwrap();
        store
            .update_student("ana@uni.edu", &StudentUpdate::Department("EE".to_string()))
            .await
            .unwrap();

        let got = store.get_student("ana@uni.edu").await.unwrap().unwrap();
        assert_eq!(got.name, "Ana");
        assert_eq!(got.department, "EE");
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts_and_keeps_original() {
        let store = MemoryRecordStore::new();
        store.insert_student(&student("Ana", "ana@uni.edu", "CS")).await.unwrap();

        let err = store
            .insert_student(&student("Impostor", "ana@uni.edu", "EE"))
            .await
            .unwrap_err();
        assert!(matches!(err, CampusError::Conflict(_)));

        let got = store.get_student("ana@uni.edu").await.unwrap().unwrap();
        assert_eq!(got.name, "Ana");
        assert_eq!(got.department, "CS");
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = MemoryRecordStore::new();
        store.insert_student(&student("Ana", "ana@uni.edu", "CS")).await.unwrap();

        let err = store.delete_student("ghost@uni.edu").await.unwrap_err();
        assert!(matches!(err, CampusError::NotFound(_)));
        assert_eq!(store.count_students().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_email_change_onto_existing_conflicts() {
        let store = MemoryRecordStore::new();
        store.insert_student(&student("Ana", "ana@uni.edu", "CS")).await.unwrap();
        store.insert_student(&student("Ben", "ben@uni.edu", "CS")).await.unwrap();

        let err = store
            .update_student("ben@uni.edu", &StudentUpdate::Email("ana@uni.edu".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, CampusError::Conflict(_)));
        assert!(store.get_student("ben@uni.edu").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_activity_window() {
        let store = MemoryRecordStore::new();
        store.insert_student(&student("Ana", "ana@uni.edu", "CS")).await.unwrap();
        store.insert_student(&student("Ben", "ben@uni.edu", "CS")).await.unwrap();

        let now = Utc::now();
        store.touch_student("ana@uni.edu", now).await.unwrap();
        store
            .touch_student("ben@uni.edu", now - Duration::days(10))
            .await
            .unwrap();

        let active = store.active_since(now - Duration::days(7)).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].email, "ana@uni.edu");
    }
}
