//! Aggregate analytics over the record store.

use crate::agent::ACTIVE_WINDOW_DAYS;
use crate::error::Result;
use crate::store::{DepartmentCount, RecordStore, Student};
use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

const DASHBOARD_RECENT: usize = 5;

/// Activity counts keyed by weekday name, then hour of day (UTC).
pub type ActivityHeatmap = BTreeMap<String, BTreeMap<u32, u64>>;

/// Everything the admin dashboard shows in one payload.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub total_students: u64,
    pub students_by_department: Vec<DepartmentCount>,
    pub recent_onboarded: Vec<Student>,
    pub active_last_7_days: usize,
    pub activity_heatmap: ActivityHeatmap,
}

/// Build the dashboard as of `now`.
pub async fn dashboard(store: &dyn RecordStore, now: DateTime<Utc>) -> Result<Dashboard> {
    let active = store
        .active_since(now - Duration::days(ACTIVE_WINDOW_DAYS))
        .await?;

    Ok(Dashboard {
        total_students: store.count_students().await?,
        students_by_department: store.count_by_department().await?,
        recent_onboarded: store.recent_students(DASHBOARD_RECENT).await?,
        active_last_7_days: active.len(),
        activity_heatmap: activity_heatmap(&active),
    })
}

/// Bucket each student's last activity by weekday and hour.
pub fn activity_heatmap(students: &[Student]) -> ActivityHeatmap {
    let mut heatmap = ActivityHeatmap::new();
    for at in students.iter().filter_map(|s| s.last_active_at) {
        *heatmap
            .entry(at.format("%A").to_string())
            .or_default()
            .entry(at.hour())
            .or_insert(0) += 1;
    }
    heatmap
}
