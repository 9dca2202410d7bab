//! Status projection: read-only views of task records for polling clients.

use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::task::{TaskId, TaskRecord, TaskStatus};

/// One task as reported by `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(serialize_with = "id_as_string")]
    pub id: TaskId,
    pub locator: String,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Bytes per second; active tasks only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_speed: Option<f64>,
    /// Milliseconds remaining; active tasks only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn id_as_string<S: serde::Serializer>(id: &TaskId, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(id)
}

impl TaskView {
    pub fn project(record: &TaskRecord) -> Self {
        let telemetry = record
            .telemetry()
            .filter(|_| record.status() == TaskStatus::Active);
        Self {
            id: record.id(),
            locator: record.locator().to_string(),
            status: record.status(),
            progress: record.progress(),
            file_name: record.artifact_name().map(str::to_string),
            file_size: record.artifact_size(),
            download_url: record.artifact_location().map(str::to_string),
            created_at: to_utc(record.created_at()),
            download_speed: telemetry.and_then(|t| t.bytes_per_sec),
            eta: telemetry
                .and_then(|t| t.eta_secs)
                .map(|secs| (secs * 1000.0).round() as u64),
            error: record.failure().map(str::to_string),
        }
    }
}

fn to_utc(t: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t)
}

/// Number of records in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub queued: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Queued => self.queued += 1,
            TaskStatus::Active => self.active += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }
}
