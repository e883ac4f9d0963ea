//! Task view-models handed to the notification pipeline.
//!
//! These are transient: collaborators build them fresh from storage for each
//! render / aggregation call and nothing here mutates them afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
    Blocker,
}

impl TaskStatus {
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Blocker => "Blocked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

/// A subtask: same shape as [`TaskSummary`] without further nesting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskSummary {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub blocker_reason: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl SubtaskSummary {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_blocker_reason(mut self, reason: impl Into<String>) -> Self {
        self.blocker_reason = Some(reason.into());
        self
    }

    /// Blank or whitespace-only reasons count as absent.
    pub fn has_blocker_reason(&self) -> bool {
        self.blocker_reason
            .as_deref()
            .map(|r| !r.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub blocker_reason: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub subtasks: Vec<SubtaskSummary>,
}

impl TaskSummary {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_blocker_reason(mut self, reason: impl Into<String>) -> Self {
        self.blocker_reason = Some(reason.into());
        self
    }

    pub fn with_creator(mut self, name: impl Into<String>) -> Self {
        self.created_by = Some(name.into());
        self
    }

    pub fn with_subtask(mut self, subtask: SubtaskSummary) -> Self {
        self.subtasks.push(subtask);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == Some(TaskStatus::Completed)
    }

    /// Not completed and the deadline lies strictly before `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed() && self.deadline.map(|d| d < now).unwrap_or(false)
    }

    /// Blocked with the reason recorded on at least one subtask.
    ///
    /// The task's own `blocker_reason` is deliberately not consulted here.
    pub fn is_carried_over(&self) -> bool {
        self.status == Some(TaskStatus::Blocker)
            && self.subtasks.iter().any(SubtaskSummary::has_blocker_reason)
    }
}

/// Presentational only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientProfile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub department: Option<String>,
}

impl RecipientProfile {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            department: None,
        }
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }
}

/// One row of the manager summary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberSummary {
    pub name: String,
    #[serde(default)]
    pub completed_today: u32,
    #[serde(default)]
    pub tasks: Vec<TaskSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn completed_task_is_never_overdue() {
        let t = TaskSummary::new("t1", "ship")
            .with_status(TaskStatus::Completed)
            .with_deadline(now() - Duration::days(3));
        assert!(!t.is_overdue(now()));
    }

    #[test]
    fn deadline_equal_to_now_is_not_overdue() {
        let t = TaskSummary::new("t1", "ship").with_deadline(now());
        assert!(!t.is_overdue(now()));
        assert!(t.is_overdue(now() + Duration::seconds(1)));
    }

    #[test]
    fn carried_over_ignores_own_reason() {
        let own = TaskSummary::new("t1", "blocked")
            .with_status(TaskStatus::Blocker)
            .with_blocker_reason("legal review");
        assert!(!own.is_carried_over());

        let via_subtask = own
            .clone()
            .with_subtask(SubtaskSummary::new("s1", "sign").with_blocker_reason("waiting on vendor"));
        assert!(via_subtask.is_carried_over());
    }

    #[test]
    fn blank_subtask_reason_does_not_count() {
        let t = TaskSummary::new("t1", "blocked")
            .with_status(TaskStatus::Blocker)
            .with_subtask(SubtaskSummary::new("s1", "x").with_blocker_reason("   "));
        assert!(!t.is_carried_over());
    }

    #[test]
    fn deserializes_camel_case_input() {
        let json = r#"{
            "id": "42",
            "title": "Quarterly audit",
            "deadline": "2026-03-01T17:00:00Z",
            "priority": "high",
            "status": "in_progress",
            "createdBy": "Dana",
            "subtasks": [{"title": "Collect receipts", "blockerReason": "finance offline"}]
        }"#;
        let t: TaskSummary = serde_json::from_str(json).unwrap();
        assert_eq!(t.priority, Some(Priority::High));
        assert_eq!(t.status, Some(TaskStatus::InProgress));
        assert_eq!(t.created_by.as_deref(), Some("Dana"));
        assert!(t.subtasks[0].has_blocker_reason());
    }
}
