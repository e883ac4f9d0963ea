//! Notification taxonomy and the persisted notification record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of notification kinds; selects the report template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskAssigned,
    TaskCompleted,
    TaskOverdue,
    TaskDeadline,
    DailyProgress,
    WeeklyReport,
    ManagerSummary,
    General,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 8] = [
        NotificationKind::TaskAssigned,
        NotificationKind::TaskCompleted,
        NotificationKind::TaskOverdue,
        NotificationKind::TaskDeadline,
        NotificationKind::DailyProgress,
        NotificationKind::WeeklyReport,
        NotificationKind::ManagerSummary,
        NotificationKind::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::TaskAssigned => "task_assigned",
            NotificationKind::TaskCompleted => "task_completed",
            NotificationKind::TaskOverdue => "task_overdue",
            NotificationKind::TaskDeadline => "task_deadline",
            NotificationKind::DailyProgress => "daily_progress",
            NotificationKind::WeeklyReport => "weekly_report",
            NotificationKind::ManagerSummary => "manager_summary",
            NotificationKind::General => "general",
        }
    }

    /// Document title for this kind.
    pub fn title(self) -> &'static str {
        match self {
            NotificationKind::TaskAssigned => "Task Assignment Notification",
            NotificationKind::TaskCompleted => "Task Completion Report",
            NotificationKind::TaskOverdue => "Overdue Tasks Alert",
            NotificationKind::TaskDeadline => "Deadline Reminder",
            NotificationKind::DailyProgress => "Daily Progress Summary",
            NotificationKind::WeeklyReport => "Weekly Progress Report",
            NotificationKind::ManagerSummary => "Team Summary Report",
            NotificationKind::General => "Task Management Notification",
        }
    }

    /// One-line description printed under the recipient block.
    pub fn description(self) -> &'static str {
        match self {
            NotificationKind::TaskAssigned => "A new task has been assigned to you.",
            NotificationKind::TaskCompleted => "A task has been marked as completed.",
            NotificationKind::TaskOverdue => "The following tasks are past their deadline.",
            NotificationKind::TaskDeadline => "A task deadline is approaching.",
            NotificationKind::DailyProgress => "Summary of your task progress for today.",
            NotificationKind::WeeklyReport => "Summary of your task progress for this week.",
            NotificationKind::ManagerSummary => "Summary of your team's completed work today.",
            NotificationKind::General => "General task management notification.",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted unit of a notification. The read flag is the only mutable part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        kind: NotificationKind,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            kind,
            message: message.into(),
            is_read: false,
            task_id: None,
            created_at,
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn mark_read(&mut self) {
        self.is_read = true;
    }
}
