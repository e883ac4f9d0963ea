//! Task-lifecycle classification and deadline reminder projection.
//!
//! Both functions are deterministic in their inputs: ids are derived from
//! kind, recipient, task and timestamp, and "now" is always passed in.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::notification::{NotificationKind, NotificationRecord};
use crate::task::TaskSummary;

/// A lifecycle event raised by business logic elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Assigned { task: TaskSummary, assignee: String },
    Completed { task: TaskSummary, owner: String },
    DeadlineApproaching { task: TaskSummary, owner: String },
    Overdue { tasks: Vec<TaskSummary>, owner: String },
    DailyDigest { owner: String },
    WeeklyDigest { owner: String },
    TeamDigest { manager: String },
    Announcement { user: String, message: String },
}

impl TaskEvent {
    pub fn kind(&self) -> NotificationKind {
        match self {
            TaskEvent::Assigned { .. } => NotificationKind::TaskAssigned,
            TaskEvent::Completed { .. } => NotificationKind::TaskCompleted,
            TaskEvent::DeadlineApproaching { .. } => NotificationKind::TaskDeadline,
            TaskEvent::Overdue { .. } => NotificationKind::TaskOverdue,
            TaskEvent::DailyDigest { .. } => NotificationKind::DailyProgress,
            TaskEvent::WeeklyDigest { .. } => NotificationKind::WeeklyReport,
            TaskEvent::TeamDigest { .. } => NotificationKind::ManagerSummary,
            TaskEvent::Announcement { .. } => NotificationKind::General,
        }
    }
}

fn record_id(kind: NotificationKind, user: &str, task: Option<&str>, at: DateTime<Utc>) -> String {
    match task {
        Some(task) => format!("{}:{}:{}:{}", kind, user, task, at.timestamp()),
        None => format!("{}:{}:{}", kind, user, at.timestamp()),
    }
}

fn task_record(
    kind: NotificationKind,
    user: &str,
    task: &TaskSummary,
    message: String,
    now: DateTime<Utc>,
) -> NotificationRecord {
    NotificationRecord::new(record_id(kind, user, Some(&task.id), now), user, kind, message, now)
        .with_task(task.id.clone())
}

/// Turn a lifecycle event into the notification record for its recipient.
pub fn classify(event: &TaskEvent, now: DateTime<Utc>) -> NotificationRecord {
    let kind = event.kind();
    match event {
        TaskEvent::Assigned { task, assignee } => task_record(
            kind,
            assignee,
            task,
            format!("New task assigned: {}", task.title),
            now,
        ),
        TaskEvent::Completed { task, owner } => task_record(
            kind,
            owner,
            task,
            format!("Task completed: {}", task.title),
            now,
        ),
        TaskEvent::DeadlineApproaching { task, owner } => {
            let due = task
                .deadline
                .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "soon".to_string());
            task_record(
                kind,
                owner,
                task,
                format!("Deadline approaching for {} (due {})", task.title, due),
                now,
            )
        }
        TaskEvent::Overdue { tasks, owner } => {
            let message = match tasks.as_slice() {
                [only] => format!("Task overdue: {}", only.title),
                many => format!("You have {} overdue tasks", many.len()),
            };
            let rec = NotificationRecord::new(record_id(kind, owner, None, now), owner, kind, message, now);
            match tasks.as_slice() {
                [only] => rec.with_task(only.id.clone()),
                _ => rec,
            }
        }
        TaskEvent::DailyDigest { owner } => NotificationRecord::new(
            record_id(kind, owner, None, now),
            owner,
            kind,
            "Your daily progress summary is ready",
            now,
        ),
        TaskEvent::WeeklyDigest { owner } => NotificationRecord::new(
            record_id(kind, owner, None, now),
            owner,
            kind,
            "Your weekly progress report is ready",
            now,
        ),
        TaskEvent::TeamDigest { manager } => NotificationRecord::new(
            record_id(kind, manager, None, now),
            manager,
            kind,
            "Your team summary report is ready",
            now,
        ),
        TaskEvent::Announcement { user, message } => NotificationRecord::new(
            record_id(kind, user, None, now),
            user,
            kind,
            message.clone(),
            now,
        ),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReminderPolicy {
    /// Tasks due within this many hours get a deadline reminder.
    pub lead_hours: i64,
    /// Cap on records produced by one projection run.
    pub max_per_run: usize,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            lead_hours: 24,
            max_per_run: 10,
        }
    }
}

/// Project deadline / overdue records for one owner's tasks.
///
/// Deadlines in `(now, now + lead]` yield `task_deadline`; deadlines strictly
/// before `now` are collected into a single `task_overdue` record, emitted
/// first. Completed tasks and tasks without a deadline are skipped.
pub fn deadline_reminders(
    tasks: &[TaskSummary],
    owner: &str,
    now: DateTime<Utc>,
    policy: ReminderPolicy,
) -> Vec<NotificationRecord> {
    let horizon = now + Duration::hours(policy.lead_hours);

    let overdue: Vec<TaskSummary> = tasks.iter().filter(|t| t.is_overdue(now)).cloned().collect();

    let mut upcoming: Vec<&TaskSummary> = tasks
        .iter()
        .filter(|t| !t.is_completed())
        .filter(|t| t.deadline.map(|d| d > now && d <= horizon).unwrap_or(false))
        .collect();
    upcoming.sort_by_key(|t| t.deadline);

    let mut out = Vec::new();
    if !overdue.is_empty() {
        out.push(classify(
            &TaskEvent::Overdue {
                tasks: overdue,
                owner: owner.to_string(),
            },
            now,
        ));
    }
    for task in upcoming {
        out.push(classify(
            &TaskEvent::DeadlineApproaching {
                task: task.clone(),
                owner: owner.to_string(),
            },
            now,
        ));
    }

    out.truncate(policy.max_per_run);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn assignment_targets_assignee() {
        let task = TaskSummary::new("t1", "Prepare budget");
        let rec = classify(
            &TaskEvent::Assigned {
                task,
                assignee: "u2".to_string(),
            },
            now(),
        );
        assert_eq!(rec.kind, NotificationKind::TaskAssigned);
        assert_eq!(rec.user_id, "u2");
        assert_eq!(rec.task_id.as_deref(), Some("t1"));
        assert_eq!(rec.message, "New task assigned: Prepare budget");
        assert!(!rec.is_read);
    }

    #[test]
    fn classification_is_deterministic() {
        let ev = TaskEvent::WeeklyDigest { owner: "u1".to_string() };
        assert_eq!(classify(&ev, now()), classify(&ev, now()));
    }

    #[test]
    fn overdue_message_counts_tasks() {
        let ev = TaskEvent::Overdue {
            tasks: vec![TaskSummary::new("a", "A"), TaskSummary::new("b", "B")],
            owner: "u1".to_string(),
        };
        let rec = classify(&ev, now());
        assert_eq!(rec.message, "You have 2 overdue tasks");
        assert_eq!(rec.task_id, None);
    }

    #[test]
    fn reminders_split_overdue_and_upcoming() {
        let tasks = vec![
            TaskSummary::new("late", "Late").with_deadline(now() - Duration::hours(3)),
            TaskSummary::new("soon", "Soon").with_deadline(now() + Duration::hours(2)),
            TaskSummary::new("later", "Later").with_deadline(now() + Duration::hours(48)),
            TaskSummary::new("done", "Done")
                .with_status(TaskStatus::Completed)
                .with_deadline(now() + Duration::hours(1)),
            TaskSummary::new("edge", "Edge").with_deadline(now()),
        ];
        let out = deadline_reminders(&tasks, "u1", now(), ReminderPolicy::default());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind, NotificationKind::TaskOverdue);
        assert_eq!(out[0].task_id.as_deref(), Some("late"));
        assert_eq!(out[1].kind, NotificationKind::TaskDeadline);
        assert_eq!(out[1].task_id.as_deref(), Some("soon"));
    }

    #[test]
    fn reminders_respect_cap() {
        let tasks: Vec<TaskSummary> = (0..5)
            .map(|i| TaskSummary::new(format!("t{i}"), "x").with_deadline(now() + Duration::hours(i + 1)))
            .collect();
        let policy = ReminderPolicy {
            max_per_run: 3,
            ..ReminderPolicy::default()
        };
        assert_eq!(deadline_reminders(&tasks, "u1", now(), policy).len(), 3);
    }
}
