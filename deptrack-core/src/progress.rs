//! Report aggregator: flat task list -> progress snapshot.
//!
//! Counters are fixed when the snapshot is built and are the denominator of the
//! completion rate, so the printed rate always agrees with the printed
//! counters even when a snapshot arrives pre-counted. Everything time- or
//! subtask-dependent (overdue, carried over, completion rate) is recomputed on
//! each call so a snapshot can never go stale between aggregation and render.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{TaskStatus, TaskSummary};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub completed: u32,
    pub pending: u32,
    pub blockers: u32,
    #[serde(default)]
    pub tasks: Vec<TaskSummary>,
}

/// Derived numbers, as printed in periodic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub total: u32,
    pub completed: u32,
    pub pending: u32,
    pub blockers: u32,
    pub overdue_count: u32,
    pub carried_over_count: u32,
    pub completion_rate: u32,
}

impl ProgressSnapshot {
    /// Aggregate a user's tasks. Tasks without a status count as pending.
    pub fn from_tasks(tasks: &[TaskSummary]) -> Self {
        let mut snap = ProgressSnapshot {
            tasks: tasks.to_vec(),
            ..Self::default()
        };
        for t in tasks {
            match t.status {
                Some(TaskStatus::Completed) => snap.completed += 1,
                Some(TaskStatus::Blocker) => snap.blockers += 1,
                _ => snap.pending += 1,
            }
        }
        snap
    }

    /// Sum of the counters; equals `tasks.len()` for snapshots built by
    /// [`ProgressSnapshot::from_tasks`].
    pub fn total(&self) -> u32 {
        self.completed
            .saturating_add(self.pending)
            .saturating_add(self.blockers)
    }

    pub fn overdue_count(&self, now: DateTime<Utc>) -> u32 {
        self.tasks.iter().filter(|t| t.is_overdue(now)).count() as u32
    }

    pub fn carried_over_count(&self) -> u32 {
        self.tasks.iter().filter(|t| t.is_carried_over()).count() as u32
    }

    /// Percentage of tasks completed, rounded half-up; 0 for an empty set.
    pub fn completion_rate(&self) -> u32 {
        completion_rate(self.completed, self.total())
    }

    pub fn stats(&self, now: DateTime<Utc>) -> ProgressStats {
        ProgressStats {
            total: self.total(),
            completed: self.completed,
            pending: self.pending,
            blockers: self.blockers,
            overdue_count: self.overdue_count(now),
            carried_over_count: self.carried_over_count(),
            completion_rate: self.completion_rate(),
        }
    }
}

/// `round(completed / total * 100)` in integer arithmetic, clamped to 100.
pub fn completion_rate(completed: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let completed = u64::from(completed.min(total));
    let total = u64::from(total);
    ((completed * 200 + total) / (total * 2)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::SubtaskSummary;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn example_snapshot() {
        let tasks = vec![
            TaskSummary::new("1", "a").with_status(TaskStatus::Completed),
            TaskSummary::new("2", "b").with_status(TaskStatus::Todo),
            TaskSummary::new("3", "c")
                .with_status(TaskStatus::Blocker)
                .with_subtask(SubtaskSummary::new("3.1", "d").with_blocker_reason("waiting on vendor")),
        ];
        let snap = ProgressSnapshot::from_tasks(&tasks);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.pending, 1);
        assert_eq!(snap.blockers, 1);
        assert_eq!(snap.carried_over_count(), 1);
        assert_eq!(snap.completion_rate(), 33);
    }

    #[test]
    fn precounted_snapshot_uses_its_counters() {
        let snap: ProgressSnapshot =
            serde_json::from_str(r#"{"completed": 3, "pending": 1, "blockers": 0}"#).unwrap();
        assert!(snap.tasks.is_empty());
        assert_eq!(snap.total(), 4);
        assert_eq!(snap.completion_rate(), 75);
        assert_eq!(snap.stats(now()).overdue_count, 0);
    }

    #[test]
    fn empty_input_yields_zeroes() {
        let snap = ProgressSnapshot::from_tasks(&[]);
        assert_eq!(snap.stats(now()), ProgressStats::default());
    }

    #[test]
    fn in_progress_and_unset_status_are_pending() {
        let tasks = vec![
            TaskSummary::new("1", "a").with_status(TaskStatus::InProgress),
            TaskSummary::new("2", "b"),
        ];
        let snap = ProgressSnapshot::from_tasks(&tasks);
        assert_eq!(snap.pending, 2);
        assert_eq!(snap.completion_rate(), 0);
    }

    #[test]
    fn completion_rate_rounds_half_up() {
        assert_eq!(completion_rate(1, 8), 13); // 12.5
        assert_eq!(completion_rate(2, 3), 67);
        assert_eq!(completion_rate(1, 200), 1); // 0.5
        assert_eq!(completion_rate(1, 201), 0);
        assert_eq!(completion_rate(5, 5), 100);
    }

    #[test]
    fn completion_rate_stays_within_bounds() {
        for total in 0..40u32 {
            for completed in 0..=total + 2 {
                let r = completion_rate(completed, total);
                assert!(r <= 100);
                if total == 0 {
                    assert_eq!(r, 0);
                }
            }
        }
    }

    #[test]
    fn overdue_excludes_completed_and_exact_now() {
        let tasks = vec![
            TaskSummary::new("1", "done late")
                .with_status(TaskStatus::Completed)
                .with_deadline(now() - Duration::days(2)),
            TaskSummary::new("2", "due now")
                .with_status(TaskStatus::Todo)
                .with_deadline(now()),
            TaskSummary::new("3", "late")
                .with_status(TaskStatus::InProgress)
                .with_deadline(now() - Duration::minutes(1)),
            TaskSummary::new("4", "no deadline").with_status(TaskStatus::Todo),
        ];
        let snap = ProgressSnapshot::from_tasks(&tasks);
        assert_eq!(snap.overdue_count(now()), 1);
    }

    #[test]
    fn derived_fields_follow_the_supplied_clock() {
        let tasks = vec![TaskSummary::new("1", "a").with_deadline(now())];
        let snap = ProgressSnapshot::from_tasks(&tasks);
        assert_eq!(snap.overdue_count(now()), 0);
        assert_eq!(snap.overdue_count(now() + Duration::hours(1)), 1);
    }
}
