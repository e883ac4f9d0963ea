//! Kind-bound render payloads.
//!
//! [`NotificationPayload`] carries exactly the data block its kind needs, so a
//! well-typed payload cannot be missing one. [`NotificationRequest`] is the
//! loose wire form (a kind tag plus four optional blocks) that collaborators
//! send; it is validated once, at the boundary, via `TryFrom`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notification::NotificationKind;
use crate::progress::ProgressSnapshot;
use crate::task::{RecipientProfile, TaskSummary, TeamMemberSummary};

/// Which optional block of a [`NotificationRequest`] a kind depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBlock {
    TaskData,
    ProgressData,
    TeamData,
    OverdueData,
}

impl DataBlock {
    pub fn field_name(self) -> &'static str {
        match self {
            DataBlock::TaskData => "taskData",
            DataBlock::ProgressData => "progressData",
            DataBlock::TeamData => "teamData",
            DataBlock::OverdueData => "overdueData",
        }
    }
}

impl std::fmt::Display for DataBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("{kind} notification requires {block}")]
    MissingBlock { kind: NotificationKind, block: DataBlock },
    #[error("{kind} notification does not accept {block}")]
    UnexpectedBlock { kind: NotificationKind, block: DataBlock },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationPayload {
    TaskAssigned(TaskSummary),
    TaskCompleted(TaskSummary),
    TaskOverdue(Vec<TaskSummary>),
    TaskDeadline(TaskSummary),
    DailyProgress(ProgressSnapshot),
    WeeklyReport(ProgressSnapshot),
    ManagerSummary(Vec<TeamMemberSummary>),
    General,
}

impl NotificationPayload {
    pub fn kind(&self) -> NotificationKind {
        match self {
            NotificationPayload::TaskAssigned(_) => NotificationKind::TaskAssigned,
            NotificationPayload::TaskCompleted(_) => NotificationKind::TaskCompleted,
            NotificationPayload::TaskOverdue(_) => NotificationKind::TaskOverdue,
            NotificationPayload::TaskDeadline(_) => NotificationKind::TaskDeadline,
            NotificationPayload::DailyProgress(_) => NotificationKind::DailyProgress,
            NotificationPayload::WeeklyReport(_) => NotificationKind::WeeklyReport,
            NotificationPayload::ManagerSummary(_) => NotificationKind::ManagerSummary,
            NotificationPayload::General => NotificationKind::General,
        }
    }

    /// The block a kind requires, `None` for `general`.
    pub fn required_block(kind: NotificationKind) -> Option<DataBlock> {
        match kind {
            NotificationKind::TaskAssigned
            | NotificationKind::TaskCompleted
            | NotificationKind::TaskDeadline => Some(DataBlock::TaskData),
            NotificationKind::TaskOverdue => Some(DataBlock::OverdueData),
            NotificationKind::DailyProgress | NotificationKind::WeeklyReport => {
                Some(DataBlock::ProgressData)
            }
            NotificationKind::ManagerSummary => Some(DataBlock::TeamData),
            NotificationKind::General => None,
        }
    }
}

/// Loose render request as produced by the notification-generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub recipient: RecipientProfile,
    #[serde(default)]
    pub task_data: Option<TaskSummary>,
    #[serde(default)]
    pub progress_data: Option<ProgressSnapshot>,
    #[serde(default)]
    pub team_data: Option<Vec<TeamMemberSummary>>,
    #[serde(default)]
    pub overdue_data: Option<Vec<TaskSummary>>,
}

impl NotificationRequest {
    pub fn new(kind: NotificationKind, recipient: RecipientProfile) -> Self {
        Self {
            kind,
            recipient,
            task_data: None,
            progress_data: None,
            team_data: None,
            overdue_data: None,
        }
    }

    /// Blocks that are present on the request, in field order.
    pub fn present_blocks(&self) -> Vec<DataBlock> {
        [
            (DataBlock::TaskData, self.task_data.is_some()),
            (DataBlock::ProgressData, self.progress_data.is_some()),
            (DataBlock::TeamData, self.team_data.is_some()),
            (DataBlock::OverdueData, self.overdue_data.is_some()),
        ]
        .into_iter()
        .filter_map(|(block, present)| present.then_some(block))
        .collect()
    }

    /// Validate and split into the recipient and a kind-bound payload.
    pub fn into_parts(self) -> Result<(RecipientProfile, NotificationPayload), PayloadError> {
        let recipient = self.recipient.clone();
        let payload = NotificationPayload::try_from(self)?;
        Ok((recipient, payload))
    }
}

impl TryFrom<NotificationRequest> for NotificationPayload {
    type Error = PayloadError;

    fn try_from(req: NotificationRequest) -> Result<Self, Self::Error> {
        let kind = req.kind;
        let missing = |block| PayloadError::MissingBlock { kind, block };

        let required = NotificationPayload::required_block(kind);
        let present = req.present_blocks();
        if let Some(block) = required.filter(|b| !present.contains(b)) {
            return Err(missing(block));
        }
        if let Some(&block) = present.iter().find(|b| Some(**b) != required) {
            return Err(PayloadError::UnexpectedBlock { kind, block });
        }

        Ok(match kind {
            NotificationKind::TaskAssigned => NotificationPayload::TaskAssigned(
                req.task_data.ok_or_else(|| missing(DataBlock::TaskData))?,
            ),
            NotificationKind::TaskCompleted => NotificationPayload::TaskCompleted(
                req.task_data.ok_or_else(|| missing(DataBlock::TaskData))?,
            ),
            NotificationKind::TaskDeadline => NotificationPayload::TaskDeadline(
                req.task_data.ok_or_else(|| missing(DataBlock::TaskData))?,
            ),
            NotificationKind::TaskOverdue => NotificationPayload::TaskOverdue(
                req.overdue_data.ok_or_else(|| missing(DataBlock::OverdueData))?,
            ),
            NotificationKind::DailyProgress => NotificationPayload::DailyProgress(
                req.progress_data.ok_or_else(|| missing(DataBlock::ProgressData))?,
            ),
            NotificationKind::WeeklyReport => NotificationPayload::WeeklyReport(
                req.progress_data.ok_or_else(|| missing(DataBlock::ProgressData))?,
            ),
            NotificationKind::ManagerSummary => NotificationPayload::ManagerSummary(
                req.team_data.ok_or_else(|| missing(DataBlock::TeamData))?,
            ),
            NotificationKind::General => NotificationPayload::General,
        })
    }
}
