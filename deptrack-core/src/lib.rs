//! deptrack-core: notification taxonomy, task view-models and report aggregation.

pub mod events;
pub mod notification;
pub mod payload;
pub mod progress;
pub mod task;
pub mod time;

pub use events::{classify, deadline_reminders, ReminderPolicy, TaskEvent};
pub use notification::{NotificationKind, NotificationRecord};
pub use payload::{DataBlock, NotificationPayload, NotificationRequest, PayloadError};
pub use progress::{completion_rate, ProgressSnapshot, ProgressStats};
pub use task::{
    Priority, RecipientProfile, SubtaskSummary, TaskStatus, TaskSummary, TeamMemberSummary,
};
