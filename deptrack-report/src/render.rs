//! Notification document renderer.
//!
//! One branch per notification kind. The shared header is: optional branding
//! image, centered title, generation date, recipient, optional department and
//! the kind's one-line description. Bodies differ per kind.
//!
//! Rendering is a pure function of its inputs; the clock and timezone come in
//! through [`RenderContext`], so repeated calls are byte-identical.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use deptrack_core::time::{format_deadline, format_report_date};
use deptrack_core::{
    NotificationKind, NotificationPayload, NotificationRequest, ProgressSnapshot, RecipientProfile,
    SubtaskSummary, TaskStatus, TaskSummary, TeamMemberSummary,
};
use tracing::debug;

use crate::branding::BrandingImage;
use crate::docx::write_docx;
use crate::document::{
    Document, Paragraph, Run, COLOR_ALERT, COLOR_MUTED, SIZE_BANNER, SIZE_TITLE,
};
use crate::error::RenderError;

const NOT_SET: &str = "Not set";

#[derive(Debug, Clone, Copy)]
pub struct RenderContext {
    pub now: DateTime<Utc>,
    pub timezone: Tz,
}

impl RenderContext {
    pub fn new(now: DateTime<Utc>, timezone: Tz) -> Self {
        Self { now, timezone }
    }

    fn date(&self, dt: DateTime<Utc>) -> String {
        format_report_date(dt, self.timezone)
    }

    fn deadline(&self, dt: Option<DateTime<Utc>>) -> String {
        dt.map(|d| format_deadline(d, self.timezone))
            .unwrap_or_else(|| NOT_SET.to_string())
    }
}

/// A rendered attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Suggested attachment name, e.g. `daily_progress_2026-03-02.docx`.
pub fn attachment_name(kind: NotificationKind, ctx: &RenderContext) -> String {
    format!(
        "{}_{}.docx",
        kind.as_str(),
        ctx.now.with_timezone(&ctx.timezone).format("%Y-%m-%d")
    )
}

/// Validate a loose request against its kind, then render it.
pub fn render_request(
    request: NotificationRequest,
    branding: Option<&[u8]>,
    ctx: &RenderContext,
) -> Result<RenderedDocument, RenderError> {
    let (recipient, payload) = request.into_parts()?;
    render(&payload, &recipient, branding, ctx)
}

/// Render a kind-bound payload into a `.docx` package.
pub fn render(
    payload: &NotificationPayload,
    recipient: &RecipientProfile,
    branding: Option<&[u8]>,
    ctx: &RenderContext,
) -> Result<RenderedDocument, RenderError> {
    let doc = build_document(payload, recipient, branding, ctx);
    let bytes = write_docx(&doc)?;
    debug!(kind = %payload.kind(), bytes = bytes.len(), "rendered notification document");
    Ok(RenderedDocument {
        file_name: attachment_name(payload.kind(), ctx),
        bytes,
    })
}

/// Build the document model without packaging it.
pub fn build_document(
    payload: &NotificationPayload,
    recipient: &RecipientProfile,
    branding: Option<&[u8]>,
    ctx: &RenderContext,
) -> Document {
    let kind = payload.kind();
    let mut doc = Document::new(kind.title(), ctx.now);

    if let Some(img) = branding.and_then(BrandingImage::from_bytes) {
        doc.image(img);
    }
    header(&mut doc, kind, recipient, ctx);

    match payload {
        NotificationPayload::TaskAssigned(task) => task_assigned(&mut doc, task, ctx),
        NotificationPayload::TaskCompleted(task) => task_completed(&mut doc, task, ctx),
        NotificationPayload::TaskOverdue(tasks) => task_overdue(&mut doc, tasks, ctx),
        NotificationPayload::TaskDeadline(task) => task_deadline(&mut doc, task, ctx),
        NotificationPayload::DailyProgress(snap) => progress(&mut doc, snap, "today", ctx),
        NotificationPayload::WeeklyReport(snap) => progress(&mut doc, snap, "this week", ctx),
        NotificationPayload::ManagerSummary(team) => manager_summary(&mut doc, team, ctx),
        NotificationPayload::General => general(&mut doc),
    }

    doc
}

fn header(doc: &mut Document, kind: NotificationKind, recipient: &RecipientProfile, ctx: &RenderContext) {
    doc.push(Paragraph::new(vec![Run::bold(kind.title()).size(SIZE_TITLE)]).centered());
    doc.push(
        Paragraph::new(vec![Run::plain(format!("Generated on: {}", ctx.date(ctx.now))).color(COLOR_MUTED)])
            .centered(),
    );
    doc.field("Recipient", recipient.name.clone());
    if let Some(dept) = &recipient.department {
        doc.field("Department", dept.clone());
    }
    doc.push(Paragraph::new(vec![Run::plain(kind.description()).italic()]).spaced(120));
}

fn status_label(status: Option<TaskStatus>) -> &'static str {
    status.map(TaskStatus::label).unwrap_or(NOT_SET)
}

/// Title, description, deadline, priority, status and creator.
fn task_fields(doc: &mut Document, task: &TaskSummary, ctx: &RenderContext, emphasize_deadline: bool) {
    doc.heading("Task Details");
    doc.field("Title", task.title.clone());
    if let Some(desc) = &task.description {
        doc.field("Description", desc.clone());
    }
    if emphasize_deadline {
        doc.push(Paragraph::new(vec![
            Run::bold("Deadline: ").color(COLOR_ALERT),
            Run::bold(ctx.deadline(task.deadline)).color(COLOR_ALERT).size(SIZE_BANNER),
        ]));
    } else {
        doc.field("Deadline", ctx.deadline(task.deadline));
    }
    doc.field("Priority", task.priority.map(|p| p.label()).unwrap_or(NOT_SET));
    doc.field("Status", status_label(task.status));
    if let Some(reason) = &task.blocker_reason {
        doc.push(Paragraph::new(vec![
            Run::bold("Blocker: ").color(COLOR_ALERT),
            Run::plain(reason.clone()).highlighted(),
        ]));
    }
    if let Some(creator) = &task.created_by {
        doc.field("Created by", creator.clone());
    }
}

fn subtask_list(doc: &mut Document, subtasks: &[SubtaskSummary], ctx: &RenderContext, level: u8) {
    if subtasks.is_empty() {
        return;
    }
    doc.push(Paragraph::new(vec![Run::bold("Subtasks:")]).indented(level.saturating_sub(1)));
    for sub in subtasks {
        doc.bullet(
            level,
            vec![
                Run::bold(sub.title.clone()),
                Run::plain(format!(
                    " (Status: {} | Priority: {} | Deadline: {})",
                    status_label(sub.status),
                    sub.priority.map(|p| p.label()).unwrap_or(NOT_SET),
                    ctx.deadline(sub.deadline),
                )),
            ],
        );
        if sub.has_blocker_reason() {
            let reason = sub.blocker_reason.clone().unwrap_or_default();
            doc.push(
                Paragraph::new(vec![
                    Run::bold("Blocker: ").color(COLOR_ALERT),
                    Run::plain(reason).highlighted(),
                ])
                .indented(level + 1),
            );
        }
    }
}

fn task_assigned(doc: &mut Document, task: &TaskSummary, ctx: &RenderContext) {
    task_fields(doc, task, ctx, false);
    subtask_list(doc, &task.subtasks, ctx, 1);
}

fn task_completed(doc: &mut Document, task: &TaskSummary, ctx: &RenderContext) {
    task_fields(doc, task, ctx, false);
    doc.push(Paragraph::new(vec![
        Run::bold("Completion status: "),
        Run::bold(TaskStatus::Completed.label()),
    ]));
    doc.field("Completion date", ctx.date(ctx.now));
    subtask_list(doc, &task.subtasks, ctx, 1);
}

fn task_deadline(doc: &mut Document, task: &TaskSummary, ctx: &RenderContext) {
    task_fields(doc, task, ctx, true);
    subtask_list(doc, &task.subtasks, ctx, 1);
}

/// Banner text for the overdue alert; states the exact count.
pub fn overdue_banner(count: usize) -> String {
    match count {
        1 => "You have 1 overdue task".to_string(),
        n => format!("You have {n} overdue tasks"),
    }
}

fn task_overdue(doc: &mut Document, tasks: &[TaskSummary], ctx: &RenderContext) {
    doc.push(
        Paragraph::new(vec![Run::bold(overdue_banner(tasks.len()))
            .color(COLOR_ALERT)
            .size(SIZE_BANNER)])
        .spaced(240),
    );
    for (i, task) in tasks.iter().enumerate() {
        doc.heading(format!("{}. {}", i + 1, task.title));
        if let Some(desc) = &task.description {
            doc.field("Description", desc.clone());
        }
        doc.push(Paragraph::new(vec![
            Run::bold("Original deadline: "),
            Run::plain(ctx.deadline(task.deadline)).color(COLOR_ALERT),
        ]));
        doc.field("Priority", task.priority.map(|p| p.label()).unwrap_or(NOT_SET));
        doc.field("Status", status_label(task.status));
        subtask_list(doc, &task.subtasks, ctx, 1);
    }
}

fn progress(doc: &mut Document, snap: &ProgressSnapshot, period: &str, ctx: &RenderContext) {
    let stats = snap.stats(ctx.now);

    doc.heading(format!("Progress {period}"));
    doc.field("Completed", stats.completed.to_string());
    doc.field("Pending", stats.pending.to_string());
    doc.field("Blocked", stats.blockers.to_string());
    doc.field("Completion rate", format!("{}%", stats.completion_rate));
    if stats.overdue_count > 0 {
        doc.push(Paragraph::new(vec![
            Run::bold("Overdue: ").color(COLOR_ALERT),
            Run::plain(stats.overdue_count.to_string()).color(COLOR_ALERT),
        ]));
    } else {
        doc.field("Overdue", "0");
    }
    doc.field("Carried over", stats.carried_over_count.to_string());

    if snap.tasks.is_empty() {
        doc.line(format!("No tasks recorded {period}."));
        return;
    }

    doc.heading("Task Details");
    for task in &snap.tasks {
        let mut runs = vec![
            Run::bold(task.title.clone()),
            Run::plain(format!(
                " (Status: {} | Deadline: {})",
                status_label(task.status),
                ctx.deadline(task.deadline)
            )),
        ];
        if task.is_overdue(ctx.now) {
            runs.push(Run::bold(" OVERDUE").color(COLOR_ALERT));
        }
        doc.bullet(1, runs);
        subtask_list(doc, &task.subtasks, ctx, 2);
    }
}

fn manager_summary(doc: &mut Document, team: &[TeamMemberSummary], ctx: &RenderContext) {
    if team.is_empty() {
        doc.line("No team members to report.");
        return;
    }
    for member in team {
        doc.heading(member.name.clone());
        doc.field("Tasks completed today", member.completed_today.to_string());
        if member.tasks.is_empty() {
            doc.push(Paragraph::new(vec![Run::plain("No completed tasks today").italic().color(COLOR_MUTED)]));
            continue;
        }
        for task in &member.tasks {
            doc.bullet(
                1,
                vec![
                    Run::bold(task.title.clone()),
                    Run::plain(format!(" (Deadline: {})", ctx.deadline(task.deadline))),
                ],
            );
            subtask_list(doc, &task.subtasks, ctx, 2);
        }
    }
}

fn general(doc: &mut Document) {
    doc.line("You have a new notification from the task management system.");
    doc.line("Please log in to your dashboard to view the details and take any required action.");
}
