//! Wire frames of the notification stream.
//!
//! One JSON object per line with a required `type` discriminator. Lines in
//! SSE framing (`data: {...}`) are accepted too; SSE comments and field lines
//! other than `data:` are skipped.

use chrono::{DateTime, Utc};
use deptrack_core::NotificationRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    Connected {
        #[serde(default)]
        message: String,
    },
    Notification {
        notification: NotificationRecord,
    },
    Heartbeat {
        timestamp: DateTime<Utc>,
    },
}

impl StreamFrame {
    /// Single-line JSON encoding (without the trailing newline).
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Frame(StreamFrame),
    /// Blank line, SSE comment or non-data SSE field.
    Skip,
    /// Well-formed frame with a `type` this client does not know.
    Ignored(String),
    /// Not JSON, no `type`, or a known type with a bad body.
    Malformed(String),
}

const KNOWN_TYPES: [&str; 3] = ["connected", "notification", "heartbeat"];

pub fn parse_frame(line: &str) -> FrameOutcome {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return FrameOutcome::Skip;
    }
    let data = match line.strip_prefix("data:") {
        Some(rest) => rest.trim(),
        None if line.starts_with("event:") || line.starts_with("id:") || line.starts_with("retry:") => {
            return FrameOutcome::Skip;
        }
        None => line,
    };

    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return FrameOutcome::Malformed(format!("invalid json: {e}")),
    };
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return FrameOutcome::Malformed("frame has no string `type` field".to_string());
    };
    if !KNOWN_TYPES.contains(&kind) {
        return FrameOutcome::Ignored(kind.to_string());
    }
    let kind = kind.to_string();

    match serde_json::from_value::<StreamFrame>(value) {
        Ok(frame) => FrameOutcome::Frame(frame),
        Err(e) => FrameOutcome::Malformed(format!("bad {kind} frame: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use deptrack_core::NotificationKind;

    #[test]
    fn parses_connected_ack() {
        assert_eq!(
            parse_frame(r#"{"type":"connected","message":"Notification stream connected"}"#),
            FrameOutcome::Frame(StreamFrame::Connected {
                message: "Notification stream connected".to_string()
            })
        );
    }

    #[test]
    fn parses_notification_payload() {
        let line = r#"{"type":"notification","notification":{"id":"n1","userId":"u1","type":"task_overdue","message":"late","isRead":false,"createdAt":"2026-03-02T09:00:00Z"}}"#;
        match parse_frame(line) {
            FrameOutcome::Frame(StreamFrame::Notification { notification }) => {
                assert_eq!(notification.kind, NotificationKind::TaskOverdue);
                assert_eq!(notification.user_id, "u1");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn accepts_sse_data_prefix() {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        assert_eq!(
            parse_frame(r#"data: {"type":"heartbeat","timestamp":"2026-03-02T09:00:00Z"}"#),
            FrameOutcome::Frame(StreamFrame::Heartbeat { timestamp: at })
        );
        assert_eq!(parse_frame(": keep-alive"), FrameOutcome::Skip);
        assert_eq!(parse_frame("event: message"), FrameOutcome::Skip);
        assert_eq!(parse_frame("   "), FrameOutcome::Skip);
    }

    #[test]
    fn unknown_types_are_ignored_not_malformed() {
        assert_eq!(
            parse_frame(r#"{"type":"presence","who":"u2"}"#),
            FrameOutcome::Ignored("presence".to_string())
        );
    }

    #[test]
    fn malformed_frames_are_classified() {
        assert!(matches!(parse_frame("{not json"), FrameOutcome::Malformed(_)));
        assert!(matches!(parse_frame(r#"{"message":"x"}"#), FrameOutcome::Malformed(_)));
        assert!(matches!(
            parse_frame(r#"{"type":"notification"}"#),
            FrameOutcome::Malformed(_)
        ));
    }

    #[test]
    fn encode_is_single_line_and_parses_back() {
        let frame = StreamFrame::Connected { message: "hi\nthere".to_string() };
        let line = frame.encode().unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(parse_frame(&line), FrameOutcome::Frame(frame));
    }
}
