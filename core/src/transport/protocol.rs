/// Wire format of the push socket
///
/// Inbound frames are either control frames (`-<severity><text>`) or data frames
/// (JSON `{id, value}` whose `value` is itself JSON `{notif_type, notification}`).
/// Outbound frames after the handshake are acknowledgments that reuse the `-`
/// prefix.
use crate::error::{Result, SyncError};
use crate::model::{NotificationEvent, NotificationId, NotificationRecord};
use std::fmt;

const CONTROL_PREFIX: char = '-';

/// Severity marker of a control frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
    /// Any other marker, kept for logging
    Unexpected(Option<char>),
}

impl Severity {
    fn from_marker(marker: Option<char>) -> Self {
        match marker {
            Some('I') => Severity::Info,
            Some('E') => Severity::Error,
            other => Severity::Unexpected(other),
        }
    }
}

/// One frame received from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Control { severity: Severity, text: String },
    Notification(NotificationEvent),
}

impl InboundFrame {
    /// Parse a text frame, decoding both JSON layers of a data frame
    pub fn parse(raw: &str) -> Result<Self> {
        if let Some(rest) = raw.strip_prefix(CONTROL_PREFIX) {
            let mut chars = rest.chars();
            let marker = chars.next();
            return Ok(InboundFrame::Control {
                severity: Severity::from_marker(marker),
                text: chars.as_str().to_string(),
            });
        }

        if !raw.trim_start().starts_with('{') {
            return Err(SyncError::Protocol(format!(
                "unrecognised frame: {}",
                raw.chars().take(16).collect::<String>()
            )));
        }

        let record: NotificationRecord = serde_json::from_str(raw)
            .map_err(|e| SyncError::MalformedEvent(format!("invalid envelope: {}", e)))?;
        record.decode().map(InboundFrame::Notification)
    }

    /// Get frame type as string
    pub fn frame_type(&self) -> &'static str {
        match self {
            InboundFrame::Control { .. } => "control",
            InboundFrame::Notification(_) => "notification",
        }
    }
}

impl fmt::Display for InboundFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.frame_type())
    }
}

/// Outbound acknowledgment frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckFrame {
    /// Everything up to and including the id has been seen (`-R<id>`)
    ReadUpTo(NotificationId),
    /// A single notification has been seen (`-r<id>`)
    Read(NotificationId),
}

impl AckFrame {
    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn id(&self) -> NotificationId {
        match self {
            AckFrame::ReadUpTo(id) | AckFrame::Read(id) => *id,
        }
    }
}

impl fmt::Display for AckFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckFrame::ReadUpTo(id) => write!(f, "{}R{}", CONTROL_PREFIX, id),
            AckFrame::Read(id) => write!(f, "{}r{}", CONTROL_PREFIX, id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Notification, NotificationKind};

    fn data_frame(id: i64, value: serde_json::Value) -> String {
        serde_json::json!({
            "id": id,
            "value": value.to_string(),
            "read": false,
            "created": "2016-03-01T12:00:00Z",
        })
        .to_string()
    }

    #[test]
    fn test_control_frames() {
        assert_eq!(
            InboundFrame::parse("-IConnected").unwrap(),
            InboundFrame::Control {
                severity: Severity::Info,
                text: "Connected".to_string()
            }
        );
        assert_eq!(
            InboundFrame::parse("-EBad Credentials").unwrap(),
            InboundFrame::Control {
                severity: Severity::Error,
                text: "Bad Credentials".to_string()
            }
        );
        assert_eq!(
            InboundFrame::parse("-Xwhat").unwrap(),
            InboundFrame::Control {
                severity: Severity::Unexpected(Some('X')),
                text: "what".to_string()
            }
        );
        assert_eq!(
            InboundFrame::parse("-").unwrap(),
            InboundFrame::Control {
                severity: Severity::Unexpected(None),
                text: String::new()
            }
        );
    }

    #[test]
    fn test_data_frame_decodes_both_layers() {
        let raw = data_frame(
            6,
            serde_json::json!({
                "notif_type": "NEW_MESSAGE",
                "notification": {
                    "id": 900,
                    "message": "is it still available?",
                    "sender": {"id": 2, "display_name": "Bob"},
                    "offer": {"id": 12},
                }
            }),
        );
        let frame = InboundFrame::parse(&raw).unwrap();
        let InboundFrame::Notification(event) = frame else {
            panic!("expected a notification frame");
        };
        assert_eq!(event.id, 6);
        assert!(event.created.is_some());
        assert_eq!(event.notification.kind(), NotificationKind::NewMessage);
        assert_eq!(event.notification.conversation_id(), 12);
        match event.notification {
            Notification::NewMessage(m) => {
                assert_eq!(m.id, 900);
                assert_eq!(m.sender.display_name, "Bob");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_is_malformed() {
        let raw = data_frame(
            3,
            serde_json::json!({"notif_type": "NOTIF_SOMETHING_ELSE", "notification": {}}),
        );
        assert!(matches!(
            InboundFrame::parse(&raw),
            Err(SyncError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_undecodable_json_is_malformed() {
        assert!(matches!(
            InboundFrame::parse("{not json"),
            Err(SyncError::MalformedEvent(_))
        ));
        let inner_broken = serde_json::json!({"id": 1, "value": "{oops"}).to_string();
        assert!(matches!(
            InboundFrame::parse(&inner_broken),
            Err(SyncError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_unframed_text_is_protocol_error() {
        assert!(matches!(
            InboundFrame::parse("hello"),
            Err(SyncError::Protocol(_))
        ));
        assert!(matches!(InboundFrame::parse(""), Err(SyncError::Protocol(_))));
    }

    #[test]
    fn test_ack_encoding() {
        assert_eq!(AckFrame::ReadUpTo(6).encode(), "-R6");
        assert_eq!(AckFrame::Read(7).encode(), "-r7");
        assert_eq!(AckFrame::Read(7).id(), 7);
    }
}
