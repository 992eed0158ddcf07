use huddle_services::whiteboard::StrokeData;
use serde::Deserialize;

/// Closed set of inbound event kinds. Parsing and routing go through
/// this enum, so an unhandled kind is a compile error and a malformed
/// payload is rejected before any state is touched.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinRoom {
        room_id: String,
    },
    LeaveRoom {
        room_id: String,
    },
    ChatMessage {
        room_id: String,
        message: String,
        #[serde(default = "default_message_type")]
        message_type: String,
    },
    WhiteboardStroke {
        room_id: String,
        stroke_data: StrokeData,
    },
    WhiteboardClear {
        room_id: String,
    },
    WhiteboardSnapshot {
        room_id: String,
    },
    CodeDocumentCreate {
        room_id: String,
        filename: String,
        #[serde(default = "default_language")]
        language: String,
    },
    CodeContentChange {
        room_id: String,
        document_id: String,
        content: String,
        cursor_position: Option<i64>,
    },
    CursorPosition {
        room_id: String,
        document_id: String,
        position: i64,
    },
    CodeRun {
        room_id: String,
        document_id: String,
    },
    VideoBootstrap {
        room_id: String,
    },
    VideoSignal {
        room_id: String,
        target_user_id: Option<String>,
        #[serde(rename = "type")]
        signal_type: String,
        #[serde(default)]
        data: serde_json::Value,
    },
    TypingIndicator {
        room_id: String,
        #[serde(default)]
        is_typing: bool,
    },
    PresenceUpdate {
        room_id: String,
        status: String,
    },
    Ping,
}

fn default_message_type() -> String {
    "text".to_string()
}

fn default_language() -> String {
    "plaintext".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_envelope() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"chat_message","data":{"room_id":"665f1c0a9d3e2b0001a1b2c3","message":"hi"}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::ChatMessage {
                message,
                message_type,
                ..
            } => {
                assert_eq!(message, "hi");
                assert_eq!(message_type, "text");
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let result: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"type":"format_disk","data":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn video_signal_inner_type_does_not_clash_with_tag() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"video_signal","data":{"room_id":"665f1c0a9d3e2b0001a1b2c3","type":"offer","data":{"sdp":"v=0"}}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::VideoSignal {
                signal_type,
                target_user_id,
                ..
            } => {
                assert_eq!(signal_type, "offer");
                assert!(target_user_id.is_none());
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn ping_needs_no_data() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"ping"}"#).is_ok());
    }
}
