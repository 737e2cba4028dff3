//! Message records and the JSON wire frames that carry them.

use serde::{Deserialize, Serialize};

use crate::palette::Swatch;
use crate::surface::ZONE_COUNT;

/// A join/leave notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub author: String,
    #[serde(default)]
    pub channel: String,
}

/// A drawn message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContent {
    pub author: String,
    #[serde(default)]
    pub color: Swatch,
    /// `data:image/png;base64,...`
    pub img: String,
    /// Vertical extent in zones, `1..=5`.
    pub height: u8,
}

/// One entry of the message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageRecord {
    Banner,
    Join(Presence),
    Leave(Presence),
    User(UserContent),
}

impl MessageRecord {
    pub fn presence(author: impl Into<String>, channel: impl Into<String>, leaving: bool) -> Self {
        let presence = Presence {
            author: author.into(),
            channel: channel.into(),
        };
        if leaving {
            MessageRecord::Leave(presence)
        } else {
            MessageRecord::Join(presence)
        }
    }

    pub fn is_leaving(&self) -> bool {
        matches!(self, MessageRecord::Leave(_))
    }

    pub fn author(&self) -> Option<&str> {
        match self {
            MessageRecord::Banner => None,
            MessageRecord::Join(p) | MessageRecord::Leave(p) => Some(&p.author),
            MessageRecord::User(u) => Some(&u.author),
        }
    }

    /// The raster payload, if this record has one.
    pub fn user_content(&self) -> Option<&UserContent> {
        match self {
            MessageRecord::User(content) => Some(content),
            _ => None,
        }
    }

    /// Structural checks the type system cannot express.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MessageRecord::User(content) => {
                if content.height == 0 || u32::from(content.height) > ZONE_COUNT {
                    return Err(format!(
                        "user message height {} outside 1..={}",
                        content.height, ZONE_COUNT
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Frames sent to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Join {
        channel: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        name: Option<String>,
    },
    Message {
        channel: String,
        message: MessageRecord,
    },
}

impl ClientFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frames received from the relay.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Message { message: MessageRecord },
    /// Any other frame type; presence/display hints this client ignores.
    #[serde(other)]
    Other,
}

/// Why an inbound frame was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("Unparseable frame: {0}")]
    Parse(String),
    #[error("Invalid record: {0}")]
    Invalid(String),
}

/// Parse and validate an inbound text frame.
pub fn parse_server_frame(text: &str) -> Result<ServerFrame, FrameError> {
    let frame: ServerFrame =
        serde_json::from_str(text).map_err(|e| FrameError::Parse(e.to_string()))?;
    if let ServerFrame::Message { message } = &frame {
        message.validate().map_err(FrameError::Invalid)?;
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_frame_shape() {
        let frame = ClientFrame::Join {
            channel: "A".to_string(),
            name: Some("Brooke".to_string()),
        };
        let value: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "join", "channel": "A", "name": "Brooke"})
        );

        let anonymous = ClientFrame::Join {
            channel: "A".to_string(),
            name: None,
        };
        assert_eq!(anonymous.to_json().unwrap(), r#"{"type":"join","channel":"A"}"#);
    }

    #[test]
    fn test_message_frame_shape() {
        let frame = ClientFrame::Message {
            channel: "A".to_string(),
            message: MessageRecord::User(UserContent {
                author: "Brooke".to_string(),
                color: Swatch::Red,
                img: "data:image/png;base64,AAAA".to_string(),
                height: 2,
            }),
        };
        let value: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "message",
                "channel": "A",
                "message": {
                    "type": "user",
                    "author": "Brooke",
                    "color": "#ff0000",
                    "img": "data:image/png;base64,AAAA",
                    "height": 2
                }
            })
        );
    }

    #[test]
    fn test_presence_records() {
        let join = MessageRecord::presence("Brooke", "A", false);
        assert!(!join.is_leaving());
        assert_eq!(
            serde_json::to_value(&join).unwrap(),
            serde_json::json!({"type": "join", "author": "Brooke", "channel": "A"})
        );
        let leave = MessageRecord::presence("Brooke", "A", true);
        assert!(leave.is_leaving());
        assert_eq!(leave.author(), Some("Brooke"));
    }

    #[test]
    fn test_parse_inbound_message() {
        let frame = parse_server_frame(r#"{"type":"message","message":{"type":"banner"}}"#).unwrap();
        assert_eq!(
            frame,
            ServerFrame::Message {
                message: MessageRecord::Banner
            }
        );

        // Older clients omit the channel on presence records.
        let frame =
            parse_server_frame(r#"{"type":"message","message":{"type":"leave","author":"x"}}"#)
                .unwrap();
        assert!(matches!(
            frame,
            ServerFrame::Message { message: MessageRecord::Leave(_) }
        ));
    }

    #[test]
    fn test_unknown_frame_type_is_other() {
        let frame = parse_server_frame(r#"{"type":"peers","count":3}"#).unwrap();
        assert_eq!(frame, ServerFrame::Other);
    }

    #[test]
    fn test_malformed_frames_are_errors() {
        assert!(matches!(parse_server_frame("not json"), Err(FrameError::Parse(_))));
        assert!(matches!(
            parse_server_frame(r#"{"type":"message","message":{"type":"sticker"}}"#),
            Err(FrameError::Parse(_))
        ));
        assert!(matches!(
            parse_server_frame(
                r##"{"type":"message","message":{"type":"user","author":"a","color":"#ff0000","img":"","height":0}}"##
            ),
            Err(FrameError::Invalid(_))
        ));
        assert!(matches!(
            parse_server_frame(
                r##"{"type":"message","message":{"type":"user","author":"a","color":"#ff0000","img":"","height":6}}"##
            ),
            Err(FrameError::Invalid(_))
        ));
    }
}
