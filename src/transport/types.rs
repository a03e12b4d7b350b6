//! Events delivered by a transport and messages sent through it.

use serde::Deserialize;

/// Matrix message type for plain user text.
pub const MSGTYPE_TEXT: &str = "m.text";

/// Matrix message type for bot notices.
pub const MSGTYPE_NOTICE: &str = "m.notice";

/// Body of a room message event. Every field is optional: redacted events
/// arrive with an empty object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageContent {
    #[serde(default)]
    pub msgtype: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl MessageContent {
    /// Plain text content.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            msgtype: Some(MSGTYPE_TEXT.to_string()),
            body: Some(body.into()),
        }
    }
}

/// A room message as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundEvent {
    pub event_id: String,
    pub sender: String,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

impl InboundEvent {
    pub fn new(
        event_id: impl Into<String>,
        sender: impl Into<String>,
        content: Option<MessageContent>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            sender: sender.into(),
            content,
        }
    }

    /// Message body, if the event has one.
    pub fn body(&self) -> Option<&str> {
        self.content.as_ref().and_then(|c| c.body.as_deref())
    }
}

/// Kind of outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Notice,
}

impl MsgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MsgType::Notice => MSGTYPE_NOTICE,
        }
    }
}

/// A reply to a specific room event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    pub room_id: String,
    pub related_event_id: String,
    pub body: String,
    pub formatted_body: String,
    pub msgtype: MsgType,
}

/// Everything the bot subscribes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A message was posted in a room the bot is in.
    Message { room_id: String, event: InboundEvent },
    /// The bot was invited to a room.
    Invited { room_id: String },
    /// The bot joined a room it was not in before.
    Joined { room_id: String },
}

impl TransportEvent {
    pub fn room_id(&self) -> &str {
        match self {
            TransportEvent::Message { room_id, .. }
            | TransportEvent::Invited { room_id }
            | TransportEvent::Joined { room_id } => room_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TransportEvent::Message { .. } => "message",
            TransportEvent::Invited { .. } => "invite",
            TransportEvent::Joined { .. } => "join",
        }
    }
}
