//! Reply construction.

use crate::transport::{InboundEvent, MsgType, OutboundReply};

/// Wrap `message` as a notice replying to `original`.
///
/// The message is used as both the plain and the HTML body.
pub fn build_reply(room_id: &str, original: &InboundEvent, message: String) -> OutboundReply {
    OutboundReply {
        room_id: room_id.to_string(),
        related_event_id: original.event_id.clone(),
        body: message.clone(),
        formatted_body: message,
        msgtype: MsgType::Notice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MessageContent;

    #[test]
    fn reply_references_original_as_notice() {
        let original = InboundEvent::new("$abc", "@alice:x", Some(MessageContent::text("link")));
        let reply = build_reply("!room:x", &original, "<pre>x</pre>".into());

        assert_eq!(reply.room_id, "!room:x");
        assert_eq!(reply.related_event_id, "$abc");
        assert_eq!(reply.body, "<pre>x</pre>");
        assert_eq!(reply.formatted_body, "<pre>x</pre>");
        assert_eq!(reply.msgtype, MsgType::Notice);
    }
}
