//! Inbound event filter.

use crate::transport::{InboundEvent, MSGTYPE_TEXT};

/// Whether a room message should be handled at all.
///
/// Rejects, in order: events without content (redacted or system events),
/// anything that is not plain text, and messages sent by `self_id`.
pub fn should_process(event: &InboundEvent, self_id: &str) -> bool {
    let Some(content) = event.content.as_ref() else {
        return false;
    };

    if content.msgtype.as_deref() != Some(MSGTYPE_TEXT) {
        return false;
    }

    event.sender != self_id
}
