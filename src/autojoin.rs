//! Auto-join: accept every room invite.
//!
//! Not wired in by default; attach it with [`crate::bot::Bot::attach_auto_join`].

use std::sync::Arc;

use crate::error::TransportError;
use crate::transport::Transport;

/// Joins rooms the bot is invited to.
pub struct AutoJoin {
    transport: Arc<dyn Transport>,
}

impl AutoJoin {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn handle_invite(&self, room_id: &str) -> Result<(), TransportError> {
        tracing::info!(room_id = %room_id, "Accepting room invite");
        self.transport.join_room(room_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use crate::transport::memory::SentMessage;

    #[tokio::test]
    async fn auto_join_joins_invited_room() {
        let transport = Arc::new(MemoryTransport::new("@bot:x"));
        let auto_join = AutoJoin::new(transport.clone());

        auto_join.handle_invite("!new:x").await.unwrap();

        assert_eq!(
            transport.sent().await,
            vec![SentMessage::Join {
                room_id: "!new:x".into()
            }]
        );
    }
}
