//! Welcome sequence sent after joining a room.

use std::sync::Arc;

use crate::error::TransportError;
use crate::transport::Transport;

/// First message after joining (HTML).
pub const WELCOME_HTML: &str = "Thanks for adding me to your group! ❤️";

/// Second message after joining (plain text).
pub const USAGE_TEXT: &str = "GitHub Lines runs automatically, without need for commands or configuration! \
Just send a GitHub (or GitLab) link that mentions one or more lines and the bot will automatically respond.\n\n\
There are a few commands you can use, although they are not necessary for the bot to work. To get a list, type `/help`\n\n\
If you want to support us, just convince your friends to add the bot to their group chat!\n\n\
Have fun!";

/// Sends the welcome and usage messages to a freshly joined room.
pub struct InviteOnboarding {
    transport: Arc<dyn Transport>,
}

impl InviteOnboarding {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send both messages, in order. A failed send stops the sequence.
    pub async fn on_invite(&self, room_id: &str) -> Result<(), TransportError> {
        self.transport.send_markup_text(room_id, WELCOME_HTML).await?;
        self.transport.send_plain_text(room_id, USAGE_TEXT).await?;
        tracing::info!(room_id = %room_id, "Sent welcome messages");
        Ok(())
    }
}
