//! Transport abstraction for chat I/O.

pub mod matrix;
pub mod memory;
pub mod sync_store;
pub mod types;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::TransportError;

pub use matrix::MatrixTransport;
pub use memory::{MemoryTransport, SentMessage};
pub use sync_store::SyncStore;
pub use types::*;

/// Stream of events delivered by a transport.
pub type EventStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

/// The capabilities the bot needs from a chat network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name, for logs.
    fn name(&self) -> &str;

    /// Start delivering events. Called once.
    async fn start(&self) -> Result<EventStream, TransportError>;

    /// The bot's own user id.
    async fn self_id(&self) -> Result<String, TransportError>;

    /// Send a reply to an earlier event.
    async fn send_message(&self, room_id: &str, reply: OutboundReply)
    -> Result<(), TransportError>;

    /// Send an HTML message.
    async fn send_markup_text(&self, room_id: &str, html: &str) -> Result<(), TransportError>;

    /// Send a plain text message.
    async fn send_plain_text(&self, room_id: &str, text: &str) -> Result<(), TransportError>;

    /// Join a room the bot was invited to.
    async fn join_room(&self, room_id: &str) -> Result<(), TransportError>;

    /// Stop delivering events and flush transport-owned state.
    async fn shutdown(&self) -> Result<(), TransportError>;
}
