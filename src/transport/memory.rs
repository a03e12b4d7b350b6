//! In-memory transport: events are pushed by hand and every send is
//! recorded. Used for local testing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::error::TransportError;
use crate::transport::{EventStream, OutboundReply, Transport, TransportEvent};

/// Something the bot sent (or did) through the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    Reply { room_id: String, reply: OutboundReply },
    Markup { room_id: String, html: String },
    Plain { room_id: String, text: String },
    Join { room_id: String },
}

/// A transport that lives entirely in memory.
pub struct MemoryTransport {
    self_id: String,
    events_tx: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    sent: Mutex<Vec<SentMessage>>,
    fail_sends: AtomicBool,
    self_id_calls: AtomicUsize,
    shut_down: AtomicBool,
}

impl MemoryTransport {
    pub fn new(self_id: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            self_id: self_id.into(),
            events_tx: Mutex::new(Some(tx)),
            events_rx: Mutex::new(Some(rx)),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            self_id_calls: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Deliver an event to whoever started the transport.
    pub async fn push(&self, event: TransportEvent) -> bool {
        match self.events_tx.lock().await.as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// End the event stream once queued events are drained.
    pub async fn close(&self) {
        self.events_tx.lock().await.take();
    }

    /// Make every subsequent send fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Everything sent so far, in order.
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// How many times the bot asked for its own id.
    pub fn self_id_calls(&self) -> usize {
        self.self_id_calls.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    async fn record(&self, message: SentMessage) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed {
                name: "memory".into(),
                reason: "sends disabled".into(),
            });
        }
        self.sent.lock().await.push(message);
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn start(&self) -> Result<EventStream, TransportError> {
        let rx = self
            .events_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| TransportError::StartupFailed {
                name: "memory".into(),
                reason: "already started".into(),
            })?;

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|ev| (ev, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn self_id(&self) -> Result<String, TransportError> {
        self.self_id_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.self_id.clone())
    }

    async fn send_message(
        &self,
        room_id: &str,
        reply: OutboundReply,
    ) -> Result<(), TransportError> {
        self.record(SentMessage::Reply {
            room_id: room_id.to_string(),
            reply,
        })
        .await
    }

    async fn send_markup_text(&self, room_id: &str, html: &str) -> Result<(), TransportError> {
        self.record(SentMessage::Markup {
            room_id: room_id.to_string(),
            html: html.to_string(),
        })
        .await
    }

    async fn send_plain_text(&self, room_id: &str, text: &str) -> Result<(), TransportError> {
        self.record(SentMessage::Plain {
            room_id: room_id.to_string(),
            text: text.to_string(),
        })
        .await
    }

    async fn join_room(&self, room_id: &str) -> Result<(), TransportError> {
        self.record(SentMessage::Join {
            room_id: room_id.to_string(),
        })
        .await
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}
