//! Event orchestrator: turns transport events into replies.
//!
//! Every delivered event runs as its own task. Nothing orders tasks
//! against each other, not even within one room, and every `.await`
//! (identity lookup, resolver call, each send) is a point where another
//! event's task may run. Failures are logged and stay scoped to the event
//! that caused them.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::autojoin::AutoJoin;
use crate::error::Result;
use crate::onboarding::InviteOnboarding;
use crate::pipeline::{build_reply, format, should_process, spam};
use crate::resolver::LineResolver;
use crate::transport::{InboundEvent, Transport, TransportEvent};

/// Reply to a text message with no body.
pub const EMPTY_MESSAGE_REPLY: &str = "Something strange happened - the message is empty!";

/// The bot: a transport, a resolver, and what to do with each event.
pub struct Bot {
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn LineResolver>,
    onboarding: InviteOnboarding,
    auto_join: Option<AutoJoin>,
}

impl Bot {
    pub fn new(transport: Arc<dyn Transport>, resolver: Arc<dyn LineResolver>) -> Self {
        Self {
            onboarding: InviteOnboarding::new(Arc::clone(&transport)),
            transport,
            resolver,
            auto_join: None,
        }
    }

    /// Join every room the bot is invited to.
    pub fn attach_auto_join(&mut self) {
        self.auto_join = Some(AutoJoin::new(Arc::clone(&self.transport)));
    }

    /// Handle one room message: filter, resolve, cap, render, reply.
    pub async fn on_message(&self, room_id: &str, event: &InboundEvent) -> Result<()> {
        let self_id = self.transport.self_id().await?;
        if !should_process(event, &self_id) {
            debug!(room_id = %room_id, event_id = %event.event_id, "Ignoring event");
            return Ok(());
        }

        let Some(message) = self.compose_reply(event).await? else {
            debug!(room_id = %room_id, event_id = %event.event_id, "Nothing to reply");
            return Ok(());
        };

        let reply = build_reply(room_id, event, message);
        self.transport.send_message(room_id, reply).await?;

        info!(
            room_id = %room_id,
            event_id = %event.event_id,
            sender = %event.sender,
            "Replied to message"
        );
        Ok(())
    }

    async fn compose_reply(&self, event: &InboundEvent) -> Result<Option<String>> {
        let body = event.body().unwrap_or_default();
        if body.is_empty() {
            return Ok(Some(EMPTY_MESSAGE_REPLY.to_string()));
        }

        let result = self.resolver.resolve(body).await?;
        debug!(
            event_id = %event.event_id,
            items = result.items.len(),
            total_lines = result.total_lines,
            "Resolved message"
        );

        let guarded = spam::apply(result);
        Ok(format::render(&guarded.items, guarded.warning))
    }

    /// Handle the bot joining a room.
    pub async fn on_invite(&self, room_id: &str) -> Result<()> {
        info!(room_id = %room_id, "Joined room");
        self.onboarding.on_invite(room_id).await?;
        Ok(())
    }

    async fn on_invited(&self, room_id: &str) -> Result<()> {
        match &self.auto_join {
            Some(auto_join) => auto_join.handle_invite(room_id).await?,
            None => debug!(room_id = %room_id, "Invite received, auto-join not attached"),
        }
        Ok(())
    }

    /// Route one transport event to its handler.
    pub async fn dispatch(&self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::Message { room_id, event } => self.on_message(&room_id, &event).await,
            TransportEvent::Invited { room_id } => self.on_invited(&room_id).await,
            TransportEvent::Joined { room_id } => self.on_invite(&room_id).await,
        }
    }

    async fn handle(&self, event: TransportEvent) {
        let room_id = event.room_id().to_string();
        let kind = event.kind();
        let event_id = match &event {
            TransportEvent::Message { event, .. } => Some(event.event_id.clone()),
            _ => None,
        };

        if let Err(e) = self.dispatch(event).await {
            warn!(
                room_id = %room_id,
                kind,
                event_id = event_id.as_deref().unwrap_or("-"),
                error = %e,
                "Event handling failed"
            );
        }
    }

    /// Consume transport events until `shutdown` resolves or the stream
    /// ends, then wait for in-flight events and shut the transport down.
    pub async fn run<F>(self: Arc<Self>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let mut events = self.transport.start().await?;
        info!(transport = self.transport.name(), "Started bot");

        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                next = events.next() => match next {
                    Some(event) => {
                        let bot = Arc::clone(&self);
                        tasks.spawn(async move { bot.handle(event).await });
                    }
                    None => {
                        info!("Event stream ended");
                        break;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Event task panicked: {e}");
                    }
                }
            }
        }

        if !tasks.is_empty() {
            info!(in_flight = tasks.len(), "Waiting for in-flight events");
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Event task panicked: {e}");
            }
        }

        self.transport.shutdown().await?;
        info!("Bot stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::{Error, ResolverError};
    use crate::pipeline::SPAM_WARNING;
    use crate::resolver::{LineDatum, ResolutionResult};
    use crate::transport::{MemoryTransport, MessageContent, MsgType, SentMessage};

    const BOT: &str = "@lines:x";

    /// Resolver returning a fixed result and recording what it was asked.
    struct StubResolver {
        result: std::result::Result<ResolutionResult, String>,
        calls: AtomicUsize,
        bodies: Mutex<Vec<String>>,
    }

    impl StubResolver {
        fn returning(result: ResolutionResult) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(result),
                calls: AtomicUsize::new(0),
                bodies: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                result: Err("core down".into()),
                calls: AtomicUsize::new(0),
                bodies: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LineResolver for StubResolver {
        async fn resolve(
            &self,
            body: &str,
        ) -> std::result::Result<ResolutionResult, ResolverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bodies.lock().unwrap().push(body.to_string());
            self.result.clone().map_err(ResolverError::Request)
        }
    }

    fn setup(resolver: Arc<StubResolver>) -> (Arc<MemoryTransport>, Bot) {
        let transport = Arc::new(MemoryTransport::new(BOT));
        let bot = Bot::new(transport.clone(), resolver);
        (transport, bot)
    }

    fn text_event(sender: &str, body: &str) -> InboundEvent {
        InboundEvent::new("$ev", sender, Some(MessageContent::text(body)))
    }

    fn snippet_result() -> ResolutionResult {
        ResolutionResult {
            items: vec![LineDatum::new("def f():", "py")],
            total_lines: 1,
        }
    }

    fn only_reply(sent: Vec<SentMessage>) -> crate::transport::OutboundReply {
        match sent.as_slice() {
            [SentMessage::Reply { reply, .. }] => reply.clone(),
            other => panic!("expected exactly one reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn message_with_links_gets_code_reply() {
        let resolver = StubResolver::returning(snippet_result());
        let (transport, bot) = setup(resolver.clone());

        bot.on_message("!r:x", &text_event("@alice:x", "https://github.com/a/b#L1"))
            .await
            .unwrap();

        let reply = only_reply(transport.sent().await);
        assert_eq!(reply.room_id, "!r:x");
        assert_eq!(reply.related_event_id, "$ev");
        assert_eq!(reply.msgtype, MsgType::Notice);
        assert_eq!(
            reply.body,
            "<pre><code class=\"language-py\">def f():</code></pre>"
        );
        assert_eq!(reply.formatted_body, reply.body);
        assert_eq!(
            resolver.bodies.lock().unwrap().as_slice(),
            ["https://github.com/a/b#L1"]
        );
    }

    #[tokio::test]
    async fn own_message_is_ignored() {
        let resolver = StubResolver::returning(snippet_result());
        let (transport, bot) = setup(resolver.clone());

        bot.on_message("!r:x", &text_event(BOT, "https://github.com/a/b#L1"))
            .await
            .unwrap();

        assert!(transport.sent().await.is_empty());
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn self_id_resolved_per_message() {
        let resolver = StubResolver::returning(ResolutionResult::empty());
        let (transport, bot) = setup(resolver);

        for _ in 0..3 {
            bot.on_message("!r:x", &text_event("@alice:x", "hi"))
                .await
                .unwrap();
        }
        assert_eq!(transport.self_id_calls(), 3);
    }

    #[tokio::test]
    async fn missing_content_is_ignored() {
        let resolver = StubResolver::returning(snippet_result());
        let (transport, bot) = setup(resolver.clone());

        let event = InboundEvent::new("$ev", "@alice:x", None);
        bot.on_message("!r:x", &event).await.unwrap();

        assert!(transport.sent().await.is_empty());
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn empty_body_gets_fixed_reply_without_resolving() {
        let resolver = StubResolver::returning(snippet_result());
        let (transport, bot) = setup(resolver.clone());

        bot.on_message("!r:x", &text_event("@alice:x", ""))
            .await
            .unwrap();

        let reply = only_reply(transport.sent().await);
        assert_eq!(reply.body, EMPTY_MESSAGE_REPLY);
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn missing_body_gets_fixed_reply() {
        let resolver = StubResolver::returning(snippet_result());
        let (transport, bot) = setup(resolver.clone());

        let content = MessageContent {
            msgtype: Some("m.text".into()),
            body: None,
        };
        bot.on_message("!r:x", &InboundEvent::new("$ev", "@alice:x", Some(content)))
            .await
            .unwrap();

        assert_eq!(only_reply(transport.sent().await).body, EMPTY_MESSAGE_REPLY);
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn over_limit_gets_spam_warning_only() {
        let resolver = StubResolver::returning(ResolutionResult {
            items: vec![LineDatum::new("a\nb", "rs")],
            total_lines: 51,
        });
        let (transport, bot) = setup(resolver);

        bot.on_message("!r:x", &text_event("@alice:x", "links"))
            .await
            .unwrap();

        assert_eq!(only_reply(transport.sent().await).body, SPAM_WARNING);
    }

    #[tokio::test]
    async fn no_links_sends_nothing() {
        let resolver = StubResolver::returning(ResolutionResult::empty());
        let (transport, bot) = setup(resolver.clone());

        bot.on_message("!r:x", &text_event("@alice:x", "just chatting"))
            .await
            .unwrap();

        assert!(transport.sent().await.is_empty());
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn resolver_failure_aborts_without_reply() {
        let resolver = StubResolver::failing();
        let (transport, bot) = setup(resolver);

        let err = bot
            .on_message("!r:x", &text_event("@alice:x", "links"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Resolver(_)));
        assert!(transport.sent().await.is_empty());
    }

    #[tokio::test]
    async fn send_failure_is_returned() {
        let resolver = StubResolver::returning(snippet_result());
        let (transport, bot) = setup(resolver);
        transport.set_fail_sends(true);

        let err = bot
            .on_message("!r:x", &text_event("@alice:x", "links"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn invite_without_auto_join_is_ignored() {
        let (transport, bot) = setup(StubResolver::returning(ResolutionResult::empty()));
        assert!(bot.auto_join.is_none());

        bot.dispatch(TransportEvent::Invited {
            room_id: "!new:x".into(),
        })
        .await
        .unwrap();

        assert!(transport.sent().await.is_empty());
    }

    #[tokio::test]
    async fn invite_with_auto_join_joins() {
        let (transport, mut bot) = setup(StubResolver::returning(ResolutionResult::empty()));
        bot.attach_auto_join();

        bot.dispatch(TransportEvent::Invited {
            room_id: "!new:x".into(),
        })
        .await
        .unwrap();

        assert_eq!(
            transport.sent().await,
            vec![SentMessage::Join {
                room_id: "!new:x".into()
            }]
        );
    }

    #[tokio::test]
    async fn joined_room_gets_welcome_sequence() {
        let (transport, bot) = setup(StubResolver::returning(ResolutionResult::empty()));

        bot.dispatch(TransportEvent::Joined {
            room_id: "!new:x".into(),
        })
        .await
        .unwrap();

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], SentMessage::Markup { .. }));
        assert!(matches!(sent[1], SentMessage::Plain { .. }));
    }

    #[tokio::test]
    async fn run_drains_events_and_shuts_down_transport() {
        let resolver = StubResolver::returning(snippet_result());
        let transport = Arc::new(MemoryTransport::new(BOT));
        let bot = Arc::new(Bot::new(transport.clone(), resolver.clone()));

        transport
            .push(TransportEvent::Message {
                room_id: "!r:x".into(),
                event: text_event("@alice:x", "one"),
            })
            .await;
        transport
            .push(TransportEvent::Message {
                room_id: "!r:x".into(),
                event: text_event(BOT, "mine"),
            })
            .await;
        transport.close().await;

        bot.run(std::future::pending()).await.unwrap();

        assert_eq!(resolver.calls(), 1);
        assert_eq!(transport.sent().await.len(), 1);
        assert!(transport.is_shut_down());
    }

    #[tokio::test]
    async fn run_failed_event_does_not_stop_others() {
        let resolver = StubResolver::failing();
        let (transport, bot) = setup(resolver.clone());
        let bot = Arc::new(bot);

        transport
            .push(TransportEvent::Message {
                room_id: "!a:x".into(),
                event: text_event("@alice:x", "https://github.com/a/b#L1"),
            })
            .await;
        transport
            .push(TransportEvent::Joined {
                room_id: "!b:x".into(),
            })
            .await;
        transport.close().await;

        bot.run(std::future::pending()).await.unwrap();

        assert_eq!(resolver.calls(), 1);
        let sent = transport.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[0], SentMessage::Markup { room_id, .. } if room_id == "!b:x"));
        assert!(matches!(&sent[1], SentMessage::Plain { room_id, .. } if room_id == "!b:x"));
        assert!(transport.is_shut_down());
    }
}
