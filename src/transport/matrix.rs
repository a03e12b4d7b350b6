//! Matrix transport: long-polls the Client-Server API `/sync` endpoint.
//!
//! Native Rust implementation over `reqwest`, adapted to the bot's
//! Transport trait (EventStream, replies, plain and HTML sends, joins).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::{Mutex, OnceCell, mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::BotConfig;
use crate::error::TransportError;
use crate::transport::{
    EventStream, InboundEvent, MSGTYPE_TEXT, OutboundReply, SyncStore, Transport, TransportEvent,
};

/// Client-Server API prefix.
const CLIENT_API: &str = "/_matrix/client/v3";

/// Long-poll timeout for `/sync`, in milliseconds.
const SYNC_TIMEOUT_MS: &str = "30000";

/// Filter for the first sync without a stored token: no timeline, so old
/// messages are never answered.
const INITIAL_SYNC_FILTER: &str = r#"{"room":{"timeline":{"limit":0}}}"#;

/// Delay before retrying a failed sync.
const RETRY_DELAY: Duration = Duration::from_secs(5);

const HTML_FORMAT: &str = "org.matrix.custom.html";

/// Thin authenticated wrapper over the Client-Server API.
#[derive(Clone)]
struct MatrixApi {
    homeserver: String,
    access_token: SecretString,
    client: reqwest::Client,
}

impl MatrixApi {
    fn url(&self, path: &str) -> String {
        format!("{}{CLIENT_API}{path}", self.homeserver)
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, TransportError> {
        let req = self.client.get(self.url(path)).query(query);
        self.execute(req, path).await
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        let req = self.client.post(self.url(path)).json(body);
        self.execute(req, path).await
    }

    async fn put(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        let req = self.client.put(self.url(path)).json(body);
        self.execute(req, path).await
    }

    async fn execute(
        &self,
        req: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<serde_json::Value, TransportError> {
        let resp = req
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("{path} returned {status}: {err}")));
        }

        resp.json()
            .await
            .map_err(|e| TransportError::InvalidResponse {
                name: "matrix".into(),
                reason: format!("{path}: {e}"),
            })
    }

    async fn whoami(&self) -> Result<String, TransportError> {
        let data = self.get("/account/whoami", &[]).await?;
        data.get("user_id")
            .and_then(serde_json::Value::as_str)
            .map(String::from)
            .ok_or_else(|| TransportError::InvalidResponse {
                name: "matrix".into(),
                reason: "whoami response has no user_id".into(),
            })
    }

    async fn joined_rooms(&self) -> Result<Vec<String>, TransportError> {
        let data = self.get("/joined_rooms", &[]).await?;
        let rooms = data
            .get("joined_rooms")
            .and_then(serde_json::Value::as_array)
            .map(|rooms| {
                rooms
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Ok(rooms)
    }

    async fn sync(&self, since: Option<&str>) -> Result<SyncResponse, TransportError> {
        let query: Vec<(&str, &str)> = match since {
            Some(token) => vec![("since", token), ("timeout", SYNC_TIMEOUT_MS)],
            None => vec![("timeout", "0"), ("filter", INITIAL_SYNC_FILTER)],
        };
        let data = self.get("/sync", &query).await?;
        serde_json::from_value(data).map_err(|e| TransportError::InvalidResponse {
            name: "matrix".into(),
            reason: format!("/sync: {e}"),
        })
    }

    async fn send_room_message(
        &self,
        room_id: &str,
        content: serde_json::Value,
    ) -> Result<(), TransportError> {
        let path = format!(
            "/rooms/{}/send/m.room.message/{}",
            urlencoding::encode(room_id),
            Uuid::new_v4()
        );
        self.put(&path, &content)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::SendFailed {
                name: "matrix".into(),
                reason: e.to_string(),
            })
    }
}

// ── Sync response ───────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct SyncResponse {
    next_batch: String,
    #[serde(default)]
    rooms: SyncRooms,
}

#[derive(Debug, Default, Deserialize)]
struct SyncRooms {
    #[serde(default)]
    join: BTreeMap<String, JoinedRoom>,
    #[serde(default)]
    invite: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    leave: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct JoinedRoom {
    #[serde(default)]
    timeline: Timeline,
}

#[derive(Debug, Default, Deserialize)]
struct Timeline {
    #[serde(default)]
    events: Vec<serde_json::Value>,
}

/// Turn one sync batch into transport events, updating the joined-room set.
fn events_from_sync(sync: &SyncResponse, store: &mut SyncStore) -> Vec<TransportEvent> {
    let mut events = Vec::new();

    for room_id in sync.rooms.leave.keys() {
        store.remove_joined(room_id);
    }

    for room_id in sync.rooms.invite.keys() {
        events.push(TransportEvent::Invited {
            room_id: room_id.clone(),
        });
    }

    for (room_id, room) in &sync.rooms.join {
        if store.add_joined(room_id) {
            events.push(TransportEvent::Joined {
                room_id: room_id.clone(),
            });
        }

        for raw in &room.timeline.events {
            if raw.get("type").and_then(serde_json::Value::as_str) != Some("m.room.message") {
                continue;
            }
            match serde_json::from_value::<InboundEvent>(raw.clone()) {
                Ok(event) => events.push(TransportEvent::Message {
                    room_id: room_id.clone(),
                    event,
                }),
                Err(e) => {
                    tracing::debug!(room_id = %room_id, "Skipping malformed room message: {e}");
                }
            }
        }
    }

    events
}

// ── Outbound content ────────────────────────────────────────────────

fn reply_content(reply: &OutboundReply) -> serde_json::Value {
    serde_json::json!({
        "msgtype": reply.msgtype.as_str(),
        "body": reply.body,
        "format": HTML_FORMAT,
        "formatted_body": reply.formatted_body,
        "m.relates_to": {
            "m.in_reply_to": { "event_id": reply.related_event_id }
        }
    })
}

fn markup_content(html: &str) -> serde_json::Value {
    serde_json::json!({
        "msgtype": MSGTYPE_TEXT,
        "body": html,
        "format": HTML_FORMAT,
        "formatted_body": html,
    })
}

fn plain_content(text: &str) -> serde_json::Value {
    serde_json::json!({
        "msgtype": MSGTYPE_TEXT,
        "body": text,
    })
}

/// What the sync loop hands to the event stream.
///
/// A batch's state travels with its last event and is persisted only when
/// the stream yields that event, so a batch is never marked as synced while
/// its events are still queued. Batches without events carry their state
/// alone.
enum Delivery {
    Event {
        event: TransportEvent,
        commit: Option<SyncStore>,
    },
    Commit(SyncStore),
}

async fn commit_state(committed: &Mutex<SyncStore>, state: SyncStore) {
    let mut store = committed.lock().await;
    *store = state;
    if let Err(e) = store.save().await {
        tracing::warn!("Failed to persist sync state: {e}");
    }
}

// ── Transport ───────────────────────────────────────────────────────

/// Matrix transport: connects to a homeserver via `/sync` long-polling.
pub struct MatrixTransport {
    api: MatrixApi,
    store: Arc<Mutex<SyncStore>>,
    user_id: OnceCell<String>,
    stop_tx: watch::Sender<bool>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl MatrixTransport {
    pub fn new(homeserver: impl Into<String>, access_token: SecretString, store: SyncStore) -> Self {
        let homeserver: String = homeserver.into();
        let (stop_tx, _) = watch::channel(false);
        Self {
            api: MatrixApi {
                homeserver: homeserver.trim_end_matches('/').to_string(),
                access_token,
                client: reqwest::Client::new(),
            },
            store: Arc::new(Mutex::new(store)),
            user_id: OnceCell::new(),
            stop_tx,
            sync_task: Mutex::new(None),
        }
    }

    /// Build a transport from bot config, loading its sync store.
    pub async fn from_config(config: &BotConfig) -> Result<Self, TransportError> {
        let store = SyncStore::load(&config.storage_path).await?;
        Ok(Self::new(
            config.homeserver.clone(),
            config.matrix_token.clone(),
            store,
        ))
    }
}

#[async_trait]
impl Transport for MatrixTransport {
    fn name(&self) -> &str {
        "matrix"
    }

    async fn start(&self) -> Result<EventStream, TransportError> {
        let mut task = self.sync_task.lock().await;
        if task.is_some() {
            return Err(TransportError::StartupFailed {
                name: "matrix".into(),
                reason: "already started".into(),
            });
        }

        let joined = self
            .api
            .joined_rooms()
            .await
            .map_err(|e| TransportError::StartupFailed {
                name: "matrix".into(),
                reason: e.to_string(),
            })?;
        {
            let mut store = self.store.lock().await;
            for room_id in &joined {
                store.add_joined(room_id);
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let api = self.api.clone();
        let mut cursor = self.store.lock().await.clone();
        let mut stop_rx = self.stop_tx.subscribe();

        *task = Some(tokio::spawn(async move {
            tracing::info!(rooms = joined.len(), "Matrix transport listening for events...");

            loop {
                let since = cursor.sync_token().map(String::from);

                let result = tokio::select! {
                    _ = stop_rx.changed() => break,
                    r = api.sync(since.as_deref()) => r,
                };

                let sync = match result {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!("Matrix sync error: {e}");
                        tokio::select! {
                            _ = stop_rx.changed() => break,
                            _ = tokio::time::sleep(RETRY_DELAY) => continue,
                        }
                    }
                };

                let mut events = events_from_sync(&sync, &mut cursor);
                cursor.set_sync_token(sync.next_batch.clone());

                let mut deliveries: Vec<Delivery> = Vec::with_capacity(events.len().max(1));
                let last = events.pop();
                deliveries.extend(events.into_iter().map(|event| Delivery::Event {
                    event,
                    commit: None,
                }));
                deliveries.push(match last {
                    Some(event) => Delivery::Event {
                        event,
                        commit: Some(cursor.clone()),
                    },
                    None => Delivery::Commit(cursor.clone()),
                });

                for delivery in deliveries {
                    if tx.send(delivery).is_err() {
                        tracing::info!("Matrix listener channel closed");
                        return;
                    }
                }
            }

            tracing::info!("Matrix sync loop stopped");
        }));

        let committed = Arc::clone(&self.store);
        let stream = futures::stream::unfold((rx, committed), |(mut rx, committed)| async move {
            loop {
                let (event, commit) = match rx.recv().await {
                    Some(Delivery::Event { event, commit }) => (Some(event), commit),
                    Some(Delivery::Commit(state)) => (None, Some(state)),
                    None => return None,
                };
                if let Some(state) = commit {
                    commit_state(&committed, state).await;
                }
                if let Some(event) = event {
                    return Some((event, (rx, committed)));
                }
            }
        });

        Ok(Box::pin(stream))
    }

    async fn self_id(&self) -> Result<String, TransportError> {
        self.user_id
            .get_or_try_init(|| self.api.whoami())
            .await
            .cloned()
    }

    async fn send_message(
        &self,
        room_id: &str,
        reply: OutboundReply,
    ) -> Result<(), TransportError> {
        self.api
            .send_room_message(room_id, reply_content(&reply))
            .await
    }

    async fn send_markup_text(&self, room_id: &str, html: &str) -> Result<(), TransportError> {
        self.api.send_room_message(room_id, markup_content(html)).await
    }

    async fn send_plain_text(&self, room_id: &str, text: &str) -> Result<(), TransportError> {
        self.api.send_room_message(room_id, plain_content(text)).await
    }

    async fn join_room(&self, room_id: &str) -> Result<(), TransportError> {
        let path = format!("/join/{}", urlencoding::encode(room_id));
        self.api.post(&path, &serde_json::json!({})).await?;
        tracing::info!(room_id = %room_id, "Joined room");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        tracing::info!("Matrix transport shutting down");
        self.stop_tx.send_replace(true);

        if let Some(handle) = self.sync_task.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Matrix sync task ended abnormally: {e}");
            }
        }

        self.store.lock().await.save().await
    }
}

// ── Tests ───────────────────────────────────────────────────────────
