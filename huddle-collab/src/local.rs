//! In-process collaborators for tests, demos and offline use.
//!
//! ```text
//!   RoomSession A ─┐                       ┌─► Subscription (A, messages)
//!                  ├─► LocalPlatform ──► LocalBus ─► Subscription (B, messages)
//!   RoomSession B ─┘   (rows, blobs)       └─► Subscription (B, room-config)
//! ```
//!
//! [`LocalPlatform`] plays the authoritative store: it assigns message ids and
//! timestamps and publishes every row change on its [`LocalBus`] exactly like a
//! realtime backend would, using the same wire rows. Faults and latency can be
//! injected per call.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use huddle_core::{Message, MessageId, Room, RoomConfigPatch, RoomId};

use crate::error::TransportError;
use crate::transport::{
    BlobStore, EventTransport, FileUpload, MessagePatch, NewMessage, RawChange, RoomBackend,
    Subscription, Topic,
};
use crate::wire::{self, KeyRow, MessageRow, RoomRow};

// ───────────────────────────────────────────────────────────────────
// LocalBus
// ───────────────────────────────────────────────────────────────────

/// Statistics for monitoring bus health.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusStats {
    pub changes_published: u64,
    pub changes_delivered: u64,
    pub active_subscriptions: usize,
}

#[derive(Default)]
struct AtomicBusStats {
    changes_published: AtomicU64,
    changes_delivered: AtomicU64,
}

type Channels = HashMap<(Topic, RoomId), HashMap<Uuid, mpsc::UnboundedSender<RawChange>>>;

/// Publish/subscribe channel keyed by topic and room.
///
/// Delivery is ordered per subscriber. A channel entry is removed once its
/// last subscription is released.
#[derive(Clone, Default)]
pub struct LocalBus {
    channels: Arc<Mutex<Channels>>,
    stats: Arc<AtomicBusStats>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fan a change out to every subscriber of `(topic, room)`.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, topic: Topic, room_id: &RoomId, change: RawChange) -> usize {
        let channels = lock(&self.channels);
        let delivered = channels
            .get(&(topic, room_id.clone()))
            .map(|subscribers| {
                subscribers
                    .values()
                    .filter(|tx| tx.send(change.clone()).is_ok())
                    .count()
            })
            .unwrap_or(0);

        self.stats.changes_published.fetch_add(1, Ordering::Relaxed);
        self.stats
            .changes_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        log::debug!("Published {:?} on {topic} of room {room_id} to {delivered} subscriber(s)", change.kind);
        delivered
    }

    pub fn subscriber_count(&self, topic: Topic, room_id: &RoomId) -> usize {
        lock(&self.channels)
            .get(&(topic, room_id.clone()))
            .map_or(0, HashMap::len)
    }

    pub fn stats(&self) -> BusStats {
        let channels = lock(&self.channels);
        BusStats {
            changes_published: self.stats.changes_published.load(Ordering::Relaxed),
            changes_delivered: self.stats.changes_delivered.load(Ordering::Relaxed),
            active_subscriptions: channels.values().map(HashMap::len).sum(),
        }
    }
}

impl EventTransport for LocalBus {
    fn subscribe(&self, topic: Topic, room_id: &RoomId) -> Result<Subscription, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let key = (topic, room_id.clone());
        let subscriber = Uuid::new_v4();
        lock(&self.channels)
            .entry(key.clone())
            .or_default()
            .insert(subscriber, tx);

        let channels = self.channels.clone();
        let release = move || {
            let mut channels = lock(&channels);
            if let Some(subscribers) = channels.get_mut(&key) {
                subscribers.remove(&subscriber);
                if subscribers.is_empty() {
                    channels.remove(&key);
                }
            }
        };
        log::debug!("Subscribed to {topic} of room {room_id}");
        Ok(Subscription::new(topic, room_id.clone(), rx, release))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ───────────────────────────────────────────────────────────────────
// LocalPlatform
// ───────────────────────────────────────────────────────────────────

/// Calls that can be made to fail with [`LocalPlatform::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformCall {
    FetchRoom,
    FetchMessages,
    CreateMessage,
    UpdateMessage,
    DeleteMessage,
    UpdateRoom,
    Upload,
}

#[derive(Default)]
struct PlatformState {
    rooms: HashMap<RoomId, Room>,
    /// All rooms, ascending by creation time
    messages: Vec<Message>,
    blobs: HashMap<String, FileUpload>,
    faults: HashMap<PlatformCall, VecDeque<TransportError>>,
    next_id: u64,
    last_stamp: Option<DateTime<Utc>>,
}

impl PlatformState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    /// Wall-clock time, strictly increasing across calls.
    fn next_stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + ChronoDuration::milliseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }
}

/// Authoritative store plus blob storage, in memory.
#[derive(Clone, Default)]
pub struct LocalPlatform {
    bus: LocalBus,
    state: Arc<Mutex<PlatformState>>,
    latency: Duration,
}

impl LocalPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn bus(&self) -> &LocalBus {
        &self.bus
    }

    /// Create a room with default settings and a fresh id.
    pub fn create_room(&self, name: &str, password: &str) -> Room {
        let mut state = lock(&self.state);
        let room = Room::new(state.next_id("r"), name, password);
        state.rooms.insert(room.id.clone(), room.clone());
        log::info!("Created room {} ({name})", room.id);
        room
    }

    /// Insert or replace a room row as-is.
    pub fn insert_room(&self, room: Room) {
        lock(&self.state).rooms.insert(room.id.clone(), room);
    }

    /// Remove a room with its messages and notify subscribers.
    pub fn delete_room(&self, room_id: &RoomId) -> bool {
        let removed = {
            let mut state = lock(&self.state);
            state.messages.retain(|m| &m.room_id != room_id);
            state.rooms.remove(room_id).is_some()
        };
        if removed {
            self.publish_row(Topic::RoomConfig, room_id, RawChange::delete, &KeyRow { id: room_id.to_string() });
        }
        removed
    }

    /// Seed a message without publishing it, keeping its id and timestamp.
    pub fn seed_message(&self, message: Message) {
        let mut state = lock(&self.state);
        let idx = state
            .messages
            .partition_point(|m| m.created_at <= message.created_at);
        state.messages.insert(idx, message);
    }

    pub fn room(&self, room_id: &RoomId) -> Option<Room> {
        lock(&self.state).rooms.get(room_id).cloned()
    }

    pub fn messages(&self, room_id: &RoomId) -> Vec<Message> {
        lock(&self.state)
            .messages
            .iter()
            .filter(|m| &m.room_id == room_id)
            .cloned()
            .collect()
    }

    /// Stored bytes of an uploaded file, by its URL.
    pub fn blob(&self, url: &str) -> Option<FileUpload> {
        let key = url.strip_prefix(BLOB_URL_PREFIX)?;
        lock(&self.state).blobs.get(key).cloned()
    }

    /// Make the next `call` fail with `error`. Faults queue up per call.
    pub fn fail_next(&self, call: PlatformCall, error: TransportError) {
        lock(&self.state)
            .faults
            .entry(call)
            .or_default()
            .push_back(error);
    }

    /// Publish an arbitrary change, e.g. a malformed payload.
    pub fn publish_raw(&self, topic: Topic, room_id: &RoomId, change: RawChange) -> usize {
        self.bus.publish(topic, room_id, change)
    }

    async fn enter(&self, call: PlatformCall) -> Result<(), TransportError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match lock(&self.state).faults.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(error) => {
                log::debug!("Injected fault on {call:?}: {error}");
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn publish_row<R: serde::Serialize>(
        &self,
        topic: Topic,
        room_id: &RoomId,
        change: fn(serde_json::Value) -> RawChange,
        row: &R,
    ) {
        match wire::encode(row) {
            Ok(payload) => {
                self.bus.publish(topic, room_id, change(payload));
            }
            Err(e) => log::warn!("Failed to encode {topic} row for room {room_id}: {e}"),
        }
    }
}

impl RoomBackend for LocalPlatform {
    async fn fetch_room(&self, room_id: &RoomId) -> Result<Option<Room>, TransportError> {
        self.enter(PlatformCall::FetchRoom).await?;
        Ok(self.room(room_id))
    }

    async fn fetch_messages(&self, room_id: &RoomId) -> Result<Vec<Message>, TransportError> {
        self.enter(PlatformCall::FetchMessages).await?;
        Ok(self.messages(room_id))
    }

    async fn create_message(&self, request: NewMessage) -> Result<Message, TransportError> {
        self.enter(PlatformCall::CreateMessage).await?;
        let message = {
            let mut state = lock(&self.state);
            if !state.rooms.contains_key(&request.room_id) {
                return Err(TransportError::Storage(format!(
                    "room {} does not exist",
                    request.room_id
                )));
            }
            let id = MessageId::new(state.next_id("m"));
            let created_at = state.next_stamp();
            let message = Message::from_draft(
                id,
                request.room_id.clone(),
                &request.author,
                &request.draft,
                created_at,
            );
            state.messages.push(message.clone());
            message
        };

        let row = MessageRow::from_message(&message, Some(request.nonce));
        self.publish_row(Topic::Messages, &message.room_id, RawChange::insert, &row);
        Ok(message)
    }

    async fn update_message(&self, id: &MessageId, patch: MessagePatch) -> Result<(), TransportError> {
        self.enter(PlatformCall::UpdateMessage).await?;
        let updated = {
            let mut state = lock(&self.state);
            let found = state.messages.iter_mut().find(|m| &m.id == id);
            found.map(|m| {
                m.reactions = patch.reactions;
                m.clone()
            })
        };

        match updated {
            Some(message) => {
                let row = MessageRow::from_message(&message, None);
                self.publish_row(Topic::Messages, &message.room_id, RawChange::update, &row);
            }
            // Zero rows matched: not an error for the caller
            None => log::debug!("Update of absent message {id}"),
        }
        Ok(())
    }

    async fn delete_message(&self, id: &MessageId) -> Result<(), TransportError> {
        self.enter(PlatformCall::DeleteMessage).await?;
        let removed = {
            let mut state = lock(&self.state);
            match state.messages.iter().position(|m| &m.id == id) {
                Some(idx) => Some(state.messages.remove(idx)),
                None => None,
            }
        };

        if let Some(message) = removed {
            let row = KeyRow { id: id.to_string() };
            self.publish_row(Topic::Messages, &message.room_id, RawChange::delete, &row);
        }
        Ok(())
    }

    async fn update_room(&self, room_id: &RoomId, patch: RoomConfigPatch) -> Result<(), TransportError> {
        self.enter(PlatformCall::UpdateRoom).await?;
        let room = {
            let mut state = lock(&self.state);
            let room = state
                .rooms
                .get_mut(room_id)
                .ok_or_else(|| TransportError::Storage(format!("room {room_id} does not exist")))?;
            room.settings.apply(&patch);
            room.clone()
        };

        self.publish_row(Topic::RoomConfig, room_id, RawChange::update, &RoomRow::from_room(&room));
        Ok(())
    }
}

const BLOB_URL_PREFIX: &str = "local://blobs/";

impl BlobStore for LocalPlatform {
    async fn upload(&self, room_id: &RoomId, file: FileUpload) -> Result<String, TransportError> {
        self.enter(PlatformCall::Upload).await?;
        let mut state = lock(&self.state);
        let millis = state.next_stamp().timestamp_millis();
        let key = match file.extension() {
            Some(ext) => format!("{room_id}/{millis}.{ext}"),
            None => format!("{room_id}/{millis}"),
        };
        log::debug!("Stored {} ({} bytes) as {key}", file.name, file.bytes.len());
        state.blobs.insert(key.clone(), file);
        Ok(format!("{BLOB_URL_PREFIX}{key}"))
    }
}
