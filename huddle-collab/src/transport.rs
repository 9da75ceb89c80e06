//! Contracts of the external collaborators.
//!
//! ```text
//! ┌──────────────────┐  RawChange (JSON)  ┌──────────┐  TransportEvent  ┌──────────────┐
//! │ EventTransport   │ ─────────────────► │ wire     │ ───────────────► │ RoomSession  │
//! │ (pub/sub)        │  per topic + room  │ (decode) │   closed union   │ (store, cfg) │
//! └──────────────────┘                    └──────────┘                  └──────┬───────┘
//!                                                                              │
//!                              ┌───────────────────────────────┬───────────────┘
//!                              ▼                               ▼
//!                       ┌─────────────┐                 ┌─────────────┐
//!                       │ RoomBackend │                 │ BlobStore   │
//!                       │ (queries)   │                 │ (uploads)   │
//!                       └─────────────┘                 └─────────────┘
//! ```
//!
//! Delivery on a subscription is at-least-once and ordered per topic and
//! room; nothing is guaranteed across topics.

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use uuid::Uuid;

use huddle_core::{
    Message, MessageDraft, MessageId, ParticipantSession, PendingId, Reactions, Room,
    RoomConfigPatch, RoomId,
};

use crate::error::TransportError;

// ───────────────────────────────────────────────────────────────────
// Event stream
// ───────────────────────────────────────────────────────────────────

/// The two logical streams of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    Messages,
    RoomConfig,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Messages => "messages",
            Topic::RoomConfig => "room-config",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row-level change notified by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A change as delivered: untyped until validated by [`crate::wire`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChange {
    pub kind: ChangeKind,
    pub payload: serde_json::Value,
}

impl RawChange {
    pub fn insert(payload: serde_json::Value) -> Self {
        Self { kind: ChangeKind::Insert, payload }
    }

    pub fn update(payload: serde_json::Value) -> Self {
        Self { kind: ChangeKind::Update, payload }
    }

    pub fn delete(payload: serde_json::Value) -> Self {
        Self { kind: ChangeKind::Delete, payload }
    }
}

/// Validated message stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageEvent {
    /// `nonce` is the pending id of the local draft this row was created from, if any.
    Inserted {
        message: Message,
        nonce: Option<PendingId>,
    },
    Updated(Message),
    Deleted(MessageId),
}

/// Validated room-config stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomConfigEvent {
    Inserted(Room),
    Updated(Room),
    Deleted(RoomId),
}

/// `{Insert, Update, Delete} × {Message, RoomConfig}`.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Messages(MessageEvent),
    RoomConfig(RoomConfigEvent),
}

type Release = Box<dyn FnOnce() + Send>;

/// Owned handle to one topic of one room.
///
/// Changes are delivered until the handle is released, either explicitly
/// with [`Subscription::unsubscribe`] or by dropping it.
pub struct Subscription {
    id: Uuid,
    topic: Topic,
    room_id: RoomId,
    rx: mpsc::UnboundedReceiver<RawChange>,
    release: Option<Release>,
}

impl Subscription {
    /// Build a handle; `release` runs exactly once when it is released.
    pub fn new(
        topic: Topic,
        room_id: RoomId,
        rx: mpsc::UnboundedReceiver<RawChange>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic,
            room_id,
            rx,
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Next change, or `None` once the transport side has gone away.
    pub async fn recv(&mut self) -> Option<RawChange> {
        self.rx.recv().await
    }

    /// Next already-queued change, without waiting.
    pub fn try_recv(&mut self) -> Option<RawChange> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            log::debug!("Releasing {} subscription for room {}", self.topic, self.room_id);
            self.rx.close();
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl Stream for Subscription {
    type Item = RawChange;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("room_id", &self.room_id)
            .finish()
    }
}

/// Publish/subscribe channel keyed by room id.
pub trait EventTransport: Send + Sync + 'static {
    fn subscribe(&self, topic: Topic, room_id: &RoomId) -> Result<Subscription, TransportError>;
}

// ───────────────────────────────────────────────────────────────────
// Persistence and blob storage
// ───────────────────────────────────────────────────────────────────

/// Request to create a message from a local draft.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub author: ParticipantSession,
    pub draft: MessageDraft,
    /// Echoed back on the insert event so the optimistic entry can be matched.
    pub nonce: PendingId,
}

/// Post-creation mutation of a message. Only reactions ever change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePatch {
    pub reactions: Reactions,
}

/// Persistence/query collaborator.
pub trait RoomBackend: Send + Sync + 'static {
    fn fetch_room(
        &self,
        room_id: &RoomId,
    ) -> impl Future<Output = Result<Option<Room>, TransportError>> + Send;

    /// Messages of the room, ascending by creation time.
    fn fetch_messages(
        &self,
        room_id: &RoomId,
    ) -> impl Future<Output = Result<Vec<Message>, TransportError>> + Send;

    /// Assigns the canonical id and timestamp.
    fn create_message(
        &self,
        request: NewMessage,
    ) -> impl Future<Output = Result<Message, TransportError>> + Send;

    fn update_message(
        &self,
        id: &MessageId,
        patch: MessagePatch,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn delete_message(&self, id: &MessageId)
        -> impl Future<Output = Result<(), TransportError>> + Send;

    fn update_room(
        &self,
        room_id: &RoomId,
        patch: RoomConfigPatch,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// File handed to the blob collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Extension of the file name, without the dot.
    pub fn extension(&self) -> Option<&str> {
        self.name.rsplit_once('.').map(|(_, ext)| ext).filter(|ext| !ext.is_empty())
    }
}

/// Blob-storage collaborator. Returns the public URL of the stored file.
pub trait BlobStore: Send + Sync + 'static {
    fn upload(
        &self,
        room_id: &RoomId,
        file: FileUpload,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;
}
