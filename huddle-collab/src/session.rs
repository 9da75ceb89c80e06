//! Room view lifecycle and event pipeline.
//!
//! ```text
//!                   ┌──────────────────────── RoomSession ────────────────────────┐
//!  messages sub ───►│                                                             │
//!  config sub ─────►│  next_update() ── select! ──► wire::decode ──► store/config │──► SessionUpdate
//!  completions ────►│        ▲                                                    │
//!                   │        └──── spawned I/O (create, update, delete, upload) ◄─┼── send/react/...
//!                   └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All state changes happen on the caller's task: either in the synchronous
//! operation methods or inside [`RoomSession::next_update`]. Backend calls run
//! in spawned tasks and report back through a completion queue owned by the
//! activation, so a closed activation never sees a stale result.
//!
//! Activation: `Inactive → Loading → Active → Closed`, `Closed → Loading`.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use huddle_core::{
    Attachment, Message, MessageDraft, MessageId, ParticipantSession, PendingId, Room,
    RoomConfigPatch, RoomId, RoomSettings,
};

use crate::config::SessionConfig;
use crate::config_sync::{LocalWrite, RoomConfigSync};
use crate::error::{SyncError, TransportError};
use crate::reactions::{self, ReactionAction, ReactionUpdate};
use crate::replies::{self, ReplyResolution};
use crate::store::{DeliveryState, MessageStore, Snapshot, StoreChange};
use crate::transport::{
    BlobStore, EventTransport, FileUpload, MessageEvent, MessagePatch, NewMessage, RawChange,
    RoomBackend, RoomConfigEvent, Subscription, Topic, TransportEvent,
};
use crate::wire::{self, PayloadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Inactive,
    Loading,
    Active,
    Closed,
}

impl std::fmt::Display for ActivationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Inactive => "inactive",
            Self::Loading => "loading",
            Self::Active => "active",
            Self::Closed => "closed",
        })
    }
}

/// User-initiated operation that performs I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Send,
    Upload,
    React,
    Delete,
    UpdateSetting,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Send => "send message",
            Self::Upload => "upload file",
            Self::React => "react",
            Self::Delete => "delete message",
            Self::UpdateSetting => "update room setting",
        })
    }
}

/// Transient, user-visible failure of an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub operation: Operation,
    pub error: SyncError,
    /// Optimistic entry affected, for retry or discard
    pub pending: Option<PendingId>,
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to {}: {}", self.operation, self.error)
    }
}

/// What one step of the pipeline did.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// Store mutation; `alert` asks for a notification sound
    Message { change: StoreChange, alert: bool },
    /// Upload finished and the attachment message is now pending
    Sending(PendingId),
    /// Room settings fields changed remotely
    Settings(Vec<RoomConfigPatch>),
    Acknowledged(Operation),
    Failed(Notification),
    /// Malformed transport payload, skipped
    Rejected(PayloadError),
    /// Well-formed change the session could not apply, skipped
    Dropped { topic: Topic, error: SyncError },
    /// The active room was deleted; the session is closed
    RoomRemoved(RoomId),
    /// The transport ended this stream
    StreamEnded(Topic),
}

/// Result of a spawned I/O task.
enum Completion {
    Sent {
        pending: PendingId,
        result: Result<Message, TransportError>,
    },
    Uploaded {
        caption: String,
        reply_to: Option<MessageId>,
        result: Result<Attachment, TransportError>,
    },
    Reacted {
        update: ReactionUpdate,
        result: Result<(), TransportError>,
    },
    Deleted {
        result: Result<(), TransportError>,
    },
    SettingWritten {
        write: LocalWrite,
        result: Result<(), TransportError>,
    },
}

enum Inbound {
    Change(Topic, Option<RawChange>),
    Completion(Completion),
}

/// Resources of one activation. Dropping it releases them all.
struct Live {
    room_id: RoomId,
    participant: ParticipantSession,
    messages: Option<Subscription>,
    config_events: Option<Subscription>,
    config: RoomConfigSync,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    tasks: Vec<JoinHandle<()>>,
    in_flight: usize,
}

impl Live {
    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(tokio::spawn(async move {
            // Receiver gone means the activation closed
            let _ = tx.send(task.await);
        }));
        self.in_flight += 1;
    }

    fn subscription_mut(&mut self, topic: Topic) -> &mut Option<Subscription> {
        match topic {
            Topic::Messages => &mut self.messages,
            Topic::RoomConfig => &mut self.config_events,
        }
    }
}

impl Drop for Live {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

async fn next_change(subscription: &mut Option<Subscription>) -> Option<RawChange> {
    match subscription {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

fn active<'a>(
    live: &'a mut Option<Live>,
    state: ActivationState,
    operation: &'static str,
) -> Result<&'a mut Live, SyncError> {
    match live {
        Some(live) if state == ActivationState::Active => Ok(live),
        _ => Err(SyncError::InvalidState { operation, state }),
    }
}

/// Holds `Loading` for the duration of one activation.
///
/// Dropped without [`finish`](Self::finish), e.g. when the activation future
/// is cancelled, the state falls back to `Closed`.
struct Activation<'a> {
    state: &'a mut ActivationState,
}

impl<'a> Activation<'a> {
    fn begin(state: &'a mut ActivationState) -> Self {
        *state = ActivationState::Loading;
        Self { state }
    }

    fn finish(self, state: ActivationState) {
        *self.state = state;
    }
}

impl Drop for Activation<'_> {
    fn drop(&mut self) {
        if *self.state == ActivationState::Loading {
            log::warn!("Activation abandoned before loading finished");
            *self.state = ActivationState::Closed;
        }
    }
}

/// Subscriptions first, then the fetch, so nothing falls in between.
async fn load<B: RoomBackend, T: EventTransport>(
    backend: &B,
    transport: &T,
    room_id: &RoomId,
) -> Result<(Subscription, Subscription, Room, Vec<Message>), SyncError> {
    let messages = transport.subscribe(Topic::Messages, room_id)?;
    let config_events = transport.subscribe(Topic::RoomConfig, room_id)?;
    let room = backend
        .fetch_room(room_id)
        .await?
        .ok_or_else(|| SyncError::room_not_found(room_id))?;
    let history = backend.fetch_messages(room_id).await?;
    Ok((messages, config_events, room, history))
}

/// Client view of one room at a time.
pub struct RoomSession<B, T> {
    backend: Arc<B>,
    transport: Arc<T>,
    config: SessionConfig,
    state: ActivationState,
    store: MessageStore,
    live: Option<Live>,
}

impl<B: RoomBackend, T: EventTransport> RoomSession<B, T> {
    pub fn new(backend: Arc<B>, transport: Arc<T>, config: SessionConfig) -> Self {
        Self {
            backend,
            transport,
            config,
            state: ActivationState::Inactive,
            store: MessageStore::new(),
            live: None,
        }
    }

    // ─── lifecycle ──────────────────────────────────────────────────

    /// Subscribe, fetch and load `room_id`.
    ///
    /// Without a stored identity the caller must run the join flow first.
    /// Changes delivered while fetching stay queued and are applied by
    /// [`next_update`](Self::next_update).
    pub async fn activate(
        &mut self,
        room_id: RoomId,
        identity: Option<ParticipantSession>,
    ) -> Result<(), SyncError> {
        if matches!(self.state, ActivationState::Loading | ActivationState::Active) {
            return Err(SyncError::InvalidState {
                operation: "activate room",
                state: self.state,
            });
        }
        let participant = identity.ok_or_else(|| SyncError::MissingIdentity(room_id.clone()))?;

        let backend = self.backend.clone();
        let transport = self.transport.clone();
        let activation = Activation::begin(&mut self.state);
        log::info!("Activating room {room_id} as {}", participant.display_name);

        match load(&*backend, &*transport, &room_id).await {
            Ok((messages, config_events, room, history)) => {
                if let Err(e) = self.store.load_initial(room_id.clone(), history) {
                    activation.finish(ActivationState::Closed);
                    return Err(e);
                }
                let (completions_tx, completions_rx) = mpsc::unbounded_channel();
                self.live = Some(Live {
                    room_id: room_id.clone(),
                    participant,
                    messages: Some(messages),
                    config_events: Some(config_events),
                    config: RoomConfigSync::new(room),
                    completions_tx,
                    completions_rx,
                    tasks: Vec::new(),
                    in_flight: 0,
                });
                activation.finish(ActivationState::Active);
                log::info!("Room {room_id} active with {} messages", self.store.len());
                Ok(())
            }
            Err(e) => {
                log::warn!("Activation of room {room_id} failed: {e}");
                activation.finish(ActivationState::Closed);
                Err(e)
            }
        }
    }

    /// Release subscriptions, abort in-flight I/O and discard local state.
    pub fn deactivate(&mut self) {
        let Some(live) = self.live.take() else {
            return;
        };
        let aborted = live.in_flight;
        let room_id = live.room_id.clone();
        drop(live);
        let discarded = self.store.close();
        self.state = ActivationState::Closed;
        log::info!(
            "Deactivated room {room_id} ({aborted} operations aborted, {discarded} unconfirmed messages discarded)"
        );
    }

    /// Fully close the current room before activating the next one.
    pub async fn switch_room(
        &mut self,
        room_id: RoomId,
        identity: Option<ParticipantSession>,
    ) -> Result<(), SyncError> {
        self.deactivate();
        self.activate(room_id, identity).await
    }

    // ─── event pipeline ─────────────────────────────────────────────

    /// Wait for and apply the next change or completion.
    ///
    /// Returns `None` when the session is not active, or when both streams
    /// have ended and no operation is in flight.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        let live = self.live.as_mut()?;
        if live.messages.is_none() && live.config_events.is_none() && live.in_flight == 0 {
            return None;
        }

        let inbound = tokio::select! {
            biased;
            Some(done) = live.completions_rx.recv() => Inbound::Completion(done),
            change = next_change(&mut live.messages) => Inbound::Change(Topic::Messages, change),
            change = next_change(&mut live.config_events) => Inbound::Change(Topic::RoomConfig, change),
        };

        let update = match inbound {
            Inbound::Completion(done) => self.complete(done),
            Inbound::Change(topic, Some(raw)) => match self.apply_raw(topic, raw) {
                Ok(update) => update,
                Err(error) => {
                    log::warn!("Dropped {topic} change: {error}");
                    SessionUpdate::Dropped { topic, error }
                }
            },
            Inbound::Change(topic, None) => {
                if let Some(live) = self.live.as_mut() {
                    log::warn!("{topic} stream of room {} ended", live.room_id);
                    *live.subscription_mut(topic) = None;
                }
                SessionUpdate::StreamEnded(topic)
            }
        };
        Some(update)
    }

    /// Validate and apply a change as delivered by the transport.
    pub fn apply_raw(&mut self, topic: Topic, raw: RawChange) -> Result<SessionUpdate, SyncError> {
        active(&mut self.live, self.state, "apply change")?;
        match wire::decode(topic, raw) {
            Ok(event) => self.apply_event(event),
            Err(e) => {
                log::warn!("Rejected {topic} payload: {e}");
                Ok(SessionUpdate::Rejected(e))
            }
        }
    }

    /// Apply a validated transport event.
    pub fn apply_event(&mut self, event: TransportEvent) -> Result<SessionUpdate, SyncError> {
        let live = active(&mut self.live, self.state, "apply event")?;
        let update = match event {
            TransportEvent::Messages(MessageEvent::Inserted { message, nonce }) => {
                let from_other = !message.is_authored_by(&live.participant.user_id);
                let change = self.store.apply_remote_insert(message, nonce);
                let alert = from_other
                    && matches!(change, StoreChange::Inserted(_))
                    && !live.config.is_muted();
                SessionUpdate::Message { change, alert }
            }
            TransportEvent::Messages(MessageEvent::Updated(message)) => SessionUpdate::Message {
                change: self.store.apply_remote_update(message),
                alert: false,
            },
            TransportEvent::Messages(MessageEvent::Deleted(id)) => SessionUpdate::Message {
                change: self.store.apply_remote_delete(&id),
                alert: false,
            },
            TransportEvent::RoomConfig(RoomConfigEvent::Inserted(room))
            | TransportEvent::RoomConfig(RoomConfigEvent::Updated(room)) => {
                SessionUpdate::Settings(live.config.apply_remote(&room))
            }
            TransportEvent::RoomConfig(RoomConfigEvent::Deleted(room_id)) => {
                if room_id != live.room_id {
                    log::warn!("Delete of room {room_id} ignored by room {}", live.room_id);
                    return Ok(SessionUpdate::Settings(Vec::new()));
                }
                log::warn!("Room {room_id} was deleted");
                self.deactivate();
                SessionUpdate::RoomRemoved(room_id)
            }
        };
        Ok(update)
    }

    fn complete(&mut self, done: Completion) -> SessionUpdate {
        if let Some(live) = self.live.as_mut() {
            live.in_flight = live.in_flight.saturating_sub(1);
        }

        match done {
            Completion::Sent { pending, result } => match result {
                Ok(message) => SessionUpdate::Message {
                    change: self.store.confirm_pending(pending, message),
                    alert: false,
                },
                Err(e) => {
                    self.store.mark_failed(pending);
                    failed(Operation::Send, e.into(), Some(pending))
                }
            },
            Completion::Uploaded {
                caption,
                reply_to,
                result,
            } => match result {
                Ok(attachment) => {
                    let mut draft = MessageDraft::attachment(attachment, caption);
                    draft.reply_to = reply_to;
                    match self.send(draft) {
                        Ok(pending) => SessionUpdate::Sending(pending),
                        Err(e) => failed(Operation::Send, e, None),
                    }
                }
                Err(e) => failed(Operation::Upload, e.into(), None),
            },
            Completion::Reacted { update, result } => match result {
                Ok(()) => SessionUpdate::Acknowledged(Operation::React),
                Err(e) => {
                    let restored = self.store.restore_reactions(
                        &update.message_id,
                        &update.reactions,
                        update.previous,
                    );
                    log::debug!("Reaction on {} failed, restored: {restored}", update.message_id);
                    failed(Operation::React, e.into(), None)
                }
            },
            Completion::Deleted { result } => match result {
                Ok(()) => SessionUpdate::Acknowledged(Operation::Delete),
                Err(e) => failed(Operation::Delete, e.into(), None),
            },
            Completion::SettingWritten { write, result } => match result {
                Ok(()) => SessionUpdate::Acknowledged(Operation::UpdateSetting),
                Err(e) => {
                    if let Some(live) = self.live.as_mut() {
                        live.config.rollback(&write);
                    }
                    failed(Operation::UpdateSetting, e.into(), None)
                }
            },
        }
    }

    // ─── operations ─────────────────────────────────────────────────

    /// Show the draft immediately and create it in the background.
    pub fn send(&mut self, draft: MessageDraft) -> Result<PendingId, SyncError> {
        draft.validate()?;
        let live = active(&mut self.live, self.state, "send message")?;
        let pending_sends = self.store.pending_count();
        if pending_sends >= self.config.max_pending_sends {
            return Err(SyncError::TooManyPending(pending_sends));
        }

        let pending = self.store.append_optimistic(&live.participant, &draft)?;
        spawn_create(live, &self.backend, pending, draft);
        Ok(pending)
    }

    /// Re-send a failed message under the same pending id.
    pub fn retry_send(&mut self, pending: PendingId) -> Result<(), SyncError> {
        let live = active(&mut self.live, self.state, "retry message")?;
        let draft = self
            .store
            .retry_failed(pending)
            .ok_or_else(|| SyncError::message_not_found(&pending.as_message_id()))?;
        spawn_create(live, &self.backend, pending, draft);
        Ok(())
    }

    /// Drop a failed message from the view.
    pub fn discard_failed(&mut self, pending: PendingId) -> Result<Message, SyncError> {
        active(&mut self.live, self.state, "discard message")?;
        let id = pending.as_message_id();
        let is_failed = self
            .store
            .snapshot()
            .entry(&id)
            .is_some_and(|e| e.state() == DeliveryState::Failed);
        if !is_failed {
            return Err(SyncError::message_not_found(&id));
        }
        self.store
            .discard_pending(pending)
            .ok_or_else(|| SyncError::message_not_found(&id))
    }

    /// Upload a file, then send it as an attachment message.
    ///
    /// The message appears once the upload finishes, reported as
    /// [`SessionUpdate::Sending`].
    pub fn send_attachment<F: BlobStore>(
        &mut self,
        blobs: Arc<F>,
        file: FileUpload,
        caption: impl Into<String>,
        reply_to: Option<MessageId>,
    ) -> Result<(), SyncError> {
        let live = active(&mut self.live, self.state, "upload file")?;
        let caption = caption.into();
        let room_id = live.room_id.clone();
        let name = file.name.clone();
        let mime_type = file.mime_type.clone();
        let size_bytes = file.bytes.len() as u64;

        live.spawn(async move {
            let result = blobs.upload(&room_id, file).await.map(|url| Attachment {
                url,
                name,
                mime_type,
                size_bytes,
            });
            Completion::Uploaded {
                caption,
                reply_to,
                result,
            }
        });
        Ok(())
    }

    /// Toggle a reaction locally and persist it in the background.
    pub fn react(&mut self, id: &MessageId, action: ReactionAction) -> Result<ReactionUpdate, SyncError> {
        let live = active(&mut self.live, self.state, "react")?;
        let update = reactions::compute(&self.store.snapshot(), id, &live.participant.user_id, action)?;
        self.store.apply_reactions(id, update.reactions.clone())?;

        let backend = self.backend.clone();
        let task_update = update.clone();
        live.spawn(async move {
            let patch = MessagePatch {
                reactions: task_update.reactions.clone(),
            };
            let result = backend.update_message(&task_update.message_id, patch).await;
            Completion::Reacted {
                update: task_update,
                result,
            }
        });
        Ok(update)
    }

    /// Ask the backend to delete one of our own messages.
    ///
    /// The entry stays visible until the delete event arrives.
    pub fn delete(&mut self, id: &MessageId) -> Result<(), SyncError> {
        let live = active(&mut self.live, self.state, "delete message")?;
        let snapshot = self.store.snapshot();
        let message = snapshot
            .entry(id)
            .filter(|entry| entry.pending_id().is_none())
            .map(|entry| entry.message())
            .ok_or_else(|| SyncError::message_not_found(id))?;
        if !message.is_authored_by(&live.participant.user_id) {
            return Err(SyncError::NotAuthor(id.clone()));
        }

        let backend = self.backend.clone();
        let id = id.clone();
        live.spawn(async move {
            let result = backend.delete_message(&id).await;
            Completion::Deleted { result }
        });
        Ok(())
    }

    /// Change one room setting for everyone, optimistically.
    pub fn update_setting(&mut self, patch: RoomConfigPatch) -> Result<(), SyncError> {
        let live = active(&mut self.live, self.state, "update room setting")?;
        let write = live.config.apply_local(patch);

        let backend = self.backend.clone();
        let room_id = live.room_id.clone();
        live.spawn(async move {
            let result = backend.update_room(&room_id, write.patch.clone()).await;
            Completion::SettingWritten { write, result }
        });
        Ok(())
    }

    // ─── accessors ──────────────────────────────────────────────────

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn room(&self) -> Option<&Room> {
        self.live.as_ref().map(|live| live.config.room())
    }

    pub fn settings(&self) -> Option<&RoomSettings> {
        self.live.as_ref().map(|live| live.config.settings())
    }

    pub fn participant(&self) -> Option<&ParticipantSession> {
        self.live.as_ref().map(|live| &live.participant)
    }

    /// Operations spawned and not yet completed.
    pub fn in_flight(&self) -> usize {
        self.live.as_ref().map_or(0, |live| live.in_flight)
    }

    pub fn resolve_reply(&self, message: &Message) -> ReplyResolution {
        replies::resolve(message, &self.store.snapshot(), self.config.preview_chars)
    }
}

fn spawn_create<B: RoomBackend>(live: &mut Live, backend: &Arc<B>, pending: PendingId, draft: MessageDraft) {
    let backend = backend.clone();
    let request = NewMessage {
        room_id: live.room_id.clone(),
        author: live.participant.clone(),
        draft,
        nonce: pending,
    };
    live.spawn(async move {
        let result = backend.create_message(request).await;
        Completion::Sent { pending, result }
    });
}

fn failed(operation: Operation, error: SyncError, pending: Option<PendingId>) -> SessionUpdate {
    log::warn!("Failed to {operation}: {error}");
    SessionUpdate::Failed(Notification {
        operation,
        error,
        pending,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{LocalPlatform, PlatformCall};
    use huddle_core::ParticipantId;

    type Session = RoomSession<LocalPlatform, crate::local::LocalBus>;

    fn session(platform: &LocalPlatform) -> Session {
        RoomSession::new(
            Arc::new(platform.clone()),
            Arc::new(platform.bus().clone()),
            SessionConfig::for_testing(),
        )
    }

    fn alice() -> ParticipantSession {
        ParticipantSession::new(ParticipantId::from("u-alice"), "Alice")
    }

    #[tokio::test]
    async fn test_activate_requires_identity() {
        let platform = LocalPlatform::new();
        let room = platform.create_room("general", "pw");
        let mut s = session(&platform);

        let err = s.activate(room.id.clone(), None).await.unwrap_err();
        assert_eq!(err, SyncError::MissingIdentity(room.id));
        assert_eq!(s.state(), ActivationState::Inactive);
    }

    #[tokio::test]
    async fn test_activate_missing_room_closes() {
        let platform = LocalPlatform::new();
        let mut s = session(&platform);

        let err = s.activate(RoomId::from("r-404"), Some(alice())).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
        assert_eq!(s.state(), ActivationState::Closed);
        // Subscriptions were released on the error path
        assert_eq!(platform.bus().stats().active_subscriptions, 0);
    }

    #[tokio::test]
    async fn test_activate_twice_rejected() {
        let platform = LocalPlatform::new();
        let room = platform.create_room("general", "pw");
        let mut s = session(&platform);
        s.activate(room.id.clone(), Some(alice())).await.unwrap();

        let err = s.activate(room.id, Some(alice())).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::InvalidState { state: ActivationState::Active, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_activation_can_be_retried() {
        let platform = LocalPlatform::new().with_latency(std::time::Duration::from_millis(200));
        let room = platform.create_room("general", "pw");
        let mut s = session(&platform);

        let cancelled = tokio::time::timeout(
            std::time::Duration::from_millis(10),
            s.activate(room.id.clone(), Some(alice())),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(s.state(), ActivationState::Closed);
        assert_eq!(platform.bus().stats().active_subscriptions, 0);

        s.deactivate();
        s.activate(room.id, Some(alice())).await.unwrap();
        assert_eq!(s.state(), ActivationState::Active);
    }

    #[tokio::test]
    async fn test_delete_canonical_id_with_pending_prefix() {
        let platform = LocalPlatform::new();
        let room = platform.create_room("general", "pw");
        let seeded = Message {
            id: MessageId::from("tmp-server-1"),
            room_id: room.id.clone(),
            author_id: alice().user_id,
            author_name: "Alice".into(),
            body: "mine".into(),
            kind: huddle_core::MessageKind::Text,
            attachment: None,
            reply_to: None,
            reactions: huddle_core::Reactions::default(),
            created_at: chrono::Utc::now(),
        };
        platform.seed_message(seeded.clone());
        let mut s = session(&platform);
        s.activate(room.id.clone(), Some(alice())).await.unwrap();

        s.delete(&seeded.id).unwrap();
        let pending = s.send(MessageDraft::text("later")).unwrap();
        assert!(matches!(
            s.delete(&pending.as_message_id()),
            Err(SyncError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_operations_require_active() {
        let platform = LocalPlatform::new();
        let mut s = session(&platform);
        assert!(matches!(
            s.send(MessageDraft::text("hi")),
            Err(SyncError::InvalidState { state: ActivationState::Inactive, .. })
        ));
        assert!(s.next_update().await.is_none());
    }

    #[tokio::test]
    async fn test_send_failure_marks_failed_then_retry() {
        let platform = LocalPlatform::new();
        let room = platform.create_room("general", "pw");
        let mut s = session(&platform);
        s.activate(room.id.clone(), Some(alice())).await.unwrap();

        platform.fail_next(PlatformCall::CreateMessage, TransportError::Network("reset".into()));
        let pending = s.send(MessageDraft::text("hello")).unwrap();

        match s.next_update().await.unwrap() {
            SessionUpdate::Failed(n) => {
                assert_eq!(n.operation, Operation::Send);
                assert_eq!(n.pending, Some(pending));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(s.snapshot().entries()[0].state(), DeliveryState::Failed);

        s.retry_send(pending).unwrap();
        // Completion and echo, in either order, leave one confirmed entry
        s.next_update().await.unwrap();
        s.next_update().await.unwrap();
        let snapshot = s.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.entries()[0].state(), DeliveryState::Confirmed);
        assert_eq!(s.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_empty_draft_rejected_before_io() {
        let platform = LocalPlatform::new();
        let room = platform.create_room("general", "pw");
        let mut s = session(&platform);
        s.activate(room.id, Some(alice())).await.unwrap();

        assert!(matches!(s.send(MessageDraft::text("  ")), Err(SyncError::Model(_))));
        assert_eq!(s.in_flight(), 0);
        assert!(s.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_pending_window_bounded() {
        let platform = LocalPlatform::new();
        let room = platform.create_room("general", "pw");
        let mut s = session(&platform);
        s.activate(room.id, Some(alice())).await.unwrap();

        for i in 0..4 {
            s.send(MessageDraft::text(format!("#{i}"))).unwrap();
        }
        assert_eq!(s.send(MessageDraft::text("one more")), Err(SyncError::TooManyPending(4)));
    }

    #[tokio::test]
    async fn test_setting_failure_rolls_back() {
        let platform = LocalPlatform::new();
        let room = platform.create_room("general", "pw");
        let mut s = session(&platform);
        s.activate(room.id, Some(alice())).await.unwrap();

        platform.fail_next(PlatformCall::UpdateRoom, TransportError::Unauthorized("read-only".into()));
        s.update_setting(RoomConfigPatch::Muted(true)).unwrap();
        assert!(s.settings().unwrap().is_muted);

        match s.next_update().await.unwrap() {
            SessionUpdate::Failed(n) => assert_eq!(n.operation, Operation::UpdateSetting),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!s.settings().unwrap().is_muted);
    }

    #[tokio::test]
    async fn test_deactivate_releases_everything() {
        let platform = LocalPlatform::new();
        let room = platform.create_room("general", "pw");
        let mut s = session(&platform);
        s.activate(room.id.clone(), Some(alice())).await.unwrap();
        s.send(MessageDraft::text("never confirmed here")).unwrap();
        assert_eq!(platform.bus().stats().active_subscriptions, 2);

        s.deactivate();
        assert_eq!(s.state(), ActivationState::Closed);
        assert!(s.snapshot().is_empty());
        assert_eq!(platform.bus().stats().active_subscriptions, 0);
        assert!(s.next_update().await.is_none());

        // Closed → Loading → Active again
        s.activate(room.id, Some(alice())).await.unwrap();
        assert_eq!(s.state(), ActivationState::Active);
    }

    #[tokio::test]
    async fn test_malformed_payload_rejected() {
        let platform = LocalPlatform::new();
        let room = platform.create_room("general", "pw");
        let mut s = session(&platform);
        s.activate(room.id.clone(), Some(alice())).await.unwrap();

        platform.publish_raw(Topic::Messages, &room.id, RawChange::insert(serde_json::json!({"id": 7})));
        assert!(matches!(s.next_update().await, Some(SessionUpdate::Rejected(_))));
        assert!(s.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_unapplied_change_keeps_pipeline_running() {
        let platform = LocalPlatform::new();
        let room = platform.create_room("general", "pw");
        let mut s = session(&platform);
        s.activate(room.id.clone(), Some(alice())).await.unwrap();

        s.state = ActivationState::Loading;
        platform.publish_raw(Topic::Messages, &room.id, RawChange::insert(serde_json::json!({"id": 7})));
        assert!(matches!(
            s.next_update().await,
            Some(SessionUpdate::Dropped { topic: Topic::Messages, error: SyncError::InvalidState { .. } })
        ));
        assert!(s.snapshot().is_empty());
    }
}
