//! Ordered, deduplicated message log of the active room.
//!
//! ```text
//!  remote insert ──┐
//!  remote update ──┤                ┌────────────────────────────────────┐
//!  remote delete ──┼──► MessageStore│ Arc<Vec<StoreEntry>>               │──► snapshot()
//!  optimistic ─────┤                │ sorted by (created_at, seq)        │    (O(1) clone,
//!  confirm ────────┘                └────────────────────────────────────┘     copy-on-write)
//! ```
//!
//! Ordering key is `created_at` ascending with the per-store arrival sequence
//! number as tie-break, so equal timestamps keep a stable order. Optimistic
//! entries carry a [`PendingId`] until reconciled; reconciliation rewrites the
//! identity of that one entry and never matches on content.
//!
//! The store performs no I/O.

use chrono::Utc;
use std::sync::Arc;

use huddle_core::{
    Message, MessageDraft, MessageId, ParticipantSession, PendingId, Reactions, RoomId,
};

use crate::error::SyncError;
use crate::session::ActivationState;

/// Delivery state of a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Known to the authoritative store
    Confirmed,
    /// Optimistic, awaiting the create result or its echo
    Pending,
    /// Create call failed; kept for retry or discard
    Failed,
}

/// One message plus its local bookkeeping.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    seq: u64,
    pending: Option<PendingId>,
    state: DeliveryState,
    message: Arc<Message>,
}

impl StoreEntry {
    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn pending_id(&self) -> Option<PendingId> {
        self.pending
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    /// Arrival sequence number within the store.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    fn key(&self) -> (chrono::DateTime<Utc>, u64) {
        (self.message.created_at, self.seq)
    }
}

/// What a store mutation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// A new entry became visible
    Inserted(MessageId),
    /// An optimistic entry took its canonical identity
    Reconciled { pending: PendingId, id: MessageId },
    /// An existing entry was overwritten
    Replaced(MessageId),
    /// An entry was removed
    Removed(MessageId),
    /// Nothing changed
    Ignored,
}

/// Read-only view of the log at one point in time.
///
/// Later store mutations never affect an existing snapshot. Iteration is
/// time-ordered and can be restarted any number of times.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: Arc<Vec<StoreEntry>>,
}

impl Snapshot {
    pub fn iter(&self) -> impl Iterator<Item = &Message> + '_ {
        self.entries.iter().map(|e| e.message())
    }

    pub fn entries(&self) -> &[StoreEntry] {
        &self.entries
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.entry(id).map(|e| e.message())
    }

    pub fn entry(&self, id: &MessageId) -> Option<&StoreEntry> {
        self.entries.iter().find(|e| &e.message.id == id)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.entry(id).is_some()
    }

    pub fn ids(&self) -> Vec<MessageId> {
        self.iter().map(|m| m.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Message;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, StoreEntry>, fn(&'a StoreEntry) -> &'a Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter().map(StoreEntry::message as fn(&'a StoreEntry) -> &'a Message)
    }
}

/// Message log of exactly one active room.
#[derive(Debug, Default)]
pub struct MessageStore {
    room: Option<RoomId>,
    entries: Arc<Vec<StoreEntry>>,
    next_seq: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.room.is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries not yet confirmed (pending or failed).
    pub fn unconfirmed(&self) -> usize {
        self.entries.iter().filter(|e| e.pending.is_some()).count()
    }

    /// Number of entries still awaiting confirmation.
    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state == DeliveryState::Pending)
            .count()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            entries: self.entries.clone(),
        }
    }

    /// Replace the content with the initial fetch of `room`.
    ///
    /// Fails while another room is active. Duplicate ids collapse to the last
    /// occurrence; rows of other rooms are dropped.
    pub fn load_initial(&mut self, room: RoomId, messages: Vec<Message>) -> Result<(), SyncError> {
        if let Some(current) = &self.room {
            return Err(SyncError::StoreOccupied(current.clone()));
        }

        let mut entries: Vec<StoreEntry> = Vec::with_capacity(messages.len());
        for message in messages {
            if message.room_id != room {
                log::warn!("Dropping message {} of room {} from load of {room}", message.id, message.room_id);
                continue;
            }
            match entries.iter().position(|e| e.message.id == message.id) {
                Some(idx) => entries[idx].message = Arc::new(message),
                None => {
                    let seq = self.bump_seq();
                    entries.push(StoreEntry {
                        seq,
                        pending: None,
                        state: DeliveryState::Confirmed,
                        message: Arc::new(message),
                    });
                }
            }
        }
        entries.sort_by_key(StoreEntry::key);

        log::info!("Loaded {} messages for room {room}", entries.len());
        self.entries = Arc::new(entries);
        self.room = Some(room);
        Ok(())
    }

    /// Apply an insert event. Idempotent per message id.
    ///
    /// `nonce` is the pending id echoed by the authoritative store; when it
    /// names a local optimistic entry, that entry takes the canonical identity.
    pub fn apply_remote_insert(&mut self, message: Message, nonce: Option<PendingId>) -> StoreChange {
        if !self.accepts(&message) {
            return StoreChange::Ignored;
        }
        if let Some(idx) = self.position(&message.id) {
            let id = message.id.clone();
            self.overwrite(idx, message);
            return StoreChange::Replaced(id);
        }
        if let Some(pending) = nonce {
            if let Some(idx) = self.pending_position(pending) {
                let id = message.id.clone();
                self.confirm_at(idx, message);
                log::debug!("Reconciled {pending} as {id} from insert echo");
                return StoreChange::Reconciled { pending, id };
            }
        }
        let id = message.id.clone();
        self.insert_entry(message, None, DeliveryState::Confirmed);
        StoreChange::Inserted(id)
    }

    /// Apply an update event. Unknown ids are a tolerated race.
    pub fn apply_remote_update(&mut self, message: Message) -> StoreChange {
        if !self.accepts(&message) {
            return StoreChange::Ignored;
        }
        match self.position(&message.id) {
            Some(idx) => {
                let id = message.id.clone();
                self.overwrite(idx, message);
                StoreChange::Replaced(id)
            }
            None => {
                log::warn!("Update for unknown message {} ignored", message.id);
                StoreChange::Ignored
            }
        }
    }

    /// Apply a delete event. Idempotent.
    pub fn apply_remote_delete(&mut self, id: &MessageId) -> StoreChange {
        match self.position(id) {
            Some(idx) => {
                Arc::make_mut(&mut self.entries).remove(idx);
                StoreChange::Removed(id.clone())
            }
            None => {
                log::debug!("Delete for absent message {id} ignored");
                StoreChange::Ignored
            }
        }
    }

    /// Show a locally authored message immediately, before confirmation.
    pub fn append_optimistic(
        &mut self,
        author: &ParticipantSession,
        draft: &MessageDraft,
    ) -> Result<PendingId, SyncError> {
        let Some(room) = self.room.clone() else {
            return Err(SyncError::InvalidState {
                operation: "append message",
                state: ActivationState::Inactive,
            });
        };
        let pending = PendingId::generate();
        let message = Message::from_draft(pending.as_message_id(), room, author, draft, Utc::now());
        self.insert_entry(message, Some(pending), DeliveryState::Pending);
        Ok(pending)
    }

    /// Rewrite `pending → canonical` once the create call has returned.
    ///
    /// If the echo already inserted the canonical id, the optimistic entry is
    /// dropped in favour of it.
    pub fn confirm_pending(&mut self, pending: PendingId, message: Message) -> StoreChange {
        if !self.accepts(&message) {
            return StoreChange::Ignored;
        }
        let id = message.id.clone();
        let pending_idx = self.pending_position(pending);
        match (self.position(&id), pending_idx) {
            (Some(_), Some(p_idx)) => {
                Arc::make_mut(&mut self.entries).remove(p_idx);
                if let Some(idx) = self.position(&id) {
                    self.overwrite(idx, message);
                }
                StoreChange::Reconciled { pending, id }
            }
            (Some(idx), None) => {
                self.overwrite(idx, message);
                StoreChange::Replaced(id)
            }
            (None, Some(p_idx)) => {
                self.confirm_at(p_idx, message);
                StoreChange::Reconciled { pending, id }
            }
            (None, None) => {
                // Discarded locally but created remotely: the row exists, so show it.
                self.insert_entry(message, None, DeliveryState::Confirmed);
                StoreChange::Inserted(id)
            }
        }
    }

    /// Mark a pending entry as failed. Returns whether it was pending.
    pub fn mark_failed(&mut self, pending: PendingId) -> bool {
        match self.pending_position(pending) {
            Some(idx) => {
                Arc::make_mut(&mut self.entries)[idx].state = DeliveryState::Failed;
                true
            }
            None => false,
        }
    }

    /// Put a failed entry back to pending and return its draft for re-sending.
    pub fn retry_failed(&mut self, pending: PendingId) -> Option<MessageDraft> {
        let idx = self.pending_position(pending)?;
        if self.entries[idx].state != DeliveryState::Failed {
            return None;
        }
        let entries = Arc::make_mut(&mut self.entries);
        entries[idx].state = DeliveryState::Pending;
        let message = entries[idx].message();
        Some(MessageDraft {
            body: message.body.clone(),
            kind: message.kind,
            attachment: message.attachment.clone(),
            reply_to: message.reply_to.clone(),
        })
    }

    /// Roll back an optimistic entry.
    pub fn discard_pending(&mut self, pending: PendingId) -> Option<Message> {
        let idx = self.pending_position(pending)?;
        let entry = Arc::make_mut(&mut self.entries).remove(idx);
        Some(Arc::unwrap_or_clone(entry.message))
    }

    /// Overwrite the reaction sets of `id`, returning the previous ones.
    pub fn apply_reactions(&mut self, id: &MessageId, reactions: Reactions) -> Result<Reactions, SyncError> {
        let idx = self.position(id).ok_or_else(|| SyncError::message_not_found(id))?;
        let entry = &mut Arc::make_mut(&mut self.entries)[idx];
        let message = Arc::make_mut(&mut entry.message);
        Ok(std::mem::replace(&mut message.reactions, reactions))
    }

    /// Restore `previous` only if `id` still holds `expected`.
    pub fn restore_reactions(&mut self, id: &MessageId, expected: &Reactions, previous: Reactions) -> bool {
        match self.position(id) {
            Some(idx) if &self.entries[idx].message.reactions == expected => {
                let entry = &mut Arc::make_mut(&mut self.entries)[idx];
                Arc::make_mut(&mut entry.message).reactions = previous;
                true
            }
            _ => false,
        }
    }

    /// Drop all state, optimistic entries included. Returns how many of those were discarded.
    pub fn close(&mut self) -> usize {
        let discarded = self.unconfirmed();
        if let Some(room) = self.room.take() {
            log::info!("Closed message store of room {room} ({discarded} unconfirmed discarded)");
        }
        self.entries = Arc::new(Vec::new());
        discarded
    }

    // ── internals ────────────────────────────────────────────────

    fn accepts(&self, message: &Message) -> bool {
        match &self.room {
            Some(room) if *room == message.room_id => true,
            Some(room) => {
                log::warn!("Message {} of room {} ignored by store of {room}", message.id, message.room_id);
                false
            }
            None => {
                log::debug!("Message {} ignored by inactive store", message.id);
                false
            }
        }
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn position(&self, id: &MessageId) -> Option<usize> {
        self.entries.iter().position(|e| &e.message.id == id)
    }

    fn pending_position(&self, pending: PendingId) -> Option<usize> {
        self.entries.iter().position(|e| e.pending == Some(pending))
    }

    fn insert_entry(&mut self, message: Message, pending: Option<PendingId>, state: DeliveryState) {
        let seq = self.bump_seq();
        let entry = StoreEntry {
            seq,
            pending,
            state,
            message: Arc::new(message),
        };
        self.place(entry);
    }

    /// Insert keeping `(created_at, seq)` order.
    fn place(&mut self, entry: StoreEntry) {
        let key = entry.key();
        let entries = Arc::make_mut(&mut self.entries);
        let idx = entries.partition_point(|e| e.key() < key);
        entries.insert(idx, entry);
    }

    /// Replace the message at `idx`, keeping its sequence number.
    fn overwrite(&mut self, idx: usize, message: Message) {
        let entries = Arc::make_mut(&mut self.entries);
        let mut entry = entries.remove(idx);
        entry.message = Arc::new(message);
        entry.state = DeliveryState::Confirmed;
        self.place(entry);
    }

    fn confirm_at(&mut self, idx: usize, message: Message) {
        let entries = Arc::make_mut(&mut self.entries);
        let mut entry = entries.remove(idx);
        entry.pending = None;
        entry.state = DeliveryState::Confirmed;
        entry.message = Arc::new(message);
        self.place(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone};
    use huddle_core::ParticipantId;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn msg(id: &str, at: DateTime<Utc>) -> Message {
        Message {
            id: MessageId::from(id),
            room_id: RoomId::from("general"),
            author_id: ParticipantId::from("u-bob"),
            author_name: "Bob".into(),
            body: format!("body of {id}"),
            kind: Default::default(),
            attachment: None,
            reply_to: None,
            reactions: Reactions::default(),
            created_at: at,
        }
    }

    fn alice() -> ParticipantSession {
        ParticipantSession::new(ParticipantId::from("u-alice"), "Alice")
    }

    fn active_store(messages: Vec<Message>) -> MessageStore {
        let mut store = MessageStore::new();
        store.load_initial(RoomId::from("general"), messages).unwrap();
        store
    }

    fn ids(store: &MessageStore) -> Vec<String> {
        store.snapshot().iter().map(|m| m.id.to_string()).collect()
    }

    #[test]
    fn test_load_initial_sorts_and_dedupes() {
        let store = active_store(vec![
            msg("b", t(2)),
            msg("a", t(1)),
            msg("b", t(2)),
        ]);
        assert_eq!(ids(&store), vec!["a", "b"]);
    }

    #[test]
    fn test_load_initial_drops_foreign_rows() {
        let mut foreign = msg("x", t(1));
        foreign.room_id = RoomId::from("random");
        let store = active_store(vec![foreign, msg("a", t(2))]);
        assert_eq!(ids(&store), vec!["a"]);
    }

    #[test]
    fn test_load_initial_while_occupied() {
        let mut store = active_store(vec![]);
        let err = store.load_initial(RoomId::from("random"), vec![]).unwrap_err();
        assert_eq!(err, SyncError::StoreOccupied(RoomId::from("general")));

        store.close();
        assert!(store.load_initial(RoomId::from("general"), vec![]).is_ok());
    }

    #[test]
    fn test_insert_twice_is_idempotent() {
        let mut store = active_store(vec![]);
        let first = store.apply_remote_insert(msg("m-1", t(1)), None);
        let second = store.apply_remote_insert(msg("m-1", t(1)), None);

        assert_eq!(first, StoreChange::Inserted(MessageId::from("m-1")));
        assert_eq!(second, StoreChange::Replaced(MessageId::from("m-1")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_ordering_independent_of_arrival() {
        let mut store = active_store(vec![]);
        store.apply_remote_insert(msg("late", t(5)), None);
        store.apply_remote_insert(msg("early", t(1)), None);
        store.apply_remote_insert(msg("middle", t(3)), None);

        assert_eq!(ids(&store), vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_equal_timestamps_keep_arrival_order() {
        let mut store = active_store(vec![]);
        store.apply_remote_insert(msg("first", t(1)), None);
        store.apply_remote_insert(msg("second", t(1)), None);
        store.apply_remote_insert(msg("third", t(1)), None);

        assert_eq!(ids(&store), vec!["first", "second", "third"]);
        // Re-applying an update keeps the original slot
        store.apply_remote_update(msg("first", t(1)));
        assert_eq!(ids(&store), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_join_and_send_scenario() {
        let mut store = active_store(vec![msg("A", t(1)), msg("B", t(2))]);
        let pending = store
            .append_optimistic(&alice(), &MessageDraft::text("C"))
            .unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.snapshot().entries()[2].state(), DeliveryState::Pending);

        let mut echo = msg("m-42", t(3));
        echo.author_id = ParticipantId::from("u-alice");
        echo.body = "C".into();
        let change = store.apply_remote_insert(echo, Some(pending));

        assert_eq!(
            change,
            StoreChange::Reconciled { pending, id: MessageId::from("m-42") }
        );
        assert_eq!(ids(&store), vec!["A", "B", "m-42"]);
        assert_eq!(store.unconfirmed(), 0);
    }

    #[test]
    fn test_confirm_then_echo_single_entry() {
        let mut store = active_store(vec![]);
        let pending = store.append_optimistic(&alice(), &MessageDraft::text("hi")).unwrap();

        let canonical = msg("m-9", t(10));
        let change = store.confirm_pending(pending, canonical.clone());
        assert!(matches!(change, StoreChange::Reconciled { .. }));

        let change = store.apply_remote_insert(canonical, Some(pending));
        assert_eq!(change, StoreChange::Replaced(MessageId::from("m-9")));
        assert_eq!(ids(&store), vec!["m-9"]);
    }

    #[test]
    fn test_echo_without_nonce_then_confirm_single_entry() {
        let mut store = active_store(vec![]);
        let pending = store.append_optimistic(&alice(), &MessageDraft::text("hi")).unwrap();

        // Echo arrives first and cannot be linked yet
        store.apply_remote_insert(msg("m-9", t(10)), None);
        assert_eq!(store.len(), 2);

        // The create result links it: the optimistic entry folds away
        let change = store.confirm_pending(pending, msg("m-9", t(10)));
        assert_eq!(
            change,
            StoreChange::Reconciled { pending, id: MessageId::from("m-9") }
        );
        assert_eq!(ids(&store), vec!["m-9"]);
    }

    #[test]
    fn test_content_never_fuzzy_matched() {
        let mut store = active_store(vec![]);
        store.append_optimistic(&alice(), &MessageDraft::text("same text")).unwrap();

        let mut other = msg("m-1", Utc::now() + Duration::seconds(1));
        other.body = "same text".into();
        other.author_id = ParticipantId::from("u-alice");
        store.apply_remote_insert(other, None);

        assert_eq!(store.len(), 2);
        assert_eq!(store.unconfirmed(), 1);
    }

    #[test]
    fn test_reconcile_repositions_by_server_time() {
        let mut store = active_store(vec![]);
        let pending = store.append_optimistic(&alice(), &MessageDraft::text("mine")).unwrap();
        let far_future = Utc::now() + Duration::days(1);
        store.apply_remote_insert(msg("later", far_future), None);

        // Server stamped our message after "later"
        store.confirm_pending(pending, msg("m-mine", far_future + Duration::seconds(1)));
        assert_eq!(ids(&store), vec!["later", "m-mine"]);
    }

    #[test]
    fn test_update_unknown_is_ignored() {
        let mut store = active_store(vec![]);
        assert_eq!(store.apply_remote_update(msg("ghost", t(1))), StoreChange::Ignored);
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_idempotent() {
        let mut store = active_store(vec![msg("m-5", t(1))]);
        assert_eq!(
            store.apply_remote_delete(&MessageId::from("m-5")),
            StoreChange::Removed(MessageId::from("m-5"))
        );
        assert_eq!(store.apply_remote_delete(&MessageId::from("m-5")), StoreChange::Ignored);
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_race_update_then_delete() {
        let mut store = active_store(vec![msg("m-5", t(1))]);

        let mut liked = msg("m-5", t(1));
        liked.reactions = Reactions::new(
            [ParticipantId::from("u-alice")].into_iter().collect(),
            Default::default(),
        );
        assert_eq!(store.apply_remote_update(liked), StoreChange::Replaced(MessageId::from("m-5")));
        store.apply_remote_delete(&MessageId::from("m-5"));
        // A late duplicate of the update is tolerated
        assert_eq!(store.apply_remote_update(msg("m-5", t(1))), StoreChange::Ignored);

        assert!(!store.snapshot().contains(&MessageId::from("m-5")));
    }

    #[test]
    fn test_snapshot_isolated_from_mutation() {
        let mut store = active_store(vec![msg("a", t(1))]);
        let before = store.snapshot();

        store.apply_remote_insert(msg("b", t(2)), None);
        store.apply_remote_delete(&MessageId::from("a"));

        assert_eq!(before.ids(), vec![MessageId::from("a")]);
        // Restartable
        assert_eq!(before.iter().count(), 1);
        assert_eq!((&before).into_iter().count(), 1);
        assert_eq!(store.snapshot().ids(), vec![MessageId::from("b")]);
    }

    #[test]
    fn test_failed_send_retry_and_discard() {
        let mut store = active_store(vec![]);
        let draft = MessageDraft::text("flaky");
        let pending = store.append_optimistic(&alice(), &draft).unwrap();

        assert!(store.retry_failed(pending).is_none()); // still pending, not failed
        assert!(store.mark_failed(pending));
        assert_eq!(store.snapshot().entries()[0].state(), DeliveryState::Failed);

        assert_eq!(store.retry_failed(pending), Some(draft));
        assert_eq!(store.snapshot().entries()[0].state(), DeliveryState::Pending);

        let dropped = store.discard_pending(pending).unwrap();
        assert_eq!(dropped.body, "flaky");
        assert!(store.is_empty());
    }

    #[test]
    fn test_append_requires_active_room() {
        let mut store = MessageStore::new();
        assert!(store.append_optimistic(&alice(), &MessageDraft::text("x")).is_err());
    }

    #[test]
    fn test_foreign_room_events_ignored() {
        let mut store = active_store(vec![]);
        let mut foreign = msg("m-1", t(1));
        foreign.room_id = RoomId::from("random");
        assert_eq!(store.apply_remote_insert(foreign, None), StoreChange::Ignored);
        assert!(store.is_empty());
    }

    #[test]
    fn test_close_discards_optimistic_state() {
        let mut store = active_store(vec![msg("a", t(1))]);
        store.append_optimistic(&alice(), &MessageDraft::text("x")).unwrap();

        assert_eq!(store.close(), 1);
        assert!(store.is_empty());
        assert!(!store.is_active());
        assert_eq!(store.apply_remote_insert(msg("b", t(2)), None), StoreChange::Ignored);
    }

    #[test]
    fn test_reactions_apply_and_restore() {
        let mut store = active_store(vec![msg("m-1", t(1))]);
        let id = MessageId::from("m-1");
        let liked = Reactions::new(
            [ParticipantId::from("u-alice")].into_iter().collect(),
            Default::default(),
        );

        let previous = store.apply_reactions(&id, liked.clone()).unwrap();
        assert_eq!(previous, Reactions::default());
        assert!(store.restore_reactions(&id, &liked, previous.clone()));
        assert_eq!(store.snapshot().get(&id).unwrap().reactions, previous);

        // Superseded: no restore
        assert!(!store.restore_reactions(&id, &liked, Reactions::default()));
        assert!(store.apply_reactions(&MessageId::from("nope"), liked).is_err());
    }
}
