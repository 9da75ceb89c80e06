//! Like/dislike toggling.
//!
//! A participant is always in at most one of the two sets of a message.
//! Toggling is pure; the session applies the result optimistically and
//! persists it in the background.

use std::collections::BTreeSet;

use huddle_core::{MessageId, ParticipantId, Reactions};

use crate::error::SyncError;
use crate::store::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionAction {
    Like,
    Dislike,
}

/// Sets after `participant` toggles `action` on `current`.
///
/// Toggling the same action twice removes it; switching moves the participant
/// to the other set.
pub fn toggle(current: &Reactions, participant: &ParticipantId, action: ReactionAction) -> Reactions {
    let mut liked: BTreeSet<ParticipantId> = current.liked_by().clone();
    let mut disliked: BTreeSet<ParticipantId> = current.disliked_by().clone();

    let (target, other) = match action {
        ReactionAction::Like => (&mut liked, &mut disliked),
        ReactionAction::Dislike => (&mut disliked, &mut liked),
    };
    if !target.remove(participant) {
        other.remove(participant);
        target.insert(participant.clone());
    }

    Reactions::new(liked, disliked)
}

/// Optimistic reaction change of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionUpdate {
    pub message_id: MessageId,
    pub previous: Reactions,
    pub reactions: Reactions,
}

/// Compute the toggle against the current snapshot.
///
/// Pending messages have no canonical id to persist against and report
/// [`SyncError::NotFound`].
pub fn compute(
    snapshot: &Snapshot,
    message_id: &MessageId,
    participant: &ParticipantId,
    action: ReactionAction,
) -> Result<ReactionUpdate, SyncError> {
    let message = snapshot
        .entry(message_id)
        .filter(|entry| entry.pending_id().is_none())
        .map(|entry| entry.message())
        .ok_or_else(|| SyncError::message_not_found(message_id))?;

    Ok(ReactionUpdate {
        message_id: message_id.clone(),
        previous: message.reactions.clone(),
        reactions: toggle(&message.reactions, participant, action),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn me() -> ParticipantId {
        ParticipantId::from("u-me")
    }

    #[test]
    fn test_like_toggles_off() {
        let liked = toggle(&Reactions::default(), &me(), ReactionAction::Like);
        assert!(liked.has_liked(&me()));

        let cleared = toggle(&liked, &me(), ReactionAction::Like);
        assert_eq!(cleared, Reactions::default());
    }

    #[test]
    fn test_like_dislike_like() {
        let r = toggle(&Reactions::default(), &me(), ReactionAction::Like);
        let r = toggle(&r, &me(), ReactionAction::Dislike);
        assert!(r.has_disliked(&me()));
        assert!(!r.has_liked(&me()));

        let r = toggle(&r, &me(), ReactionAction::Like);
        assert!(r.has_liked(&me()));
        assert!(!r.has_disliked(&me()));
        assert!(r.liked_by().is_disjoint(r.disliked_by()));
    }

    #[test]
    fn test_other_participants_untouched() {
        let others = Reactions::new(
            [ParticipantId::from("u-a")].into_iter().collect(),
            [ParticipantId::from("u-b")].into_iter().collect(),
        );
        let r = toggle(&others, &me(), ReactionAction::Dislike);
        assert_eq!(r.likes(), 1);
        assert_eq!(r.dislikes(), 2);
    }

    #[test]
    fn test_compute_rejects_pending_and_absent() {
        let snapshot = Snapshot::default();
        let pending = huddle_core::PendingId::generate().as_message_id();

        assert!(matches!(
            compute(&snapshot, &pending, &me(), ReactionAction::Like),
            Err(SyncError::NotFound(_))
        ));
        assert!(matches!(
            compute(&snapshot, &MessageId::from("m-1"), &me(), ReactionAction::Like),
            Err(SyncError::NotFound(_))
        ));
    }

    #[test]
    fn test_pending_decided_by_entry_not_id_text() {
        use crate::store::MessageStore;
        use chrono::{TimeZone, Utc};
        use huddle_core::{Message, MessageDraft, MessageKind, ParticipantSession, RoomId};

        let canonical = Message {
            id: MessageId::from("tmp-server-7"),
            room_id: RoomId::from("general"),
            author_id: ParticipantId::from("u-bob"),
            author_name: "Bob".into(),
            body: "hello".into(),
            kind: MessageKind::Text,
            attachment: None,
            reply_to: None,
            reactions: Reactions::default(),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };
        let mut store = MessageStore::new();
        store.load_initial(RoomId::from("general"), vec![canonical]).unwrap();
        let author = ParticipantSession::new(me(), "Me");
        let pending = store
            .append_optimistic(&author, &MessageDraft::text("mine"))
            .unwrap()
            .as_message_id();
        let snapshot = store.snapshot();

        let update = compute(&snapshot, &MessageId::from("tmp-server-7"), &me(), ReactionAction::Like)
            .unwrap();
        assert!(update.reactions.has_liked(&me()));
        assert!(matches!(
            compute(&snapshot, &pending, &me(), ReactionAction::Like),
            Err(SyncError::NotFound(_))
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashMap;

        fn action() -> impl Strategy<Value = ReactionAction> {
            prop_oneof![Just(ReactionAction::Like), Just(ReactionAction::Dislike)]
        }

        proptest! {
            #[test]
            fn test_toggle_sequences_stay_exclusive(
                steps in prop::collection::vec((0usize..4, action()), 0..64)
            ) {
                let participants: Vec<ParticipantId> =
                    (0..4).map(|n| ParticipantId::new(format!("u-{n}"))).collect();
                let mut reactions = Reactions::default();
                let mut expected: HashMap<usize, ReactionAction> = HashMap::new();

                for (who, action) in steps {
                    reactions = toggle(&reactions, &participants[who], action);
                    prop_assert!(reactions.liked_by().is_disjoint(reactions.disliked_by()));

                    if expected.get(&who) == Some(&action) {
                        expected.remove(&who);
                    } else {
                        expected.insert(who, action);
                    }
                }

                for (n, participant) in participants.iter().enumerate() {
                    let state = expected.get(&n);
                    prop_assert_eq!(reactions.has_liked(participant), state == Some(&ReactionAction::Like));
                    prop_assert_eq!(reactions.has_disliked(participant), state == Some(&ReactionAction::Dislike));
                }
            }

            #[test]
            fn test_repeated_action_follows_parity(times in 0usize..16, like in any::<bool>()) {
                let action = if like { ReactionAction::Like } else { ReactionAction::Dislike };
                let me = me();
                let reactions = (0..times)
                    .fold(Reactions::default(), |r, _| toggle(&r, &me, action));

                let member = match action {
                    ReactionAction::Like => reactions.has_liked(&me),
                    ReactionAction::Dislike => reactions.has_disliked(&me),
                };
                prop_assert_eq!(member, times % 2 == 1);
                prop_assert!(reactions.liked_by().is_disjoint(reactions.disliked_by()));
            }
        }
    }
}
