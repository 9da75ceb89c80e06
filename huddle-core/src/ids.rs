//! Opaque identifiers.
//!
//! Room, message and participant ids are assigned by collaborators outside
//! this crate and are treated as opaque strings. `PendingId` is the only id
//! generated locally: it names an optimistic message until the authoritative
//! store hands back the canonical `MessageId`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix used when a pending id is shown in place of a message id.
pub const PENDING_PREFIX: &str = "tmp-";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Room identifier, immutable for the lifetime of the room.
    RoomId
);
string_id!(
    /// Message identifier assigned by the authoritative store.
    MessageId
);
string_id!(
    /// Participant identifier, generated locally at join time.
    ParticipantId
);

impl ParticipantId {
    /// Generate a fresh participant id for a new room membership.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Temporary identity of a locally authored message awaiting confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingId(Uuid);

impl PendingId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create with an explicit uuid (for testing and wire decoding).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// The message id shown for the optimistic entry until it is confirmed.
    pub fn as_message_id(&self) -> MessageId {
        MessageId(format!("{PENDING_PREFIX}{}", self.0))
    }
}

impl fmt::Display for PendingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PENDING_PREFIX}{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_id_display_form() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let pending = PendingId::from_uuid(id);
        let shown = pending.as_message_id();

        assert_eq!(shown.as_str(), "tmp-550e8400-e29b-41d4-a716-446655440000");
        assert_eq!(pending.to_string(), shown.to_string());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&RoomId::from("general")).unwrap();
        assert_eq!(json, "\"general\"");

        let back: RoomId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RoomId::from("general"));
    }

    #[test]
    fn test_generated_participants_distinct() {
        assert_ne!(ParticipantId::generate(), ParticipantId::generate());
    }
}
