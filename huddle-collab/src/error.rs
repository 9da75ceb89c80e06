//! Error taxonomy of the reconciliation engine.
//!
//! - [`TransportError`] - any failure reported by the transport, persistence
//!   or blob collaborators. Never retried here.
//! - [`SyncError`] - what engine operations return to their caller.
//!
//! Update-after-delete and repeated deletes are not errors; the store absorbs
//! them and logs a warning.

use huddle_core::{MessageId, ModelError, RoomId};

use crate::identity::IdentityError;
use crate::session::ActivationState;
use crate::wire::PayloadError;

/// Failures reported by external collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Network unreachable, timeout, reset
    Network(String),
    /// Rejected credentials or policy
    Unauthorized(String),
    /// Persistence or blob storage refused the operation
    Storage(String),
    /// Channel or connection already closed
    Closed,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(e) => write!(f, "Network error: {e}"),
            Self::Unauthorized(e) => write!(f, "Unauthorized: {e}"),
            Self::Storage(e) => write!(f, "Storage error: {e}"),
            Self::Closed => write!(f, "Transport closed"),
        }
    }
}

impl std::error::Error for TransportError {}

/// What was looked up and not found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    Room(RoomId),
    Message(MessageId),
}

impl std::fmt::Display for NotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Room(id) => write!(f, "Room not found: {id}"),
            Self::Message(id) => write!(f, "Message not found: {id}"),
        }
    }
}

/// Errors returned by engine operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Referenced room or message is absent
    NotFound(NotFound),
    /// Operation attempted in the wrong activation state
    InvalidState {
        operation: &'static str,
        state: ActivationState,
    },
    /// Message store still holds the log of another activation
    StoreOccupied(RoomId),
    /// No stored participant identity for the room; the caller must redirect
    MissingIdentity(RoomId),
    /// Only the author may delete a message
    NotAuthor(MessageId),
    /// Too many optimistic sends awaiting confirmation
    TooManyPending(usize),
    Transport(TransportError),
    Payload(PayloadError),
    Model(ModelError),
    Identity(IdentityError),
}

impl SyncError {
    pub fn room_not_found(id: &RoomId) -> Self {
        Self::NotFound(NotFound::Room(id.clone()))
    }

    pub fn message_not_found(id: &MessageId) -> Self {
        Self::NotFound(NotFound::Message(id.clone()))
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "{what}"),
            Self::InvalidState { operation, state } => {
                write!(f, "Cannot {operation} while room is {state}")
            }
            Self::StoreOccupied(room) => write!(f, "Message store still holds room {room}"),
            Self::MissingIdentity(room) => write!(f, "No participant identity for room {room}"),
            Self::NotAuthor(id) => write!(f, "Not the author of message {id}"),
            Self::TooManyPending(n) => write!(f, "{n} sends already awaiting confirmation"),
            Self::Transport(e) => write!(f, "{e}"),
            Self::Payload(e) => write!(f, "{e}"),
            Self::Model(e) => write!(f, "{e}"),
            Self::Identity(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<TransportError> for SyncError {
    fn from(e: TransportError) -> Self {
        SyncError::Transport(e)
    }
}

impl From<PayloadError> for SyncError {
    fn from(e: PayloadError) -> Self {
        SyncError::Payload(e)
    }
}

impl From<ModelError> for SyncError {
    fn from(e: ModelError) -> Self {
        SyncError::Model(e)
    }
}

impl From<IdentityError> for SyncError {
    fn from(e: IdentityError) -> Self {
        SyncError::Identity(e)
    }
}
