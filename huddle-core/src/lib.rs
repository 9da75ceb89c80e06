//! # huddle-core - data model for Huddle chat rooms
//!
//! Plain value types shared by the reconciliation engine and its
//! collaborators: rooms and their settings, messages with attachments and
//! reaction sets, drafts, and the local participant identity.
//!
//! ## Modules
//!
//! - [`ids`] - opaque room/message/participant ids and local pending ids
//! - [`room`] - `Room`, `RoomSettings`, single-field `RoomConfigPatch`
//! - [`message`] - `Message`, `Reactions`, `Attachment`, `MessageDraft`
//! - [`participant`] - `ParticipantSession` and the password join gate
//! - [`error`] - model validation errors

pub mod error;
pub mod ids;
pub mod message;
pub mod participant;
pub mod room;

pub use error::ModelError;
pub use ids::{MessageId, ParticipantId, PendingId, RoomId, PENDING_PREFIX};
pub use message::{Attachment, Message, MessageDraft, MessageKind, Reactions};
pub use participant::ParticipantSession;
pub use room::{
    BackgroundPattern, Room, RoomConfigPatch, RoomField, RoomSettings, BACKGROUND_PALETTE,
    DEFAULT_BACKGROUND_COLOR,
};
