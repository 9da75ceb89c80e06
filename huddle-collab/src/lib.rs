//! # huddle-collab - realtime state reconciliation for Huddle rooms
//!
//! Keeps a client's view of one chat room consistent with the authoritative
//! store while local optimistic writes and remote change events race.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐  RawChange   ┌──────────┐  TransportEvent  ┌──────────────┐
//! │ EventTransport│ ───────────► │ wire     │ ───────────────► │ RoomSession  │
//! │ (2 topics)    │              │ (decode) │                  │ (one room)   │
//! └───────────────┘              └──────────┘                  └──────┬───────┘
//!                                                    ┌────────────────┼────────────────┐
//!                                                    ▼                ▼                ▼
//!                                             ┌─────────────┐  ┌─────────────┐  ┌─────────────┐
//!                                             │ MessageStore│  │ ConfigSync  │  │ RoomBackend │
//!                                             │ (ordered)   │  │ (LWW)       │  │ BlobStore   │
//!                                             └─────────────┘  └─────────────┘  └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`transport`] - collaborator contracts and owned subscriptions
//! - [`wire`] - row payloads and their validation into typed events
//! - [`store`] - ordered, deduplicated message log with pending identities
//! - [`reactions`] - like/dislike toggling
//! - [`replies`] - weak reply-link resolution
//! - [`config_sync`] - optimistic room settings, last arrival wins
//! - [`session`] - activation lifecycle and the event pipeline
//! - [`identity`] - per-room participant identity and the join flow
//! - [`local`] - in-process bus and platform
//! - [`config`] - session tuning

pub mod config;
pub mod config_sync;
pub mod error;
pub mod identity;
pub mod local;
pub mod reactions;
pub mod replies;
pub mod session;
pub mod store;
pub mod transport;
pub mod wire;

// Re-exports for convenience
pub use config::SessionConfig;
pub use config_sync::{LocalWrite, RoomConfigSync};
pub use error::{NotFound, SyncError, TransportError};
pub use identity::{join_room, FileIdentityStore, IdentityError, IdentityStore, MemoryIdentityStore};
pub use local::{BusStats, LocalBus, LocalPlatform, PlatformCall};
pub use reactions::{ReactionAction, ReactionUpdate};
pub use replies::{ReplyResolution, ResolvedReply};
pub use session::{ActivationState, Notification, Operation, RoomSession, SessionUpdate};
pub use store::{DeliveryState, MessageStore, Snapshot, StoreChange, StoreEntry};
pub use transport::{
    BlobStore, ChangeKind, EventTransport, FileUpload, MessageEvent, MessagePatch, NewMessage,
    RawChange, RoomBackend, RoomConfigEvent, Subscription, Topic, TransportEvent,
};
pub use wire::PayloadError;
