//! Local participant identity for one room membership.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::ids::ParticipantId;
use crate::room::Room;

/// Who the local user is inside one room.
///
/// Created at join time and kept by the hosting environment across room
/// activations. It is never sent anywhere except as message authorship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSession {
    pub user_id: ParticipantId,
    pub display_name: String,
}

impl ParticipantSession {
    pub fn new(user_id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
        }
    }

    /// Join `room` with the shared password, generating a fresh user id.
    pub fn join(room: &Room, password: &str, display_name: &str) -> Result<Self, ModelError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(ModelError::EmptyDisplayName);
        }
        if !room.verify_password(password) {
            return Err(ModelError::WrongPassword);
        }
        log::info!("Joined room {} as {display_name}", room.id);
        Ok(Self::new(ParticipantId::generate(), display_name))
    }
}
