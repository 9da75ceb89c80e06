//! Per-room participant identity kept across activations.
//!
//! Activation of a room requires a stored [`ParticipantSession`]; the join
//! flow creates one after the password check. Two stores are provided: an
//! in-memory map and a JSON file mapping room id to session.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use huddle_core::{ParticipantSession, RoomId};

use crate::error::SyncError;
use crate::transport::RoomBackend;

/// Identity store failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// File could not be read or written
    Io(String),
    /// File content is not a valid identity map
    Corrupt(String),
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Identity store I/O error: {e}"),
            Self::Corrupt(e) => write!(f, "Identity store corrupt: {e}"),
        }
    }
}

impl std::error::Error for IdentityError {}

impl From<std::io::Error> for IdentityError {
    fn from(e: std::io::Error) -> Self {
        IdentityError::Io(e.to_string())
    }
}

/// Where room identities live between activations.
pub trait IdentityStore: Send + Sync {
    fn load(&self, room_id: &RoomId) -> Result<Option<ParticipantSession>, IdentityError>;
    fn save(&self, room_id: &RoomId, session: &ParticipantSession) -> Result<(), IdentityError>;
    /// Returns whether an identity was stored.
    fn forget(&self, room_id: &RoomId) -> Result<bool, IdentityError>;
}

// ─── memory ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    sessions: Mutex<BTreeMap<RoomId, ParticipantSession>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self, room_id: &RoomId) -> Result<Option<ParticipantSession>, IdentityError> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions.get(room_id).cloned())
    }

    fn save(&self, room_id: &RoomId, session: &ParticipantSession) -> Result<(), IdentityError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(room_id.clone(), session.clone());
        Ok(())
    }

    fn forget(&self, room_id: &RoomId) -> Result<bool, IdentityError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions.remove(room_id).is_some())
    }
}

// ─── file ───────────────────────────────────────────────────────────

/// JSON file of `{ "<room id>": { "user_id": .., "display_name": .. } }`.
///
/// Every call re-reads the file, so several processes see each other's joins.
#[derive(Debug)]
pub struct FileIdentityStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<RoomId, ParticipantSession>, IdentityError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| IdentityError::Corrupt(format!("{}: {e}", self.path.display())))
    }

    fn write(&self, sessions: &BTreeMap<RoomId, ParticipantSession>) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(sessions)
            .map_err(|e| IdentityError::Corrupt(e.to_string()))?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self, room_id: &RoomId) -> Result<Option<ParticipantSession>, IdentityError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read()?.remove(room_id))
    }

    fn save(&self, room_id: &RoomId, session: &ParticipantSession) -> Result<(), IdentityError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut sessions = self.read()?;
        sessions.insert(room_id.clone(), session.clone());
        self.write(&sessions)?;
        log::debug!("Saved identity for room {room_id} to {}", self.path.display());
        Ok(())
    }

    fn forget(&self, room_id: &RoomId) -> Result<bool, IdentityError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut sessions = self.read()?;
        let removed = sessions.remove(room_id).is_some();
        if removed {
            self.write(&sessions)?;
        }
        Ok(removed)
    }
}

// ─── join flow ──────────────────────────────────────────────────────

/// Check the room password, create a participant identity and store it.
pub async fn join_room<B: RoomBackend, S: IdentityStore + ?Sized>(
    backend: &B,
    identities: &S,
    room_id: &RoomId,
    password: &str,
    display_name: &str,
) -> Result<ParticipantSession, SyncError> {
    let room = backend
        .fetch_room(room_id)
        .await?
        .ok_or_else(|| SyncError::room_not_found(room_id))?;
    let session = ParticipantSession::join(&room, password, display_name)?;
    identities.save(room_id, &session)?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::ParticipantId;

    fn alice() -> ParticipantSession {
        ParticipantSession::new(ParticipantId::from("u-alice"), "Alice")
    }

    #[test]
    fn test_memory_store_roundtrip_and_forget() {
        let store = MemoryIdentityStore::new();
        let room = RoomId::from("r-1");

        assert_eq!(store.load(&room).unwrap(), None);
        store.save(&room, &alice()).unwrap();
        assert_eq!(store.load(&room).unwrap(), Some(alice()));
        assert!(store.forget(&room).unwrap());
        assert!(!store.forget(&room).unwrap());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("identities.json");
        let room = RoomId::from("r-1");

        FileIdentityStore::new(&path).save(&room, &alice()).unwrap();

        let reopened = FileIdentityStore::new(&path);
        assert_eq!(reopened.load(&room).unwrap(), Some(alice()));
        assert_eq!(reopened.load(&RoomId::from("r-2")).unwrap(), None);
    }

    #[test]
    fn test_file_store_keeps_other_rooms() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path().join("ids.json"));
        let bob = ParticipantSession::new(ParticipantId::from("u-bob"), "Bob");

        store.save(&RoomId::from("r-1"), &alice()).unwrap();
        store.save(&RoomId::from("r-2"), &bob).unwrap();
        assert!(store.forget(&RoomId::from("r-1")).unwrap());

        assert_eq!(store.load(&RoomId::from("r-2")).unwrap(), Some(bob));
    }

    #[test]
    fn test_file_store_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        fs::write(&path, "[1, 2").unwrap();

        let err = FileIdentityStore::new(&path).load(&RoomId::from("r-1")).unwrap_err();
        assert!(matches!(err, IdentityError::Corrupt(_)));
    }
}
