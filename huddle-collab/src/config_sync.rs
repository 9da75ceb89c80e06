//! Shared room settings with optimistic local writes.
//!
//! ```text
//!   apply_local(patch) ──► settings (optimistic) ──► LocalWrite { generation }
//!                                 ▲
//!   apply_remote(row) ── full row replaces every field ──► changed fields
//!                                 ▲
//!   rollback(write) ── only if the field's generation is unchanged
//! ```
//!
//! No causal ordering: whichever update is applied last wins. A remote row is
//! the complete authoritative row, so it overwrites every optimistic value,
//! including one the row happens to leave at its previous remote value.

use std::collections::HashMap;

use huddle_core::{Room, RoomConfigPatch, RoomField, RoomSettings};

/// Token of an optimistic setting write, used to roll it back on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalWrite {
    pub patch: RoomConfigPatch,
    previous: RoomConfigPatch,
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct RoomConfigSync {
    room: Room,
    generations: HashMap<RoomField, u64>,
    next_generation: u64,
}

impl RoomConfigSync {
    /// Start from the fetched row.
    pub fn new(room: Room) -> Self {
        Self {
            room,
            generations: HashMap::new(),
            next_generation: 1,
        }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.room.settings
    }

    pub fn is_muted(&self) -> bool {
        self.room.settings.is_muted
    }

    pub fn apply_local(&mut self, patch: RoomConfigPatch) -> LocalWrite {
        let field = patch.field();
        let previous = self.room.settings.field(field);
        self.room.settings.apply(&patch);
        let generation = self.bump(field);
        log::debug!("Local write {patch:?} (generation {generation})");
        LocalWrite {
            patch,
            previous,
            generation,
        }
    }

    /// Apply a remote row; returns the patches that changed the local view.
    pub fn apply_remote(&mut self, row: &Room) -> Vec<RoomConfigPatch> {
        if row.id != self.room.id {
            log::warn!("Config update for room {} ignored by room {}", row.id, self.room.id);
            return Vec::new();
        }

        let changed = self.room.settings.diff(&row.settings);
        for field in RoomField::ALL {
            self.bump(field);
        }
        self.room.settings = row.settings.clone();
        self.room.name = row.name.clone();
        self.room.password = row.password.clone();
        changed
    }

    /// Revert a failed local write. Returns `false` when a newer write to the
    /// same field has superseded it.
    pub fn rollback(&mut self, write: &LocalWrite) -> bool {
        let field = write.patch.field();
        if self.generations.get(&field) != Some(&write.generation) {
            log::debug!("Rollback of {:?} skipped, superseded", write.patch);
            return false;
        }
        self.room.settings.apply(&write.previous);
        self.bump(field);
        true
    }

    fn bump(&mut self, field: RoomField) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.generations.insert(field, generation);
        generation
    }
}
