//! Room and its shared display settings.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ModelError;
use crate::ids::RoomId;

/// Background color of a freshly created room.
pub const DEFAULT_BACKGROUND_COLOR: &str = "#ffffff";

/// Colors offered by the room color picker.
pub const BACKGROUND_PALETTE: [&str; 5] = [
    "#ef4444", // red
    "#3b82f6", // blue
    "#10b981", // green
    "#f59e0b", // amber
    "#8b5cf6", // violet
];

/// Pattern drawn over the room background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundPattern {
    #[default]
    None,
    Grid,
    Dots,
    Waves,
    Diagonal,
}

impl BackgroundPattern {
    pub const ALL: [BackgroundPattern; 5] = [
        BackgroundPattern::None,
        BackgroundPattern::Grid,
        BackgroundPattern::Dots,
        BackgroundPattern::Waves,
        BackgroundPattern::Diagonal,
    ];

    /// Wire name of the pattern.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Grid => "grid",
            Self::Dots => "dots",
            Self::Waves => "waves",
            Self::Diagonal => "diagonal",
        }
    }
}

impl FromStr for BackgroundPattern {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ModelError::UnknownPattern(s.to_string()))
    }
}

/// The three settings shared by everyone in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub background_color: String,
    pub background_pattern: BackgroundPattern,
    pub is_muted: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            background_pattern: BackgroundPattern::None,
            is_muted: false,
        }
    }
}

impl RoomSettings {
    /// Apply a single-field patch.
    pub fn apply(&mut self, patch: &RoomConfigPatch) {
        match patch {
            RoomConfigPatch::BackgroundColor(color) => self.background_color = color.clone(),
            RoomConfigPatch::BackgroundPattern(pattern) => self.background_pattern = *pattern,
            RoomConfigPatch::Muted(muted) => self.is_muted = *muted,
        }
    }

    /// Current value of `field`, as a patch.
    pub fn field(&self, field: RoomField) -> RoomConfigPatch {
        match field {
            RoomField::BackgroundColor => {
                RoomConfigPatch::BackgroundColor(self.background_color.clone())
            }
            RoomField::BackgroundPattern => {
                RoomConfigPatch::BackgroundPattern(self.background_pattern)
            }
            RoomField::Muted => RoomConfigPatch::Muted(self.is_muted),
        }
    }

    /// Fields whose values differ between `self` and `other`, with `other`'s values.
    pub fn diff(&self, other: &RoomSettings) -> Vec<RoomConfigPatch> {
        RoomField::ALL
            .into_iter()
            .filter(|f| self.field(*f) != other.field(*f))
            .map(|f| other.field(f))
            .collect()
    }
}

/// One of the three mutable room settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomField {
    BackgroundColor,
    BackgroundPattern,
    Muted,
}

impl RoomField {
    pub const ALL: [RoomField; 3] = [
        RoomField::BackgroundColor,
        RoomField::BackgroundPattern,
        RoomField::Muted,
    ];
}

/// An update touching exactly one room setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomConfigPatch {
    BackgroundColor(String),
    BackgroundPattern(BackgroundPattern),
    Muted(bool),
}

impl RoomConfigPatch {
    pub fn field(&self) -> RoomField {
        match self {
            Self::BackgroundColor(_) => RoomField::BackgroundColor,
            Self::BackgroundPattern(_) => RoomField::BackgroundPattern,
            Self::Muted(_) => RoomField::Muted,
        }
    }
}

/// A password-gated chat room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    /// Plaintext shared secret checked at join time.
    pub password: String,
    pub settings: RoomSettings,
}

impl Room {
    /// Create a room with default settings.
    pub fn new(id: impl Into<RoomId>, name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            password: password.into(),
            settings: RoomSettings::default(),
        }
    }

    pub fn verify_password(&self, candidate: &str) -> bool {
        self.password == candidate
    }
}
