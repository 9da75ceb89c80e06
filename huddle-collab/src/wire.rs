//! Row format of transport payloads and their validation.
//!
//! The managed platform delivers table rows as JSON. Rows are decoded here
//! into [`TransportEvent`]s; anything that does not satisfy the model
//! invariants is rejected with a [`PayloadError`] before it reaches the store.
//!
//! Message row:
//! ```text
//! { id, room_id, user_id, username, content, message_type,
//!   file_url?, file_name?, file_type?, file_size?, reply_to?,
//!   likes[], dislikes[], created_at, client_nonce? }
//! ```
//!
//! Room row:
//! ```text
//! { id, name, password, background_color, background_pattern, is_muted }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use huddle_core::{
    Attachment, BackgroundPattern, Message, MessageId, MessageKind, ParticipantId, PendingId,
    Reactions, Room, RoomId, RoomSettings,
};

use crate::transport::{
    ChangeKind, MessageEvent, RawChange, RoomConfigEvent, Topic, TransportEvent,
};

/// MIME type assumed when a row carries a file without one.
const FALLBACK_MIME: &str = "application/octet-stream";

/// Message table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub likes: Option<Vec<String>>,
    #[serde(default)]
    pub dislikes: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_nonce: Option<Uuid>,
}

impl MessageRow {
    pub fn from_message(message: &Message, nonce: Option<PendingId>) -> Self {
        let attachment = message.attachment.as_ref();
        Self {
            id: message.id.to_string(),
            room_id: message.room_id.to_string(),
            user_id: message.author_id.to_string(),
            username: message.author_name.clone(),
            content: Some(message.body.clone()),
            message_type: Some(message.kind.as_str().to_string()),
            file_url: attachment.map(|a| a.url.clone()),
            file_name: attachment.map(|a| a.name.clone()),
            file_type: attachment.map(|a| a.mime_type.clone()),
            file_size: attachment.map(|a| a.size_bytes),
            reply_to: message.reply_to.as_ref().map(|id| id.to_string()),
            likes: Some(message.reactions.liked_by().iter().map(|p| p.to_string()).collect()),
            dislikes: Some(
                message.reactions.disliked_by().iter().map(|p| p.to_string()).collect(),
            ),
            created_at: message.created_at,
            client_nonce: nonce.map(|n| n.as_uuid()),
        }
    }

    /// Validate into a message plus the echoed pending id, if any.
    pub fn into_message(self) -> Result<(Message, Option<PendingId>), PayloadError> {
        if self.id.is_empty() {
            return Err(PayloadError::Invalid("message row without id".into()));
        }
        let kind = match self.message_type.as_deref() {
            None => MessageKind::Text,
            Some(name) => name
                .parse::<MessageKind>()
                .map_err(|e| PayloadError::Invalid(e.to_string()))?,
        };
        let attachment = self.file_url.map(|url| Attachment {
            url,
            name: self.file_name.unwrap_or_default(),
            mime_type: self.file_type.unwrap_or_else(|| FALLBACK_MIME.to_string()),
            size_bytes: self.file_size.unwrap_or(0),
        });
        if kind != MessageKind::Text && attachment.is_none() {
            return Err(PayloadError::Invalid(format!(
                "{} message {} without file_url",
                kind.as_str(),
                self.id
            )));
        }
        let body = self.content.unwrap_or_default();
        if body.is_empty() && attachment.is_none() {
            return Err(PayloadError::Invalid(format!("message {} has no content", self.id)));
        }

        let reactions = Reactions::new(
            participant_set(self.likes),
            participant_set(self.dislikes),
        );
        let message = Message {
            id: MessageId::new(self.id),
            room_id: RoomId::new(self.room_id),
            author_id: ParticipantId::new(self.user_id),
            author_name: self.username,
            body,
            kind,
            attachment,
            reply_to: self.reply_to.filter(|r| !r.is_empty()).map(MessageId::new),
            reactions,
            created_at: self.created_at,
        };
        Ok((message, self.client_nonce.map(PendingId::from_uuid)))
    }
}

fn participant_set(ids: Option<Vec<String>>) -> BTreeSet<ParticipantId> {
    ids.unwrap_or_default().into_iter().map(ParticipantId::new).collect()
}

/// Room table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRow {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub background_pattern: Option<String>,
    #[serde(default)]
    pub is_muted: Option<bool>,
}

impl RoomRow {
    pub fn from_room(room: &Room) -> Self {
        Self {
            id: room.id.to_string(),
            name: room.name.clone(),
            password: room.password.clone(),
            background_color: Some(room.settings.background_color.clone()),
            background_pattern: Some(room.settings.background_pattern.as_str().to_string()),
            is_muted: Some(room.settings.is_muted),
        }
    }

    /// Validate into a room; missing settings fall back to the defaults.
    pub fn into_room(self) -> Result<Room, PayloadError> {
        if self.id.is_empty() {
            return Err(PayloadError::Invalid("room row without id".into()));
        }
        let defaults = RoomSettings::default();
        let background_pattern = match self.background_pattern.as_deref() {
            None => defaults.background_pattern,
            Some(name) => name
                .parse::<BackgroundPattern>()
                .map_err(|e| PayloadError::Invalid(e.to_string()))?,
        };
        Ok(Room {
            id: RoomId::new(self.id),
            name: self.name,
            password: self.password,
            settings: RoomSettings {
                background_color: self.background_color.unwrap_or(defaults.background_color),
                background_pattern,
                is_muted: self.is_muted.unwrap_or(defaults.is_muted),
            },
        })
    }
}

/// Delete payloads carry only the primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRow {
    pub id: String,
}

/// Validate a raw change from `topic` into a typed event.
pub fn decode(topic: Topic, change: RawChange) -> Result<TransportEvent, PayloadError> {
    let RawChange { kind, payload } = change;
    let event = match (topic, kind) {
        (Topic::Messages, ChangeKind::Insert) => {
            let (message, nonce) = parse::<MessageRow>(payload)?.into_message()?;
            TransportEvent::Messages(MessageEvent::Inserted { message, nonce })
        }
        (Topic::Messages, ChangeKind::Update) => {
            let (message, _) = parse::<MessageRow>(payload)?.into_message()?;
            TransportEvent::Messages(MessageEvent::Updated(message))
        }
        (Topic::Messages, ChangeKind::Delete) => {
            TransportEvent::Messages(MessageEvent::Deleted(MessageId::new(key(payload)?)))
        }
        (Topic::RoomConfig, ChangeKind::Insert) => {
            TransportEvent::RoomConfig(RoomConfigEvent::Inserted(parse::<RoomRow>(payload)?.into_room()?))
        }
        (Topic::RoomConfig, ChangeKind::Update) => {
            TransportEvent::RoomConfig(RoomConfigEvent::Updated(parse::<RoomRow>(payload)?.into_room()?))
        }
        (Topic::RoomConfig, ChangeKind::Delete) => {
            TransportEvent::RoomConfig(RoomConfigEvent::Deleted(RoomId::new(key(payload)?)))
        }
    };
    Ok(event)
}

fn parse<T: serde::de::DeserializeOwned>(payload: serde_json::Value) -> Result<T, PayloadError> {
    serde_json::from_value(payload).map_err(|e| PayloadError::Malformed(e.to_string()))
}

fn key(payload: serde_json::Value) -> Result<String, PayloadError> {
    let row = parse::<KeyRow>(payload)?;
    if row.id.is_empty() {
        return Err(PayloadError::Invalid("delete without id".into()));
    }
    Ok(row.id)
}

/// Encode a row as a JSON payload.
pub fn encode<T: Serialize>(row: &T) -> Result<serde_json::Value, PayloadError> {
    serde_json::to_value(row).map_err(|e| PayloadError::Malformed(e.to_string()))
}

/// Transport payload errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Payload is not a row of the expected shape
    Malformed(String),
    /// Row violates a model invariant
    Invalid(String),
}

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "Malformed payload: {e}"),
            Self::Invalid(e) => write!(f, "Invalid payload: {e}"),
        }
    }
}

impl std::error::Error for PayloadError {}
