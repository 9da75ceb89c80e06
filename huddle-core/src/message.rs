//! Chat messages, attachments and reaction sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::ModelError;
use crate::ids::{MessageId, ParticipantId, RoomId};
use crate::participant::ParticipantSession;

/// What a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
    Audio,
    Video,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Pick the kind for an uploaded file from its MIME type.
    pub fn from_mime(mime_type: &str) -> Self {
        match mime_type.split('/').next().unwrap_or_default() {
            "image" => Self::Image,
            "audio" => Self::Audio,
            "video" => Self::Video,
            _ => Self::File,
        }
    }
}

impl FromStr for MessageKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "file" => Ok(Self::File),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(ModelError::UnknownKind(other.to_string())),
        }
    }
}

/// Descriptor of an uploaded blob. Opaque to this crate beyond display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl Attachment {
    /// Size in kilobytes with two decimals, e.g. `"12.50 KB"`.
    pub fn display_size(&self) -> String {
        format!("{:.2} KB", self.size_bytes as f64 / 1024.0)
    }
}

#[derive(Deserialize)]
struct ReactionSets {
    #[serde(default)]
    liked_by: BTreeSet<ParticipantId>,
    #[serde(default)]
    disliked_by: BTreeSet<ParticipantId>,
}

impl From<ReactionSets> for Reactions {
    fn from(sets: ReactionSets) -> Self {
        Reactions::new(sets.liked_by, sets.disliked_by)
    }
}

/// Like/dislike participant sets of one message.
///
/// A participant is in at most one of the two sets. The sets are private so
/// every value of this type satisfies that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ReactionSets")]
pub struct Reactions {
    liked_by: BTreeSet<ParticipantId>,
    disliked_by: BTreeSet<ParticipantId>,
}

impl Reactions {
    /// Build from raw sets. A participant found in both is kept as a like.
    pub fn new(liked_by: BTreeSet<ParticipantId>, mut disliked_by: BTreeSet<ParticipantId>) -> Self {
        let before = disliked_by.len();
        disliked_by.retain(|p| !liked_by.contains(p));
        if disliked_by.len() != before {
            log::warn!(
                "Dropped {} participant(s) present in both like and dislike sets",
                before - disliked_by.len()
            );
        }
        Self { liked_by, disliked_by }
    }

    pub fn liked_by(&self) -> &BTreeSet<ParticipantId> {
        &self.liked_by
    }

    pub fn disliked_by(&self) -> &BTreeSet<ParticipantId> {
        &self.disliked_by
    }

    pub fn likes(&self) -> usize {
        self.liked_by.len()
    }

    pub fn dislikes(&self) -> usize {
        self.disliked_by.len()
    }

    pub fn has_liked(&self, participant: &ParticipantId) -> bool {
        self.liked_by.contains(participant)
    }

    pub fn has_disliked(&self, participant: &ParticipantId) -> bool {
        self.disliked_by.contains(participant)
    }
}

/// A chat message as held by the authoritative store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub author_id: ParticipantId,
    pub author_name: String,
    /// May be empty only when an attachment is present.
    pub body: String,
    pub kind: MessageKind,
    pub attachment: Option<Attachment>,
    /// Weak reference; the target may be missing or deleted.
    pub reply_to: Option<MessageId>,
    pub reactions: Reactions,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Materialize a draft as a message authored by `author`.
    pub fn from_draft(
        id: MessageId,
        room_id: RoomId,
        author: &ParticipantSession,
        draft: &MessageDraft,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            room_id,
            author_id: author.user_id.clone(),
            author_name: author.display_name.clone(),
            body: draft.body.clone(),
            kind: draft.kind,
            attachment: draft.attachment.clone(),
            reply_to: draft.reply_to.clone(),
            reactions: Reactions::default(),
            created_at,
        }
    }

    pub fn is_authored_by(&self, participant: &ParticipantId) -> bool {
        &self.author_id == participant
    }
}

/// Locally authored message content, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageDraft {
    pub body: String,
    pub kind: MessageKind,
    pub attachment: Option<Attachment>,
    pub reply_to: Option<MessageId>,
}

impl MessageDraft {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Attachment message; the kind follows the attachment's MIME type.
    pub fn attachment(attachment: Attachment, caption: impl Into<String>) -> Self {
        Self {
            body: caption.into(),
            kind: MessageKind::from_mime(&attachment.mime_type),
            attachment: Some(attachment),
            reply_to: None,
        }
    }

    pub fn replying_to(mut self, target: MessageId) -> Self {
        self.reply_to = Some(target);
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.kind != MessageKind::Text && self.attachment.is_none() {
            return Err(ModelError::MissingAttachment);
        }
        if self.body.trim().is_empty() && self.attachment.is_none() {
            return Err(ModelError::EmptyMessage);
        }
        Ok(())
    }
}
