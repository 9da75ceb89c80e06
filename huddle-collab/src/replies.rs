//! Reply-link resolution against a snapshot.
//!
//! `reply_to` is a weak reference: the target may have been deleted or never
//! loaded. Resolution is recomputed for every snapshot.

use huddle_core::{Message, MessageId, MessageKind};

use crate::store::Snapshot;

const ELLIPSIS: char = '…';

/// Display data of a resolved reply target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReply {
    pub target: MessageId,
    pub author_name: String,
    pub preview: String,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyResolution {
    Resolved(ResolvedReply),
    /// Target missing from the snapshot ("original message deleted")
    Absent { target: MessageId },
    NotAReply,
}

impl ReplyResolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

pub fn resolve(message: &Message, snapshot: &Snapshot, preview_chars: usize) -> ReplyResolution {
    let Some(target) = &message.reply_to else {
        return ReplyResolution::NotAReply;
    };

    match snapshot.get(target) {
        Some(original) => ReplyResolution::Resolved(ResolvedReply {
            target: target.clone(),
            author_name: original.author_name.clone(),
            preview: preview(original, preview_chars),
            kind: original.kind,
        }),
        None => ReplyResolution::Absent {
            target: target.clone(),
        },
    }
}

/// One-line preview of a message body, falling back to the attachment name.
pub fn preview(message: &Message, max_chars: usize) -> String {
    let body = message.body.trim();
    let source = match (&message.attachment, body.is_empty()) {
        (Some(attachment), true) => attachment.name.as_str(),
        _ => body,
    };
    let flat: String = source
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();

    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.truncate(cut.trim_end().len());
    cut.push(ELLIPSIS);
    cut
}
