//! Validation errors for the data model.

/// Model validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Draft has no text and no attachment
    EmptyMessage,
    /// Non-text draft without an attachment descriptor
    MissingAttachment,
    /// Participant display name is blank
    EmptyDisplayName,
    /// Room password did not match
    WrongPassword,
    /// Background pattern name not recognised
    UnknownPattern(String),
    /// Message kind name not recognised
    UnknownKind(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "Message has no content"),
            Self::MissingAttachment => write!(f, "Attachment required for this message kind"),
            Self::EmptyDisplayName => write!(f, "Display name is empty"),
            Self::WrongPassword => write!(f, "Wrong room password"),
            Self::UnknownPattern(p) => write!(f, "Unknown background pattern: {p}"),
            Self::UnknownKind(k) => write!(f, "Unknown message kind: {k}"),
        }
    }
}

impl std::error::Error for ModelError {}
