//! Incoming messages, generated replies and folder references.

use chrono::{DateTime, Utc};

use super::address::EmailAddress;

/// An unread message fetched from the mail store. Never mutated here.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IncomingMessage {
    /// Store-specific identifier used to attach the draft reply later.
    pub id: String,
    pub sender: EmailAddress,
    pub subject: String,
    pub body: String,
    pub received: DateTime<Utc>,
    /// RFC 5322 `Message-ID`, used for `In-Reply-To` on the draft.
    pub message_id: Option<String>,
}

impl IncomingMessage {
    /// First `max_chars` characters of the body on a single line.
    pub fn preview(&self, max_chars: usize) -> String {
        let flat: String = self
            .body
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let mut out: String = flat.chars().take(max_chars).collect();
        if flat.chars().count() > max_chars {
            out.push_str("...");
        }
        out
    }
}

/// Reply text produced for one incoming message.
///
/// Exists only until it is handed to the draft writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReply {
    pub message_id: String,
    pub body: String,
}

/// A mail folder as listed by the store.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FolderRef {
    pub name: String,
    pub unread: usize,
}

/// Where a draft ended up, in store-specific terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRef {
    pub id: String,
}
