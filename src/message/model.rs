use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Id, MessageType};
use crate::integration::model::AttachmentRecord;
use crate::user::model::Participant;
use crate::{thread, user};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Video,
    File,
}

impl AttachmentKind {
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            Self::Image
        } else if mime.starts_with("video/") {
            Self::Video
        } else {
            Self::File
        }
    }
}

/// Immutable once attached to a message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub size: u64,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

impl From<AttachmentRecord> for Attachment {
    fn from(a: AttachmentRecord) -> Self {
        let mime_type = a.mime_type.unwrap_or_else(|| "application/octet-stream".into());
        Self {
            id: a.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: a.name,
            url: a.url,
            kind: AttachmentKind::from_mime(&mime_type),
            size: a.size.unwrap_or(0),
            mime_type,
        }
    }
}

/// Caller-supplied payload for a send operation.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MessageDraft {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub reply_to_id: Option<Id>,
}

impl MessageDraft {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Id,
    pub thread_id: thread::Id,
    pub sender_id: user::Id,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub message_type: MessageType,
    pub metadata: Option<serde_json::Value>,
    pub read_by: Vec<user::Id>,
    pub is_deleted: bool,
    pub deleted_for: Vec<user::Id>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub attachments: Vec<Attachment>,
    pub sender: Option<Participant>,
    pub reply_to_id: Option<Id>,
}

impl Message {
    /// A sender has implicitly read their own message.
    pub fn new(thread_id: thread::Id, sender: &user::Id, draft: MessageDraft) -> Self {
        Self {
            id: Id::random(),
            thread_id,
            sender_id: sender.clone(),
            content: draft.content,
            created_at: Utc::now(),
            updated_at: None,
            message_type: draft.message_type,
            metadata: draft.metadata,
            read_by: vec![sender.clone()],
            is_deleted: false,
            deleted_for: Vec::new(),
            deleted_at: None,
            attachments: draft.attachments,
            sender: None,
            reply_to_id: draft.reply_to_id,
        }
    }

    /// Add-only read receipt; re-marking is a no-op.
    pub fn mark_read_by(&mut self, reader: &user::Id) {
        if !self.read_by.contains(reader) {
            self.read_by.push(reader.clone());
        }
    }

    /// Hides the message for one viewer without touching anyone else's view.
    pub fn hide_for(&mut self, viewer: &user::Id) {
        if !self.deleted_for.contains(viewer) {
            self.deleted_for.push(viewer.clone());
        }
    }

    pub fn is_hidden_for(&self, viewer: &user::Id) -> bool {
        self.deleted_for.contains(viewer)
    }

    /// Deletes for everyone: content cleared, row kept as a placeholder.
    /// Terminal; no further deletion transition is meaningful.
    pub fn redact(&mut self, at: DateTime<Utc>) {
        self.is_deleted = true;
        self.deleted_at = Some(at);
        self.updated_at = Some(at);
        self.content.clear();
    }

    /// Thread/notification preview text.
    pub fn preview(&self) -> String {
        if !self.content.trim().is_empty() {
            self.content.clone()
        } else if !self.attachments.is_empty() {
            "Shared an attachment".into()
        } else {
            "Sent a message".into()
        }
    }
}
