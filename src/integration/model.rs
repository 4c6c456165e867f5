use std::pin::Pin;

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::model::{Attachment, Message};
use crate::thread::model::Thread;
use crate::user::model::Participant;
use crate::{message, thread, user};

/// Pagination window for list reads. `page` is zero-based.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Page {
    pub limit: usize,
    pub page: usize,
}

impl Page {
    pub fn of(limit: usize, page: usize) -> Self {
        Self { limit, page }
    }

    pub fn first(limit: usize) -> Self {
        Self { limit, page: 0 }
    }

    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.page.saturating_mul(self.limit))
            .take(self.limit)
            .collect()
    }
}

/// Profile shape served by the user-profile collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: user::Id,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Participant row as embedded in remote thread records. Field names vary
/// between read paths; aliases absorb the union.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticipantRecord {
    #[serde(alias = "user_id")]
    pub id: user::Id,
    #[serde(default, alias = "full_name", alias = "username")]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl From<ParticipantRecord> for Participant {
    fn from(p: ParticipantRecord) -> Self {
        match p.name.filter(|n| !n.trim().is_empty()) {
            Some(name) => Participant::new(p.id, name, p.avatar_url),
            None => Participant::unknown(&p.id),
        }
    }
}

/// Per-message read state embedded in thread reads, enough to recompute the
/// viewer's unread count without trusting a server-side counter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReadStateRecord {
    pub sender_id: user::Id,
    #[serde(default)]
    pub read_by: Vec<user::Id>,
}

/// Remote thread record. The two read paths (direct table read and the
/// aggregated per-user overview) ship differently named fields for the same
/// data; serde aliases fold them into one typed input.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub id: thread::Id,
    #[serde(default, rename = "type", alias = "thread_type")]
    pub kind: Option<String>,
    #[serde(default, alias = "thread_name", alias = "title")]
    pub name: Option<String>,
    #[serde(default, alias = "last_message_content")]
    pub last_message_preview: Option<String>,
    #[serde(default, alias = "last_message_time")]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "chat_participants")]
    pub participants: Vec<ParticipantRecord>,
    #[serde(default)]
    pub messages: Vec<ReadStateRecord>,
    #[serde(default)]
    pub unread_count: Option<u32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ThreadRecord {
    /// Normalizes the wire record into the client thread shape, validated at
    /// the boundary. The viewer must be among the participants; the unread
    /// count is recomputed from embedded read state when present and never
    /// trusted incrementally.
    pub fn normalize(self, viewer: &user::Id) -> thread::Result<Thread> {
        if self.participants.is_empty() {
            return Err(thread::Error::NoParticipants(self.id));
        }

        let participants: Vec<Participant> = self
            .participants
            .into_iter()
            .map(Participant::from)
            .collect();

        if !participants.iter().any(|p| &p.id == viewer) {
            return Err(thread::Error::NotMember);
        }

        let kind = match self.kind {
            Some(raw) => raw.parse()?,
            None => thread::Kind::derive_from(participants.len()),
        };

        let unread_count = if self.messages.is_empty() {
            self.unread_count.unwrap_or(0)
        } else {
            self.messages
                .iter()
                .filter(|m| &m.sender_id != viewer && !m.read_by.contains(viewer))
                .count() as u32
        };

        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| Thread::display_name(&participants, viewer));

        let now = Utc::now();

        Ok(Thread {
            id: self.id,
            name,
            kind,
            participants,
            last_message_preview: self.last_message_preview,
            last_message_at: self.last_message_at,
            unread_count,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttachmentRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub url: String,
    #[serde(default, alias = "mimeType", alias = "content_type")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Remote message record, including sender and attachment detail.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: message::Id,
    pub thread_id: thread::Id,
    #[serde(alias = "user_id", alias = "author_id")]
    pub sender_id: user::Id,
    #[serde(default, alias = "body", alias = "text")]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "type")]
    pub message_type: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub read_by: Vec<user::Id>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub deleted_for: Vec<user::Id>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRecord>,
    #[serde(default)]
    pub sender: Option<ParticipantRecord>,
    #[serde(default)]
    pub reply_to_id: Option<message::Id>,
}

impl MessageRecord {
    /// Normalizes the wire record into the client message shape.
    /// Attachments are classified by mime prefix here; `read_by` is repaired
    /// to always contain the sender.
    pub fn normalize(self) -> message::Result<Message> {
        let message_type = match self.message_type {
            Some(raw) => raw.parse()?,
            None => message::MessageType::Text,
        };

        let mut read_by = self.read_by;
        if !read_by.contains(&self.sender_id) {
            read_by.insert(0, self.sender_id.clone());
        }

        let attachments = self.attachments.into_iter().map(Attachment::from).collect();

        Ok(Message {
            id: self.id,
            thread_id: self.thread_id,
            sender_id: self.sender_id,
            content: self.content,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            updated_at: self.updated_at,
            message_type,
            metadata: self.metadata,
            read_by,
            is_deleted: self.is_deleted,
            deleted_for: self.deleted_for,
            deleted_at: self.deleted_at,
            attachments,
            sender: self.sender.map(Participant::from),
            reply_to_id: self.reply_to_id,
        })
    }
}

/// Thread insert payload.
#[derive(Clone, Debug, Serialize)]
pub struct NewThreadRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub participant_ids: Vec<user::Id>,
    pub created_by: user::Id,
}

/// Message insert payload.
#[derive(Clone, Debug, Serialize)]
pub struct NewMessageRecord {
    pub thread_id: thread::Id,
    pub sender_id: user::Id,
    pub content: String,
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<message::Id>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    #[serde(alias = "chat_threads")]
    Threads,
    Messages,
}

/// Raw change notification from the realtime feed. Carries the changed row's
/// id and at most a partial snapshot; the full record must be re-fetched.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChangeEvent {
    #[serde(alias = "type")]
    pub op: ChangeOp,
    pub table: Table,
    pub record_id: String,
    #[serde(default)]
    pub record: Option<serde_json::Value>,
}

impl ChangeEvent {
    pub fn thread_id(&self) -> Option<thread::Id> {
        Uuid::parse_str(&self.record_id).ok().map(thread::Id::from)
    }

    pub fn message_id(&self) -> Option<message::Id> {
        Uuid::parse_str(&self.record_id).ok().map(message::Id::from)
    }

    /// Best-effort message reconstruction from the partial snapshot, for the
    /// call-signaling passthrough when the full fetch is not possible.
    pub fn snapshot_message(&self) -> Option<Message> {
        let raw = self.record.clone()?;
        let record: MessageRecord = serde_json::from_value(raw).ok()?;
        record.normalize().ok()
    }
}

pub type ChangeStream = Pin<Box<dyn Stream<Item = ChangeEvent> + Send>>;
