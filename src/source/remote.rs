use std::sync::Arc;

use async_trait::async_trait;
use log::warn;

use super::DataSource;
use crate::integration;
use crate::integration::backend::Backend;
use crate::integration::model::{NewMessageRecord, NewThreadRecord, Page};
use crate::message::model::{Message, MessageDraft};
use crate::thread::model::Thread;
use crate::user::model::Participant;
use crate::{message, thread, user};

/// Authoritative path: every operation is a backend round trip, with wire
/// records normalized at the boundary.
pub struct RemoteDataSource {
    backend: Arc<dyn Backend>,
}

impl RemoteDataSource {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl DataSource for RemoteDataSource {
    async fn list_threads(&self, viewer: &user::Id, page: &Page) -> thread::Result<Vec<Thread>> {
        let records = match self.backend.fetch_threads(viewer, page).await {
            Ok(records) => records,
            Err(e) if e.is_policy_recursion() => {
                warn!("thread read hit a recursive policy fault, retrying aggregated view");
                self.backend.fetch_thread_overview(viewer, page).await?
            }
            Err(e) => return Err(e.into()),
        };

        let mut threads: Vec<Thread> = records
            .into_iter()
            .filter_map(|r| match r.normalize(viewer) {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!("dropping malformed thread record: {e:?}");
                    None
                }
            })
            .collect();

        threads.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(threads)
    }

    async fn find_thread(&self, id: &thread::Id) -> thread::Result<Thread> {
        let record = self.backend.fetch_thread(id).await?;
        // no viewer in scope here: validate against any listed participant
        let viewer = record
            .participants
            .first()
            .map(|p| p.id.clone())
            .ok_or(thread::Error::NoParticipants(*id))?;
        record.normalize(&viewer)
    }

    async fn create_thread(
        &self,
        creator: &user::Id,
        name: Option<String>,
        kind: thread::Kind,
        participants: Vec<Participant>,
    ) -> thread::Result<Thread> {
        let record = NewThreadRecord {
            name,
            kind: kind.as_str().to_string(),
            participant_ids: participants.iter().map(|p| p.id.clone()).collect(),
            created_by: creator.clone(),
        };

        let created = self.backend.insert_thread(&record).await?;
        created.normalize(creator)
    }

    async fn list_messages(&self, thread_id: &thread::Id) -> message::Result<Vec<Message>> {
        let records = self.backend.fetch_messages(thread_id).await?;

        let mut messages: Vec<Message> = records
            .into_iter()
            .filter_map(|r| match r.normalize() {
                Ok(m) => Some(m),
                Err(e) => {
                    warn!("dropping malformed message record: {e:?}");
                    None
                }
            })
            .collect();

        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn find_message(&self, id: &message::Id) -> message::Result<Message> {
        self.backend.fetch_message(id).await?.normalize()
    }

    async fn insert_message(
        &self,
        thread_id: &thread::Id,
        draft: &MessageDraft,
        sender: &user::Id,
    ) -> message::Result<(Thread, Message)> {
        let record = NewMessageRecord {
            thread_id: *thread_id,
            sender_id: sender.clone(),
            content: draft.content.clone(),
            message_type: draft.message_type.as_str().to_string(),
            metadata: draft.metadata.clone(),
            attachments: draft.attachments.clone(),
            reply_to_id: draft.reply_to_id,
        };

        let message = self.backend.insert_message(&record).await?.normalize()?;

        // The insert is already durable; a failed read-back of the thread
        // summary must not look like a failed send.
        let thread = match self.backend.fetch_thread(thread_id).await {
            Ok(rec) => match rec.normalize(sender) {
                Ok(t) => t,
                Err(e) => {
                    warn!("thread read-back after send failed: {e:?}");
                    Thread::stub(*thread_id, Participant::unknown(sender))
                }
            },
            Err(e) => {
                warn!("thread read-back after send failed: {e:?}");
                Thread::stub(*thread_id, Participant::unknown(sender))
            }
        };

        Ok((thread, message))
    }

    async fn mark_read(
        &self,
        thread_id: &thread::Id,
        message_ids: &[message::Id],
        reader: &user::Id,
    ) -> message::Result<()> {
        self.backend
            .append_read_receipts(thread_id, message_ids, reader)
            .await
            .map_err(message::Error::from)
    }

    async fn hide_message(&self, id: &message::Id, viewer: &user::Id) -> message::Result<()> {
        self.backend
            .hide_message(id, viewer)
            .await
            .map_err(message::Error::from)
    }

    async fn redact_message(&self, id: &message::Id, sender: &user::Id) -> message::Result<()> {
        self.backend
            .redact_message(id, sender)
            .await
            .map_err(|e| match e {
                // server says the window already closed (lost race)
                integration::Error::Status {
                    status: 403 | 409 | 422,
                    ..
                } => message::Error::DeleteWindowExpired,
                other => message::Error::from(other),
            })
    }

    async fn search(
        &self,
        query: &str,
        viewer: &user::Id,
        thread_id: Option<&thread::Id>,
    ) -> message::Result<Vec<Message>> {
        let records = self
            .backend
            .search_messages(query, viewer, thread_id)
            .await?;

        let messages = records
            .into_iter()
            .filter_map(|r| r.normalize().ok())
            .filter(|m| !m.is_deleted && !m.is_hidden_for(viewer))
            .collect();

        Ok(messages)
    }
}
