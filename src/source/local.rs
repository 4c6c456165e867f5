use std::sync::Arc;

use async_trait::async_trait;

use super::DataSource;
use crate::fallback::FallbackStore;
use crate::integration::model::Page;
use crate::message::model::{Message, MessageDraft};
use crate::thread::model::Thread;
use crate::user::model::Participant;
use crate::{message, thread, user};

/// Degraded path over the in-memory fallback store. Relaxed consistency,
/// same operations; nothing here performs I/O.
pub struct LocalDataSource {
    store: Arc<FallbackStore>,
}

impl LocalDataSource {
    pub fn new(store: Arc<FallbackStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DataSource for LocalDataSource {
    async fn list_threads(&self, viewer: &user::Id, page: &Page) -> thread::Result<Vec<Thread>> {
        Ok(page.slice(self.store.list_threads(viewer)))
    }

    async fn find_thread(&self, id: &thread::Id) -> thread::Result<Thread> {
        self.store.find_thread(id).ok_or(thread::Error::NotFound(*id))
    }

    async fn create_thread(
        &self,
        creator: &user::Id,
        name: Option<String>,
        kind: thread::Kind,
        participants: Vec<Participant>,
    ) -> thread::Result<Thread> {
        Ok(self
            .store
            .create_thread(creator, name, Some(kind), participants))
    }

    async fn list_messages(&self, thread_id: &thread::Id) -> message::Result<Vec<Message>> {
        Ok(self.store.list_messages(thread_id))
    }

    async fn find_message(&self, id: &message::Id) -> message::Result<Message> {
        self.store
            .find_message(id)
            .ok_or(message::Error::NotFound(Some(*id)))
    }

    async fn insert_message(
        &self,
        thread_id: &thread::Id,
        draft: &MessageDraft,
        sender: &user::Id,
    ) -> message::Result<(Thread, Message)> {
        Ok(self.store.push_message(thread_id, draft, sender))
    }

    async fn mark_read(
        &self,
        thread_id: &thread::Id,
        message_ids: &[message::Id],
        reader: &user::Id,
    ) -> message::Result<()> {
        self.store.mark_read(thread_id, message_ids, reader);
        Ok(())
    }

    async fn hide_message(&self, id: &message::Id, viewer: &user::Id) -> message::Result<()> {
        self.store
            .hide_message(id, viewer)
            .map(|_| ())
            .ok_or(message::Error::NotFound(Some(*id)))
    }

    async fn redact_message(&self, id: &message::Id, _sender: &user::Id) -> message::Result<()> {
        self.store
            .redact_message(id)
            .map(|_| ())
            .ok_or(message::Error::NotFound(Some(*id)))
    }

    async fn search(
        &self,
        query: &str,
        viewer: &user::Id,
        thread_id: Option<&thread::Id>,
    ) -> message::Result<Vec<Message>> {
        Ok(self.store.search(query, viewer, thread_id))
    }
}
