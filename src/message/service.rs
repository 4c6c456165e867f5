use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use log::warn;

use super::MessageType;
use super::model::{Message, MessageDraft};
use super::policy;
use crate::event::EventRouter;
use crate::event::model::ThreadEvent;
use crate::notify::NotificationDispatcher;
use crate::source::SourceSupervisor;
use crate::{thread, user};

pub struct MessageService {
    sources: Arc<SourceSupervisor>,
    router: Arc<EventRouter>,
    notifier: Arc<NotificationDispatcher>,
    delete_window: TimeDelta,
}

impl MessageService {
    pub fn new(
        sources: Arc<SourceSupervisor>,
        router: Arc<EventRouter>,
        notifier: Arc<NotificationDispatcher>,
        delete_window: TimeDelta,
    ) -> Self {
        Self {
            sources,
            router,
            notifier,
            delete_window,
        }
    }
}

impl MessageService {
    /// Messages of a thread from one viewer's perspective, oldest first.
    /// Messages the viewer deleted for themselves are withheld. Remote-first
    /// like every read; a reachable backend promotes the session out of
    /// degraded mode.
    pub async fn find_by_thread_id(
        &self,
        thread_id: &thread::Id,
        viewer: &user::Id,
    ) -> super::Result<Vec<Message>> {
        let messages = match self.sources.remote().list_messages(thread_id).await {
            Ok(messages) => {
                self.sources.promote();
                messages
            }
            Err(e) => {
                warn!("message list from backend failed: {e:?}");
                self.sources.demote();
                self.sources.local().list_messages(thread_id).await?
            }
        };

        Ok(messages
            .into_iter()
            .filter(|m| !m.is_hidden_for(viewer))
            .collect())
    }

    /// Stores a message, updates the thread summary for subscribers and fans
    /// out push notifications. A backend failure demotes and the send lands
    /// in the local mirror instead; the caller sees a message either way.
    pub async fn create(
        &self,
        thread_id: &thread::Id,
        draft: &MessageDraft,
        sender: &user::Id,
    ) -> super::Result<Message> {
        let (thread, message) = match self
            .sources
            .active()
            .insert_message(thread_id, draft, sender)
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                warn!("message insert on backend failed: {e:?}");
                self.sources.demote();
                self.sources
                    .local()
                    .insert_message(thread_id, draft, sender)
                    .await?
            }
        };

        self.router.publish_thread(ThreadEvent::Updated {
            thread: thread.clone(),
        });
        self.router.publish_message(&message, false).await;

        if message.message_type == MessageType::CallRequest {
            self.notifier.dispatch_call_invite(&thread, &message).await;
        }

        Ok(message)
    }

    /// Add-only read receipts. A backend failure demotes and applies the
    /// receipts locally; the receipt is never lost on the reader's side.
    pub async fn mark_read(
        &self,
        thread_id: &thread::Id,
        message_ids: &[super::Id],
        reader: &user::Id,
    ) -> super::Result<()> {
        if let Err(e) = self
            .sources
            .active()
            .mark_read(thread_id, message_ids, reader)
            .await
        {
            warn!("read receipt on backend failed: {e:?}");
            self.sources.demote();
            self.sources
                .local()
                .mark_read(thread_id, message_ids, reader)
                .await?;
        }

        self.router.publish_seen(thread_id, message_ids, reader);
        Ok(())
    }

    /// Hides a message for the requester only. No time limit, no effect on
    /// anyone else's view.
    pub async fn delete_for_me(&self, id: &super::Id, viewer: &user::Id) -> super::Result<()> {
        if let Err(e) = self.sources.active().hide_message(id, viewer).await {
            warn!("hide on backend failed: {e:?}");
            self.sources.demote();
            self.sources.local().hide_message(id, viewer).await?;
        }
        Ok(())
    }

    pub async fn can_delete_for_everyone(&self, id: &super::Id, requester: &user::Id) -> bool {
        match self.sources.find_message(id).await {
            Ok(message) => {
                policy::can_delete_for_everyone(&message, requester, Utc::now(), self.delete_window)
            }
            Err(_) => false,
        }
    }

    /// Redacts a message for all participants. Checked against the retention
    /// window before the call and enforced again by the backend; unlike the
    /// other operations a failure here surfaces to the caller.
    pub async fn delete_for_everyone(
        &self,
        id: &super::Id,
        requester: &user::Id,
    ) -> super::Result<()> {
        let message = self.sources.find_message(id).await?;
        policy::check_delete_for_everyone(&message, requester, Utc::now(), self.delete_window)?;

        self.sources.active().redact_message(id, requester).await?;

        self.router.publish_redacted(&message.thread_id, id);
        Ok(())
    }

    pub async fn search(
        &self,
        query: &str,
        viewer: &user::Id,
        thread_id: Option<&thread::Id>,
    ) -> super::Result<Vec<Message>> {
        match self.sources.remote().search(query, viewer, thread_id).await {
            Ok(messages) => {
                self.sources.promote();
                Ok(messages)
            }
            Err(e) => {
                warn!("message search on backend failed: {e:?}");
                self.sources.demote();
                self.sources.local().search(query, viewer, thread_id).await
            }
        }
    }
}
