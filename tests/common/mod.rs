#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, UnboundedSender};
use uuid::Uuid;

use chat_sync::event::Subscription;
use chat_sync::integration;
use chat_sync::integration::backend::Backend;
use chat_sync::integration::directory::ProfileDirectory;
use chat_sync::integration::feed::ChangeFeed;
use chat_sync::integration::model::{
    ChangeEvent, ChangeStream, MessageRecord, NewMessageRecord, NewThreadRecord, Page,
    ParticipantRecord, ProfileRecord, ThreadRecord,
};
use chat_sync::integration::push::{PushRequest, PushSender};
use chat_sync::settings::Config;
use chat_sync::{message, thread, user, ChatSync};

pub fn uid(s: &str) -> user::Id {
    user::Id(s.into())
}

pub fn participant(id: &str) -> ParticipantRecord {
    ParticipantRecord {
        id: uid(id),
        name: Some(id.to_uppercase()),
        avatar_url: None,
    }
}

/// Receives one event or panics; a second of silence means the test failed.
pub async fn recv_event<E>(sub: &mut Subscription<E>) -> E {
    tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("timed out waiting for event")
        .expect("subscription closed")
}

/// Gives spawned routing a chance to run, then asserts silence.
pub async fn assert_no_event<E>(sub: &mut Subscription<E>) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(sub.try_recv().is_none(), "expected no event");
}

#[derive(Default)]
struct BackendState {
    threads: HashMap<thread::Id, ThreadRecord>,
    messages: Vec<MessageRecord>,
}

/// In-memory stand-in for the remote store. Enforces the same server-side
/// rules the real backend does: membership on reads, sender and retention
/// window on redaction.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<BackendState>,
    /// Every call fails with a 503 while set.
    pub offline: AtomicBool,
    /// Direct thread reads fail with the recursive-policy fault while set;
    /// the aggregated overview keeps working.
    pub recursive_policy: AtomicBool,
}

impl MemoryBackend {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn seed_thread(&self, ids: &[&str]) -> thread::Id {
        self.seed_thread_with(ids.iter().map(|id| participant(id)).collect())
    }

    pub fn seed_thread_with(&self, participants: Vec<ParticipantRecord>) -> thread::Id {
        let id = thread::Id::from(Uuid::new_v4());
        let now = Utc::now();
        let record = ThreadRecord {
            id,
            kind: None,
            name: None,
            last_message_preview: None,
            last_message_at: None,
            participants,
            messages: Vec::new(),
            unread_count: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.state.lock().unwrap().threads.insert(id, record);
        id
    }

    pub fn seed_message(&self, thread_id: thread::Id, sender: &str, content: &str) -> message::Id {
        self.seed_message_at(thread_id, sender, content, Utc::now())
    }

    pub fn seed_message_at(
        &self,
        thread_id: thread::Id,
        sender: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> message::Id {
        let id = message::Id::from(Uuid::new_v4());
        let record = MessageRecord {
            id,
            thread_id,
            sender_id: uid(sender),
            content: content.into(),
            created_at: Some(created_at),
            updated_at: None,
            message_type: None,
            metadata: None,
            read_by: vec![uid(sender)],
            is_deleted: false,
            deleted_for: Vec::new(),
            deleted_at: None,
            attachments: Vec::new(),
            sender: None,
            reply_to_id: None,
        };

        let mut state = self.state.lock().unwrap();
        if let Some(t) = state.threads.get_mut(&thread_id) {
            t.last_message_preview = Some(content.into());
            t.last_message_at = Some(created_at);
        }
        state.messages.push(record);
        id
    }

    pub fn message(&self, id: &message::Id) -> Option<MessageRecord> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .find(|m| &m.id == id)
            .cloned()
    }

    pub fn message_count(&self) -> usize {
        self.state.lock().unwrap().messages.len()
    }

    fn guard(&self) -> Result<(), integration::Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(integration::Error::Status {
                status: 503,
                body: "service unavailable".into(),
            });
        }
        Ok(())
    }

    fn with_read_states(state: &BackendState, record: &ThreadRecord) -> ThreadRecord {
        let mut filled = record.clone();
        filled.messages = state
            .messages
            .iter()
            .filter(|m| m.thread_id == record.id && !m.is_deleted)
            .map(|m| chat_sync::integration::model::ReadStateRecord {
                sender_id: m.sender_id.clone(),
                read_by: m.read_by.clone(),
            })
            .collect();
        filled
    }

    fn threads_for(&self, viewer: &user::Id, page: &Page) -> Vec<ThreadRecord> {
        let state = self.state.lock().unwrap();
        let mut threads: Vec<ThreadRecord> = state
            .threads
            .values()
            .filter(|t| t.participants.iter().any(|p| &p.id == viewer))
            .map(|t| Self::with_read_states(&state, t))
            .collect();
        threads.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        page.slice(threads)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch_threads(
        &self,
        viewer: &user::Id,
        page: &Page,
    ) -> Result<Vec<ThreadRecord>, integration::Error> {
        self.guard()?;
        if self.recursive_policy.load(Ordering::SeqCst) {
            return Err(integration::Error::Policy {
                code: "42P17".into(),
                message: "infinite recursion detected in policy for relation \"chat_threads\""
                    .into(),
            });
        }
        Ok(self.threads_for(viewer, page))
    }

    async fn fetch_thread_overview(
        &self,
        viewer: &user::Id,
        page: &Page,
    ) -> Result<Vec<ThreadRecord>, integration::Error> {
        self.guard()?;
        Ok(self.threads_for(viewer, page))
    }

    async fn fetch_thread(&self, id: &thread::Id) -> Result<ThreadRecord, integration::Error> {
        self.guard()?;
        let state = self.state.lock().unwrap();
        state
            .threads
            .get(id)
            .map(|t| Self::with_read_states(&state, t))
            .ok_or(integration::Error::Status {
                status: 404,
                body: "thread not found".into(),
            })
    }

    async fn fetch_messages(
        &self,
        thread_id: &thread::Id,
    ) -> Result<Vec<MessageRecord>, integration::Error> {
        self.guard()?;
        let state = self.state.lock().unwrap();
        let mut messages: Vec<MessageRecord> = state
            .messages
            .iter()
            .filter(|m| &m.thread_id == thread_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn fetch_message(&self, id: &message::Id) -> Result<MessageRecord, integration::Error> {
        self.guard()?;
        self.message(id).ok_or(integration::Error::Status {
            status: 404,
            body: "message not found".into(),
        })
    }

    async fn insert_thread(
        &self,
        record: &NewThreadRecord,
    ) -> Result<ThreadRecord, integration::Error> {
        self.guard()?;
        let id = thread::Id::from(Uuid::new_v4());
        let now = Utc::now();

        let mut ids = record.participant_ids.clone();
        if !ids.contains(&record.created_by) {
            ids.insert(0, record.created_by.clone());
        }

        let stored = ThreadRecord {
            id,
            kind: Some(record.kind.clone()),
            name: record.name.clone(),
            last_message_preview: None,
            last_message_at: None,
            participants: ids.iter().map(|i| participant(i.as_str())).collect(),
            messages: Vec::new(),
            unread_count: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.state
            .lock()
            .unwrap()
            .threads
            .insert(id, stored.clone());
        Ok(stored)
    }

    async fn insert_message(
        &self,
        record: &NewMessageRecord,
    ) -> Result<MessageRecord, integration::Error> {
        self.guard()?;
        let now = Utc::now();
        let stored = MessageRecord {
            id: message::Id::from(Uuid::new_v4()),
            thread_id: record.thread_id,
            sender_id: record.sender_id.clone(),
            content: record.content.clone(),
            created_at: Some(now),
            updated_at: None,
            message_type: Some(record.message_type.clone()),
            metadata: record.metadata.clone(),
            read_by: vec![record.sender_id.clone()],
            is_deleted: false,
            deleted_for: Vec::new(),
            deleted_at: None,
            attachments: record
                .attachments
                .iter()
                .map(|a| chat_sync::integration::model::AttachmentRecord {
                    id: Some(a.id.clone()),
                    name: a.name.clone(),
                    url: a.url.clone(),
                    mime_type: Some(a.mime_type.clone()),
                    size: Some(a.size),
                })
                .collect(),
            sender: None,
            reply_to_id: record.reply_to_id,
        };

        let mut state = self.state.lock().unwrap();
        if let Some(t) = state.threads.get_mut(&record.thread_id) {
            t.last_message_preview = Some(stored.content.clone());
            t.last_message_at = Some(now);
        }
        state.messages.push(stored.clone());
        Ok(stored)
    }

    async fn append_read_receipts(
        &self,
        thread_id: &thread::Id,
        message_ids: &[message::Id],
        reader: &user::Id,
    ) -> Result<(), integration::Error> {
        self.guard()?;
        let mut state = self.state.lock().unwrap();
        for m in state
            .messages
            .iter_mut()
            .filter(|m| &m.thread_id == thread_id && message_ids.contains(&m.id))
        {
            if !m.read_by.contains(reader) {
                m.read_by.push(reader.clone());
            }
        }
        Ok(())
    }

    async fn hide_message(
        &self,
        id: &message::Id,
        viewer: &user::Id,
    ) -> Result<(), integration::Error> {
        self.guard()?;
        let mut state = self.state.lock().unwrap();
        let msg = state
            .messages
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or(integration::Error::Status {
                status: 404,
                body: "message not found".into(),
            })?;
        if !msg.deleted_for.contains(viewer) {
            msg.deleted_for.push(viewer.clone());
        }
        Ok(())
    }

    async fn redact_message(
        &self,
        id: &message::Id,
        sender: &user::Id,
    ) -> Result<(), integration::Error> {
        self.guard()?;
        let mut state = self.state.lock().unwrap();
        let msg = state
            .messages
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or(integration::Error::Status {
                status: 404,
                body: "message not found".into(),
            })?;

        if msg.is_deleted {
            return Err(integration::Error::Status {
                status: 409,
                body: "already deleted".into(),
            });
        }
        if &msg.sender_id != sender {
            return Err(integration::Error::Status {
                status: 403,
                body: "not the sender".into(),
            });
        }
        let created = msg.created_at.unwrap_or_else(Utc::now);
        if Utc::now() - created > chrono::TimeDelta::minutes(15) {
            return Err(integration::Error::Status {
                status: 403,
                body: "deletion window expired".into(),
            });
        }

        msg.is_deleted = true;
        msg.deleted_at = Some(Utc::now());
        msg.content.clear();
        Ok(())
    }

    async fn search_messages(
        &self,
        query: &str,
        viewer: &user::Id,
        thread_id: Option<&thread::Id>,
    ) -> Result<Vec<MessageRecord>, integration::Error> {
        self.guard()?;
        let state = self.state.lock().unwrap();
        let needle = query.to_lowercase();
        let hits = state
            .messages
            .iter()
            .filter(|m| match thread_id {
                Some(scope) => &m.thread_id == scope,
                None => true,
            })
            .filter(|m| {
                state
                    .threads
                    .get(&m.thread_id)
                    .is_some_and(|t| t.participants.iter().any(|p| &p.id == viewer))
            })
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Ok(hits)
    }
}

/// Captures every push request instead of delivering it.
#[derive(Default)]
pub struct RecordingPushSender {
    sent: Mutex<Vec<PushRequest>>,
}

impl RecordingPushSender {
    pub fn sent(&self) -> Vec<PushRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushSender for RecordingPushSender {
    async fn send(&self, request: PushRequest) -> Result<(), integration::Error> {
        self.sent.lock().unwrap().push(request);
        Ok(())
    }
}

/// Fixed id-to-profile map.
#[derive(Default)]
pub struct StaticDirectory {
    profiles: HashMap<user::Id, ProfileRecord>,
}

impl StaticDirectory {
    pub fn with(names: &[(&str, &str)]) -> Self {
        let profiles = names
            .iter()
            .map(|(id, name)| {
                (
                    uid(id),
                    ProfileRecord {
                        id: uid(id),
                        full_name: Some(name.to_string()),
                        username: None,
                        avatar_url: None,
                    },
                )
            })
            .collect();
        Self { profiles }
    }
}

#[async_trait]
impl ProfileDirectory for StaticDirectory {
    async fn find_by_id(&self, id: &user::Id) -> Result<Option<ProfileRecord>, integration::Error> {
        Ok(self.profiles.get(id).cloned())
    }
}

/// Test-driven change feed: whatever the test sends down the channel comes
/// out of the subscribed stream.
pub struct ChannelFeed {
    rx: Mutex<Option<mpsc::UnboundedReceiver<ChangeEvent>>>,
}

impl ChannelFeed {
    pub fn pair() -> (Arc<Self>, UnboundedSender<ChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                rx: Mutex::new(Some(rx)),
            }),
            tx,
        )
    }
}

#[async_trait]
impl ChangeFeed for ChannelFeed {
    async fn subscribe(&self) -> Result<ChangeStream, integration::Error> {
        let mut rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .ok_or(integration::Error::Status {
                status: 409,
                body: "feed already subscribed".into(),
            })?;

        let stream = async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        };
        Ok(Box::pin(stream))
    }
}

pub struct Harness {
    pub sync: ChatSync,
    pub backend: Arc<MemoryBackend>,
    pub push: Arc<RecordingPushSender>,
    pub feed: UnboundedSender<ChangeEvent>,
}

pub fn harness() -> Harness {
    harness_with_directory(StaticDirectory::default())
}

pub fn harness_with_directory(directory: StaticDirectory) -> Harness {
    let backend = Arc::new(MemoryBackend::default());
    let push = Arc::new(RecordingPushSender::default());
    let (feed, feed_tx) = ChannelFeed::pair();

    let sync = ChatSync::init(
        backend.clone(),
        feed,
        push.clone(),
        Arc::new(directory),
        &Config::default(),
    );

    Harness {
        sync,
        backend,
        push,
        feed: feed_tx,
    }
}
