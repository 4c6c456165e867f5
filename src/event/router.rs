use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use log::{debug, warn};
use tokio::sync::Notify;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::model::{MessageEvent, ThreadEvent};
use crate::integration::backend::Backend;
use crate::integration::model::{ChangeEvent, ChangeOp, ChangeStream, Table, ThreadRecord};
use crate::message::model::Message;
use crate::notify::NotificationDispatcher;
use crate::{message, thread, user};

/// Keyed fan-out table. Senders are dropped eagerly on unsubscribe so a
/// closed receiver never accumulates events.
struct Registry<K, E> {
    subs: Mutex<HashMap<K, HashMap<u64, UnboundedSender<E>>>>,
}

impl<K: Clone + Eq + Hash, E: Clone> Registry<K, E> {
    fn new() -> Self {
        Self {
            subs: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, HashMap<u64, UnboundedSender<E>>>> {
        self.subs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(&self, key: K, token: u64, tx: UnboundedSender<E>) {
        self.lock().entry(key).or_default().insert(token, tx);
    }

    fn remove(&self, key: &K, token: u64) {
        let mut subs = self.lock();
        if let Some(entry) = subs.get_mut(key) {
            entry.remove(&token);
            if entry.is_empty() {
                subs.remove(key);
            }
        }
    }

    fn publish_to(&self, key: &K, event: E) {
        if let Some(entry) = self.lock().get(key) {
            for tx in entry.values() {
                // a closed receiver is cleaned up on unsubscribe, not here
                let _ = tx.send(event.clone());
            }
        }
    }

    fn keys(&self) -> Vec<K> {
        self.lock().keys().cloned().collect()
    }

    fn count(&self, key: &K) -> usize {
        self.lock().get(key).map_or(0, HashMap::len)
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// Live handle to an event subscription. Dropping it (or calling
/// [`unsubscribe`](Self::unsubscribe)) detaches from the router; there is no
/// way to leak a registration.
pub struct Subscription<E> {
    events: UnboundedReceiver<E>,
    cleanup: Option<Box<dyn FnOnce() + Send>>,
}

impl<E> Subscription<E> {
    pub async fn recv(&mut self) -> Option<E> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<E> {
        self.events.try_recv().ok()
    }

    /// Idempotent; also runs on drop.
    pub fn unsubscribe(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
        self.events.close();
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Routes changes to in-process subscribers and the push dispatcher.
///
/// Two planes: thread events keyed per user (each subscriber sees the thread
/// normalized for themselves), message events keyed per thread. Feed-borne
/// deliveries are re-fetched in full and marked `skip_push`, since the
/// originating side already handled notification fan-out.
pub struct EventRouter {
    thread_subs: Arc<Registry<user::Id, ThreadEvent>>,
    message_subs: Arc<Registry<thread::Id, MessageEvent>>,
    seq: AtomicU64,
    backend: Arc<dyn Backend>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl EventRouter {
    pub fn new(backend: Arc<dyn Backend>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            thread_subs: Arc::new(Registry::new()),
            message_subs: Arc::new(Registry::new()),
            seq: AtomicU64::new(0),
            backend,
            dispatcher,
        }
    }

    pub fn subscribe_threads(&self, viewer: &user::Id) -> Subscription<ThreadEvent> {
        let token = self.seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        self.thread_subs.add(viewer.clone(), token, tx);

        let registry = Arc::clone(&self.thread_subs);
        let key = viewer.clone();
        Subscription {
            events: rx,
            cleanup: Some(Box::new(move || registry.remove(&key, token))),
        }
    }

    pub fn subscribe_messages(&self, thread_id: &thread::Id) -> Subscription<MessageEvent> {
        let token = self.seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        self.message_subs.add(*thread_id, token, tx);

        let registry = Arc::clone(&self.message_subs);
        let key = *thread_id;
        Subscription {
            events: rx,
            cleanup: Some(Box::new(move || registry.remove(&key, token))),
        }
    }

    pub fn thread_subscriber_count(&self, viewer: &user::Id) -> usize {
        self.thread_subs.count(viewer)
    }

    pub fn message_subscriber_count(&self, thread_id: &thread::Id) -> usize {
        self.message_subs.count(thread_id)
    }

    pub fn clear(&self) {
        self.thread_subs.clear();
        self.message_subs.clear();
    }
}

impl EventRouter {
    /// Delivers a thread event to its participants only.
    pub fn publish_thread(&self, event: ThreadEvent) {
        for p in &event.thread().participants {
            self.thread_subs.publish_to(&p.id, event.clone());
        }
    }

    /// Delivers a new message to thread subscribers, then fans out push
    /// notifications unless the delivery is marked `skip_push`.
    pub async fn publish_message(&self, message: &Message, skip_push: bool) {
        self.message_subs.publish_to(
            &message.thread_id,
            MessageEvent::New {
                message: message.clone(),
                skip_push,
            },
        );

        if !skip_push {
            self.dispatcher.dispatch(message).await;
        }
    }

    pub fn publish_message_updated(&self, message: &Message) {
        self.message_subs.publish_to(
            &message.thread_id,
            MessageEvent::Updated {
                message: message.clone(),
            },
        );
    }

    pub fn publish_seen(
        &self,
        thread_id: &thread::Id,
        message_ids: &[message::Id],
        reader: &user::Id,
    ) {
        self.message_subs.publish_to(
            thread_id,
            MessageEvent::Seen {
                thread_id: *thread_id,
                message_ids: message_ids.to_vec(),
                reader: reader.clone(),
            },
        );
    }

    pub fn publish_redacted(&self, thread_id: &thread::Id, id: &message::Id) {
        self.message_subs
            .publish_to(thread_id, MessageEvent::Redacted {
                thread_id: *thread_id,
                id: *id,
            });
    }
}

impl EventRouter {
    /// Consumes the realtime feed until the stream ends or `stop` fires.
    pub async fn run(self: Arc<Self>, mut stream: ChangeStream, stop: Arc<Notify>) {
        loop {
            tokio::select! {
                _ = stop.notified() => break,
                next = stream.next() => match next {
                    Some(event) => self.route(event).await,
                    None => break,
                },
            }
        }
        debug!("realtime routing stopped");
    }

    /// Feed payloads are partial snapshots; the full record is re-fetched
    /// before delivery so subscribers never see a stale shape.
    async fn route(&self, event: ChangeEvent) {
        match event.table {
            Table::Threads => self.route_thread_change(event).await,
            Table::Messages => self.route_message_change(event).await,
        }
    }

    async fn route_thread_change(&self, event: ChangeEvent) {
        if event.op == ChangeOp::Delete {
            return;
        }

        let Some(id) = event.thread_id() else {
            debug!("thread change with non-uuid record id: {}", event.record_id);
            return;
        };

        match self.backend.fetch_thread(&id).await {
            Ok(record) => self.route_thread_record(record, event.op),
            Err(e) => warn!("dropping thread change, re-fetch failed: {e:?}"),
        }
    }

    /// Each subscriber gets the thread normalized for themselves; a record
    /// the subscriber is not a participant of is silently withheld.
    fn route_thread_record(&self, record: ThreadRecord, op: ChangeOp) {
        for viewer in self.thread_subs.keys() {
            match record.clone().normalize(&viewer) {
                Ok(thread) => {
                    let event = match op {
                        ChangeOp::Insert => ThreadEvent::New { thread },
                        _ => ThreadEvent::Updated { thread },
                    };
                    self.thread_subs.publish_to(&viewer, event);
                }
                Err(thread::Error::NotMember) => {}
                Err(e) => debug!("dropping thread event for {viewer}: {e:?}"),
            }
        }
    }

    async fn route_message_change(&self, event: ChangeEvent) {
        if event.op == ChangeOp::Delete {
            if let Some(msg) = event.snapshot_message() {
                self.publish_redacted(&msg.thread_id, &msg.id);
            }
            return;
        }

        let Some(id) = event.message_id() else {
            debug!("message change with non-uuid record id: {}", event.record_id);
            return;
        };

        match self.backend.fetch_message(&id).await {
            Ok(record) => match record.normalize() {
                Ok(message) => self.deliver_message(message, event.op).await,
                Err(e) => debug!("dropping malformed message change: {e:?}"),
            },
            Err(e) => {
                // Call signaling is time-critical; a snapshot beats nothing.
                // Anything else is dropped rather than delivered stale.
                match event.snapshot_message() {
                    Some(msg) if msg.message_type.is_call_control() => {
                        warn!("re-fetch failed, passing call snapshot through: {e:?}");
                        self.deliver_message(msg, event.op).await;
                    }
                    _ => debug!("dropping unresolvable message change: {e:?}"),
                }
            }
        }
    }

    async fn deliver_message(&self, message: Message, op: ChangeOp) {
        match op {
            ChangeOp::Insert => self.publish_message(&message, true).await,
            _ => self.publish_message_updated(&message),
        }
    }
}
