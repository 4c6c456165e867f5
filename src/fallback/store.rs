use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::message::model::{Message, MessageDraft};
use crate::thread::model::{MemberKey, Thread};
use crate::user::model::Participant;
use crate::{message, thread, user};

#[derive(Default)]
struct State {
    threads: HashMap<thread::Id, Thread>,
    by_members: HashMap<MemberKey, thread::Id>,
    messages: HashMap<thread::Id, Vec<Message>>,
    message_index: HashMap<message::Id, thread::Id>,
}

/// In-memory, per-session mirror of threads and messages, serving every
/// operation while the backend is degraded. No persistence, no cross-tab
/// sharing. All mutations are synchronous; a single lock covers all maps so
/// no reader observes an intermediate state.
#[derive(Default)]
pub struct FallbackStore {
    state: Mutex<State>,
}

impl FallbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FallbackStore {
    pub fn list_threads(&self, viewer: &user::Id) -> Vec<Thread> {
        let state = self.lock();

        let mut threads: Vec<Thread> = state
            .threads
            .values()
            .filter(|t| t.is_participant(viewer))
            .cloned()
            .collect();

        for t in threads.iter_mut() {
            if let Some(msgs) = state.messages.get(&t.id) {
                t.recount_unread(msgs, viewer);
            }
        }

        threads.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        threads
    }

    pub fn find_thread(&self, id: &thread::Id) -> Option<Thread> {
        self.lock().threads.get(id).cloned()
    }

    /// Idempotent by participant set: re-requesting a thread for the same
    /// set returns the existing one.
    pub fn create_thread(
        &self,
        creator: &user::Id,
        name: Option<String>,
        kind: Option<thread::Kind>,
        participants: Vec<Participant>,
    ) -> Thread {
        let mut state = self.lock();

        let key = MemberKey::of(
            participants
                .iter()
                .map(|p| &p.id)
                .chain(std::iter::once(creator)),
        );

        if let Some(existing) = state
            .by_members
            .get(&key)
            .and_then(|id| state.threads.get(id))
        {
            return existing.clone();
        }

        let thread = Thread::new(creator, name, kind, participants);
        state.by_members.insert(key, thread.id);
        state.threads.insert(thread.id, thread.clone());
        state.messages.entry(thread.id).or_default();
        thread
    }

    pub fn list_messages(&self, thread_id: &thread::Id) -> Vec<Message> {
        self.lock()
            .messages
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn find_message(&self, id: &message::Id) -> Option<Message> {
        let state = self.lock();
        let thread_id = state.message_index.get(id)?;
        state
            .messages
            .get(thread_id)?
            .iter()
            .find(|m| &m.id == id)
            .cloned()
    }

    /// Synthesizes a message locally. Unknown threads get a stub container
    /// so a degraded session can keep sending.
    pub fn push_message(
        &self,
        thread_id: &thread::Id,
        draft: &MessageDraft,
        sender: &user::Id,
    ) -> (Thread, Message) {
        let mut state = self.lock();

        if !state.threads.contains_key(thread_id) {
            let stub = Thread::stub(*thread_id, Participant::unknown(sender));
            state.by_members.insert(stub.member_key(), stub.id);
            state.threads.insert(stub.id, stub);
        }

        let msg = Message::new(*thread_id, sender, draft.clone());

        let thread = {
            // contains_key checked above
            let thread = state
                .threads
                .get_mut(thread_id)
                .expect("thread was just ensured");
            thread.touch(msg.preview(), msg.created_at);
            thread.clone()
        };

        state.messages.entry(*thread_id).or_default().push(msg.clone());
        state.message_index.insert(msg.id, *thread_id);

        (thread, msg)
    }

    /// Add-only read receipts; the thread's unread count is reset directly
    /// and recomputed on the next fetch anyway.
    pub fn mark_read(&self, thread_id: &thread::Id, ids: &[message::Id], reader: &user::Id) {
        let mut state = self.lock();

        if let Some(msgs) = state.messages.get_mut(thread_id) {
            for m in msgs.iter_mut().filter(|m| ids.contains(&m.id)) {
                m.mark_read_by(reader);
            }
        }

        if let Some(thread) = state.threads.get_mut(thread_id) {
            thread.unread_count = 0;
        }
    }

    pub fn hide_message(&self, id: &message::Id, viewer: &user::Id) -> Option<Message> {
        self.mutate_message(id, |m| m.hide_for(viewer))
    }

    pub fn redact_message(&self, id: &message::Id) -> Option<Message> {
        self.mutate_message(id, |m| m.redact(Utc::now()))
    }

    pub fn search(
        &self,
        query: &str,
        viewer: &user::Id,
        thread_id: Option<&thread::Id>,
    ) -> Vec<Message> {
        let state = self.lock();
        let needle = query.to_lowercase();

        let mut hits: Vec<Message> = state
            .messages
            .iter()
            .filter(|(tid, _)| match thread_id {
                Some(scope) => scope == *tid,
                None => true,
            })
            .filter(|(tid, _)| {
                state
                    .threads
                    .get(tid)
                    .is_some_and(|t| t.is_participant(viewer))
            })
            .flat_map(|(_, msgs)| msgs.iter())
            .filter(|m| !m.is_deleted && !m.is_hidden_for(viewer))
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();

        hits.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        hits
    }

    fn mutate_message(
        &self,
        id: &message::Id,
        apply: impl FnOnce(&mut Message),
    ) -> Option<Message> {
        let mut state = self.lock();
        let thread_id = *state.message_index.get(id)?;
        let msgs = state.messages.get_mut(&thread_id)?;
        let msg = msgs.iter_mut().find(|m| &m.id == id)?;
        apply(msg);
        Some(msg.clone())
    }
}
