use crate::message::model::Message;
use crate::thread::model::Thread;
use crate::{message, thread, user};

/// Thread-level change delivered to per-user subscribers.
#[derive(Clone, Debug)]
pub enum ThreadEvent {
    New { thread: Thread },
    Updated { thread: Thread },
}

impl ThreadEvent {
    pub fn thread(&self) -> &Thread {
        match self {
            Self::New { thread } | Self::Updated { thread } => thread,
        }
    }
}

/// Message-level change delivered to per-thread subscribers.
///
/// `skip_push` marks deliveries that the realtime feed already carried:
/// subscribers still render them, but no notification fan-out happens for
/// them a second time.
#[derive(Clone, Debug)]
pub enum MessageEvent {
    New {
        message: Message,
        skip_push: bool,
    },
    Updated {
        message: Message,
    },
    Redacted {
        thread_id: thread::Id,
        id: message::Id,
    },
    Seen {
        thread_id: thread::Id,
        message_ids: Vec<message::Id>,
        reader: user::Id,
    },
}
