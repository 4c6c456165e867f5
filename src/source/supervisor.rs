use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{info, warn};

use super::DataSource;
use crate::message::model::Message;
use crate::thread::model::Thread;
use crate::{message, thread};

/// Which path currently serves reads and writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Remote,
    Degraded,
}

/// Owns the remote/local pair and the sticky mode between them.
///
/// The mode only moves through [`demote`](Self::demote) and
/// [`promote`](Self::promote): a remote failure demotes, a later successful
/// remote read promotes. Writes always go through [`active`](Self::active),
/// reads may probe [`remote`](Self::remote) first regardless of mode.
pub struct SourceSupervisor {
    remote: Arc<dyn DataSource>,
    local: Arc<dyn DataSource>,
    mode: Mutex<Mode>,
}

impl SourceSupervisor {
    pub fn new(remote: Arc<dyn DataSource>, local: Arc<dyn DataSource>) -> Self {
        Self {
            remote,
            local,
            mode: Mutex::new(Mode::Remote),
        }
    }

    fn mode_lock(&self) -> MutexGuard<'_, Mode> {
        self.mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> Mode {
        *self.mode_lock()
    }

    pub fn is_degraded(&self) -> bool {
        self.mode() == Mode::Degraded
    }

    pub fn demote(&self) {
        let mut mode = self.mode_lock();
        if *mode == Mode::Remote {
            warn!("backend unreachable, switching to local fallback");
            *mode = Mode::Degraded;
        }
    }

    pub fn promote(&self) {
        let mut mode = self.mode_lock();
        if *mode == Mode::Degraded {
            info!("backend reachable again, leaving local fallback");
            *mode = Mode::Remote;
        }
    }

    pub fn remote(&self) -> Arc<dyn DataSource> {
        Arc::clone(&self.remote)
    }

    pub fn local(&self) -> Arc<dyn DataSource> {
        Arc::clone(&self.local)
    }

    pub fn active(&self) -> Arc<dyn DataSource> {
        match self.mode() {
            Mode::Remote => self.remote(),
            Mode::Degraded => self.local(),
        }
    }

    /// Remote-first thread lookup. A remote failure demotes and falls
    /// through to the local mirror.
    pub async fn find_thread(&self, id: &thread::Id) -> thread::Result<Thread> {
        match self.remote.find_thread(id).await {
            Ok(thread) => {
                self.promote();
                Ok(thread)
            }
            Err(e) => {
                warn!("remote thread lookup failed: {e:?}");
                self.demote();
                self.local.find_thread(id).await
            }
        }
    }

    /// Remote-first message lookup, same demotion rule as threads.
    pub async fn find_message(&self, id: &message::Id) -> message::Result<Message> {
        match self.remote.find_message(id).await {
            Ok(message) => {
                self.promote();
                Ok(message)
            }
            Err(e) => {
                warn!("remote message lookup failed: {e:?}");
                self.demote();
                self.local.find_message(id).await
            }
        }
    }
}
