use std::sync::{Arc, Mutex, PoisonError};

use log::info;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::event::EventRouter;
use crate::fallback::FallbackStore;
use crate::integration;
use crate::integration::backend::{Backend, HttpBackend};
use crate::integration::directory::{HttpProfileDirectory, ProfileDirectory};
use crate::integration::feed::{ChangeFeed, HttpChangeFeed};
use crate::integration::push::{HttpPushSender, PushSender};
use crate::message::service::MessageService;
use crate::notify::NotificationDispatcher;
use crate::settings::Config;
use crate::source::{LocalDataSource, RemoteDataSource, SourceSupervisor};
use crate::thread::service::ThreadService;
use crate::user::service::ProfileService;
use crate::{message, thread, user};

type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not subscribe to the realtime feed")]
    FeedUnavailable(#[source] integration::Error),
}

/// Root of the synchronization subsystem. One instance per session; every
/// collaborator is injected, so tests wire in-memory doubles where
/// production wires HTTP.
///
/// Construction wires the object graph, [`start`](Self::start) attaches the
/// realtime feed, [`dispose`](Self::dispose) tears everything down. Nothing
/// here is global.
pub struct ChatSync {
    profiles: user::Service,
    threads: thread::Service,
    messages: message::Service,
    router: Arc<EventRouter>,
    sources: Arc<SourceSupervisor>,
    feed: Arc<dyn ChangeFeed>,
    stop: Arc<Notify>,
    feed_task: Mutex<Option<JoinHandle<()>>>,
}

impl ChatSync {
    pub fn init(
        backend: Arc<dyn Backend>,
        feed: Arc<dyn ChangeFeed>,
        push: Arc<dyn PushSender>,
        directory: Arc<dyn ProfileDirectory>,
        config: &Config,
    ) -> Self {
        let store = Arc::new(FallbackStore::new());
        let profiles: user::Service = Arc::new(ProfileService::new(directory));

        let remote = Arc::new(RemoteDataSource::new(Arc::clone(&backend)));
        let local = Arc::new(LocalDataSource::new(store));
        let sources = Arc::new(SourceSupervisor::new(remote, local));

        let notifier = Arc::new(NotificationDispatcher::new(
            push,
            Arc::clone(&profiles),
            Arc::clone(&sources),
        ));
        let router = Arc::new(EventRouter::new(backend, Arc::clone(&notifier)));

        let threads: thread::Service = Arc::new(ThreadService::new(
            Arc::clone(&sources),
            Arc::clone(&profiles),
            Arc::clone(&router),
        ));
        let messages: message::Service = Arc::new(MessageService::new(
            Arc::clone(&sources),
            Arc::clone(&router),
            notifier,
            config.delete_window(),
        ));

        Self {
            profiles,
            threads,
            messages,
            router,
            sources,
            feed,
            stop: Arc::new(Notify::new()),
            feed_task: Mutex::new(None),
        }
    }

    /// Production wiring: HTTP collaborators against `Config::env()`.
    pub fn from_env() -> Self {
        let config = Config::env();
        let http = integration::init_http_client(&config);

        let backend = Arc::new(HttpBackend::new(http.clone(), config.base_url.clone()));
        let feed = Arc::new(HttpChangeFeed::new(
            integration::long_poll_client(&config),
            config.base_url.clone(),
            config.feed_poll_interval,
        ));
        let push = Arc::new(HttpPushSender::new(http.clone(), config.base_url.clone()));
        let directory = Arc::new(HttpProfileDirectory::new(http, config.base_url.clone()));

        Self::init(backend, feed, push, directory, &config)
    }
}

impl ChatSync {
    /// Subscribes to the realtime feed and routes its changes until
    /// [`dispose`](Self::dispose). Starting again replaces the previous
    /// routing task.
    pub async fn start(&self) -> Result<()> {
        let stream = self.feed.subscribe().await.map_err(Error::FeedUnavailable)?;

        let handle = tokio::spawn(Arc::clone(&self.router).run(stream, Arc::clone(&self.stop)));
        if let Some(previous) = self.swap_feed_task(Some(handle)) {
            previous.abort();
        }

        info!("realtime synchronization started");
        Ok(())
    }

    /// Stops routing and drops every live subscription. Idempotent; the
    /// instance must not be used afterwards.
    pub fn dispose(&self) {
        self.stop.notify_waiters();
        if let Some(task) = self.swap_feed_task(None) {
            task.abort();
        }
        self.router.clear();

        info!("realtime synchronization stopped");
    }

    fn swap_feed_task(&self, next: Option<JoinHandle<()>>) -> Option<JoinHandle<()>> {
        let mut slot = self
            .feed_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, next)
    }
}

impl ChatSync {
    pub fn profiles(&self) -> user::Service {
        Arc::clone(&self.profiles)
    }

    pub fn threads(&self) -> thread::Service {
        Arc::clone(&self.threads)
    }

    pub fn messages(&self) -> message::Service {
        Arc::clone(&self.messages)
    }

    pub fn router(&self) -> Arc<EventRouter> {
        Arc::clone(&self.router)
    }

    pub fn degraded(&self) -> bool {
        self.sources.is_degraded()
    }
}

impl Drop for ChatSync {
    fn drop(&mut self) {
        self.dispose();
    }
}
