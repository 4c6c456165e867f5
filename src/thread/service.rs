use std::sync::Arc;

use log::warn;
use serde::Deserialize;

use super::{Kind, model::Thread};
use crate::event::EventRouter;
use crate::event::model::ThreadEvent;
use crate::integration::model::Page;
use crate::source::SourceSupervisor;
use crate::user;
use crate::user::model::Participant;

/// Creation request. Callers usually pass bare ids and let the profile
/// service fill in display data; pre-resolved participants short-circuit
/// that lookup.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CreateThread {
    pub participant_ids: Vec<user::Id>,
    #[serde(skip)]
    pub participants: Option<Vec<Participant>>,
    #[serde(default)]
    pub kind: Option<Kind>,
    #[serde(default)]
    pub name: Option<String>,
}

impl CreateThread {
    pub fn with(participant_ids: Vec<user::Id>) -> Self {
        Self {
            participant_ids,
            ..Self::default()
        }
    }
}

pub struct ThreadService {
    sources: Arc<SourceSupervisor>,
    profiles: user::Service,
    router: Arc<EventRouter>,
}

impl ThreadService {
    pub fn new(
        sources: Arc<SourceSupervisor>,
        profiles: user::Service,
        router: Arc<EventRouter>,
    ) -> Self {
        Self {
            sources,
            profiles,
            router,
        }
    }
}

impl ThreadService {
    /// Lists the viewer's threads, newest activity first. Reads probe the
    /// backend even in degraded mode so a recovered backend promotes the
    /// session back; only when that probe fails is the local mirror served.
    pub async fn find_all(&self, viewer: &user::Id, page: &Page) -> super::Result<Vec<Thread>> {
        match self.sources.remote().list_threads(viewer, page).await {
            Ok(threads) => {
                self.sources.promote();
                Ok(threads)
            }
            Err(e) => {
                warn!("thread list from backend failed: {e:?}");
                self.sources.demote();
                self.sources.local().list_threads(viewer, page).await
            }
        }
    }

    pub async fn find_by_id(&self, id: &super::Id) -> super::Result<Thread> {
        self.sources.find_thread(id).await
    }

    /// Creates (or re-surfaces) a thread for a participant set and announces
    /// it to the participants' subscriptions.
    pub async fn create(&self, creator: &user::Id, req: CreateThread) -> super::Result<Thread> {
        let mut participants = match req.participants {
            Some(participants) => participants,
            None => self.profiles.resolve_many(&req.participant_ids).await,
        };

        if !participants.iter().any(|p| &p.id == creator) {
            participants.insert(0, self.profiles.resolve(creator).await);
        }

        let kind = req
            .kind
            .unwrap_or_else(|| Kind::derive_from(participants.len()));

        let thread = match self
            .sources
            .active()
            .create_thread(creator, req.name.clone(), kind, participants.clone())
            .await
        {
            Ok(thread) => thread,
            Err(e) => {
                warn!("thread creation on backend failed: {e:?}");
                self.sources.demote();
                self.sources
                    .local()
                    .create_thread(creator, req.name, kind, participants)
                    .await?
            }
        };

        self.router.publish_thread(ThreadEvent::New {
            thread: thread.clone(),
        });

        Ok(thread)
    }
}
