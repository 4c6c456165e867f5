use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use log::warn;

use super::model::Participant;
use crate::integration::directory::ProfileDirectory;
use crate::user;

/// Resolves opaque user ids to display participants. Lookups go through the
/// injected profile directory once and are cached for the session; a failed
/// lookup degrades to a placeholder, never an error.
pub struct ProfileService {
    directory: Arc<dyn ProfileDirectory>,
    cache: Mutex<HashMap<user::Id, Participant>>,
}

impl ProfileService {
    pub fn new(directory: Arc<dyn ProfileDirectory>) -> Self {
        Self {
            directory,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl ProfileService {
    pub async fn find(&self, id: &user::Id) -> Option<Participant> {
        if let Some(hit) = self.cached(id) {
            return Some(hit);
        }

        match self.directory.find_by_id(id).await {
            Ok(Some(profile)) => {
                let participant = Participant::from(profile);
                self.remember(participant.clone());
                Some(participant)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("profile lookup failed for {id}: {e:?}");
                None
            }
        }
    }

    pub async fn resolve(&self, id: &user::Id) -> Participant {
        match self.find(id).await {
            Some(p) => p,
            None => Participant::unknown(id),
        }
    }

    pub async fn resolve_many(&self, ids: &[user::Id]) -> Vec<Participant> {
        join_all(ids.iter().map(|id| self.resolve(id))).await
    }
}

impl ProfileService {
    fn cached(&self, id: &user::Id) -> Option<Participant> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn remember(&self, participant: Participant) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(participant.id.clone(), participant);
    }
}
