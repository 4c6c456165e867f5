use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Id, Kind};
use crate::message::model::Message;
use crate::user;
use crate::user::model::Participant;

/// Order-independent participant-set key. Two threads are the same
/// conversation iff their keys are equal.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct MemberKey(String);

impl MemberKey {
    pub fn of<'a>(ids: impl IntoIterator<Item = &'a user::Id>) -> Self {
        let mut ids: Vec<&user::Id> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();

        let joined = ids
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(":");

        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Thread {
    pub id: Id,
    pub name: String,
    pub kind: Kind,
    pub participants: Vec<Participant>,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    /// Creates a fresh thread for a participant set. Participants are
    /// deduplicated by id; the creator is always included. Kind is derived
    /// from the total count unless explicitly overridden.
    pub fn new(
        creator: &user::Id,
        name: Option<String>,
        kind: Option<Kind>,
        participants: Vec<Participant>,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut unique: Vec<Participant> = participants
            .into_iter()
            .filter(|p| seen.insert(p.id.clone()))
            .collect();

        if !unique.iter().any(|p| &p.id == creator) {
            unique.insert(0, Participant::unknown(creator));
        }

        let kind = kind.unwrap_or_else(|| Kind::derive_from(unique.len()));
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| Self::display_name(&unique, creator));
        let now = Utc::now();

        Self {
            id: Id::random(),
            name,
            kind,
            participants: unique,
            last_message_preview: None,
            last_message_at: None,
            unread_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Minimal placeholder when the full record cannot be read back, e.g.
    /// right after a remote insert succeeded but the follow-up fetch failed.
    pub fn stub(id: Id, participant: Participant) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: participant.name.clone(),
            kind: Kind::Direct,
            participants: vec![participant],
            last_message_preview: None,
            last_message_at: None,
            unread_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Default display name from the viewer's perspective: the other
    /// participants' names.
    pub fn display_name(participants: &[Participant], viewer: &user::Id) -> String {
        let others = participants
            .iter()
            .filter(|p| &p.id != viewer)
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>();

        if others.is_empty() {
            "New conversation".into()
        } else {
            others.join(", ")
        }
    }

    pub fn member_key(&self) -> MemberKey {
        MemberKey::of(self.participants.iter().map(|p| &p.id))
    }

    pub fn is_participant(&self, id: &user::Id) -> bool {
        self.participants.iter().any(|p| &p.id == id)
    }

    pub fn participant_ids(&self) -> Vec<user::Id> {
        self.participants.iter().map(|p| p.id.clone()).collect()
    }

    /// Applies a new last message to the thread summary.
    pub fn touch(&mut self, preview: String, at: DateTime<Utc>) {
        self.last_message_preview = Some(preview);
        self.last_message_at = Some(at);
        self.updated_at = at;
    }

    /// Recomputes the viewer's unread count from actual read state, never
    /// incrementally.
    pub fn recount_unread(&mut self, messages: &[Message], viewer: &user::Id) {
        self.unread_count = messages
            .iter()
            .filter(|m| &m.sender_id != viewer && !m.read_by.contains(viewer))
            .count() as u32;
    }
}
