use serde::{Deserialize, Serialize};

use crate::integration::model::ProfileRecord;
use crate::user;

pub const UNKNOWN_USER: &str = "Unknown User";

/// Display-ready participant. A pure value object: created on demand when a
/// thread or message references an unknown id, never persisted here.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub id: user::Id,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Participant {
    pub fn new(id: user::Id, name: impl Into<String>, avatar_url: Option<String>) -> Self {
        Self {
            id,
            name: name.into(),
            avatar_url,
        }
    }

    pub fn unknown(id: &user::Id) -> Self {
        Self {
            id: id.clone(),
            name: UNKNOWN_USER.into(),
            avatar_url: None,
        }
    }
}

impl From<ProfileRecord> for Participant {
    fn from(p: ProfileRecord) -> Self {
        let name = p
            .full_name
            .or(p.username)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_USER.into());

        Self {
            id: p.id,
            name,
            avatar_url: p.avatar_url,
        }
    }
}
