use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::integration;

pub mod model;
pub mod service;

pub type Result<T> = std::result::Result<T, Error>;
pub type Service = Arc<service::ThreadService>;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Hash, PartialEq, Eq)]
pub struct Id(Uuid);

impl Id {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn get(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Id {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Direct,
    Group,
}

impl Kind {
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }

    /// Direct iff exactly two total participants, group otherwise.
    pub const fn derive_from(participant_count: usize) -> Self {
        if participant_count == 2 {
            Self::Direct
        } else {
            Self::Group
        }
    }
}

impl FromStr for Kind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "direct" | "chat" => Ok(Self::Direct),
            "group" => Ok(Self::Group),
            other => Err(Error::UnsupportedKind(other.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("thread not found: {0}")]
    NotFound(Id),
    #[error("viewer is not a thread participant")]
    NotMember,
    #[error("thread record has no participants: {0}")]
    NoParticipants(Id),
    #[error("unsupported thread kind: {0:?}")]
    UnsupportedKind(String),

    #[error(transparent)]
    _Integration(#[from] integration::Error),
}
