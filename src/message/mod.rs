use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{integration, thread};

pub mod model;
pub mod policy;
pub mod service;

pub type Result<T> = std::result::Result<T, Error>;
pub type Service = Arc<service::MessageService>;

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

/// Partitions records into renderable chat content and system/control
/// signaling. Control messages flow through the same synchronization path
/// but are excluded from generic push notification.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
    System,
    CallRequest,
    CallAccepted,
    CallRejected,
    CallEnded,
    Reaction,
    HandRaise,
    ScreenShare,
}

impl MessageType {
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::System => "system",
            Self::CallRequest => "call_request",
            Self::CallAccepted => "call_accepted",
            Self::CallRejected => "call_rejected",
            Self::CallEnded => "call_ended",
            Self::Reaction => "reaction",
            Self::HandRaise => "hand_raise",
            Self::ScreenShare => "screen_share",
        }
    }

    pub const fn is_control(&self) -> bool {
        !matches!(self, Self::Text | Self::Image | Self::File)
    }

    pub const fn is_call_control(&self) -> bool {
        matches!(
            self,
            Self::CallRequest | Self::CallAccepted | Self::CallRejected | Self::CallEnded
        )
    }
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "file" => Ok(Self::File),
            "system" => Ok(Self::System),
            "call_request" => Ok(Self::CallRequest),
            "call_accepted" => Ok(Self::CallAccepted),
            "call_rejected" => Ok(Self::CallRejected),
            "call_ended" => Ok(Self::CallEnded),
            "reaction" => Ok(Self::Reaction),
            "hand_raise" => Ok(Self::HandRaise),
            "screen_share" => Ok(Self::ScreenShare),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("message not found: {0:?}")]
    NotFound(Option<Id>),
    #[error("not the sender of the message")]
    NotSender,
    #[error("can only delete for everyone within the retention window")]
    DeleteWindowExpired,
    #[error("message already deleted for everyone")]
    AlreadyDeleted,
    #[error("unsupported message type: {0:?}")]
    UnsupportedType(String),

    #[error(transparent)]
    _Thread(#[from] thread::Error),
    #[error(transparent)]
    _Integration(#[from] integration::Error),
}
