use chrono::{DateTime, TimeDelta, Utc};

use super::model::Message;
use crate::user;

/// Server-enforced limit for "delete for everyone", counted from the
/// message's creation time.
pub const DELETE_FOR_EVERYONE_WINDOW_MINS: i64 = 15;

pub fn default_window() -> TimeDelta {
    TimeDelta::minutes(DELETE_FOR_EVERYONE_WINDOW_MINS)
}

/// Deletion state machine:
/// `active -> hidden-for-subset* -> redacted (terminal, content cleared)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletionStatus {
    Active,
    HiddenForSome,
    Redacted,
}

pub fn status(message: &Message) -> DeletionStatus {
    if message.is_deleted {
        DeletionStatus::Redacted
    } else if !message.deleted_for.is_empty() {
        DeletionStatus::HiddenForSome
    } else {
        DeletionStatus::Active
    }
}

/// "Delete for me" carries no time check and is always permitted.
pub fn check_delete_for_everyone(
    message: &Message,
    requester: &user::Id,
    now: DateTime<Utc>,
    window: TimeDelta,
) -> super::Result<()> {
    if message.is_deleted {
        return Err(super::Error::AlreadyDeleted);
    }

    if &message.sender_id != requester {
        return Err(super::Error::NotSender);
    }

    if now - message.created_at > window {
        return Err(super::Error::DeleteWindowExpired);
    }

    Ok(())
}

pub fn can_delete_for_everyone(
    message: &Message,
    requester: &user::Id,
    now: DateTime<Utc>,
    window: TimeDelta,
) -> bool {
    check_delete_for_everyone(message, requester, now, window).is_ok()
}
