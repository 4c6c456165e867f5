use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, warn};
use serde_json::json;

use crate::integration::push::{PushRequest, PushSender};
use crate::message::model::Message;
use crate::source::SourceSupervisor;
use crate::thread::model::Thread;
use crate::user;

const NEW_MESSAGE: &str = "new_message";
const CALL_REQUEST: &str = "call_request";

/// Fans a message out to push notifications. Every failure here is logged
/// and swallowed: notification delivery never fails a send.
pub struct NotificationDispatcher {
    push: Arc<dyn PushSender>,
    profiles: user::Service,
    sources: Arc<SourceSupervisor>,
}

impl NotificationDispatcher {
    pub fn new(
        push: Arc<dyn PushSender>,
        profiles: user::Service,
        sources: Arc<SourceSupervisor>,
    ) -> Self {
        Self {
            push,
            profiles,
            sources,
        }
    }

    /// Standard fan-out for a freshly stored message. Control records are
    /// suppressed; every other participant gets exactly one push.
    pub async fn dispatch(&self, message: &Message) {
        if message.message_type.is_control() {
            debug!("skipping push for control message {}", message.id);
            return;
        }

        let thread = match self.sources.find_thread(&message.thread_id).await {
            Ok(t) => t,
            Err(e) => {
                warn!("cannot resolve thread for notification fan-out: {e:?}");
                return;
            }
        };

        let title = self.sender_title(message).await;
        let body = message.preview();
        let data = json!({
            "thread_id": message.thread_id,
            "message_id": message.id,
        });

        for recipient in recipients(&thread, &message.sender_id) {
            let request = PushRequest {
                user_id: recipient,
                title: title.clone(),
                body: body.clone(),
                notification_type: NEW_MESSAGE.to_string(),
                data: data.clone(),
                skip_db: false,
                tag: None,
                require_interaction: false,
                vibrate: None,
            };

            if let Err(e) = self.push.send(request).await {
                warn!("push delivery failed: {e:?}");
            }
        }
    }

    /// Incoming-call path. Unlike regular pushes these must surface even on
    /// an idle device: persistent, vibrating, deduplicated per call so a
    /// re-ring replaces the previous banner instead of stacking.
    pub async fn dispatch_call_invite(&self, thread: &Thread, message: &Message) {
        let room_id = metadata_str(message, "room_id")
            .unwrap_or_else(|| message.thread_id.to_string());
        let call_token = metadata_str(message, "call_token");

        let caller = self.sender_title(message).await;
        let data = json!({
            "thread_id": message.thread_id,
            "message_id": message.id,
            "room_id": room_id,
            "call_token": call_token,
        });

        for recipient in recipients(thread, &message.sender_id) {
            let request = PushRequest {
                user_id: recipient,
                title: format!("{caller} is calling"),
                body: thread.name.clone(),
                notification_type: CALL_REQUEST.to_string(),
                data: data.clone(),
                skip_db: true,
                tag: Some(format!("call-{room_id}")),
                require_interaction: true,
                vibrate: Some(vec![200, 100, 200]),
            };

            if let Err(e) = self.push.send(request).await {
                warn!("call push delivery failed: {e:?}");
            }
        }
    }

    async fn sender_title(&self, message: &Message) -> String {
        if let Some(profile) = self.profiles.find(&message.sender_id).await {
            return profile.name;
        }

        message
            .sender
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "Someone".to_string())
    }
}

/// Unique recipients of a thread event, excluding the originator. Duplicate
/// participant rows must never produce duplicate pushes.
fn recipients(thread: &Thread, sender: &user::Id) -> Vec<user::Id> {
    let mut seen = HashSet::new();
    thread
        .participants
        .iter()
        .map(|p| p.id.clone())
        .filter(|id| id != sender)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

fn metadata_str(message: &Message, key: &str) -> Option<String> {
    message
        .metadata
        .as_ref()
        .and_then(|m| m.get(key))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}
