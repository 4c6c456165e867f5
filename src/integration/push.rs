use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use super::Error;
use crate::user;

/// Push request as accepted by the notification-delivery collaborator.
/// Fire-and-forget from this subsystem's point of view.
#[derive(Clone, Debug, Serialize)]
pub struct PushRequest {
    pub user_id: user::Id,
    pub title: String,
    pub body: String,
    pub notification_type: String,
    pub data: serde_json::Value,
    pub skip_db: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(rename = "requireInteraction")]
    pub require_interaction: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibrate: Option<Vec<u32>>,
}

#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, request: PushRequest) -> super::Result<()>;
}

pub struct HttpPushSender {
    http: reqwest::Client,
    base: Url,
}

impl HttpPushSender {
    pub fn new(http: reqwest::Client, base: Url) -> Self {
        Self { http, base }
    }
}

#[async_trait]
impl PushSender for HttpPushSender {
    async fn send(&self, request: PushRequest) -> super::Result<()> {
        let url = self.base.join("notifications")?;
        let resp = self.http.post(url).json(&request).send().await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        Err(Error::Status {
            status: status.as_u16(),
            body: resp.text().await.unwrap_or_default(),
        })
    }
}
