use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::Error;
use super::model::{MessageRecord, NewMessageRecord, NewThreadRecord, Page, ThreadRecord};
use crate::{message, thread, user};

/// Authoritative store for threads, messages, participants, read receipts
/// and search. Owned by another subsystem; this is the client-side contract.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_threads(&self, viewer: &user::Id, page: &Page)
    -> super::Result<Vec<ThreadRecord>>;

    /// Alternate read path: precomputed per-user thread view, immune to the
    /// recursive-policy fault on the direct read.
    async fn fetch_thread_overview(
        &self,
        viewer: &user::Id,
        page: &Page,
    ) -> super::Result<Vec<ThreadRecord>>;

    async fn fetch_thread(&self, id: &thread::Id) -> super::Result<ThreadRecord>;

    async fn fetch_messages(&self, thread_id: &thread::Id) -> super::Result<Vec<MessageRecord>>;

    async fn fetch_message(&self, id: &message::Id) -> super::Result<MessageRecord>;

    async fn insert_thread(&self, record: &NewThreadRecord) -> super::Result<ThreadRecord>;

    async fn insert_message(&self, record: &NewMessageRecord) -> super::Result<MessageRecord>;

    async fn append_read_receipts(
        &self,
        thread_id: &thread::Id,
        message_ids: &[message::Id],
        reader: &user::Id,
    ) -> super::Result<()>;

    async fn hide_message(&self, id: &message::Id, viewer: &user::Id) -> super::Result<()>;

    /// Soft-deletes for everyone. The server enforces the retention window
    /// independently of the client-side check.
    async fn redact_message(&self, id: &message::Id, sender: &user::Id) -> super::Result<()>;

    async fn search_messages(
        &self,
        query: &str,
        viewer: &user::Id,
        thread_id: Option<&thread::Id>,
    ) -> super::Result<Vec<MessageRecord>>;
}

pub struct HttpBackend {
    http: reqwest::Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(http: reqwest::Client, base: Url) -> Self {
        Self { http, base }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_threads(
        &self,
        viewer: &user::Id,
        page: &Page,
    ) -> super::Result<Vec<ThreadRecord>> {
        let url = self.base.join("threads")?;
        let resp = self
            .http
            .get(url)
            .query(&[("user_id", viewer.as_str())])
            .query(&[("limit", page.limit), ("page", page.page)])
            .send()
            .await?;
        read_json(resp).await
    }

    async fn fetch_thread_overview(
        &self,
        viewer: &user::Id,
        page: &Page,
    ) -> super::Result<Vec<ThreadRecord>> {
        let url = self.base.join("thread-overview")?;
        let resp = self
            .http
            .get(url)
            .query(&[("user_id", viewer.as_str())])
            .query(&[("limit", page.limit), ("page", page.page)])
            .send()
            .await?;
        read_json(resp).await
    }

    async fn fetch_thread(&self, id: &thread::Id) -> super::Result<ThreadRecord> {
        let url = self.base.join(&format!("threads/{id}"))?;
        let resp = self.http.get(url).send().await?;
        read_json(resp).await
    }

    async fn fetch_messages(&self, thread_id: &thread::Id) -> super::Result<Vec<MessageRecord>> {
        let url = self.base.join(&format!("threads/{thread_id}/messages"))?;
        let resp = self.http.get(url).send().await?;
        read_json(resp).await
    }

    async fn fetch_message(&self, id: &message::Id) -> super::Result<MessageRecord> {
        let url = self.base.join(&format!("messages/{id}"))?;
        let resp = self.http.get(url).send().await?;
        read_json(resp).await
    }

    async fn insert_thread(&self, record: &NewThreadRecord) -> super::Result<ThreadRecord> {
        let url = self.base.join("threads")?;
        let resp = self.http.post(url).json(record).send().await?;
        read_json(resp).await
    }

    async fn insert_message(&self, record: &NewMessageRecord) -> super::Result<MessageRecord> {
        let url = self.base.join("messages")?;
        let resp = self.http.post(url).json(record).send().await?;
        read_json(resp).await
    }

    async fn append_read_receipts(
        &self,
        thread_id: &thread::Id,
        message_ids: &[message::Id],
        reader: &user::Id,
    ) -> super::Result<()> {
        let url = self.base.join(&format!("threads/{thread_id}/read"))?;
        let resp = self
            .http
            .post(url)
            .json(&serde_json::json!({
                "user_id": reader,
                "message_ids": message_ids,
            }))
            .send()
            .await?;
        read_empty(resp).await
    }

    async fn hide_message(&self, id: &message::Id, viewer: &user::Id) -> super::Result<()> {
        let url = self.base.join(&format!("messages/{id}/hide"))?;
        let resp = self
            .http
            .post(url)
            .json(&serde_json::json!({ "user_id": viewer }))
            .send()
            .await?;
        read_empty(resp).await
    }

    async fn redact_message(&self, id: &message::Id, sender: &user::Id) -> super::Result<()> {
        let url = self.base.join(&format!("messages/{id}/redact"))?;
        let resp = self
            .http
            .post(url)
            .json(&serde_json::json!({ "user_id": sender }))
            .send()
            .await?;
        read_empty(resp).await
    }

    async fn search_messages(
        &self,
        query: &str,
        viewer: &user::Id,
        thread_id: Option<&thread::Id>,
    ) -> super::Result<Vec<MessageRecord>> {
        let url = self.base.join("messages/search")?;
        let mut params = vec![
            ("q".to_string(), query.to_string()),
            ("user_id".to_string(), viewer.to_string()),
        ];
        if let Some(tid) = thread_id {
            params.push(("thread_id".to_string(), tid.to_string()));
        }
        let resp = self.http.get(url).query(&params).send().await?;
        read_json(resp).await
    }
}

#[derive(Deserialize)]
struct ApiFault {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> super::Result<T> {
    let status = resp.status();
    if status.is_success() {
        return resp.json::<T>().await.map_err(Error::from);
    }
    Err(fault(status.as_u16(), resp.text().await.unwrap_or_default()))
}

async fn read_empty(resp: reqwest::Response) -> super::Result<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    Err(fault(status.as_u16(), resp.text().await.unwrap_or_default()))
}

fn fault(status: u16, body: String) -> Error {
    if let Ok(api) = serde_json::from_str::<ApiFault>(&body) {
        let policy = Error::Policy {
            code: api.code.unwrap_or_default(),
            message: api.message.unwrap_or_default(),
        };
        if policy.is_policy_recursion() {
            return policy;
        }
    }

    Error::Status { status, body }
}
