use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use super::Error;
use super::model::ProfileRecord;
use crate::user;

/// Lookup-by-id against the user-profile collaborator.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn find_by_id(&self, id: &user::Id) -> super::Result<Option<ProfileRecord>>;
}

pub struct HttpProfileDirectory {
    http: reqwest::Client,
    base: Url,
}

impl HttpProfileDirectory {
    pub fn new(http: reqwest::Client, base: Url) -> Self {
        Self { http, base }
    }
}

#[async_trait]
impl ProfileDirectory for HttpProfileDirectory {
    async fn find_by_id(&self, id: &user::Id) -> super::Result<Option<ProfileRecord>> {
        let url = self.base.join(&format!("profiles/{id}"))?;
        let resp = self.http.get(url).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        resp.json::<ProfileRecord>().await.map(Some).map_err(Error::from)
    }
}
