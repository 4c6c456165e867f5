use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use url::Url;

use super::model::{ChangeEvent, ChangeStream};

/// Server-pushed change notifications. The feed delivers change events, not
/// complete records; consumers re-fetch the full row before routing.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self) -> super::Result<ChangeStream>;
}

#[derive(Deserialize)]
struct PollBatch {
    cursor: u64,
    #[serde(default)]
    events: Vec<ChangeEvent>,
}

/// Cursor-based long-poll implementation of the change feed. Poll errors are
/// logged and retried after a pause; the stream itself never ends on error.
pub struct HttpChangeFeed {
    http: reqwest::Client,
    base: Url,
    retry_pause: Duration,
}

impl HttpChangeFeed {
    pub fn new(http: reqwest::Client, base: Url, retry_pause: Duration) -> Self {
        Self {
            http,
            base,
            retry_pause,
        }
    }
}

#[async_trait]
impl ChangeFeed for HttpChangeFeed {
    async fn subscribe(&self) -> super::Result<ChangeStream> {
        let http = self.http.clone();
        let url = self.base.join("realtime/poll")?;
        let retry_pause = self.retry_pause;

        let stream = async_stream::stream! {
            let mut cursor = 0u64;
            loop {
                let poll = http
                    .get(url.clone())
                    .query(&[("cursor", cursor)])
                    .send()
                    .await;

                let batch = match poll {
                    Ok(resp) => resp.json::<PollBatch>().await,
                    Err(e) => Err(e),
                };

                match batch {
                    Ok(batch) => {
                        cursor = batch.cursor;
                        for event in batch.events {
                            yield event;
                        }
                    }
                    Err(e) => {
                        warn!("realtime poll failed, retrying: {e:?}");
                        tokio::time::sleep(retry_pause).await;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
