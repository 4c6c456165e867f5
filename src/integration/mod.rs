use std::time::Duration;

use crate::settings::Config;

pub mod backend;
pub mod directory;
pub mod feed;
pub mod model;
pub mod push;

type Result<T> = std::result::Result<T, Error>;

/// SQLSTATE reported by the backend when one of its row-access policies
/// recurses into itself.
const POLICY_RECURSION_CODE: &str = "42P17";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend policy fault {code}: {message}")]
    Policy { code: String, message: String },

    #[error(transparent)]
    _Http(#[from] reqwest::Error),
    #[error(transparent)]
    _ParseJson(#[from] serde_json::Error),
    #[error(transparent)]
    _ParseUrl(#[from] url::ParseError),
}

impl Error {
    /// Recognizes the recursive-policy class of authorization faults, which
    /// gets a one-time alternate-read-path retry instead of fallback.
    pub fn is_policy_recursion(&self) -> bool {
        match self {
            Self::Policy { code, message } => {
                code == POLICY_RECURSION_CODE || message.contains("infinite recursion")
            }
            _ => false,
        }
    }
}

pub fn init_http_client(config: &Config) -> reqwest::Client {
    match reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            panic!("Failed to initialize HTTP client: {e}")
        }
    }
}

pub(crate) fn long_poll_client(config: &Config) -> reqwest::Client {
    match reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(Duration::from_secs(30))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            panic!("Failed to initialize long-poll client: {e}")
        }
    }
}
