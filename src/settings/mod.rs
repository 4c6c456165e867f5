use std::fs::File;
use std::str::FromStr;
use std::time::Duration;
use std::{env, sync::Once};

use chrono::TimeDelta;
use dotenv::dotenv;
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, TermLogger, TerminalMode, WriteLogger};
use url::Url;

use crate::message::policy;

static LOGGER: Once = Once::new();

#[derive(Clone)]
pub struct Config {
    /// Base URL of the backend API. Must end with a trailing slash so
    /// relative paths join under it.
    pub base_url: Url,
    pub delete_window_mins: i64,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub feed_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:8000/api/")
                .expect("default base url should parse"),
            delete_window_mins: policy::DELETE_FOR_EVERYONE_WINDOW_MINS,
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            feed_poll_interval: Duration::from_secs(2),
        }
    }
}

impl Config {
    pub fn env() -> Self {
        dotenv().ok();

        init_logger();

        let defaults = Self::default();

        let base_url = env::var("BACKEND_BASE_URL")
            .ok()
            .map(|raw| {
                let raw = if raw.ends_with('/') { raw } else { format!("{raw}/") };
                Url::parse(&raw).expect("BACKEND_BASE_URL must be a valid url")
            })
            .unwrap_or(defaults.base_url);

        let delete_window_mins = env::var("DELETE_WINDOW_MINS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.delete_window_mins);

        let feed_poll_interval = env::var("FEED_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.feed_poll_interval);

        Self {
            base_url,
            delete_window_mins,
            feed_poll_interval,
            ..defaults
        }
    }

    pub fn delete_window(&self) -> TimeDelta {
        TimeDelta::minutes(self.delete_window_mins)
    }
}

fn init_logger() {
    LOGGER.call_once(|| {
        let rust_log = env::var("RUST_LOG").unwrap_or("info".into());
        let level = LevelFilter::from_str(&rust_log).unwrap_or(LevelFilter::Info);
        let log_file = env::var("SERVICE_NAME")
            .map(|pkg| format!("{pkg}.log"))
            .unwrap_or("chat_sync.log".into());

        CombinedLogger::init(vec![
            TermLogger::new(
                level,
                simplelog::Config::default(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            ),
            WriteLogger::new(
                level,
                simplelog::Config::default(),
                File::create(log_file).expect("Failed to create log file"),
            ),
        ])
        .expect("Failed to initialize logger");
    });
}
