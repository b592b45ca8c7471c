//! Optional RON settings file, mapped onto the engine's settings.
//!
//! Every field may be omitted; anything not given keeps its default. Command
//! line flags are applied on top with [`AppConfig::apply_cli`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use wikipath_core::{BackoffPolicy, DEFAULT_LOG_CAPACITY};
use wikipath_engine::{ClientSettings, SessionSettings};
use wikipath_logging::{wikipath_info, wikipath_warn};

use crate::cli::{BackoffArg, Cli};

pub const DEFAULT_CONFIG_FILE: &str = "wikipath.ron";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub initial_poll_delay_ms: u64,
    pub backoff: BackoffConfig,
    /// `None` disables reconnecting the live log.
    pub log_reconnect_delay_ms: Option<u64>,
    pub session_token: Option<String>,
    pub log_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffConfig {
    Fixed {
        interval_ms: u64,
    },
    Escalating {
        initial_ms: u64,
        escalated_ms: u64,
        escalate_after: u32,
    },
}

impl Default for AppConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        let session = SessionSettings::default();
        Self {
            server: client.base_url,
            connect_timeout_ms: millis(client.connect_timeout),
            request_timeout_ms: millis(client.request_timeout),
            initial_poll_delay_ms: millis(session.initial_poll_delay),
            backoff: BackoffConfig::from(session.backoff),
            log_reconnect_delay_ms: session.log_reconnect_delay.map(millis),
            session_token: session.session_token,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl From<BackoffPolicy> for BackoffConfig {
    fn from(policy: BackoffPolicy) -> Self {
        match policy {
            BackoffPolicy::Fixed(interval) => BackoffConfig::Fixed {
                interval_ms: millis(interval),
            },
            BackoffPolicy::Escalating {
                initial,
                escalated,
                escalate_after,
            } => BackoffConfig::Escalating {
                initial_ms: millis(initial),
                escalated_ms: millis(escalated),
                escalate_after,
            },
        }
    }
}

impl From<BackoffConfig> for BackoffPolicy {
    fn from(config: BackoffConfig) -> Self {
        match config {
            BackoffConfig::Fixed { interval_ms } => {
                BackoffPolicy::Fixed(Duration::from_millis(interval_ms))
            }
            BackoffConfig::Escalating {
                initial_ms,
                escalated_ms,
                escalate_after,
            } => BackoffPolicy::Escalating {
                initial: Duration::from_millis(initial_ms),
                escalated: Duration::from_millis(escalated_ms),
                escalate_after,
            },
        }
    }
}

impl AppConfig {
    /// Loads `explicit`, or `./wikipath.ron` when no path was given.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        match Self::load_from(&path)? {
            Some(config) => Ok(config),
            None => {
                if explicit.is_some() {
                    wikipath_warn!("Config file {:?} not found; using defaults", path);
                }
                Ok(Self::default())
            }
        }
    }

    /// `Ok(None)` when the file does not exist. A file that exists but does
    /// not parse is an error.
    pub fn load_from(path: &Path) -> anyhow::Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("reading config file {path:?}"));
            }
        };
        let config: AppConfig = ron::from_str(&content)
            .with_context(|| format!("parsing config file {path:?}"))?;
        wikipath_info!("Loaded config from {:?}", path);
        Ok(Some(config))
    }

    /// Command line flags win over file values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(server) = &cli.server {
            self.server = server.clone();
        }
        match (cli.backoff, self.backoff) {
            (Some(BackoffArg::Fixed), BackoffConfig::Escalating { initial_ms, .. }) => {
                self.backoff = BackoffConfig::Fixed {
                    interval_ms: initial_ms,
                };
            }
            (Some(BackoffArg::Escalating), BackoffConfig::Fixed { .. }) => {
                self.backoff = BackoffConfig::from(BackoffPolicy::escalating());
            }
            _ => {}
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.server.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            initial_poll_delay: Duration::from_millis(self.initial_poll_delay_ms),
            backoff: self.backoff.into(),
            log_reconnect_delay: self.log_reconnect_delay_ms.map(Duration::from_millis),
            session_token: self.session_token.clone(),
            log_capacity: self.log_capacity.max(1),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
