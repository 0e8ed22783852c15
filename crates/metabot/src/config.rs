//! Configuration for the bot.
//!
//! Loaded from, in order:
//! - `--config <path>` when given
//! - `~/.config/metabot/config.toml` (platform config dir) when it exists
//! - built-in defaults
//!
//! Command-line arguments then override the connection fields.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use metabot_irc::DEFAULT_MAX_LINE_BYTES;
use metabot_links::{ProvidersConfig, ResolverConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Chat network connection and identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IrcConfig {
    pub server: Option<String>,
    /// Port (default 6667)
    pub port: u16,
    pub channel: Option<String>,
    pub nickname: Option<String>,
    /// Appended to the nickname each time the server reports it in use.
    pub nick_suffix: String,
    /// Longest text sent in one message, in bytes.
    pub max_line_bytes: usize,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            server: None,
            port: 6667,
            channel: None,
            nickname: None,
            nick_suffix: "_".into(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// Flood control for outgoing lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    /// Minimum spacing between two sent lines, in milliseconds.
    pub send_interval_ms: u64,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            send_interval_ms: 1500,
        }
    }
}

impl OutboundConfig {
    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }
}

/// What to do when the connection drops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub enabled: bool,
    pub initial_delay_secs: u64,
    pub max_delay_secs: u64,
    /// Give up after this many consecutive failures (0 retries forever).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_secs: 1,
            max_delay_secs: 60,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.enabled && (self.max_attempts == 0 || attempt <= self.max_attempts)
    }

    /// Exponential backoff: `initial * 2^(attempt - 1)`, capped at `max_delay_secs`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1);
        let seconds = 1_u64
            .checked_shl(shift)
            .and_then(|factor| self.initial_delay_secs.checked_mul(factor))
            .unwrap_or(u64::MAX)
            .clamp(self.initial_delay_secs, self.max_delay_secs.max(self.initial_delay_secs));
        Duration::from_secs(seconds)
    }
}

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub irc: IrcConfig,
    pub outbound: OutboundConfig,
    pub resolver: ResolverConfig,
    pub providers: ProvidersConfig,
    pub reconnect: ReconnectConfig,
}

/// Validated connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectSettings {
    pub host: String,
    pub port: u16,
    pub channel: String,
    pub nickname: String,
}

impl Config {
    /// Load from `path`, or the default location, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(p) => p,
                None => {
                    tracing::info!("No config file found, using defaults");
                    return Ok(Config::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// `<config dir>/metabot/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("metabot").join("config.toml"))
    }

    /// Override connection fields from the command line.
    ///
    /// `server` accepts `host` or `host:port`.
    pub fn apply_cli(
        &mut self,
        server: Option<&str>,
        channel: Option<&str>,
        nickname: Option<&str>,
    ) -> Result<(), ConfigError> {
        if let Some(server) = server {
            match server.rsplit_once(':') {
                Some((host, port)) => {
                    let port = port
                        .parse()
                        .map_err(|_| ConfigError::Invalid(format!("port in {server:?}")))?;
                    self.irc.server = Some(host.to_string());
                    self.irc.port = port;
                }
                None => self.irc.server = Some(server.to_string()),
            }
        }
        if let Some(channel) = channel {
            self.irc.channel = Some(channel.to_string());
        }
        if let Some(nickname) = nickname {
            self.irc.nickname = Some(nickname.to_string());
        }
        Ok(())
    }

    /// Check the merged configuration and extract what a connection needs.
    pub fn connect_settings(&self) -> Result<ConnectSettings, ConfigError> {
        let host = non_blank(self.irc.server.as_deref()).ok_or(ConfigError::Missing("server"))?;
        let channel =
            non_blank(self.irc.channel.as_deref()).ok_or(ConfigError::Missing("channel"))?;
        let nickname =
            non_blank(self.irc.nickname.as_deref()).ok_or(ConfigError::Missing("nickname"))?;

        if nickname.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!("nickname {nickname:?}")));
        }
        if channel.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!("channel {channel:?}")));
        }
        if self.irc.nick_suffix.is_empty() {
            return Err(ConfigError::Invalid("nick_suffix must not be empty".into()));
        }
        if self.outbound.send_interval_ms == 0 {
            return Err(ConfigError::Invalid("send_interval_ms must be positive".into()));
        }
        if self.resolver.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
        }
        for (name, endpoint) in [
            ("providers.video.endpoint", &self.providers.video.endpoint),
            ("providers.image.endpoint", &self.providers.image.endpoint),
        ] {
            if !endpoint.contains("{id}") {
                return Err(ConfigError::Invalid(format!("{name} must contain {{id}}")));
            }
        }

        Ok(ConnectSettings {
            host: host.to_string(),
            port: self.irc.port,
            channel: channel.to_string(),
            nickname: nickname.to_string(),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
