// crates/fanout-bus-config/src/config.rs
// ============================================================================
// Module: Fanout Bus Configuration
// Description: Configuration loading and validation for the fan-out bus.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: fanout-bus-broker, fanout-bus-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Unknown keys, malformed values, and unresolvable subscription targets fail
//! closed; a running server keeps its active routing table on reload errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;

use fanout_bus_broker::DEFAULT_MAX_BODY_BYTES;
use fanout_bus_broker::HopTarget;
use fanout_bus_core::ChannelConfig;
use fanout_bus_core::ChannelReference;
use fanout_bus_core::FanoutConfig;
use fanout_bus_core::SubscriptionSpec;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "fanout-bus.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FANOUT_BUS_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default bind address for the ingress server.
const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default fan-out deadline in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 60_000;
/// Maximum fan-out deadline in milliseconds.
pub const MAX_TIMEOUT_MS: u64 = 600_000;
/// Default reload poll interval in milliseconds.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
/// Maximum reload poll interval in milliseconds.
const MAX_POLL_INTERVAL_MS: u64 = 3_600_000;
/// Maximum number of configured channels.
pub const MAX_CHANNELS: usize = 4096;
/// Maximum number of subscriptions per channel.
pub const MAX_SUBSCRIPTIONS_PER_CHANNEL: usize = 1024;

// ============================================================================
// SECTION: Configuration Model
// ============================================================================

/// Fan-out bus configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FanoutBusConfig {
    /// Ingress server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Fan-out engine configuration.
    #[serde(default)]
    pub fanout: FanoutSettings,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Config reload configuration.
    #[serde(default)]
    pub reload: ReloadConfig,
    /// Channel routing table.
    #[serde(default)]
    pub channels: Vec<ChannelEntry>,
    /// Resolved path the configuration was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
    /// Modification time of the source file (not serialized).
    #[serde(skip)]
    pub source_modified_at: Option<SystemTime>,
}

impl FanoutBusConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config = Self::from_toml(content)?;
        config.source_modified_at = fs::metadata(&resolved).and_then(|meta| meta.modified()).ok();
        config.source_path = Some(resolved);
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.fanout.validate()?;
        self.audit.validate()?;
        self.reload.validate()?;
        if self.channels.len() > MAX_CHANNELS {
            return Err(ConfigError::Invalid(format!("too many channels (max {MAX_CHANNELS})")));
        }
        for (index, channel) in self.channels.iter().enumerate() {
            channel.validate(index)?;
        }
        self.fanout_config().map(|_| ())
    }

    /// Converts the channel entries into a routing table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for malformed channel references or
    /// duplicate channels.
    pub fn fanout_config(&self) -> Result<FanoutConfig, ConfigError> {
        let channels = self
            .channels
            .iter()
            .enumerate()
            .map(|(index, entry)| entry.to_channel_config(index))
            .collect::<Result<Vec<_>, _>>()?;
        FanoutConfig::new(channels).map_err(|err| ConfigError::Invalid(err.to_string()))
    }
}

/// Ingress server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address the ingress server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the bind address is malformed.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid bind address: {}", self.bind)))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        self.bind_addr().map(|_| ())
    }
}

/// Fan-out engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FanoutSettings {
    /// Shared deadline for one fan-out, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for FanoutSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl FanoutSettings {
    /// Returns the shared fan-out deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates fan-out configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "fanout.timeout_ms must be between 1 and {MAX_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Audit disabled.
    None,
}

/// Audit configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink receiving audit events.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.sink=file requires audit.path".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => validate_path(path),
            (AuditSinkKind::Stderr | AuditSinkKind::None, Some(_)) => Err(ConfigError::Invalid(
                "audit.path is only valid with audit.sink=file".to_string(),
            )),
            (AuditSinkKind::Stderr | AuditSinkKind::None, None) => Ok(()),
        }
    }
}

/// Config reload configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReloadConfig {
    /// Poll interval for config file changes in milliseconds; 0 disables.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ReloadConfig {
    /// Returns the poll interval, or `None` when reloading is disabled.
    #[must_use]
    pub const fn poll_interval(&self) -> Option<Duration> {
        if self.poll_interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.poll_interval_ms))
        }
    }

    /// Validates reload configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "reload.poll_interval_ms must not exceed {MAX_POLL_INTERVAL_MS}"
            )));
        }
        Ok(())
    }
}

/// Channel entry in the routing table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelEntry {
    /// Channel namespace.
    pub namespace: String,
    /// Channel name.
    pub name: String,
    /// Subscriptions in declaration order.
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionEntry>,
}

impl ChannelEntry {
    /// Validates channel limits and subscription targets.
    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        if self.subscriptions.len() > MAX_SUBSCRIPTIONS_PER_CHANNEL {
            return Err(ConfigError::Invalid(format!(
                "channels[{index}] has too many subscriptions (max \
                 {MAX_SUBSCRIPTIONS_PER_CHANNEL})"
            )));
        }
        for (position, subscription) in self.subscriptions.iter().enumerate() {
            subscription.validate().map_err(|err| {
                ConfigError::Invalid(format!("channels[{index}].subscriptions[{position}]: {err}"))
            })?;
        }
        Ok(())
    }

    /// Converts the entry into a channel configuration.
    fn to_channel_config(&self, index: usize) -> Result<ChannelConfig, ConfigError> {
        let channel = ChannelReference::new(&self.namespace, &self.name)
            .map_err(|err| ConfigError::Invalid(format!("channels[{index}]: {err}")))?;
        let subscriptions =
            self.subscriptions.iter().map(SubscriptionEntry::to_spec).collect();
        Ok(ChannelConfig::new(channel, subscriptions))
    }
}

/// Subscription entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionEntry {
    /// Transforming endpoint receiving the event first.
    #[serde(default)]
    pub callable: Option<String>,
    /// Terminal endpoint receiving the (possibly transformed) event.
    #[serde(default)]
    pub sinkable: Option<String>,
}

impl SubscriptionEntry {
    /// Converts the entry into a normalized subscription.
    fn to_spec(&self) -> SubscriptionSpec {
        SubscriptionSpec::new(self.callable.clone(), self.sinkable.clone())
    }

    /// Checks that configured targets resolve to hop addresses.
    fn validate(&self) -> Result<(), String> {
        let spec = self.to_spec();
        if let Some(callable) = spec.callable() {
            HopTarget::parse(callable).map_err(|err| format!("callable: {err}"))?;
        }
        if let Some(sinkable) = spec.sinkable() {
            HopTarget::parse(sinkable).map_err(|err| format!("sinkable: {err}"))?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default fan-out deadline.
const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Default reload poll interval.
const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI input or environment.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}
