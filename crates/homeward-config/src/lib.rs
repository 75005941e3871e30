//! Shared configuration for the homeward CLI.
//!
//! TOML settings file + `HOMEWARD_*` environment overrides, resolved
//! through figment, and translation into the core's [`Settings`] and
//! [`ControllerOptions`]. The core never reads files — everything it
//! sees flows through here.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use homeward_core::{
    ConnectionMode, ControllerOptions, EndpointConfig, FallbackPolicy, HomeNetworkSet, Settings,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Endpoint selection mode: "auto", "internal", or "external".
    #[serde(default)]
    pub mode: ConnectionMode,

    /// What to assume when on WiFi but the network is unidentifiable.
    #[serde(default)]
    pub fallback_policy: FallbackPolicy,

    #[serde(default)]
    pub endpoints: Endpoints,

    #[serde(default)]
    pub home: Home,

    #[serde(default)]
    pub timing: Timing,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Endpoints {
    /// URL to use on the home network (empty → built-in default).
    #[serde(default)]
    pub internal: String,

    /// URL to use everywhere else (empty → built-in default).
    #[serde(default)]
    pub external: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Home {
    /// WiFi identities that map to the internal URL.
    #[serde(default)]
    pub networks: Vec<String>,

    /// Identity to assume when detection fails entirely.
    #[serde(default)]
    pub manual_override: Option<String>,
}

/// Timing knobs, as humantime strings ("5s", "300ms", …).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Timing {
    #[serde(default = "default_debounce")]
    pub debounce: String,

    #[serde(default = "default_mode_debounce")]
    pub mode_debounce: String,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: String,

    #[serde(default = "default_backoff_base")]
    pub backoff_base: String,

    #[serde(default = "default_max_backoff_retries")]
    pub max_backoff_retries: u32,

    /// Link monitor poll interval.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            debounce: default_debounce(),
            mode_debounce: default_mode_debounce(),
            probe_timeout: default_probe_timeout(),
            backoff_base: default_backoff_base(),
            max_backoff_retries: default_max_backoff_retries(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_debounce() -> String {
    "5s".into()
}
fn default_mode_debounce() -> String {
    "300ms".into()
}
fn default_probe_timeout() -> String {
    "5s".into()
}
fn default_backoff_base() -> String {
    "1s".into()
}
fn default_max_backoff_retries() -> u32 {
    3
}
fn default_poll_interval() -> String {
    "2s".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("sh", "homeward", "homeward").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("homeward");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the configuration from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the configuration from an explicit file + environment.
pub fn load_config_from(path: &std::path::Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HOMEWARD_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning the defaults if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize config to TOML and write it to an explicit path.
pub fn save_config_to(cfg: &Config, path: &std::path::Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation to core types ───────────────────────────────────────

impl Config {
    /// Build the core's settings snapshot from this configuration.
    pub fn to_settings(&self) -> Settings {
        Settings {
            mode: self.mode,
            endpoints: EndpointConfig {
                internal_url: self.endpoints.internal.clone(),
                external_url: self.endpoints.external.clone(),
            },
            home_networks: self
                .home
                .networks
                .iter()
                .cloned()
                .collect::<HomeNetworkSet>(),
            manual_override: self
                .home
                .manual_override
                .clone()
                .filter(|s| !s.trim().is_empty()),
            fallback_policy: self.fallback_policy,
        }
    }

    /// Parse the timing table into controller options.
    pub fn controller_options(&self) -> Result<ControllerOptions, ConfigError> {
        Ok(ControllerOptions {
            debounce: parse_duration("timing.debounce", &self.timing.debounce)?,
            mode_debounce: parse_duration("timing.mode_debounce", &self.timing.mode_debounce)?,
            probe_timeout: parse_duration("timing.probe_timeout", &self.timing.probe_timeout)?,
            backoff_base: parse_duration("timing.backoff_base", &self.timing.backoff_base)?,
            max_backoff_retries: self.timing.max_backoff_retries,
        })
    }

    /// Parse the link monitor poll interval.
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration("timing.poll_interval", &self.timing.poll_interval)
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid duration '{value}': {e}"),
    })
}

// ── Tests ────────────────────────────────────────────────────────────
