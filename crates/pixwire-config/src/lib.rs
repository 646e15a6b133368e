//! Shared configuration for pixwire tools.
//!
//! TOML profiles merged with `PIXWIRE_` environment overrides, and
//! translation to `pixwire_core::DiagramConfig`. The CLI layers its
//! `GlobalOpts` flags on top.

use std::collections::{BTreeMap, HashSet};
use std::num::NonZeroU8;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pixwire_core::config::DEFAULT_SHARED_PORT_MAX_PIXELS;
use pixwire_core::{DiagramConfig, SharedPort, SnapSettings, TlsVerification, TopologyRules};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

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

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: the override if given, else the
    /// configured default.
    pub fn active_profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_true")]
    pub auto_snap: bool,

    #[serde(default = "default_snap_radius")]
    pub snap_radius: f64,

    #[serde(default = "default_true")]
    pub feed: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            auto_snap: true,
            snap_radius: default_snap_radius(),
            feed: true,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_snap_radius() -> f64 {
    pixwire_core::engine::DEFAULT_SNAP_RADIUS
}

/// A named diagram-server profile.
///
/// Every field is optional; unset fields fall back to [`Defaults`] or the
/// core defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Diagram server base URL (e.g., "http://localhost:3001").
    pub server: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept invalid TLS certificates.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// Subscribe to the controller feed.
    pub feed: Option<bool>,

    /// Snap dropped wires to nearby handles.
    pub auto_snap: Option<bool>,

    /// Snap radius in canvas units.
    pub snap_radius: Option<f64>,

    /// Ports on every differential board.
    pub ports_per_board: Option<usize>,

    /// Shared slot names on each differential port, in lane order.
    pub shared_port_names: Option<Vec<String>>,

    /// Pixel budget of each shared slot.
    pub shared_port_max_pixels: Option<u32>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "pixwire", "pixwire").map_or_else(
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
    p.push("pixwire");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load Config from `path` + environment. A missing file is not an error.
///
/// Environment keys nest on a double underscore:
/// `PIXWIRE_DEFAULTS__TIMEOUT=5`, `PIXWIRE_DEFAULT_PROFILE=studio`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PIXWIRE_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile resolution ──────────────────────────────────────────────

/// Build a `DiagramConfig` from a profile and the global defaults.
pub fn resolve_profile(profile: &Profile, defaults: &Defaults) -> Result<DiagramConfig, ConfigError> {
    let server = profile
        .server
        .as_deref()
        .map(|raw| {
            raw.parse::<url::Url>()
                .map_err(|e| invalid("server", format!("{raw}: {e}")))
        })
        .transpose()?;

    let tls = if profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let radius = profile.snap_radius.unwrap_or(defaults.snap_radius);
    if !radius.is_finite() || radius < 0.0 {
        return Err(invalid("snap_radius", format!("must be a non-negative number, got {radius}")));
    }

    Ok(DiagramConfig {
        server,
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        feed_enabled: profile.feed.unwrap_or(defaults.feed),
        snap: SnapSettings {
            enabled: profile.auto_snap.unwrap_or(defaults.auto_snap),
            radius,
        },
        rules: resolve_rules(profile)?,
    })
}

fn resolve_rules(profile: &Profile) -> Result<TopologyRules, ConfigError> {
    let mut rules = TopologyRules::default();

    if let Some(n) = profile.ports_per_board {
        rules.ports_per_board = u8::try_from(n)
            .ok()
            .and_then(NonZeroU8::new)
            .ok_or_else(|| invalid("ports_per_board", format!("must be 1..=255, got {n}")))?;
    }

    let max = profile
        .shared_port_max_pixels
        .unwrap_or(DEFAULT_SHARED_PORT_MAX_PIXELS);
    let names: Vec<String> = match &profile.shared_port_names {
        Some(names) => names.clone(),
        None => rules
            .shared_port_template
            .iter()
            .map(|slot| slot.name.clone())
            .collect(),
    };
    if names.is_empty() {
        return Err(invalid("shared_port_names", "at least one slot is required"));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
        return Err(invalid("shared_port_names", format!("duplicate slot '{dup}'")));
    }
    rules.shared_port_template = names
        .into_iter()
        .map(|name| SharedPort::new(name, max))
        .collect();

    Ok(rules)
}
