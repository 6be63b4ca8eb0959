//! Shared configuration for stackwatch.
//!
//! TOML profiles layered with environment variables, and translation to
//! `stackwatch_core::ControllerConfig`. The CLI adds flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stackwatch_core::{ControllerConfig, ReconnectConfig, TlsVerification};

/// Environment prefix; nested keys use `__` (e.g. `STACKWATCH_DEFAULTS__TIMEOUT`).
pub const ENV_PREFIX: &str = "STACKWATCH_";

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

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
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
    /// Name of the profile to use: explicit choice, then `default_profile`,
    /// then `"default"`.
    pub fn active_profile_name<'a>(&'a self, explicit: Option<&'a str>) -> &'a str {
        explicit
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
    }

    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// REST timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
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

/// A named server profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Server base URL (e.g., "http://localhost:8080").
    pub url: String,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// First reconnect delay in milliseconds.
    pub reconnect_initial_ms: Option<u64>,

    /// Reconnect delay cap in milliseconds.
    pub reconnect_max_ms: Option<u64>,

    /// Consecutive reconnects before giving up.
    pub reconnect_max_retries: Option<u32>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "stackwatch", "stackwatch").map_or_else(
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
    p.push("stackwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config layered as defaults, then `path` (if present), then
/// `STACKWATCH_` environment variables.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file is missing or invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize config to TOML and write it to `path`, creating parents.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ControllerConfig` from a profile and global defaults.
pub fn profile_to_controller_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ControllerConfig, ConfigError> {
    let url = parse_url(&profile.url)?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    let reconnect = reconnect_config(profile)?;

    Ok(ControllerConfig {
        url,
        tls,
        timeout,
        reconnect,
    })
}

/// Parse and check a server URL. Only http(s) is accepted.
pub fn parse_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "url".into(),
            reason: format!("unsupported scheme '{other}', expected http or https"),
        }),
    }
}

fn reconnect_config(profile: &Profile) -> Result<ReconnectConfig, ConfigError> {
    let base = ReconnectConfig::default();
    let initial_delay = profile
        .reconnect_initial_ms
        .map_or(base.initial_delay, Duration::from_millis);
    let max_delay = profile
        .reconnect_max_ms
        .map_or(base.max_delay, Duration::from_millis);

    if initial_delay.is_zero() {
        return Err(ConfigError::Validation {
            field: "reconnect_initial_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }
    if max_delay < initial_delay {
        return Err(ConfigError::Validation {
            field: "reconnect_max_ms".into(),
            reason: "must not be smaller than reconnect_initial_ms".into(),
        });
    }

    Ok(ReconnectConfig {
        initial_delay,
        max_delay,
        max_retries: profile.reconnect_max_retries.unwrap_or(base.max_retries),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn profile(url: &str) -> Profile {
        Profile {
            url: url.into(),
            ..Profile::default()
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.output, "table");
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        let mut prod = profile("https://deploy.example.com");
        prod.reconnect_max_retries = Some(5);
        cfg.profiles.insert("prod".into(), prod);
        cfg.default_profile = Some("prod".into());
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.active_profile_name(None), "prod");
        assert_eq!(loaded.active_profile_name(Some("lab")), "lab");
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[defaults]\ntimeout = 5\n\n[profiles.lab]\nurl = \"http://lab:8080\"\n",
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.defaults.timeout, 5);
        assert_eq!(cfg.defaults.color, "auto");
        assert_eq!(cfg.profile("lab").unwrap().url, "http://lab:8080");
        assert!(matches!(
            cfg.profile("missing"),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn profile_translation_applies_overrides() {
        let mut p = profile("http://localhost:9000");
        p.timeout = Some(7);
        p.reconnect_initial_ms = Some(250);
        p.reconnect_max_ms = Some(4000);
        p.reconnect_max_retries = Some(10);

        let cfg = profile_to_controller_config(&p, &Defaults::default()).unwrap();
        assert_eq!(cfg.url.as_str(), "http://localhost:9000/");
        assert_eq!(cfg.timeout, Duration::from_secs(7));
        assert_eq!(cfg.tls, TlsVerification::SystemDefaults);
        assert_eq!(cfg.reconnect.initial_delay, Duration::from_millis(250));
        assert_eq!(cfg.reconnect.max_delay, Duration::from_millis(4000));
        assert_eq!(cfg.reconnect.max_retries, 10);
    }

    #[test]
    fn insecure_wins_over_ca_cert() {
        let mut p = profile("https://deploy.example.com");
        p.ca_cert = Some("/etc/ca.pem".into());
        let cfg = profile_to_controller_config(&p, &Defaults::default()).unwrap();
        assert_eq!(cfg.tls, TlsVerification::CustomCa("/etc/ca.pem".into()));

        p.insecure = Some(true);
        let cfg = profile_to_controller_config(&p, &Defaults::default()).unwrap();
        assert_eq!(cfg.tls, TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn rejects_bad_urls_and_backoff() {
        assert!(profile_to_controller_config(&profile("not a url"), &Defaults::default()).is_err());
        assert!(parse_url("ftp://host").is_err());

        let mut p = profile("http://localhost:8080");
        p.reconnect_initial_ms = Some(5000);
        p.reconnect_max_ms = Some(1000);
        let err = profile_to_controller_config(&p, &Defaults::default()).unwrap_err();
        assert!(err.to_string().contains("reconnect_max_ms"));
    }
}
