//! CLI configuration -- thin wrapper around `stackwatch_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--url, --insecure, --timeout).

use std::time::Duration;

use stackwatch_core::{ControllerConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use stackwatch_config::{
    Config, config_path, load_config, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config
        .active_profile_name(global.profile.as_deref())
        .to_owned()
}

/// Build a `ControllerConfig` from the config file, profile, and CLI overrides.
///
/// Flag values take priority over profile values. Without a matching
/// profile, `--url` alone is enough; an explicitly named profile that does
/// not exist is an error.
pub fn build_controller_config(global: &GlobalOpts) -> Result<ControllerConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut controller_config = match cfg.profiles.get(&profile_name) {
        Some(profile) => {
            let mut profile = profile.clone();
            if let Some(ref url) = global.url {
                profile.url.clone_from(url);
            }
            stackwatch_config::profile_to_controller_config(&profile, &cfg.defaults)?
        }
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        None => {
            let raw = global.url.as_deref().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?;
            let mut config = ControllerConfig::new(stackwatch_config::parse_url(raw)?);
            config.timeout = Duration::from_secs(cfg.defaults.timeout);
            if cfg.defaults.insecure {
                config.tls = TlsVerification::DangerAcceptInvalid;
            }
            config
        }
    };

    if global.insecure {
        controller_config.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        controller_config.timeout = Duration::from_secs(secs);
    }

    Ok(controller_config)
}

/// Comma-separated profile names, or `(none)`.
pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
