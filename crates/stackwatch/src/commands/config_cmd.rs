//! Config subcommand handlers. None of these touch the network.

use std::path::PathBuf;

use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ProfileEntry<'a> {
    name: &'a str,
    url: &'a str,
    default: bool,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "URL")]
    url: String,
}

fn config_detail(cfg: &Config) -> String {
    let mut lines = vec![
        format!(
            "Default profile: {}",
            cfg.default_profile.as_deref().unwrap_or("-")
        ),
        format!("Output:          {}", cfg.defaults.output),
        format!("Color:           {}", cfg.defaults.color),
        format!("Insecure:        {}", cfg.defaults.insecure),
        format!("Timeout:         {}s", cfg.defaults.timeout),
    ];
    for (name, p) in &cfg.profiles {
        lines.push(String::new());
        lines.push(format!("[{name}]"));
        lines.push(format!("  URL:      {}", p.url));
        if let Some(ref ca) = p.ca_cert {
            lines.push(format!("  CA cert:  {}", ca.display()));
        }
        if let Some(insecure) = p.insecure {
            lines.push(format!("  Insecure: {insecure}"));
        }
        if let Some(timeout) = p.timeout {
            lines.push(format!("  Timeout:  {timeout}s"));
        }
    }
    lines.join("\n")
}

fn init_profile(
    cfg: &mut Config,
    name: String,
    server: &str,
    ca_cert: Option<PathBuf>,
) -> Result<(), CliError> {
    // Validate before writing anything.
    stackwatch_config::parse_url(server)?;

    let profile = cfg.profiles.entry(name.clone()).or_default();
    profile.url = server.to_owned();
    if ca_cert.is_some() {
        profile.ca_cert = ca_cert;
    }
    if cfg.profiles.len() == 1 || cfg.default_profile.is_none() {
        cfg.default_profile = Some(name);
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init {
            server,
            name,
            ca_cert,
        } => {
            let mut cfg = config::load_config()?;
            init_profile(&mut cfg, name.clone(), &server, ca_cert)?;
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!(
                    "Profile '{name}' saved to {}",
                    config::config_path().display()
                );
            }
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let out = output::render_single(&global.output, &cfg, config_detail, |c| {
                c.default_profile.clone().unwrap_or_default()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let path = config::config_path();
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let active = config::active_profile_name(global, &cfg);
            let entries: Vec<ProfileEntry<'_>> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileEntry {
                    name,
                    url: &p.url,
                    default: *name == active,
                })
                .collect();
            let out = output::render_list(
                &global.output,
                &entries,
                |e| ProfileRow {
                    marker: if e.default { "*" } else { "" },
                    name: e.name.to_owned(),
                    url: e.url.to_owned(),
                },
                |e| e.name.to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }
    }
}
