//! Clap derive structures for the `stackwatch` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use stackwatch_core::StackStatus;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// stackwatch -- follow GitOps stack deployments from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "stackwatch",
    version,
    about = "Watch and inspect stack deployments from the command line",
    long_about = "A client for a GitOps deployment server.\n\n\
        Mirrors the server's stacks with a one-shot fetch plus a live\n\
        event stream, and renders filtered, sorted views of them.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "STACKWATCH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server URL (overrides profile)
    #[arg(long, short = 'u', env = "STACKWATCH_URL", global = true)]
    pub url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "STACKWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "STACKWATCH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "STACKWATCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List and inspect stacks
    #[command(alias = "s")]
    Stacks(StacksArgs),

    /// Show per-status counts and the latest refresh
    #[command(alias = "st")]
    Status,

    /// Ask the server to re-read its repository
    Refresh(RefreshArgs),

    /// Follow live stack changes until interrupted
    #[command(alias = "w")]
    Watch(FilterArgs),

    /// List the containers of one stack
    #[command(alias = "ps")]
    Containers {
        /// Stack path (e.g. apps/api)
        path: String,
    },

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Filter Arguments ──────────────────────────────────────────

/// View filters shared by `stacks list` and `watch`.
#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Only stacks with this status
    #[arg(long, short = 's', value_parser = parse_status)]
    pub status: Option<StackStatus>,

    /// Only stacks whose path contains this text (case-insensitive)
    #[arg(long, short = 'f')]
    pub search: Option<String>,
}

fn parse_status(raw: &str) -> Result<StackStatus, String> {
    raw.parse().map_err(|_| {
        format!(
            "unknown status '{raw}', expected one of: \
             missing, syncing, synced, deleting, failed"
        )
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  STACKS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct StacksArgs {
    #[command(subcommand)]
    pub command: StacksCommand,
}

#[derive(Debug, Subcommand)]
pub enum StacksCommand {
    /// List stacks, sorted by path
    #[command(alias = "ls")]
    List(FilterArgs),

    /// Get stack details
    Get {
        /// Stack path (e.g. apps/api)
        path: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  REFRESH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Wait for the refresh to complete or fail
    #[arg(long)]
    pub wait: bool,

    /// Give up waiting after this many seconds
    #[arg(long, default_value = "120", requires = "wait")]
    pub wait_timeout: u64,
}

impl RefreshArgs {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or update a profile
    Init {
        /// Server URL for the profile
        #[arg(long)]
        server: String,

        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// Path to a custom CA certificate
        #[arg(long)]
        ca_cert: Option<std::path::PathBuf>,
    },

    /// Display current configuration
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
