//! Clap derive structures for the `homeward` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// homeward -- network-aware internal/external URL switching
#[derive(Debug, Parser)]
#[command(
    name = "homeward",
    version,
    about = "Decide which endpoint to use for the network you're on",
    long_about = "Detects the current WiFi network, classifies it against your\n\
        configured home networks, and resolves which of the two endpoints\n\
        (internal or external) a client should be using right now.\n\n\
        `watch` runs the full transition controller: debounced switching,\n\
        connectivity validation, and exponential-backoff retry.",
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

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the config file (default: XDG config dir)
    #[arg(long, env = "HOMEWARD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HOMEWARD_OUTPUT",
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
    Auto,
    Always,
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the detected network, classification, and resolved URL
    Status,

    /// Print the URL a client should be using right now
    Resolve,

    /// Check whether the network actually routes traffic
    Probe(ProbeArgs),

    /// Run the transition controller and stream load instructions
    Watch,

    /// Inspect and edit the configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Total probe budget (e.g. "5s", "800ms")
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

// ── Config subcommands ───────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Write a starter config file
    Init,

    /// Set the connection mode: auto, internal, or external
    SetMode {
        mode: String,
    },

    /// Set one or both endpoint URLs
    SetEndpoints {
        /// URL to use on the home network
        #[arg(long)]
        internal: Option<String>,

        /// URL to use everywhere else
        #[arg(long)]
        external: Option<String>,
    },

    /// Add a WiFi identity to the home network set
    AddNetwork {
        ssid: String,
    },

    /// Remove a WiFi identity from the home network set
    RemoveNetwork {
        ssid: String,
    },

    /// Set (or clear, with no argument) the manual override identity
    SetOverride {
        ssid: Option<String>,
    },

    /// Set the detection-failure policy: assume-home or assume-away
    SetPolicy {
        policy: String,
    },
}
