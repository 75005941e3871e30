//! Per-command handlers plus shared config plumbing.

pub mod config_cmd;
pub mod status;
pub mod watch;

use std::path::PathBuf;

use homeward_config::Config;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// The config file path this invocation operates on.
pub(crate) fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(homeward_config::config_path)
}

pub(crate) fn load_cli_config(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(homeward_config::load_config_from(&config_file(global))?)
}

pub(crate) fn save_cli_config(global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    Ok(homeward_config::save_config_to(cfg, &config_file(global))?)
}

/// Route a parsed command to its handler.
pub async fn dispatch(command: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match command {
        Command::Status => status::status(global).await,
        Command::Resolve => status::resolve(global).await,
        Command::Probe(args) => status::probe(&args, global).await,
        Command::Watch => watch::handle(global).await,
        Command::Config(args) => config_cmd::handle(&args, global),
        // Completions are handled in main before dispatch.
        Command::Completions(_) => Ok(()),
    }
}
