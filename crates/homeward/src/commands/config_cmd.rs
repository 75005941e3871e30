//! `config` — inspect and edit the settings file.

use homeward_core::{ConnectionMode, FallbackPolicy, HomeNetworkSet};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match &args.command {
        ConfigCommand::Show => show(global),
        ConfigCommand::Init => init(global),
        ConfigCommand::SetMode { mode } => set_mode(global, mode),
        ConfigCommand::SetEndpoints { internal, external } => {
            set_endpoints(global, internal.as_deref(), external.as_deref())
        }
        ConfigCommand::AddNetwork { ssid } => add_network(global, ssid),
        ConfigCommand::RemoveNetwork { ssid } => remove_network(global, ssid),
        ConfigCommand::SetOverride { ssid } => set_override(global, ssid.as_deref()),
        ConfigCommand::SetPolicy { policy } => set_policy(global, policy),
    }
}

fn show(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load_cli_config(global)?;

    let rendered = output::render_single(
        &global.output,
        &cfg,
        |c| {
            output::render_kv(&[
                ("mode", c.mode.to_string()),
                ("fallback policy", c.fallback_policy.to_string()),
                ("internal url", or_default(&c.endpoints.internal)),
                ("external url", or_default(&c.endpoints.external)),
                ("home networks", c.home.networks.join(", ")),
                (
                    "manual override",
                    c.home.manual_override.clone().unwrap_or_else(|| "(none)".into()),
                ),
                ("debounce", c.timing.debounce.clone()),
                ("mode debounce", c.timing.mode_debounce.clone()),
                ("probe timeout", c.timing.probe_timeout.clone()),
                ("backoff base", c.timing.backoff_base.clone()),
                (
                    "max backoff retries",
                    c.timing.max_backoff_retries.to_string(),
                ),
            ])
        },
        |c| c.mode.to_string(),
    );
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn or_default(url: &str) -> String {
    if url.trim().is_empty() {
        "(built-in default)".into()
    } else {
        url.to_owned()
    }
}

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let path = super::config_file(global);
    if path.exists() {
        println!("config already exists at {}", path.display());
        return Ok(());
    }

    let cfg = homeward_config::Config::default();
    super::save_cli_config(global, &cfg)?;
    println!("wrote starter config to {}", path.display());
    Ok(())
}

fn set_mode(global: &GlobalOpts, mode: &str) -> Result<(), CliError> {
    let parsed: ConnectionMode = mode.parse().map_err(|_| CliError::Validation {
        field: "mode".into(),
        reason: format!("expected 'auto', 'internal', or 'external', got '{mode}'"),
    })?;

    let mut cfg = super::load_cli_config(global)?;
    cfg.mode = parsed;
    super::save_cli_config(global, &cfg)?;
    println!("mode set to {parsed}");
    Ok(())
}

fn set_endpoints(
    global: &GlobalOpts,
    internal: Option<&str>,
    external: Option<&str>,
) -> Result<(), CliError> {
    if internal.is_none() && external.is_none() {
        return Err(CliError::Validation {
            field: "endpoints".into(),
            reason: "pass --internal and/or --external".into(),
        });
    }

    let mut cfg = super::load_cli_config(global)?;
    if let Some(url) = internal {
        validate_url("internal", url)?;
        cfg.endpoints.internal = url.to_owned();
    }
    if let Some(url) = external {
        validate_url("external", url)?;
        cfg.endpoints.external = url.to_owned();
    }
    super::save_cli_config(global, &cfg)?;
    println!("endpoints updated");
    Ok(())
}

/// The core deliberately accepts any string; the CLI is where typos get
/// caught.
fn validate_url(field: &str, value: &str) -> Result<(), CliError> {
    url::Url::parse(value).map_err(|e| CliError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{value}': {e}"),
    })?;
    Ok(())
}

fn add_network(global: &GlobalOpts, ssid: &str) -> Result<(), CliError> {
    let mut cfg = super::load_cli_config(global)?;
    let mut set: HomeNetworkSet = cfg.home.networks.iter().cloned().collect();

    if set.insert(ssid) {
        cfg.home.networks = set.iter().map(String::from).collect();
        super::save_cli_config(global, &cfg)?;
        println!("added '{ssid}' to home networks");
    } else {
        println!("'{ssid}' is already a home network");
    }
    Ok(())
}

fn remove_network(global: &GlobalOpts, ssid: &str) -> Result<(), CliError> {
    let mut cfg = super::load_cli_config(global)?;
    let mut set: HomeNetworkSet = cfg.home.networks.iter().cloned().collect();

    if set.remove(ssid) {
        cfg.home.networks = set.iter().map(String::from).collect();
        super::save_cli_config(global, &cfg)?;
        println!("removed '{ssid}' from home networks");
    } else {
        println!("'{ssid}' is not a home network");
    }
    Ok(())
}

fn set_override(global: &GlobalOpts, ssid: Option<&str>) -> Result<(), CliError> {
    let mut cfg = super::load_cli_config(global)?;
    match ssid {
        Some(name) => {
            cfg.home.manual_override = Some(name.to_owned());
            super::save_cli_config(global, &cfg)?;
            println!("manual override set to '{name}'");
            if !cfg.home.networks.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                println!("note: '{name}' is not in the home network set, so it has no effect yet");
            }
        }
        None => {
            cfg.home.manual_override = None;
            super::save_cli_config(global, &cfg)?;
            println!("manual override cleared");
        }
    }
    Ok(())
}

fn set_policy(global: &GlobalOpts, policy: &str) -> Result<(), CliError> {
    let parsed: FallbackPolicy = policy.parse().map_err(|_| CliError::Validation {
        field: "policy".into(),
        reason: format!("expected 'assume-home' or 'assume-away', got '{policy}'"),
    })?;

    let mut cfg = super::load_cli_config(global)?;
    cfg.fallback_policy = parsed;
    super::save_cli_config(global, &cfg)?;
    println!("fallback policy set to {parsed}");
    Ok(())
}
