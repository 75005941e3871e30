//! One-shot commands: `status`, `resolve`, and `probe`.
//!
//! These take a single link-state snapshot, walk the same classification
//! and resolution path the controller uses, and print the answer.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use homeward_core::{ResolvedUrl, Settings, classify, resolve_url};
use homeward_net::{
    IdentityResolver, LinkSnapshot, MonitorOptions, NetworkIdentity, Prober, scan_once,
};

use crate::cli::{GlobalOpts, ProbeArgs};
use crate::error::CliError;
use crate::output;

// ── Shared evaluation ────────────────────────────────────────────────

struct Evaluation {
    identity: NetworkIdentity,
    settings: Settings,
    is_home: bool,
    resolved: ResolvedUrl,
    link: watch::Receiver<LinkSnapshot>,
}

async fn evaluate_once(global: &GlobalOpts) -> Result<Evaluation, CliError> {
    let cfg = super::load_cli_config(global)?;
    let settings = cfg.to_settings();

    // One snapshot is enough here — a watch receiver keeps its last
    // value, so the poller is not needed for one-shot commands.
    let snapshot = scan_once(&MonitorOptions::default())?;
    let (_link_tx, link) = watch::channel(snapshot);

    let resolver = IdentityResolver::new(link.clone());
    let identity = resolver.resolve(settings.manual_override.as_deref()).await;

    let is_home = classify(&identity, &settings);
    let resolved = resolve_url(is_home, settings.mode, &settings.endpoints);

    Ok(Evaluation {
        identity,
        settings,
        is_home,
        resolved,
        link,
    })
}

// ── status ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct StatusView {
    ssid: Option<String>,
    on_wifi: bool,
    detection_source: homeward_core::DetectionSource,
    validated_internet: bool,
    mode: String,
    is_home: bool,
    url: String,
    kind: homeward_core::UrlKind,
    internal_url: String,
    external_url: String,
}

pub async fn status(global: &GlobalOpts) -> Result<(), CliError> {
    let eval = evaluate_once(global).await?;

    let view = StatusView {
        ssid: eval.identity.ssid.clone(),
        on_wifi: eval.identity.on_wifi,
        detection_source: eval.identity.source,
        validated_internet: eval.identity.validated_internet,
        mode: eval.settings.mode.to_string(),
        is_home: eval.is_home,
        url: eval.resolved.url.clone(),
        kind: eval.resolved.kind,
        internal_url: eval.settings.endpoints.internal_url.clone(),
        external_url: eval.settings.endpoints.external_url.clone(),
    };

    let rendered = output::render_single(&global.output, &view, status_table, |v| v.url.clone());
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn status_table(view: &StatusView) -> String {
    output::render_kv(&[
        ("network", view.ssid.clone().unwrap_or_else(|| "(undetected)".into())),
        ("on wifi", view.on_wifi.to_string()),
        ("detection", format!("{:?}", view.detection_source).to_lowercase()),
        ("validated", view.validated_internet.to_string()),
        ("mode", view.mode.clone()),
        (
            "classified",
            if view.is_home { "home".into() } else { "away".into() },
        ),
        ("active url", view.url.clone()),
        ("kind", format!("{:?}", view.kind).to_lowercase()),
    ])
}

// ── resolve ──────────────────────────────────────────────────────────

pub async fn resolve(global: &GlobalOpts) -> Result<(), CliError> {
    let eval = evaluate_once(global).await?;
    let rendered = output::render_single(
        &global.output,
        &eval.resolved,
        |r| r.url.clone(),
        |r| r.url.clone(),
    );
    output::print_output(&rendered, global.quiet);
    Ok(())
}

// ── probe ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ProbeView {
    validated: bool,
    reachable: bool,
    timeout: String,
}

pub async fn probe(args: &ProbeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let timeout = parse_timeout(&args.timeout)?;
    let eval = evaluate_once(global).await?;

    let prober = Prober::new(eval.link.clone());
    let validated = prober.is_internet_validated();
    let reachable = prober.probe_reachability(timeout).await;

    let view = ProbeView {
        validated,
        reachable,
        timeout: args.timeout.clone(),
    };
    let rendered = output::render_single(
        &global.output,
        &view,
        |v| {
            output::render_kv(&[
                ("validated", v.validated.to_string()),
                ("reachable", v.reachable.to_string()),
            ])
        },
        |v| v.reachable.to_string(),
    );
    output::print_output(&rendered, global.quiet);

    // Data on stdout, verdict in the exit code.
    if reachable {
        Ok(())
    } else {
        Err(CliError::EndpointNotReady)
    }
}

fn parse_timeout(value: &str) -> Result<Duration, CliError> {
    humantime::parse_duration(value).map_err(|e| CliError::Validation {
        field: "timeout".into(),
        reason: format!("invalid duration '{value}': {e}"),
    })
}
