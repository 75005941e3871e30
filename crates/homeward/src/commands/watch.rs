//! `watch` — run the full pipeline and stream load instructions.
//!
//! This is a headless stand-in for a content view: it wires
//! monitor → resolver → prober → controller, prints every phase change
//! and load instruction, and immediately confirms each load so the
//! state machine keeps moving.

use std::sync::Arc;

use owo_colors::OwoColorize;
use tracing::debug;

use homeward_core::{SharedSettings, TransitionController};
use homeward_net::{IdentityResolver, MonitorOptions, NetworkMonitor, Prober};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load_cli_config(global)?;
    let options = cfg.controller_options()?;
    let poll_interval = cfg.poll_interval()?;
    let color = output::should_color(&global.color);

    let monitor = NetworkMonitor::spawn(MonitorOptions {
        poll_interval,
        ..MonitorOptions::default()
    });
    let link = monitor.link_state();

    let settings = Arc::new(SharedSettings::new(cfg.to_settings()));
    let resolver = Arc::new(IdentityResolver::new(link.clone()));
    let prober = Arc::new(Prober::new(link));

    let (controller, mut instructions) =
        TransitionController::spawn(settings, resolver, prober, options);
    controller.attach(monitor.subscribe());

    if !global.quiet {
        println!("watching for network changes (ctrl-c to stop)");
    }

    let mut phase = controller.phase();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupt received");
                break;
            }
            changed = phase.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *phase.borrow_and_update();
                if !global.quiet {
                    let ts = chrono::Local::now().format("%H:%M:%S");
                    if color {
                        println!("[{ts}] {} {current}", "phase".dimmed());
                    } else {
                        println!("[{ts}] phase {current}");
                    }
                }
            }
            Some(instruction) = instructions.recv() => {
                let ts = chrono::Local::now().format("%H:%M:%S");
                if color {
                    println!("[{ts}] {} {}", "load".green().bold(), instruction.url);
                } else {
                    println!("[{ts}] load {}", instruction.url);
                }
                // Headless consumer: confirm at once. A real view reports
                // success or failure from its actual load result.
                if controller.report_load_succeeded(&instruction.url).await.is_err() {
                    break;
                }
            }
        }
    }

    controller.shutdown().await;
    monitor.shutdown().await;
    Ok(())
}
