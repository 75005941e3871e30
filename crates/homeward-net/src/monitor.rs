//! Wireless link monitor — background poll of the kernel's view of the
//! network links, fanned out to subscribers.
//!
//! One monitor per process feeds every consumer through channels; nobody
//! else registers platform callbacks, which keeps teardown a single
//! cancellation and removes duplicate-update races at the source.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::event::{NetworkEvent, Transport};

const EVENT_CHANNEL_CAPACITY: usize = 64;

// ── LinkSnapshot ─────────────────────────────────────────────────────

/// Point-in-time view of the wireless link state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSnapshot {
    /// At least one wireless interface is associated and up.
    pub on_wifi: bool,

    /// Name of the active wireless interface, if any.
    pub interface: Option<String>,

    /// Link-level "working" signal: carrier present and interface up.
    /// Association-level only — real internet validation is the prober's job.
    pub validated: bool,

    /// Network identity from the richest platform source, when available.
    /// Usually withheld; `None` here never means "not on WiFi".
    pub transport_identity: Option<String>,
}

// ── MonitorOptions ───────────────────────────────────────────────────

/// Tuning for the link monitor.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// How often to re-read the link state.
    pub poll_interval: Duration,

    /// Root of the kernel's network class directory.
    /// Overridable for tests.
    pub sysfs_root: PathBuf,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            sysfs_root: PathBuf::from("/sys/class/net"),
        }
    }
}

// ── NetworkMonitor ───────────────────────────────────────────────────

/// Handle to the background link-state poller.
///
/// Subscribe for edge events, or read the current [`LinkSnapshot`] at any
/// time through the `watch` channel. Dropping the handle (or calling
/// [`shutdown`](Self::shutdown)) cancels the poller.
pub struct NetworkMonitor {
    event_tx: broadcast::Sender<NetworkEvent>,
    link_rx: watch::Receiver<LinkSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl NetworkMonitor {
    /// Spawn the poller. The first scan happens immediately.
    pub fn spawn(options: MonitorOptions) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (link_tx, link_rx) = watch::channel(LinkSnapshot::default());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(poll_loop(
            options,
            event_tx.clone(),
            link_tx,
            cancel.clone(),
        ));

        Self {
            event_tx,
            link_rx,
            cancel,
            task: Some(task),
        }
    }

    /// Subscribe to link-change events.
    pub fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.event_tx.subscribe()
    }

    /// Current link state, re-readable at any time.
    pub fn link_state(&self) -> watch::Receiver<LinkSnapshot> {
        self.link_rx.clone()
    }

    /// Stop the poller and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Poll loop ────────────────────────────────────────────────────────

async fn poll_loop(
    options: MonitorOptions,
    event_tx: broadcast::Sender<NetworkEvent>,
    link_tx: watch::Sender<LinkSnapshot>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(options.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut last = LinkSnapshot::default();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let current = match scan_links(&options.sysfs_root) {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        warn!(error = %e, "link scan failed, keeping previous state");
                        continue;
                    }
                };

                if current == last {
                    trace!("link state unchanged");
                    continue;
                }

                debug!(
                    on_wifi = current.on_wifi,
                    interface = ?current.interface,
                    validated = current.validated,
                    "link state changed"
                );

                for event in diff_events(&last, &current) {
                    // Send errors just mean no subscribers right now.
                    let _ = event_tx.send(event);
                }

                link_tx.send_replace(current.clone());
                last = current;
            }
        }
    }

    debug!("link monitor exiting");
}

// ── Link scanning ────────────────────────────────────────────────────

/// One synchronous scan, for one-shot callers that don't need the poller.
pub fn scan_once(options: &MonitorOptions) -> std::io::Result<LinkSnapshot> {
    scan_links(&options.sysfs_root)
}

/// Read the wireless link state from the kernel's network class directory.
///
/// An interface counts as wireless when it carries a `wireless` attribute
/// directory; it counts as active when `operstate` is `up` and `carrier`
/// reads `1`.
pub(crate) fn scan_links(root: &Path) -> std::io::Result<LinkSnapshot> {
    let mut snapshot = LinkSnapshot::default();

    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.join("wireless").is_dir() {
            continue;
        }

        let operstate = read_trimmed(&path.join("operstate"));
        let carrier = read_trimmed(&path.join("carrier"));
        let up = operstate.as_deref() == Some("up");
        let has_carrier = carrier.as_deref() == Some("1");

        if up {
            snapshot.on_wifi = true;
            snapshot.validated = has_carrier;
            snapshot.interface = entry.file_name().to_str().map(String::from);
            break;
        }
    }

    Ok(snapshot)
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_owned())
}

/// Translate a snapshot edge into the events consumers expect.
pub(crate) fn diff_events(old: &LinkSnapshot, new: &LinkSnapshot) -> Vec<NetworkEvent> {
    let mut events = Vec::new();

    match (old.on_wifi, new.on_wifi) {
        (false, true) => events.push(NetworkEvent::Available {
            transport: Transport::Wifi,
        }),
        (true, false) => events.push(NetworkEvent::Lost),
        _ => {}
    }

    // Anything else that moved while (still) associated is a capability change.
    if new.on_wifi
        && (old.validated != new.validated
            || old.interface != new.interface
            || old.transport_identity != new.transport_identity)
    {
        events.push(NetworkEvent::CapabilitiesChanged {
            transport: Transport::Wifi,
            validated: new.validated,
            transport_identity: new.transport_identity.clone(),
        });
    }

    events
}

// ── Tests ────────────────────────────────────────────────────────────
