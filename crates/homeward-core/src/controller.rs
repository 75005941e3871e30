//! Transition controller — decides *when* and *how* the consuming view
//! switches URLs.
//!
//! One background task owns all transition state. Platform events,
//! consumer feedback, forced refreshes, and probe verdicts are funneled
//! through a single `mpsc` queue and handled in arrival order, so there
//! is exactly one writer and no callback races by construction. Debounce
//! and backoff are deadline-based `select!` arms; the reachability probe
//! runs as a generation-tagged child task that a newer value can cancel
//! without leaking anything.
//!
//! Guarantees to the consumer:
//! - at most one load instruction outstanding at any time;
//! - at most one instruction per debounce window, carrying the newest value;
//! - a superseded pending switch is fully cancelled, never delivered late;
//! - an unreachable endpoint is never instructed — switches are gated on
//!   the connectivity probe, with bounded exponential-backoff retry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use homeward_net::NetworkEvent;

use crate::classify::classify;
use crate::error::{CoreError, LoadErrorKind};
use crate::resolve::{ResolvedUrl, resolve_url};
use crate::settings::SettingsSource;
use crate::source::{ConnectivitySource, IdentitySource};

const INPUT_CHANNEL_SIZE: usize = 64;
const INSTRUCTION_CHANNEL_SIZE: usize = 8;

// ── TransitionPhase ──────────────────────────────────────────────────

/// Controller state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionPhase {
    /// No resolution has happened yet.
    Idle,
    /// A switch is due; verifying the network actually routes traffic.
    AwaitingConnectivity,
    /// The consumer has been instructed and has not reported back.
    Loading,
    /// The consumer confirmed the current URL.
    Loaded,
    /// Connectivity was not ready; waiting out an exponential backoff.
    RetryBackoff { attempt: u32 },
    /// Retries exhausted or a content-level failure; waiting passively
    /// for the next network event.
    Failed,
}

impl std::fmt::Display for TransitionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingConnectivity => write!(f, "awaiting-connectivity"),
            Self::Loading => write!(f, "loading"),
            Self::Loaded => write!(f, "loaded"),
            Self::RetryBackoff { attempt } => write!(f, "retry-backoff({attempt})"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ── ControllerOptions ────────────────────────────────────────────────

/// Timing knobs for the transition machinery.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Debounce for same-side URL changes.
    pub debounce: Duration,

    /// Short debounce for changes crossing the internal/external
    /// boundary — those are user-visible and time-sensitive.
    pub mode_debounce: Duration,

    /// Total budget for one reachability probe.
    pub probe_timeout: Duration,

    /// First backoff delay; doubles per retry.
    pub backoff_base: Duration,

    /// Backoff retries before giving up and waiting for the next
    /// network event.
    pub max_backoff_retries: u32,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(5),
            mode_debounce: Duration::from_millis(300),
            probe_timeout: Duration::from_secs(5),
            backoff_base: Duration::from_secs(1),
            max_backoff_retries: 3,
        }
    }
}

// ── Inputs ───────────────────────────────────────────────────────────

/// Everything that can move the state machine, serialized into one queue.
#[derive(Debug)]
enum Input {
    Network(NetworkEvent),
    Refresh,
    LoadSucceeded(String),
    LoadFailed(String, LoadErrorKind),
    ProbeVerdict { generation: u64, reachable: bool },
}

/// How fast a new target should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Urgency {
    /// Normal debouncing rules.
    Normal,
    /// Skip debounce entirely (forced refresh, backoff retry).
    Immediate,
}

// ── TransitionController ─────────────────────────────────────────────

/// Handle to a running transition controller.
///
/// Cheaply cloneable. The paired instruction receiver is handed out once
/// at spawn time; feedback flows back through the `report_*` methods.
#[derive(Clone)]
pub struct TransitionController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    input_tx: mpsc::Sender<Input>,
    phase_rx: watch::Receiver<TransitionPhase>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TransitionController {
    /// Spawn the controller loop.
    ///
    /// Returns the handle plus the instruction stream the consumer must
    /// drain. An initial resolution is queued immediately — the first
    /// ever value always switches without debounce.
    pub fn spawn(
        settings: Arc<dyn SettingsSource>,
        identity: Arc<dyn IdentitySource>,
        connectivity: Arc<dyn ConnectivitySource>,
        options: ControllerOptions,
    ) -> (Self, mpsc::Receiver<ResolvedUrl>) {
        let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_SIZE);
        let (instruction_tx, instruction_rx) = mpsc::channel(INSTRUCTION_CHANNEL_SIZE);
        let (phase_tx, phase_rx) = watch::channel(TransitionPhase::Idle);
        let cancel = CancellationToken::new();

        let flow = Flow {
            settings,
            identity,
            connectivity,
            options,
            phase_tx,
            instruction_tx,
            input_tx: input_tx.clone(),
            cancel: cancel.clone(),
            loaded: None,
            pending: None,
            probing: None,
            outstanding: None,
            backoff: None,
            retries: 0,
            generation: 0,
        };
        let task = tokio::spawn(flow.run(input_rx));

        // Kick off the first resolution.
        let _ = input_tx.try_send(Input::Refresh);

        (
            Self {
                inner: Arc::new(ControllerInner {
                    input_tx,
                    phase_rx,
                    cancel,
                    task: Mutex::new(Some(task)),
                }),
            },
            instruction_rx,
        )
    }

    /// Observe phase changes.
    pub fn phase(&self) -> watch::Receiver<TransitionPhase> {
        self.inner.phase_rx.clone()
    }

    /// Phase changes as a `Stream` for `StreamExt` consumers.
    pub fn phase_stream(&self) -> tokio_stream::wrappers::WatchStream<TransitionPhase> {
        tokio_stream::wrappers::WatchStream::new(self.inner.phase_rx.clone())
    }

    /// Feed a platform network event into the loop.
    pub async fn network_event(&self, event: NetworkEvent) -> Result<(), CoreError> {
        self.send(Input::Network(event)).await
    }

    /// Forward a monitor's event stream into the loop until shutdown.
    pub fn attach(&self, mut events: tokio::sync::broadcast::Receiver<NetworkEvent>) {
        let input_tx = self.inner.input_tx.clone();
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    result = events.recv() => match result {
                        Ok(event) => {
                            if input_tx.send(Input::Network(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "event forwarder lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
    }

    /// User-triggered refresh: bypasses debounce, re-runs resolution,
    /// switches immediately. Wins the tie-break against any pending
    /// debounced switch.
    pub async fn request_forced_refresh(&self) -> Result<(), CoreError> {
        self.send(Input::Refresh).await
    }

    /// Consumer feedback: the instructed URL loaded.
    pub async fn report_load_succeeded(
        &self,
        url: impl Into<String>,
    ) -> Result<(), CoreError> {
        self.send(Input::LoadSucceeded(url.into())).await
    }

    /// Consumer feedback: the instructed URL failed to load.
    ///
    /// Only primary-load failures belong here — sub-resource and
    /// analytics errors must not be reported.
    pub async fn report_load_failed(
        &self,
        url: impl Into<String>,
        kind: LoadErrorKind,
    ) -> Result<(), CoreError> {
        self.send(Input::LoadFailed(url.into(), kind)).await
    }

    /// Stop the loop, cancel all pending timers and probes, and wait
    /// for the task to exit. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(task) = self.inner.task.lock().await.take() {
            let _ = task.await;
        }
    }

    async fn send(&self, input: Input) -> Result<(), CoreError> {
        self.inner
            .input_tx
            .send(input)
            .await
            .map_err(|_| CoreError::ControllerShutDown)
    }
}

// ── The state machine loop ───────────────────────────────────────────

struct Pending {
    target: ResolvedUrl,
    deadline: Instant,
}

struct Probing {
    target: ResolvedUrl,
    generation: u64,
    cancel: CancellationToken,
}

struct Backoff {
    deadline: Instant,
}

struct Flow {
    settings: Arc<dyn SettingsSource>,
    identity: Arc<dyn IdentitySource>,
    connectivity: Arc<dyn ConnectivitySource>,
    options: ControllerOptions,
    phase_tx: watch::Sender<TransitionPhase>,
    instruction_tx: mpsc::Sender<ResolvedUrl>,
    /// For probe tasks to report back through the same serialized queue.
    input_tx: mpsc::Sender<Input>,
    cancel: CancellationToken,

    // Transition state — this task is the only writer.
    loaded: Option<ResolvedUrl>,
    pending: Option<Pending>,
    probing: Option<Probing>,
    outstanding: Option<ResolvedUrl>,
    backoff: Option<Backoff>,
    retries: u32,
    generation: u64,
}

impl Flow {
    async fn run(mut self, mut input_rx: mpsc::Receiver<Input>) {
        let cancel = self.cancel.clone();

        loop {
            // The debounce timer only runs while no instruction is
            // outstanding — a due switch waits for the consumer's report.
            let debounce_at = if self.outstanding.is_none() {
                self.pending.as_ref().map(|p| p.deadline)
            } else {
                None
            };
            let backoff_at = self.backoff.as_ref().map(|b| b.deadline);

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(input) = input_rx.recv() => {
                    self.handle_input(input).await;
                }
                () = sleep_until(debounce_at.unwrap_or_else(Instant::now)),
                    if debounce_at.is_some() =>
                {
                    self.debounce_elapsed();
                }
                () = sleep_until(backoff_at.unwrap_or_else(Instant::now)),
                    if backoff_at.is_some() =>
                {
                    self.backoff_elapsed().await;
                }
            }
        }

        self.cancel_probe();
        debug!("transition loop exiting");
    }

    async fn handle_input(&mut self, input: Input) {
        match input {
            Input::Network(event) => {
                debug!(?event, "network event");
                // A fresh network signal wipes any retry history.
                self.retries = 0;
                self.backoff = None;
                self.evaluate(Urgency::Normal).await;
            }
            Input::Refresh => {
                debug!("forced refresh");
                // Tie-break: the refresh wins, the debounce timer dies.
                self.pending = None;
                self.retries = 0;
                self.backoff = None;
                self.evaluate(Urgency::Immediate).await;
            }
            Input::LoadSucceeded(url) => self.load_succeeded(&url),
            Input::LoadFailed(url, kind) => self.load_failed(&url, kind),
            Input::ProbeVerdict {
                generation,
                reachable,
            } => self.probe_verdict(generation, reachable),
        }
    }

    // ── Evaluation ───────────────────────────────────────────────────

    /// Re-read settings, re-resolve identity, and apply the resulting
    /// target. This is the only place configuration is read, so every
    /// pass sees the settings store's current values.
    async fn evaluate(&mut self, urgency: Urgency) {
        let settings = self.settings.snapshot();
        let manual = settings.manual_override.clone();
        let identity = self.identity.resolve_identity(manual.as_deref()).await;

        let is_home = classify(&identity, &settings);
        let target = resolve_url(is_home, settings.mode, &settings.endpoints);

        debug!(
            ssid = ?identity.ssid,
            on_wifi = identity.on_wifi,
            is_home,
            url = %target.url,
            kind = ?target.kind,
            "resolution complete"
        );

        self.apply_target(target, urgency);
    }

    fn apply_target(&mut self, target: ResolvedUrl, urgency: Urgency) {
        // Exactly this URL is already being delivered or verified.
        if self.outstanding.as_ref() == Some(&target) {
            self.pending = None;
            return;
        }
        if self.probing.as_ref().is_some_and(|p| p.target == target) {
            self.pending = None;
            return;
        }

        // Back on the URL we already show: cancel whatever was queued.
        if self.outstanding.is_none() && self.loaded.as_ref() == Some(&target) {
            let superseded = self.pending.take().is_some()
                || self.probing.is_some()
                || self.backoff.is_some();
            if superseded {
                debug!(url = %target.url, "queued switch superseded, staying on current url");
                self.cancel_probe();
                self.backoff = None;
                self.retries = 0;
            }
            self.set_phase(TransitionPhase::Loaded);
            return;
        }

        // The reference point for boundary detection is what the view
        // will be showing once in-flight work settles.
        let reference = self.outstanding.as_ref().or(self.loaded.as_ref());
        let delay = match urgency {
            Urgency::Immediate => Duration::ZERO,
            Urgency::Normal => match reference {
                // First ever resolution always switches at once.
                None => Duration::ZERO,
                Some(current) if current.kind != target.kind => self.options.mode_debounce,
                Some(_) => self.options.debounce,
            },
        };

        // A newer value supersedes any probe or backoff toward an older one.
        self.cancel_probe();
        self.backoff = None;

        trace!(url = %target.url, ?delay, "switch scheduled");
        // Single pending slot: last write wins, and each newer value
        // restarts the window.
        self.pending = Some(Pending {
            target,
            deadline: Instant::now() + delay,
        });

        if self.outstanding.is_none() && delay.is_zero() {
            if let Some(pending) = self.pending.take() {
                self.begin_switch(pending.target);
            }
        }
    }

    // ── Timers ───────────────────────────────────────────────────────

    fn debounce_elapsed(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(url = %pending.target.url, "debounce elapsed");
            self.begin_switch(pending.target);
        }
    }

    async fn backoff_elapsed(&mut self) {
        self.backoff = None;
        debug!(attempt = self.retries, "backoff elapsed, re-resolving");
        // Re-resolve rather than blindly retrying the old target — the
        // network may have moved on during the wait.
        self.evaluate(Urgency::Immediate).await;
    }

    // ── Switching ────────────────────────────────────────────────────

    /// Start verifying connectivity for a due switch. Never called while
    /// an instruction is outstanding.
    fn begin_switch(&mut self, target: ResolvedUrl) {
        self.set_phase(TransitionPhase::AwaitingConnectivity);
        self.generation += 1;
        let generation = self.generation;

        if !self.connectivity.is_internet_validated() {
            debug!(url = %target.url, "internet not validated, deferring switch");
            self.schedule_retry();
            return;
        }

        let cancel = self.cancel.child_token();
        let task_cancel = cancel.clone();
        let connectivity = Arc::clone(&self.connectivity);
        let verdict_tx = self.input_tx.clone();
        let timeout = self.options.probe_timeout;

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = task_cancel.cancelled() => {}
                reachable = connectivity.probe_reachability(timeout) => {
                    let _ = verdict_tx
                        .send(Input::ProbeVerdict { generation, reachable })
                        .await;
                }
            }
        });

        self.probing = Some(Probing {
            target,
            generation,
            cancel,
        });
    }

    fn probe_verdict(&mut self, generation: u64, reachable: bool) {
        let Some(probing) = self.probing.take_if(|p| p.generation == generation) else {
            trace!(generation, "stale probe verdict ignored");
            return;
        };

        if reachable {
            self.dispatch(probing.target);
        } else {
            debug!(url = %probing.target.url, "endpoint network not reachable");
            self.schedule_retry();
        }
    }

    /// Hand the instruction to the consumer. At most one outstanding.
    fn dispatch(&mut self, target: ResolvedUrl) {
        info!(url = %target.url, kind = ?target.kind, "instructing consumer to load");
        if self.instruction_tx.try_send(target.clone()).is_err() {
            warn!("consumer is not accepting instructions");
        }
        self.outstanding = Some(target);
        self.set_phase(TransitionPhase::Loading);
    }

    // ── Consumer feedback ────────────────────────────────────────────

    fn load_succeeded(&mut self, url: &str) {
        if self.outstanding.as_ref().is_none_or(|out| out.url != url) {
            debug!(url, "stale success report ignored");
            return;
        }
        let Some(out) = self.outstanding.take() else {
            return;
        };

        info!(url = %out.url, "load confirmed");
        self.loaded = Some(out);
        self.retries = 0;
        self.set_phase(TransitionPhase::Loaded);

        // A switch that came due while we were loading fires now.
        if let Some(pending) = self.pending.take_if(|p| p.deadline <= Instant::now()) {
            self.begin_switch(pending.target);
        }
    }

    fn load_failed(&mut self, url: &str, kind: LoadErrorKind) {
        let outstanding_hit = self.outstanding.as_ref().is_some_and(|out| out.url == url);
        let loaded_hit = self.outstanding.is_none()
            && self.loaded.as_ref().is_some_and(|l| l.url == url);

        if outstanding_hit {
            self.outstanding = None;
        } else if loaded_hit {
            // The view lost the URL it was already showing.
            self.loaded = None;
        } else {
            debug!(url, ?kind, "stale failure report ignored");
            return;
        }

        if kind.is_network() {
            warn!(url, ?kind, "network load failure, will retry");
            self.schedule_retry();
        } else {
            warn!(url, ?kind, "content load failure, not retrying");
            self.set_phase(TransitionPhase::Failed);
        }

        // A newer pending value still applies once its window passes.
        if let Some(pending) = self.pending.take_if(|p| p.deadline <= Instant::now()) {
            self.begin_switch(pending.target);
        }
    }

    // ── Retry / backoff ──────────────────────────────────────────────

    fn schedule_retry(&mut self) {
        self.retries += 1;
        if self.retries > self.options.max_backoff_retries {
            warn!(retries = self.retries - 1, "retries exhausted, waiting for network event");
            self.set_phase(TransitionPhase::Failed);
            self.backoff = None;
            return;
        }

        let delay = backoff_delay(self.options.backoff_base, self.retries);
        debug!(attempt = self.retries, ?delay, "scheduling retry");
        self.set_phase(TransitionPhase::RetryBackoff {
            attempt: self.retries,
        });
        self.backoff = Some(Backoff {
            deadline: Instant::now() + delay,
        });
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn cancel_probe(&mut self) {
        if let Some(probing) = self.probing.take() {
            debug!(url = %probing.target.url, "cancelling in-flight probe");
            probing.cancel.cancel();
        }
    }

    fn set_phase(&mut self, phase: TransitionPhase) {
        self.phase_tx.send_if_modified(|current| {
            if *current == phase {
                false
            } else {
                trace!(from = %current, to = %phase, "phase change");
                *current = phase;
                true
            }
        });
    }
}

/// `base * 2^(attempt-1)`, attempt counted from 1.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
    }

    #[test]
    fn backoff_shift_is_clamped() {
        // Absurd attempt numbers must not overflow the shift.
        let base = Duration::from_millis(1);
        let _ = backoff_delay(base, 1000);
    }
}
