// Integration tests for the transition controller, run against a paused
// tokio clock so debounce and backoff are deterministic and instant.
#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::time::Instant;

use homeward_core::{
    ConnectionMode, ConnectivitySource, ControllerOptions, DetectionSource, FallbackPolicy,
    HomeNetworkSet, IdentitySource, LoadErrorKind, NetworkEvent, NetworkIdentity, ResolvedUrl,
    Settings, SettingsSource, SharedSettings, TransitionController, TransitionPhase, UrlKind,
};

// ── Scripted sources ─────────────────────────────────────────────────

struct ScriptedIdentity {
    current: std::sync::Mutex<NetworkIdentity>,
}

impl ScriptedIdentity {
    fn new(identity: NetworkIdentity) -> Self {
        Self {
            current: std::sync::Mutex::new(identity),
        }
    }

    fn set(&self, identity: NetworkIdentity) {
        *self.current.lock().unwrap() = identity;
    }
}

impl IdentitySource for ScriptedIdentity {
    fn resolve_identity<'a>(
        &'a self,
        _manual_override: Option<&'a str>,
    ) -> BoxFuture<'a, NetworkIdentity> {
        let identity = self.current.lock().unwrap().clone();
        Box::pin(async move { identity })
    }
}

/// Probe answers pop off a script; an empty script answers `true`.
struct ScriptedConnectivity {
    validated: AtomicBool,
    script: std::sync::Mutex<VecDeque<bool>>,
    probes: AtomicU32,
}

impl ScriptedConnectivity {
    fn always_reachable() -> Self {
        Self {
            validated: AtomicBool::new(true),
            script: std::sync::Mutex::new(VecDeque::new()),
            probes: AtomicU32::new(0),
        }
    }

    fn with_script(results: impl IntoIterator<Item = bool>) -> Self {
        Self {
            validated: AtomicBool::new(true),
            script: std::sync::Mutex::new(results.into_iter().collect()),
            probes: AtomicU32::new(0),
        }
    }

    fn probe_count(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }
}

impl ConnectivitySource for ScriptedConnectivity {
    fn is_internet_validated(&self) -> bool {
        self.validated.load(Ordering::SeqCst)
    }

    fn probe_reachability(&self, _timeout: Duration) -> BoxFuture<'_, bool> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let result = self.script.lock().unwrap().pop_front().unwrap_or(true);
        Box::pin(async move { result })
    }
}

// ── Harness ──────────────────────────────────────────────────────────

fn on_wifi(ssid: &str) -> NetworkIdentity {
    NetworkIdentity {
        ssid: Some(ssid.into()),
        on_wifi: true,
        validated_internet: true,
        source: DetectionSource::WifiTool,
    }
}

fn off_wifi() -> NetworkIdentity {
    NetworkIdentity {
        ssid: None,
        on_wifi: false,
        validated_internet: false,
        source: DetectionSource::Undetected,
    }
}

fn base_settings() -> Settings {
    Settings {
        mode: ConnectionMode::Auto,
        endpoints: homeward_core::EndpointConfig {
            internal_url: "http://192.168.1.5:8443/".into(),
            external_url: "https://panel.example.net/".into(),
        },
        home_networks: ["HomeNet".to_owned()].into_iter().collect::<HomeNetworkSet>(),
        manual_override: None,
        fallback_policy: FallbackPolicy::AssumeHome,
    }
}

struct Harness {
    settings: Arc<SharedSettings>,
    identity: Arc<ScriptedIdentity>,
    connectivity: Arc<ScriptedConnectivity>,
    controller: TransitionController,
    instructions: mpsc::Receiver<ResolvedUrl>,
}

fn spawn(
    settings: Settings,
    identity: NetworkIdentity,
    connectivity: ScriptedConnectivity,
) -> Harness {
    let settings = Arc::new(SharedSettings::new(settings));
    let identity = Arc::new(ScriptedIdentity::new(identity));
    let connectivity = Arc::new(connectivity);

    let (controller, instructions) = TransitionController::spawn(
        Arc::clone(&settings) as Arc<dyn SettingsSource>,
        Arc::clone(&identity) as Arc<dyn IdentitySource>,
        Arc::clone(&connectivity) as Arc<dyn ConnectivitySource>,
        ControllerOptions::default(),
    );

    Harness {
        settings,
        identity,
        connectivity,
        controller,
        instructions,
    }
}

impl Harness {
    async fn next_instruction(&mut self) -> ResolvedUrl {
        tokio::time::timeout(Duration::from_secs(60), self.instructions.recv())
            .await
            .expect("timed out waiting for a load instruction")
            .expect("instruction channel closed")
    }

    async fn expect_quiet(&mut self, window: Duration) {
        let outcome = tokio::time::timeout(window, self.instructions.recv()).await;
        assert!(outcome.is_err(), "unexpected instruction: {outcome:?}");
    }

    async fn ack(&self, url: &str) {
        self.controller.report_load_succeeded(url).await.unwrap();
    }
}

// ── First resolution / no-op ─────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn first_resolution_switches_immediately() {
    let started = Instant::now();
    let mut h = spawn(
        base_settings(),
        on_wifi("HomeNet"),
        ScriptedConnectivity::always_reachable(),
    );

    let first = h.next_instruction().await;
    assert_eq!(first.kind, UrlKind::Internal);
    assert_eq!(first.url, "http://192.168.1.5:8443/");
    // No debounce on the very first value.
    assert!(started.elapsed() < Duration::from_secs(1));

    h.ack(&first.url).await;
    let mut phase = h.controller.phase();
    phase
        .wait_for(|p| *p == TransitionPhase::Loaded)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn repeated_events_on_same_network_are_no_ops() {
    let mut h = spawn(
        base_settings(),
        on_wifi("HomeNet"),
        ScriptedConnectivity::always_reachable(),
    );

    let first = h.next_instruction().await;
    h.ack(&first.url).await;

    for _ in 0..3 {
        h.controller.network_event(NetworkEvent::Lost).await.unwrap();
    }

    h.expect_quiet(Duration::from_secs(30)).await;
    assert_eq!(h.connectivity.probe_count(), 1);
}

// ── Mode-switch priority (Scenario C) ────────────────────────────────

#[tokio::test(start_paused = true)]
async fn wifi_loss_fails_over_without_long_debounce() {
    let mut h = spawn(
        base_settings(),
        on_wifi("HomeNet"),
        ScriptedConnectivity::always_reachable(),
    );

    let first = h.next_instruction().await;
    assert_eq!(first.kind, UrlKind::Internal);
    h.ack(&first.url).await;

    h.identity.set(off_wifi());
    let lost_at = Instant::now();
    h.controller.network_event(NetworkEvent::Lost).await.unwrap();

    let failover = h.next_instruction().await;
    assert_eq!(failover.kind, UrlKind::External);
    assert_eq!(failover.url, "https://panel.example.net/");
    // Boundary crossings take the short window, not the long one.
    assert!(lost_at.elapsed() < Duration::from_secs(1));
}

// ── Debounce coalescing (Scenario D) ─────────────────────────────────

#[tokio::test(start_paused = true)]
async fn same_kind_burst_coalesces_to_last_value() {
    let mut settings = base_settings();
    settings.mode = ConnectionMode::ForceInternal;
    let mut h = spawn(
        settings,
        on_wifi("HomeNet"),
        ScriptedConnectivity::always_reachable(),
    );

    let first = h.next_instruction().await;
    h.ack(&first.url).await;

    // Three same-side changes in a burst; only the last may be delivered.
    for fragment in ["a", "b", "c"] {
        h.settings.update(|s| {
            s.endpoints.internal_url = format!("http://192.168.1.5:8443/#{fragment}");
        });
        h.controller
            .network_event(NetworkEvent::CapabilitiesChanged {
                transport: homeward_core::Transport::Wifi,
                validated: true,
                transport_identity: None,
            })
            .await
            .unwrap();
    }

    let coalesced = h.next_instruction().await;
    assert_eq!(coalesced.url, "http://192.168.1.5:8443/#c");
    h.ack(&coalesced.url).await;

    h.expect_quiet(Duration::from_secs(30)).await;
}

// ── Forced refresh ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn forced_refresh_wins_over_pending_debounce() {
    let mut settings = base_settings();
    settings.mode = ConnectionMode::ForceInternal;
    let mut h = spawn(
        settings,
        on_wifi("HomeNet"),
        ScriptedConnectivity::always_reachable(),
    );

    let first = h.next_instruction().await;
    h.ack(&first.url).await;

    // Queue a same-side change behind the long debounce…
    h.settings.update(|s| {
        s.endpoints.internal_url = "http://192.168.1.5:8443/#next".into();
    });
    h.controller
        .network_event(NetworkEvent::CapabilitiesChanged {
            transport: homeward_core::Transport::Wifi,
            validated: true,
            transport_identity: None,
        })
        .await
        .unwrap();

    // …then force a refresh. The debounce timer must be cancelled and
    // the switch happen at once.
    let refreshed_at = Instant::now();
    h.controller.request_forced_refresh().await.unwrap();

    let switched = h.next_instruction().await;
    assert_eq!(switched.url, "http://192.168.1.5:8443/#next");
    assert!(refreshed_at.elapsed() < Duration::from_secs(1));
}

// ── Backoff exhaustion and recovery (Scenario E) ─────────────────────

#[tokio::test(start_paused = true)]
async fn probe_failures_back_off_then_fail_then_recover() {
    let started = Instant::now();
    let mut h = spawn(
        base_settings(),
        on_wifi("HomeNet"),
        ScriptedConnectivity::with_script([false, false, false, false]),
    );

    let mut phase = h.controller.phase();
    phase
        .wait_for(|p| *p == TransitionPhase::Failed)
        .await
        .unwrap();

    // Initial attempt plus three backoff retries at 1s, 2s, 4s.
    assert_eq!(h.connectivity.probe_count(), 4);
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_secs(7) && elapsed < Duration::from_secs(8),
        "expected ~7s of backoff, got {elapsed:?}"
    );
    h.expect_quiet(Duration::from_secs(30)).await;

    // A fresh network event resets the retry budget; the script is
    // exhausted so the next probe succeeds.
    h.controller.network_event(NetworkEvent::Lost).await.unwrap();
    let recovered = h.next_instruction().await;
    assert_eq!(recovered.kind, UrlKind::Internal);
    assert_eq!(h.connectivity.probe_count(), 5);
}

// ── Consumer-reported failures ───────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn network_load_failure_retries_the_url() {
    let mut h = spawn(
        base_settings(),
        on_wifi("HomeNet"),
        ScriptedConnectivity::always_reachable(),
    );

    let first = h.next_instruction().await;
    h.ack(&first.url).await;

    h.controller
        .report_load_failed(&first.url, LoadErrorKind::HostUnreachable)
        .await
        .unwrap();

    // One backoff period later the same resolution is re-delivered.
    let retried = h.next_instruction().await;
    assert_eq!(retried.url, first.url);
}

#[tokio::test(start_paused = true)]
async fn content_load_failure_is_not_retried() {
    let mut h = spawn(
        base_settings(),
        on_wifi("HomeNet"),
        ScriptedConnectivity::always_reachable(),
    );

    let first = h.next_instruction().await;
    h.controller
        .report_load_failed(&first.url, LoadErrorKind::Content)
        .await
        .unwrap();

    let mut phase = h.controller.phase();
    phase
        .wait_for(|p| *p == TransitionPhase::Failed)
        .await
        .unwrap();
    h.expect_quiet(Duration::from_secs(30)).await;
}

#[tokio::test(start_paused = true)]
async fn stale_reports_are_ignored() {
    let mut h = spawn(
        base_settings(),
        on_wifi("HomeNet"),
        ScriptedConnectivity::always_reachable(),
    );

    let first = h.next_instruction().await;

    // Reports about URLs we never instructed must not move the machine.
    h.controller
        .report_load_failed("https://analytics.example.net/beacon", LoadErrorKind::DnsFailure)
        .await
        .unwrap();
    h.controller
        .report_load_succeeded("https://somewhere-else.example.net/")
        .await
        .unwrap();

    let phase = h.controller.phase();
    assert_eq!(*phase.borrow(), TransitionPhase::Loading);

    h.ack(&first.url).await;
    let mut phase = h.controller.phase();
    phase
        .wait_for(|p| *p == TransitionPhase::Loaded)
        .await
        .unwrap();
}

// ── At-most-one outstanding instruction ──────────────────────────────

#[tokio::test(start_paused = true)]
async fn a_due_switch_waits_for_the_inflight_report() {
    let mut h = spawn(
        base_settings(),
        on_wifi("HomeNet"),
        ScriptedConnectivity::always_reachable(),
    );

    let first = h.next_instruction().await;
    assert_eq!(first.kind, UrlKind::Internal);

    // A boundary-crossing change comes due while the first load is
    // still unacknowledged — it must not overlap.
    h.identity.set(on_wifi("CoffeeShop"));
    h.controller.network_event(NetworkEvent::Lost).await.unwrap();
    h.expect_quiet(Duration::from_secs(10)).await;

    // Acknowledging the first load releases the queued switch.
    h.ack(&first.url).await;
    let second = h.next_instruction().await;
    assert_eq!(second.kind, UrlKind::External);
}

// ── Shutdown ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn shutdown_rejects_further_input() {
    let mut h = spawn(
        base_settings(),
        on_wifi("HomeNet"),
        ScriptedConnectivity::always_reachable(),
    );
    let first = h.next_instruction().await;
    h.ack(&first.url).await;

    h.controller.shutdown().await;
    assert!(h.controller.request_forced_refresh().await.is_err());
}
