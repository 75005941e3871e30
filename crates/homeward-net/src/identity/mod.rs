//! WiFi identity resolution — the ordered fallback chain.
//!
//! Platform SSID APIs are permission-gated and fragmented across OS
//! versions, so no single source is trusted. Resolution walks a fixed
//! most-precise-first chain and stops at the first usable answer:
//!
//! 1. Not associated with WiFi at all → answer immediately, no SSID.
//! 2. Identity carried on the latest platform capabilities snapshot.
//! 3. Direct WiFi-manager query (`nmcli`).
//! 4. Low-level system keys (`iw`, then `wpa_cli`).
//! 5. Configured manual override identity, flagged as override-sourced.
//! 6. Nothing usable → on WiFi with no SSID. Detection failure is a valid
//!    terminal state, **not** "not on WiFi".
//!
//! The chain order is a contract: reordering changes observable behavior
//! on hosts where the sources disagree. Resolution never errors and is
//! bounded — every backend query runs under its own timeout.

mod backend;

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, trace};

pub use backend::{IwBackend, NmcliBackend, SsidBackend, WpaCliBackend};

use crate::monitor::LinkSnapshot;

// ── Types ────────────────────────────────────────────────────────────

/// Which rung of the fallback chain produced the SSID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionSource {
    /// From the platform capabilities snapshot (richest source).
    Capabilities,
    /// From a direct WiFi-manager query.
    WifiTool,
    /// From low-level system configuration keys.
    SystemConfig,
    /// From the user's manual override identity.
    Override,
    /// No rung produced a usable identity.
    Undetected,
}

/// The current network identity, as well as it could be determined.
///
/// Transient — recomputed on every evaluation, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkIdentity {
    pub ssid: Option<String>,
    pub on_wifi: bool,
    pub validated_internet: bool,
    pub source: DetectionSource,
}

impl NetworkIdentity {
    fn off_wifi() -> Self {
        Self {
            ssid: None,
            on_wifi: false,
            validated_internet: false,
            source: DetectionSource::Undetected,
        }
    }
}

// ── Sentinel filtering ───────────────────────────────────────────────

/// Values platform APIs return in place of a real SSID.
const SENTINELS: &[&str] = &["", "unknown", "<unknown ssid>", "0x", "any", "off/any"];

/// Normalize a raw SSID answer, rejecting platform sentinels.
///
/// Strips one layer of surrounding quotes (some platforms quote SSIDs)
/// and whitespace before the sentinel check.
pub(crate) fn usable_ssid(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| {
            trimmed
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
        })
        .unwrap_or(trimmed)
        .trim();

    let lowered = unquoted.to_lowercase();
    if SENTINELS.iter().any(|s| *s == lowered) {
        return None;
    }
    Some(unquoted.to_owned())
}

// ── IdentityResolver ─────────────────────────────────────────────────

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(800);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3);

struct CacheEntry {
    at: Instant,
    identity: NetworkIdentity,
}

/// Walks the fallback chain against the live link state.
pub struct IdentityResolver {
    link: watch::Receiver<LinkSnapshot>,
    backends: Vec<Box<dyn SsidBackend>>,
    query_timeout: Duration,
    cache_ttl: Duration,
    /// Coalesces bursts of duplicate platform callbacks; single-digit
    /// seconds only, never a long-lived cache.
    cache: Mutex<Option<CacheEntry>>,
}

impl IdentityResolver {
    /// Resolver with the standard backend chain.
    pub fn new(link: watch::Receiver<LinkSnapshot>) -> Self {
        let backends: Vec<Box<dyn SsidBackend>> = vec![
            Box::new(NmcliBackend::new(DEFAULT_QUERY_TIMEOUT)),
            Box::new(IwBackend::new(DEFAULT_QUERY_TIMEOUT)),
            Box::new(WpaCliBackend::new(DEFAULT_QUERY_TIMEOUT)),
        ];
        Self::with_backends(link, backends, DEFAULT_CACHE_TTL)
    }

    /// Resolver with a custom backend chain (tests, alternative platforms).
    pub fn with_backends(
        link: watch::Receiver<LinkSnapshot>,
        backends: Vec<Box<dyn SsidBackend>>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            link,
            backends,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            cache_ttl,
            cache: Mutex::new(None),
        }
    }

    /// Resolve the current identity. Never errors, bounded in time.
    pub async fn resolve(&self, manual_override: Option<&str>) -> NetworkIdentity {
        if let Some(hit) = self.cached() {
            trace!("identity served from coalescing cache");
            return hit;
        }

        let snapshot = self.link.borrow().clone();
        let identity = self.detect(&snapshot, manual_override).await;

        if let Ok(mut guard) = self.cache.lock() {
            *guard = Some(CacheEntry {
                at: Instant::now(),
                identity: identity.clone(),
            });
        }
        identity
    }

    fn cached(&self) -> Option<NetworkIdentity> {
        let guard = self.cache.lock().ok()?;
        let entry = guard.as_ref()?;
        (entry.at.elapsed() < self.cache_ttl).then(|| entry.identity.clone())
    }

    async fn detect(
        &self,
        snapshot: &LinkSnapshot,
        manual_override: Option<&str>,
    ) -> NetworkIdentity {
        // 1. Not on WiFi at all — nothing to detect.
        if !snapshot.on_wifi {
            return NetworkIdentity::off_wifi();
        }

        // 2. Richest source: identity on the capabilities snapshot.
        if let Some(ssid) = snapshot
            .transport_identity
            .as_deref()
            .and_then(usable_ssid)
        {
            debug!(ssid = %ssid, "identity from capabilities snapshot");
            return detected(snapshot, ssid, DetectionSource::Capabilities);
        }

        // 3./4. Backend chain, first usable answer wins.
        for backend in &self.backends {
            match tokio::time::timeout(self.query_timeout, backend.query()).await {
                Ok(Ok(Some(raw))) => {
                    if let Some(ssid) = usable_ssid(&raw) {
                        debug!(backend = backend.name(), ssid = %ssid, "identity detected");
                        return detected(snapshot, ssid, backend.source());
                    }
                    trace!(backend = backend.name(), raw = %raw, "sentinel answer rejected");
                }
                Ok(Ok(None)) => {
                    trace!(backend = backend.name(), "backend knows no ssid");
                }
                Ok(Err(e)) => {
                    debug!(backend = backend.name(), error = %e, "backend query failed");
                }
                Err(_) => {
                    debug!(backend = backend.name(), "backend query timed out");
                }
            }
        }

        // 5. Manual override as last detection resort.
        if let Some(ssid) = manual_override.and_then(usable_ssid) {
            debug!(ssid = %ssid, "identity from manual override");
            return detected(snapshot, ssid, DetectionSource::Override);
        }

        // 6. On WiFi, identity unknown. Callers must treat this as a
        // distinct state from "not on WiFi".
        debug!("identity detection exhausted, on wifi with unknown ssid");
        NetworkIdentity {
            ssid: None,
            on_wifi: true,
            validated_internet: snapshot.validated,
            source: DetectionSource::Undetected,
        }
    }
}

fn detected(snapshot: &LinkSnapshot, ssid: String, source: DetectionSource) -> NetworkIdentity {
    NetworkIdentity {
        ssid: Some(ssid),
        on_wifi: true,
        validated_internet: snapshot.validated,
        source,
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use pretty_assertions::assert_eq;

    use crate::error::NetError;

    // ── usable_ssid ──────────────────────────────────────────────────

    #[test]
    fn usable_ssid_passes_plain_names() {
        assert_eq!(usable_ssid("HomeNet").as_deref(), Some("HomeNet"));
    }

    #[test]
    fn usable_ssid_strips_surrounding_quotes() {
        assert_eq!(usable_ssid("\"HomeNet\"").as_deref(), Some("HomeNet"));
        assert_eq!(usable_ssid("'HomeNet'").as_deref(), Some("HomeNet"));
    }

    #[test]
    fn usable_ssid_rejects_sentinels() {
        assert_eq!(usable_ssid(""), None);
        assert_eq!(usable_ssid("   "), None);
        assert_eq!(usable_ssid("<unknown ssid>"), None);
        assert_eq!(usable_ssid("<UNKNOWN SSID>"), None);
        assert_eq!(usable_ssid("unknown"), None);
        assert_eq!(usable_ssid("0x"), None);
        assert_eq!(usable_ssid("off/any"), None);
    }

    #[test]
    fn usable_ssid_rejects_quoted_sentinel() {
        assert_eq!(usable_ssid("\"\""), None);
    }

    #[test]
    fn usable_ssid_keeps_interior_quotes() {
        assert_eq!(usable_ssid("Bob's WiFi").as_deref(), Some("Bob's WiFi"));
    }

    // ── Chain behavior ───────────────────────────────────────────────

    struct Scripted {
        name: &'static str,
        source: DetectionSource,
        answer: Result<Option<String>, ()>,
    }

    impl SsidBackend for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        fn source(&self) -> DetectionSource {
            self.source
        }

        fn query(&self) -> BoxFuture<'_, Result<Option<String>, NetError>> {
            let answer = match &self.answer {
                Ok(v) => Ok(v.clone()),
                Err(()) => Err(NetError::CommandFailed {
                    program: self.name,
                    status: 1,
                }),
            };
            Box::pin(async move { answer })
        }
    }

    // A watch receiver keeps the last value after the sender drops, which
    // is all these tests need.
    fn on_wifi_link() -> watch::Receiver<LinkSnapshot> {
        let (_tx, rx) = watch::channel(LinkSnapshot {
            on_wifi: true,
            interface: Some("wlan0".into()),
            validated: true,
            transport_identity: None,
        });
        rx
    }

    fn resolver(backends: Vec<Box<dyn SsidBackend>>) -> IdentityResolver {
        IdentityResolver::with_backends(on_wifi_link(), backends, Duration::ZERO)
    }

    #[tokio::test]
    async fn off_wifi_short_circuits_everything() {
        let (tx, rx) = watch::channel(LinkSnapshot::default());
        let resolver = IdentityResolver::with_backends(
            rx,
            vec![Box::new(Scripted {
                name: "never",
                source: DetectionSource::WifiTool,
                answer: Ok(Some("ShouldNotAppear".into())),
            })],
            Duration::ZERO,
        );

        let identity = resolver.resolve(None).await;
        assert!(!identity.on_wifi);
        assert_eq!(identity.ssid, None);
        drop(tx);
    }

    #[tokio::test]
    async fn capabilities_identity_wins_over_backends() {
        let (tx, rx) = watch::channel(LinkSnapshot {
            on_wifi: true,
            interface: Some("wlan0".into()),
            validated: true,
            transport_identity: Some("\"HomeNet\"".into()),
        });
        let resolver = IdentityResolver::with_backends(
            rx,
            vec![Box::new(Scripted {
                name: "nmcli",
                source: DetectionSource::WifiTool,
                answer: Ok(Some("OtherNet".into())),
            })],
            Duration::ZERO,
        );

        let identity = resolver.resolve(None).await;
        assert_eq!(identity.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(identity.source, DetectionSource::Capabilities);
        drop(tx);
    }

    #[tokio::test]
    async fn chain_falls_through_sentinels_and_failures() {
        let resolver = resolver(vec![
            Box::new(Scripted {
                name: "nmcli",
                source: DetectionSource::WifiTool,
                answer: Ok(Some("<unknown ssid>".into())),
            }),
            Box::new(Scripted {
                name: "iw",
                source: DetectionSource::SystemConfig,
                answer: Err(()),
            }),
            Box::new(Scripted {
                name: "wpa_cli",
                source: DetectionSource::SystemConfig,
                answer: Ok(Some("HomeNet".into())),
            }),
        ]);

        let identity = resolver.resolve(None).await;
        assert_eq!(identity.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(identity.source, DetectionSource::SystemConfig);
    }

    #[tokio::test]
    async fn manual_override_used_when_detection_fails() {
        let resolver = resolver(vec![Box::new(Scripted {
            name: "nmcli",
            source: DetectionSource::WifiTool,
            answer: Err(()),
        })]);

        let identity = resolver.resolve(Some("HomeNet")).await;
        assert_eq!(identity.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(identity.source, DetectionSource::Override);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_on_wifi_without_ssid() {
        let resolver = resolver(vec![Box::new(Scripted {
            name: "nmcli",
            source: DetectionSource::WifiTool,
            answer: Ok(None),
        })]);

        let identity = resolver.resolve(None).await;
        assert!(identity.on_wifi);
        assert_eq!(identity.ssid, None);
        assert_eq!(identity.source, DetectionSource::Undetected);
    }

    #[tokio::test]
    async fn cache_coalesces_repeat_resolutions() {
        let (tx, rx) = watch::channel(LinkSnapshot {
            on_wifi: true,
            interface: Some("wlan0".into()),
            validated: true,
            transport_identity: Some("HomeNet".into()),
        });
        let resolver =
            IdentityResolver::with_backends(rx, Vec::new(), Duration::from_secs(60));

        let first = resolver.resolve(None).await;
        assert_eq!(first.ssid.as_deref(), Some("HomeNet"));

        // The link changed, but within the TTL the cached answer stands.
        tx.send_replace(LinkSnapshot::default());
        let second = resolver.resolve(None).await;
        assert_eq!(second, first);
    }
}
