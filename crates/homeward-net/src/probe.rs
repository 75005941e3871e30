//! Reachability probing — "associated" is not "online".
//!
//! A network can be joined but not yet routing traffic (common right
//! after a WiFi handoff), so switching a view onto it would load into a
//! guaranteed failure. The probe resolves two independent well-known
//! hosts sequentially, with one retry on the second host, before
//! declaring the network not ready.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, trace};

use crate::monitor::LinkSnapshot;

/// Two independent anycast operators; the order is fixed and the second
/// host gets the retry.
const PROBE_HOSTS: [&str; 2] = ["one.one.one.one:443", "dns.google:443"];

/// Connectivity prober over the live link state.
pub struct Prober {
    link: watch::Receiver<LinkSnapshot>,
    hosts: [String; 2],
}

impl Prober {
    pub fn new(link: watch::Receiver<LinkSnapshot>) -> Self {
        Self {
            link,
            hosts: [PROBE_HOSTS[0].to_owned(), PROBE_HOSTS[1].to_owned()],
        }
    }

    /// Prober with custom targets (tests point these at a local resolver).
    pub fn with_hosts(link: watch::Receiver<LinkSnapshot>, hosts: [String; 2]) -> Self {
        Self { link, hosts }
    }

    /// Cheap check from platform capability flags — no network traffic.
    pub fn is_internet_validated(&self) -> bool {
        self.link.borrow().validated
    }

    /// Expensive check: can we actually resolve names right now?
    ///
    /// Sequential attempts — first host, second host, second host again —
    /// each under an equal slice of `timeout`. `false` means "not yet
    /// ready", never a permanent verdict.
    pub async fn probe_reachability(&self, timeout: Duration) -> bool {
        let attempts = [&self.hosts[0], &self.hosts[1], &self.hosts[1]];
        let slice = timeout / u32::try_from(attempts.len()).unwrap_or(1);

        for (n, host) in attempts.iter().enumerate() {
            match tokio::time::timeout(slice, tokio::net::lookup_host(host.as_str())).await {
                Ok(Ok(mut addrs)) => {
                    if addrs.next().is_some() {
                        trace!(host = %host, attempt = n, "probe resolved");
                        return true;
                    }
                    debug!(host = %host, attempt = n, "probe resolved to nothing");
                }
                Ok(Err(e)) => {
                    debug!(host = %host, attempt = n, error = %e, "probe resolution failed");
                }
                Err(_) => {
                    debug!(host = %host, attempt = n, timeout = ?slice, "probe timed out");
                }
            }
        }

        debug!("all probe attempts exhausted");
        false
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn link(validated: bool) -> watch::Receiver<LinkSnapshot> {
        let (_tx, rx) = watch::channel(LinkSnapshot {
            on_wifi: true,
            interface: Some("wlan0".into()),
            validated,
            transport_identity: None,
        });
        rx
    }

    #[test]
    fn validated_flag_mirrors_link_state() {
        assert!(Prober::new(link(true)).is_internet_validated());
        assert!(!Prober::new(link(false)).is_internet_validated());
    }

    #[tokio::test]
    async fn localhost_probe_succeeds() {
        // Loopback resolution never leaves the host, so this is stable
        // in sandboxed test environments.
        let prober = Prober::with_hosts(
            link(true),
            ["localhost:80".to_owned(), "localhost:80".to_owned()],
        );
        assert!(prober.probe_reachability(Duration::from_secs(3)).await);
    }

    #[tokio::test]
    async fn unresolvable_hosts_report_not_ready() {
        let prober = Prober::with_hosts(
            link(true),
            [
                "does-not-exist.invalid:80".to_owned(),
                "also-missing.invalid:80".to_owned(),
            ],
        );
        assert!(!prober.probe_reachability(Duration::from_secs(3)).await);
    }
}
