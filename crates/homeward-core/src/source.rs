// ── Platform source seams ──
//
// The controller consumes identity and connectivity through these
// traits so the state machine is testable with scripted sources and the
// platform adapter stays swappable. `homeward-net`'s production types
// implement them below.

use std::time::Duration;

use futures::future::BoxFuture;

use homeward_net::{IdentityResolver, NetworkIdentity, Prober};

/// Source of the current network identity.
pub trait IdentitySource: Send + Sync {
    /// Resolve the current identity. Must be bounded in time and must
    /// not error — absence of identity is a valid answer.
    fn resolve_identity<'a>(
        &'a self,
        manual_override: Option<&'a str>,
    ) -> BoxFuture<'a, NetworkIdentity>;
}

/// Source of connectivity answers.
pub trait ConnectivitySource: Send + Sync {
    /// Cheap association-level flag from the platform.
    fn is_internet_validated(&self) -> bool;

    /// Expensive bounded reachability check. `false` means "not yet
    /// ready", never a permanent verdict.
    fn probe_reachability(&self, timeout: Duration) -> BoxFuture<'_, bool>;
}

impl IdentitySource for IdentityResolver {
    fn resolve_identity<'a>(
        &'a self,
        manual_override: Option<&'a str>,
    ) -> BoxFuture<'a, NetworkIdentity> {
        Box::pin(self.resolve(manual_override))
    }
}

impl ConnectivitySource for Prober {
    fn is_internet_validated(&self) -> bool {
        Prober::is_internet_validated(self)
    }

    fn probe_reachability(&self, timeout: Duration) -> BoxFuture<'_, bool> {
        Box::pin(Prober::probe_reachability(self, timeout))
    }
}
