//! Platform network adapter for the homeward workspace.
//!
//! Everything that touches the operating system lives here; the layers above
//! consume typed values and channels, never the platform directly:
//!
//! - **[`NetworkMonitor`]** — background watcher of the host's wireless link
//!   state. Emits [`NetworkEvent`]s (available / lost / capabilities changed)
//!   through a `broadcast` channel and maintains a [`LinkSnapshot`] `watch`
//!   channel for cheap point-in-time reads.
//!
//! - **[`IdentityResolver`]** — answers "which WiFi network am I on?" via an
//!   ordered fallback chain of detection backends. SSID detection is
//!   permission-gated and fragmented across platforms, so no single method is
//!   trusted; the chain order is a contract (most precise first).
//!
//! - **[`Prober`]** — distinguishes "associated with a network" from "that
//!   network actually routes traffic", via a bounded name-resolution probe
//!   against two independent well-known hosts.
//!
//! Nothing in this crate decides *what to do* with the answers — that is
//! `homeward-core`'s job.

pub mod error;
pub mod event;
pub mod identity;
pub mod monitor;
pub mod probe;

pub use error::NetError;
pub use event::{NetworkEvent, Transport};
pub use identity::{DetectionSource, IdentityResolver, NetworkIdentity, SsidBackend};
pub use monitor::{LinkSnapshot, MonitorOptions, NetworkMonitor, scan_once};
pub use probe::Prober;
