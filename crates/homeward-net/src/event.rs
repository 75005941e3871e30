// ── Platform network events ──
//
// Typed equivalents of the OS callbacks (availability, loss, capability
// changes). All consumers see these through the monitor's broadcast
// channel; nobody registers platform listeners of their own.

use serde::{Deserialize, Serialize};

/// Transport class of the active network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transport {
    Wifi,
    Ethernet,
    Other,
}

/// A change in the host's network situation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A usable network appeared (or came back).
    Available { transport: Transport },

    /// The active network went away entirely.
    Lost,

    /// The active network is still there but its capabilities changed.
    ///
    /// `transport_identity` is the network's identity as reported by the
    /// richest platform source, when the platform is willing to share it —
    /// it is frequently withheld, and absence here does not mean absence
    /// of WiFi.
    CapabilitiesChanged {
        transport: Transport,
        validated: bool,
        transport_identity: Option<String>,
    },
}
