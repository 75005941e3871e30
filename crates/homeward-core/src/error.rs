// ── Core error types ──
//
// Almost everything this core encounters is recoverable and handled
// internally (fallback policy, backoff, passive waiting). What remains
// is small: consumers can only fail by talking to a controller that is
// already gone.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("transition controller is shut down")]
    ControllerShutDown,
}

/// Classification of a load failure reported by the consumer.
///
/// Network kinds feed the retry/backoff machinery; `Content` is
/// surfaced as state and never retried automatically. Sub-resource and
/// analytics failures must not be reported at all — only failures of the
/// primary load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadErrorKind {
    HostUnreachable,
    DnsFailure,
    Timeout,
    TlsHandshake,
    /// The endpoint answered but the content itself failed.
    Content,
}

impl LoadErrorKind {
    /// Whether this failure is worth an automatic retry.
    pub fn is_network(self) -> bool {
        !matches!(self, Self::Content)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
