// ── Platform adapter errors ──
//
// These stay inside the adapter layer. Detection failure is NOT an error
// (an unresolvable SSID is a valid terminal state); only genuine platform
// faults surface here, and callers degrade rather than propagate.

use std::time::Duration;

use thiserror::Error;

/// Errors from platform queries.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("'{program}' exited with status {status}")]
    CommandFailed { program: &'static str, status: i32 },

    #[error("'{program}' did not answer within {timeout:?}")]
    CommandTimeout {
        program: &'static str,
        timeout: Duration,
    },

    #[error("'{program}' unavailable: {source}")]
    CommandUnavailable {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
