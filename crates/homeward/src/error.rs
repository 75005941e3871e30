//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with actionable
//! help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use homeward_config::ConfigError;
use homeward_core::CoreError;

/// Exit codes for scripting.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_READY: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(homeward::validation))]
    Validation { field: String, reason: String },

    // ── Connectivity ─────────────────────────────────────────────────

    #[error("The network is not routing traffic yet")]
    #[diagnostic(
        code(homeward::not_ready),
        help(
            "The link is associated but name resolution failed.\n\
             This is usually transient right after a WiFi handoff — try again shortly."
        )
    )]
    EndpointNotReady,

    #[error("The transition controller has shut down")]
    #[diagnostic(code(homeward::controller_gone))]
    ControllerGone,

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(homeward::config))]
    Config(#[from] ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    #[diagnostic(code(homeward::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } => exit_code::USAGE,
            Self::EndpointNotReady => exit_code::NOT_READY,
            Self::ControllerGone => exit_code::CONNECTION,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ControllerShutDown => CliError::ControllerGone,
        }
    }
}
