//! Decision core for homeward — which URL should the view be on, and
//! when is it safe to switch?
//!
//! This crate owns the business logic between the platform adapter
//! (`homeward-net`) and whatever renders the content:
//!
//! - **[`classify`]** — pure mapping from a [`NetworkIdentity`] plus user
//!   settings onto "is the active context home?".
//!
//! - **[`resolve_url`]** — pure, total mapping from that answer (or a
//!   forced mode) onto the one [`ResolvedUrl`] that should be active,
//!   tagged [`UrlKind::Internal`] or [`UrlKind::External`] at the source.
//!
//! - **[`TransitionController`]** — the stateful part: watches resolved
//!   values over time and decides per change whether to switch now,
//!   debounce, escalate (boundary-crossing changes switch fast), verify
//!   connectivity first, or retry with exponential backoff. Emits at most
//!   one load instruction at a time.
//!
//! - **[`Settings`] / [`SharedSettings`]** — the externally-owned user
//!   configuration, re-read on every evaluation.
//!
//! Nothing here is fatal: the worst outcome is staying on the last
//! successfully loaded URL while listening for the next network event.

pub mod classify;
pub mod controller;
pub mod error;
pub mod resolve;
pub mod settings;
pub mod source;

// ── Primary re-exports ──────────────────────────────────────────────
pub use classify::classify;
pub use controller::{ControllerOptions, TransitionController, TransitionPhase};
pub use error::{CoreError, LoadErrorKind};
pub use resolve::{
    DEFAULT_EXTERNAL_URL, DEFAULT_INTERNAL_URL, ResolvedUrl, UrlKind, evaluate, resolve_url,
};
pub use settings::{
    ConnectionMode, EndpointConfig, FallbackPolicy, HomeNetworkSet, Settings, SettingsSource,
    SharedSettings,
};
pub use source::{ConnectivitySource, IdentitySource};

// Platform types consumers need alongside the core.
pub use homeward_net::{DetectionSource, NetworkEvent, NetworkIdentity, Transport};
