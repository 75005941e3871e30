// ── User settings model ──
//
// The core only ever READS these. They are owned by a settings store
// outside the core (file, UI, whatever), may be rewritten concurrently,
// and are re-read on every evaluation — never cached across evaluations.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

// ── ConnectionMode ───────────────────────────────────────────────────

/// Which endpoint the user wants, or automatic selection.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum ConnectionMode {
    /// Pick internal/external from the detected network.
    #[default]
    #[serde(rename = "auto")]
    #[strum(serialize = "auto")]
    Auto,
    /// Always use the internal endpoint.
    #[serde(rename = "internal")]
    #[strum(serialize = "internal")]
    ForceInternal,
    /// Always use the external endpoint.
    #[serde(rename = "external")]
    #[strum(serialize = "external")]
    ForceExternal,
}

// ── EndpointConfig ───────────────────────────────────────────────────

/// The two configured endpoints. Well-formedness is deliberately not
/// enforced here — the resolution engine substitutes built-in defaults
/// for empty fields and otherwise passes strings through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub internal_url: String,
    #[serde(default)]
    pub external_url: String,
}

// ── FallbackPolicy ───────────────────────────────────────────────────

/// What to assume when the device is on WiFi but the network could not
/// be identified.
///
/// Defaulting to home favors the common case of detection failing on the
/// user's own router over the rarer case of detection failing on a
/// foreign network. Exposed as a setting because reasonable deployments
/// disagree.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum FallbackPolicy {
    #[default]
    #[serde(rename = "assume-home")]
    #[strum(serialize = "assume-home")]
    AssumeHome,
    #[serde(rename = "assume-away")]
    #[strum(serialize = "assume-away")]
    AssumeAway,
}

// ── HomeNetworkSet ───────────────────────────────────────────────────

/// The WiFi identities the user calls home.
///
/// Membership is case-insensitive and ignores one layer of surrounding
/// quotes (platforms sometimes hand SSIDs back quoted). Insertion order
/// is kept for display; duplicates are rejected on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HomeNetworkSet {
    names: Vec<String>,
}

impl HomeNetworkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identity. Returns `false` if an equivalent entry existed.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.names.push(name);
        true
    }

    /// Remove an identity by equivalence. Returns `true` if one was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let needle = normalize_identity(name);
        let before = self.names.len();
        self.names.retain(|n| normalize_identity(n) != needle);
        self.names.len() != before
    }

    /// Case-insensitive, quote-stripped membership test.
    pub fn contains(&self, candidate: &str) -> bool {
        let needle = normalize_identity(candidate);
        self.names.iter().any(|n| normalize_identity(n) == needle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<String> for HomeNetworkSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = Self::new();
        for name in iter {
            set.insert(name);
        }
        set
    }
}

/// Normalize an identity for comparison: trim, strip one layer of
/// surrounding quotes, lowercase.
pub(crate) fn normalize_identity(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| {
            trimmed
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
        })
        .unwrap_or(trimmed);
    unquoted.trim().to_lowercase()
}

// ── Settings ─────────────────────────────────────────────────────────

/// One coherent snapshot of everything the classifier and engine read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub mode: ConnectionMode,
    pub endpoints: EndpointConfig,
    pub home_networks: HomeNetworkSet,
    /// Identity to assume when detection fails (only honored when it is
    /// also a member of `home_networks`).
    pub manual_override: Option<String>,
    pub fallback_policy: FallbackPolicy,
}

// ── SettingsSource ───────────────────────────────────────────────────

/// Synchronous reads against the externally-owned settings store.
///
/// No caching contract: the core calls these on every evaluation and the
/// store may be rewritten concurrently between calls.
pub trait SettingsSource: Send + Sync {
    fn connection_mode(&self) -> ConnectionMode;
    fn endpoints(&self) -> EndpointConfig;
    fn home_networks(&self) -> HomeNetworkSet;
    fn manual_override(&self) -> Option<String>;
    fn fallback_policy(&self) -> FallbackPolicy;

    /// One coherent snapshot (the default impl stitches the getters;
    /// atomic stores override it).
    fn snapshot(&self) -> Settings {
        Settings {
            mode: self.connection_mode(),
            endpoints: self.endpoints(),
            home_networks: self.home_networks(),
            manual_override: self.manual_override(),
            fallback_policy: self.fallback_policy(),
        }
    }
}

// ── SharedSettings ───────────────────────────────────────────────────

/// Production settings store: lock-free reads, whole-snapshot writes.
///
/// A settings UI may `store()` at any time while evaluations `load()`
/// concurrently; readers always see a coherent snapshot.
#[derive(Default)]
pub struct SharedSettings {
    inner: ArcSwap<Settings>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: ArcSwap::from_pointee(settings),
        }
    }

    pub fn load(&self) -> Arc<Settings> {
        self.inner.load_full()
    }

    pub fn store(&self, settings: Settings) {
        self.inner.store(Arc::new(settings));
    }

    /// Read-modify-write convenience for settings UIs.
    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        let mut next = (*self.inner.load_full()).clone();
        f(&mut next);
        self.inner.store(Arc::new(next));
    }
}

impl SettingsSource for SharedSettings {
    fn connection_mode(&self) -> ConnectionMode {
        self.inner.load().mode
    }

    fn endpoints(&self) -> EndpointConfig {
        self.inner.load().endpoints.clone()
    }

    fn home_networks(&self) -> HomeNetworkSet {
        self.inner.load().home_networks.clone()
    }

    fn manual_override(&self) -> Option<String> {
        self.inner.load().manual_override.clone()
    }

    fn fallback_policy(&self) -> FallbackPolicy {
        self.inner.load().fallback_policy
    }

    fn snapshot(&self) -> Settings {
        (*self.inner.load_full()).clone()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
