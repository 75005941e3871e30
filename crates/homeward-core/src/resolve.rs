// ── URL resolution engine ──
//
// Pure, total mapping from (is_home, mode, endpoints) to the single URL
// that should currently be active. The internal/external tag is computed
// HERE, once, and carried with the value — downstream code never infers
// it back out of string shape.

use serde::{Deserialize, Serialize};

use homeward_net::NetworkIdentity;

use crate::classify::classify;
use crate::settings::{ConnectionMode, EndpointConfig, Settings};

/// Built-in endpoints used when the corresponding config field is empty.
pub const DEFAULT_INTERNAL_URL: &str = "http://dashboard.local/";
pub const DEFAULT_EXTERNAL_URL: &str = "https://dashboard.example.com/";

/// Which side of the internal/external boundary a URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UrlKind {
    Internal,
    External,
}

/// The URL the transition controller is driving toward, tagged with the
/// side it came from. Always one of the two (defaulted) endpoint strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedUrl {
    pub url: String,
    pub kind: UrlKind,
}

/// Map a classification onto the active URL. Pure and total; empty
/// endpoint fields fall back to the built-in defaults, never an error.
pub fn resolve_url(is_home: bool, mode: ConnectionMode, endpoints: &EndpointConfig) -> ResolvedUrl {
    let internal = match mode {
        ConnectionMode::ForceInternal => true,
        ConnectionMode::ForceExternal => false,
        ConnectionMode::Auto => is_home,
    };

    if internal {
        ResolvedUrl {
            url: defaulted(&endpoints.internal_url, DEFAULT_INTERNAL_URL),
            kind: UrlKind::Internal,
        }
    } else {
        ResolvedUrl {
            url: defaulted(&endpoints.external_url, DEFAULT_EXTERNAL_URL),
            kind: UrlKind::External,
        }
    }
}

/// Classify and resolve in one step — the whole per-event evaluation.
pub fn evaluate(identity: &NetworkIdentity, settings: &Settings) -> ResolvedUrl {
    let is_home = classify(identity, settings);
    resolve_url(is_home, settings.mode, &settings.endpoints)
}

fn defaulted(configured: &str, fallback: &str) -> String {
    let trimmed = configured.trim();
    if trimmed.is_empty() {
        fallback.to_owned()
    } else {
        trimmed.to_owned()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
