// ── Network classification ──
//
// Pure function from (identity, settings) to the single question the
// engine cares about: is the active context "home"? No I/O, no state.

use homeward_net::NetworkIdentity;

use crate::settings::{ConnectionMode, FallbackPolicy, Settings};

/// Decide whether the active context counts as home.
///
/// Decision order is a contract:
/// 1. A forced mode short-circuits all detection.
/// 2. Not on WiFi is never home.
/// 3. A detected SSID is checked against the home set.
/// 4. With no SSID, the manual override is checked against the home set.
/// 5. Still undetermined while on WiFi → the configured fallback policy.
pub fn classify(identity: &NetworkIdentity, settings: &Settings) -> bool {
    match settings.mode {
        ConnectionMode::ForceInternal => return true,
        ConnectionMode::ForceExternal => return false,
        ConnectionMode::Auto => {}
    }

    if !identity.on_wifi {
        return false;
    }

    if let Some(ssid) = identity.ssid.as_deref() {
        return settings.home_networks.contains(ssid);
    }

    if let Some(manual) = settings.manual_override.as_deref() {
        if !manual.trim().is_empty() && settings.home_networks.contains(manual) {
            return true;
        }
    }

    // On WiFi, identity unknown, no override match.
    matches!(settings.fallback_policy, FallbackPolicy::AssumeHome)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use homeward_net::DetectionSource;

    use crate::settings::HomeNetworkSet;

    fn identity(ssid: Option<&str>, on_wifi: bool) -> NetworkIdentity {
        NetworkIdentity {
            ssid: ssid.map(String::from),
            on_wifi,
            validated_internet: on_wifi,
            source: if ssid.is_some() {
                DetectionSource::WifiTool
            } else {
                DetectionSource::Undetected
            },
        }
    }

    fn settings_with_home(names: &[&str]) -> Settings {
        Settings {
            home_networks: names.iter().map(|s| (*s).to_owned()).collect::<HomeNetworkSet>(),
            ..Settings::default()
        }
    }

    #[test]
    fn forced_modes_short_circuit_detection() {
        // Even an obviously foreign identity cannot override a forced mode.
        let foreign = identity(Some("CoffeeShop"), true);
        let off_wifi = identity(None, false);

        let mut settings = settings_with_home(&["HomeNet"]);
        settings.mode = ConnectionMode::ForceInternal;
        assert!(classify(&foreign, &settings));
        assert!(classify(&off_wifi, &settings));

        settings.mode = ConnectionMode::ForceExternal;
        let home = identity(Some("HomeNet"), true);
        assert!(!classify(&home, &settings));
    }

    #[test]
    fn off_wifi_is_never_home() {
        let settings = settings_with_home(&["HomeNet"]);
        assert!(!classify(&identity(None, false), &settings));
    }

    #[test]
    fn known_ssid_is_home() {
        let settings = settings_with_home(&["HomeNet"]);
        assert!(classify(&identity(Some("HomeNet"), true), &settings));
    }

    #[test]
    fn unknown_ssid_is_not_home() {
        let settings = settings_with_home(&["HomeNet"]);
        assert!(!classify(&identity(Some("CoffeeShop"), true), &settings));
    }

    #[test]
    fn ssid_comparison_ignores_case_and_quotes() {
        let settings = settings_with_home(&["HomeNet"]);
        assert!(classify(&identity(Some("\"homenet\""), true), &settings));
    }

    #[test]
    fn detection_failure_checks_manual_override() {
        let mut settings = settings_with_home(&["HomeNet"]);
        settings.fallback_policy = FallbackPolicy::AssumeAway;
        settings.manual_override = Some("HomeNet".into());

        assert!(classify(&identity(None, true), &settings));

        // An override that is not in the home set does not count.
        settings.manual_override = Some("SomewhereElse".into());
        assert!(!classify(&identity(None, true), &settings));
    }

    #[test]
    fn detection_failure_defaults_to_home() {
        let settings = settings_with_home(&["HomeNet"]);
        assert!(classify(&identity(None, true), &settings));
    }

    #[test]
    fn detection_failure_respects_assume_away() {
        let mut settings = settings_with_home(&["HomeNet"]);
        settings.fallback_policy = FallbackPolicy::AssumeAway;
        assert!(!classify(&identity(None, true), &settings));
    }

    #[test]
    fn classification_is_pure() {
        let settings = settings_with_home(&["HomeNet"]);
        let id = identity(Some("HomeNet"), true);
        assert_eq!(classify(&id, &settings), classify(&id, &settings));
    }
}
