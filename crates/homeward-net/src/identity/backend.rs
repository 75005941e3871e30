// ── SSID detection backends ──
//
// Each backend wraps one platform facility that might know the current
// SSID. They all shell out through a bounded `tokio::process` call and
// parse the answer with a pure function, so the parsers are testable
// without the tools installed.

use std::process::Stdio;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::trace;

use crate::error::NetError;
use crate::identity::DetectionSource;

/// One rung of the SSID fallback chain.
///
/// `query` returns `Ok(None)` when the facility answered but knows no
/// SSID; raw answers are sentinel-filtered by the resolver, not here.
pub trait SsidBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Which chain rung this backend represents.
    fn source(&self) -> DetectionSource;

    fn query(&self) -> BoxFuture<'_, Result<Option<String>, NetError>>;
}

// ── Command execution ────────────────────────────────────────────────

/// Run an external tool with a hard timeout, returning its stdout.
async fn run_command(
    program: &'static str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, NetError> {
    let child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| NetError::CommandTimeout { program, timeout })?
        .map_err(|source| NetError::CommandUnavailable { program, source })?;

    if !output.status.success() {
        return Err(NetError::CommandFailed {
            program,
            status: output.status.code().unwrap_or(-1),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// ── NetworkManager (nmcli) ───────────────────────────────────────────

/// Queries NetworkManager's terse active-WiFi listing. The richest and
/// preferred direct query on hosts that run NetworkManager.
pub struct NmcliBackend {
    timeout: Duration,
}

impl NmcliBackend {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl SsidBackend for NmcliBackend {
    fn name(&self) -> &'static str {
        "nmcli"
    }

    fn source(&self) -> DetectionSource {
        DetectionSource::WifiTool
    }

    fn query(&self) -> BoxFuture<'_, Result<Option<String>, NetError>> {
        Box::pin(async move {
            let out = run_command(
                "nmcli",
                &["-t", "-f", "ACTIVE,SSID", "device", "wifi"],
                self.timeout,
            )
            .await?;
            trace!(lines = out.lines().count(), "nmcli answered");
            Ok(parse_nmcli(&out))
        })
    }
}

/// Pick the SSID from `nmcli -t -f ACTIVE,SSID device wifi` output.
///
/// Terse format is `yes:MySSID` per line, with `:` and `\` escaped by a
/// backslash inside values.
pub(crate) fn parse_nmcli(output: &str) -> Option<String> {
    for line in output.lines() {
        let Some(rest) = line.strip_prefix("yes:") else {
            continue;
        };
        let mut ssid = String::with_capacity(rest.len());
        let mut chars = rest.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    ssid.push(escaped);
                }
            } else {
                ssid.push(c);
            }
        }
        return Some(ssid);
    }
    None
}

// ── iw ───────────────────────────────────────────────────────────────

/// Queries the kernel's nl80211 view via `iw dev`. Works without
/// NetworkManager but needs the interface to be in managed mode.
pub struct IwBackend {
    timeout: Duration,
}

impl IwBackend {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl SsidBackend for IwBackend {
    fn name(&self) -> &'static str {
        "iw"
    }

    fn source(&self) -> DetectionSource {
        DetectionSource::SystemConfig
    }

    fn query(&self) -> BoxFuture<'_, Result<Option<String>, NetError>> {
        Box::pin(async move {
            let out = run_command("iw", &["dev"], self.timeout).await?;
            Ok(parse_iw(&out))
        })
    }
}

/// Pick the first `ssid <name>` attribute out of `iw dev` output.
pub(crate) fn parse_iw(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("ssid "))
        .map(String::from)
}

// ── wpa_cli ──────────────────────────────────────────────────────────

/// Last-resort heuristic: the supplicant's status keys. Often permission-
/// gated (control socket ownership), so failures are expected and quiet.
pub struct WpaCliBackend {
    timeout: Duration,
}

impl WpaCliBackend {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl SsidBackend for WpaCliBackend {
    fn name(&self) -> &'static str {
        "wpa_cli"
    }

    fn source(&self) -> DetectionSource {
        DetectionSource::SystemConfig
    }

    fn query(&self) -> BoxFuture<'_, Result<Option<String>, NetError>> {
        Box::pin(async move {
            let out = run_command("wpa_cli", &["status"], self.timeout).await?;
            Ok(parse_wpa_status(&out))
        })
    }
}

/// Pick the `ssid=` key out of `wpa_cli status` output.
pub(crate) fn parse_wpa_status(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("ssid="))
        .map(String::from)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nmcli_picks_active_row() {
        let out = "no:Neighbor5G\nyes:HomeNet\nno:CoffeeShop\n";
        assert_eq!(parse_nmcli(out).as_deref(), Some("HomeNet"));
    }

    #[test]
    fn nmcli_no_active_row() {
        let out = "no:Neighbor5G\nno:CoffeeShop\n";
        assert_eq!(parse_nmcli(out), None);
    }

    #[test]
    fn nmcli_unescapes_colons_and_backslashes() {
        let out = "yes:Cafe\\: Corner\\\\Bar\n";
        assert_eq!(parse_nmcli(out).as_deref(), Some("Cafe: Corner\\Bar"));
    }

    #[test]
    fn nmcli_empty_active_ssid_is_empty_string() {
        // Hidden networks show an active row with an empty SSID; the
        // resolver's sentinel filter rejects it downstream.
        let out = "yes:\n";
        assert_eq!(parse_nmcli(out).as_deref(), Some(""));
    }

    #[test]
    fn iw_finds_ssid_attribute() {
        let out = "phy#0\n\tInterface wlan0\n\t\tifindex 3\n\t\ttype managed\n\t\tssid HomeNet\n\t\tchannel 36\n";
        assert_eq!(parse_iw(out).as_deref(), Some("HomeNet"));
    }

    #[test]
    fn iw_unassociated_has_no_ssid() {
        let out = "phy#0\n\tInterface wlan0\n\t\tifindex 3\n\t\ttype managed\n";
        assert_eq!(parse_iw(out), None);
    }

    #[test]
    fn wpa_status_finds_ssid_key() {
        let out = "bssid=aa:bb:cc:dd:ee:ff\nfreq=5180\nssid=HomeNet\nwpa_state=COMPLETED\n";
        assert_eq!(parse_wpa_status(out).as_deref(), Some("HomeNet"));
    }

    #[test]
    fn wpa_status_without_ssid() {
        let out = "wpa_state=DISCONNECTED\n";
        assert_eq!(parse_wpa_status(out), None);
    }
}
