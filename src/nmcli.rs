//! NetworkManager control surface.
//!
//! [`NmcliControl`] implements [`WifiControl`] on top of NetworkManager's
//! `nmcli` tool, for running the tracker against a real Linux WiFi stack.
//!
//! # Requirements
//!
//! - NetworkManager must be installed and running
//! - The `nmcli` command must be available in PATH
//! - User must have permission to manage network connections
//!
//! # Adapter notes
//!
//! NetworkManager reports signal as a 0-100 percentage and identifies
//! profiles by UUID; this adapter converts percentages to dBm and hands
//! out stable per-process integer network ids mapped back to UUIDs
//! internally. Security words from `nmcli` ("WPA1 WPA2", "WPA3", ...)
//! are rewritten into supplicant-style capability tokens so the canonical
//! classifier sees the same shape of input on every platform.

use std::process::Command;
use std::sync::Mutex;

use tracing::debug;

use crate::control::{
    ConnectionInfo, KeyMgmt, RadioState, SavedConfig, ScanResult, SupplicantState, WifiControl,
    INVALID_NETWORK_ID,
};
use crate::error::WifiError;

/// A WiFi-capable network interface reported by NetworkManager.
#[derive(Debug, Clone)]
pub struct WifiInterface {
    pub name: String,
    pub state: String,
}

/// List all WiFi interfaces on the system.
///
/// # Command Executed
/// ```bash
/// nmcli -t -f DEVICE,TYPE,STATE device
/// ```
pub fn list_wifi_interfaces() -> Result<Vec<WifiInterface>, WifiError> {
    let stdout = run_nmcli(&["-t", "-f", "DEVICE,TYPE,STATE", "device"])?;

    let mut interfaces = Vec::new();
    for line in stdout.lines() {
        let fields = split_terse(line);
        if fields.len() >= 3 && fields[1] == "wifi" {
            interfaces.push(WifiInterface {
                name: fields[0].clone(),
                state: fields[2].clone(),
            });
        }
    }

    Ok(interfaces)
}

/// Saved profile identity as NetworkManager knows it.
struct NmProfile {
    /// Empty for profiles created by this process before re-enumeration.
    uuid: String,
    name: String,
}

/// NetworkManager-backed [`WifiControl`] for one interface.
pub struct NmcliControl {
    interface: String,
    profiles: Mutex<Vec<NmProfile>>,
}

impl NmcliControl {
    /// Bind to `interface`, or to the first WiFi interface when `None`.
    ///
    /// # Errors
    /// - [`WifiError::InterfaceNotFound`] for an unknown explicit name
    /// - [`WifiError::NoWifiInterface`] when auto-detection finds nothing
    pub fn new(interface: Option<&str>) -> Result<Self, WifiError> {
        let interfaces = list_wifi_interfaces()?;
        let resolved = match interface {
            Some(name) => interfaces
                .into_iter()
                .find(|iface| iface.name == name)
                .ok_or_else(|| WifiError::InterfaceNotFound(name.to_string()))?,
            None => interfaces
                .into_iter()
                .next()
                .ok_or(WifiError::NoWifiInterface)?,
        };

        debug!(interface = %resolved.name, "using WiFi interface");
        Ok(Self {
            interface: resolved.name,
            profiles: Mutex::new(Vec::new()),
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Stable id for a profile, registering it on first sight.
    fn profile_id(&self, uuid: &str, name: &str) -> i32 {
        let mut profiles = self.profiles.lock().unwrap();
        if let Some(index) = profiles
            .iter()
            .position(|p| (!uuid.is_empty() && p.uuid == uuid) || p.name == name)
        {
            // Learn the uuid of a profile first seen without one.
            if profiles[index].uuid.is_empty() && !uuid.is_empty() {
                profiles[index].uuid = uuid.to_string();
            }
            index as i32
        } else {
            profiles.push(NmProfile {
                uuid: uuid.to_string(),
                name: name.to_string(),
            });
            (profiles.len() - 1) as i32
        }
    }

    /// nmcli selector arguments for a registered profile id.
    fn profile_selector(&self, network_id: i32) -> Result<(String, String), WifiError> {
        let profiles = self.profiles.lock().unwrap();
        let profile = usize::try_from(network_id)
            .ok()
            .and_then(|index| profiles.get(index))
            .ok_or_else(|| WifiError::NetworkNotFound(network_id.to_string()))?;

        if profile.uuid.is_empty() {
            Ok(("id".to_string(), profile.name.clone()))
        } else {
            Ok(("uuid".to_string(), profile.uuid.clone()))
        }
    }

    fn saved_config_for(&self, uuid: &str, name: &str) -> Result<SavedConfig, WifiError> {
        let stdout = run_nmcli(&[
            "-t",
            "-f",
            "802-11-wireless.ssid,802-11-wireless-security.key-mgmt",
            "connection",
            "show",
            "uuid",
            uuid,
        ])?;

        let mut ssid = String::new();
        let mut key_mgmt_word = String::new();
        for line in stdout.lines() {
            let fields = split_terse(line);
            if fields.len() < 2 {
                continue;
            }
            match fields[0].as_str() {
                "802-11-wireless.ssid" => ssid = fields[1].clone(),
                "802-11-wireless-security.key-mgmt" => key_mgmt_word = fields[1].clone(),
                _ => {}
            }
        }
        if ssid.is_empty() {
            ssid = name.to_string();
        }

        let mut config = SavedConfig::new(&ssid);
        config.network_id = self.profile_id(uuid, name);
        match key_mgmt_word.as_str() {
            "wpa-psk" => config.key_mgmt = vec![KeyMgmt::WpaPsk],
            "sae" => config.key_mgmt = vec![KeyMgmt::Sae],
            "wpa-eap" => config.key_mgmt = vec![KeyMgmt::WpaEap],
            "wpa-eap-suite-b-192" => config.key_mgmt = vec![KeyMgmt::SuiteB192],
            "ieee8021x" => config.key_mgmt = vec![KeyMgmt::Ieee8021x],
            "owe" => config.key_mgmt = vec![KeyMgmt::Owe],
            // Static WEP keys show up as key management "none".
            "none" => {
                config.key_mgmt = vec![KeyMgmt::None];
                config.has_wep_key = true;
            }
            _ => config.key_mgmt = vec![KeyMgmt::None],
        }
        // NetworkManager only persists profiles somebody asked for.
        config.self_added = false;
        config.num_association = 1;
        Ok(config)
    }
}

impl WifiControl for NmcliControl {
    fn radio_state(&self) -> RadioState {
        match run_nmcli(&["radio", "wifi"]) {
            Ok(stdout) if stdout.trim() == "enabled" => RadioState::Enabled,
            _ => RadioState::Disabled,
        }
    }

    /// # Command Executed
    /// ```bash
    /// nmcli device wifi rescan ifname <interface>
    /// ```
    ///
    /// Rescan requests are rejected while the radio is busy or throttled;
    /// the result maps straight onto the accepted/rejected contract.
    fn request_scan(&self) -> bool {
        run_nmcli(&["device", "wifi", "rescan", "ifname", &self.interface]).is_ok()
    }

    /// # Command Executed
    /// ```bash
    /// nmcli -t -f SSID,BSSID,SIGNAL,SECURITY,FREQ device wifi list ifname <interface> --rescan no
    /// ```
    fn scan_results(&self) -> Result<Vec<ScanResult>, WifiError> {
        let stdout = run_nmcli(&[
            "-t",
            "-f",
            "SSID,BSSID,SIGNAL,SECURITY,FREQ",
            "device",
            "wifi",
            "list",
            "ifname",
            &self.interface,
            "--rescan",
            "no",
        ])?;

        let mut results = Vec::new();
        for line in stdout.lines() {
            let fields = split_terse(line);
            if fields.len() < 5 {
                continue;
            }

            let signal: u8 = fields[2].parse().unwrap_or(0);
            results.push(ScanResult::new(
                &fields[0],
                &fields[1],
                &security_to_capabilities(&fields[3]),
                percent_to_rssi(signal),
                parse_frequency(&fields[4]),
            ));
        }

        Ok(results)
    }

    /// # Commands Executed
    /// ```bash
    /// nmcli -t -f NAME,UUID,TYPE connection show
    /// nmcli -t -f 802-11-wireless.ssid,802-11-wireless-security.key-mgmt connection show uuid <uuid>
    /// ```
    fn saved_configs(&self) -> Result<Vec<SavedConfig>, WifiError> {
        let stdout = run_nmcli(&["-t", "-f", "NAME,UUID,TYPE", "connection", "show"])?;

        let mut configs = Vec::new();
        for line in stdout.lines() {
            let fields = split_terse(line);
            if fields.len() >= 3 && fields[2] == "802-11-wireless" {
                configs.push(self.saved_config_for(&fields[1], &fields[0])?);
            }
        }

        Ok(configs)
    }

    /// # Commands Executed
    /// ```bash
    /// nmcli -t device show <interface>
    /// nmcli -t -f IN-USE,SSID,BSSID,SIGNAL device wifi list ifname <interface> --rescan no
    /// ```
    fn connection_info(&self) -> Option<ConnectionInfo> {
        let stdout = run_nmcli(&["-t", "device", "show", &self.interface]).ok()?;

        let mut state_code = 0u32;
        let mut connection_name = String::new();
        let mut ip_address = None;
        for line in stdout.lines() {
            let fields: Vec<&str> = line.splitn(2, ':').collect();
            if fields.len() != 2 {
                continue;
            }
            match fields[0] {
                // e.g. "100 (connected)"
                "GENERAL.STATE" => {
                    state_code = fields[1]
                        .split_whitespace()
                        .next()
                        .and_then(|code| code.parse().ok())
                        .unwrap_or(0);
                }
                "GENERAL.CONNECTION" => {
                    if !fields[1].is_empty() && fields[1] != "--" {
                        connection_name = fields[1].to_string();
                    }
                }
                // e.g. "192.168.1.23/24"
                "IP4.ADDRESS[1]" => {
                    ip_address = fields[1]
                        .split('/')
                        .next()
                        .and_then(|addr| addr.parse().ok());
                }
                _ => {}
            }
        }

        if connection_name.is_empty() {
            return None;
        }

        let mut ssid = connection_name.clone();
        let mut bssid = String::new();
        let mut rssi = crate::access_point::UNREACHABLE_RSSI;
        if let Ok(list) = run_nmcli(&[
            "-t",
            "-f",
            "IN-USE,SSID,BSSID,SIGNAL",
            "device",
            "wifi",
            "list",
            "ifname",
            &self.interface,
            "--rescan",
            "no",
        ]) {
            for line in list.lines() {
                let fields = split_terse(line);
                if fields.len() >= 4 && fields[0] == "*" {
                    ssid = fields[1].clone();
                    bssid = fields[2].clone();
                    rssi = percent_to_rssi(fields[3].parse().unwrap_or(0));
                    break;
                }
            }
        }

        let network_id = {
            let profiles = self.profiles.lock().unwrap();
            profiles
                .iter()
                .position(|p| p.name == connection_name)
                .map(|index| index as i32)
                .unwrap_or(INVALID_NETWORK_ID)
        };

        let supplicant_state = if state_code >= 100 {
            SupplicantState::Completed
        } else if state_code >= 50 {
            SupplicantState::Associating
        } else {
            SupplicantState::Disconnected
        };

        Some(ConnectionInfo {
            ssid,
            bssid,
            network_id,
            ip_address,
            rssi,
            supplicant_state,
            passpoint_fqdn: None,
        })
    }

    /// # Command Executed
    /// ```bash
    /// nmcli --wait 0 connection up uuid <uuid> ifname <interface>
    /// ```
    ///
    /// `--wait 0` returns immediately; completion is observed through the
    /// confirmation poll, not by blocking here.
    fn connect_network(&self, network_id: i32) -> Result<(), WifiError> {
        let (selector, value) = self.profile_selector(network_id)?;
        run_nmcli(&[
            "--wait",
            "0",
            "connection",
            "up",
            &selector,
            &value,
            "ifname",
            &self.interface,
        ])?;
        Ok(())
    }

    /// # Command Executed
    /// ```bash
    /// nmcli --wait 0 device wifi connect <ssid> [password <psk>] ifname <interface>
    /// ```
    fn connect_config(&self, config: &SavedConfig) -> Result<i32, WifiError> {
        let mut args = vec!["--wait", "0", "device", "wifi", "connect", config.ssid.as_str()];
        if let Some(psk) = config.psk.as_deref() {
            args.push("password");
            args.push(psk);
        }
        args.push("ifname");
        args.push(&self.interface);

        match run_nmcli(&args) {
            Ok(_) => Ok(self.profile_id("", &config.ssid)),
            Err(WifiError::CommandFailed(message))
                if message.to_lowercase().contains("not authorized")
                    || message.to_lowercase().contains("insufficient privileges") =>
            {
                Err(WifiError::PrivilegeRequired(message))
            }
            Err(err) => Err(err),
        }
    }

    /// # Command Executed
    /// ```bash
    /// nmcli connection modify <selector> connection.autoconnect yes
    /// ```
    ///
    /// NetworkManager has no analog of exclusively disabling every other
    /// profile, so `exclusive` only raises this profile's standing.
    fn enable_network(&self, network_id: i32, _exclusive: bool) -> Result<(), WifiError> {
        let (selector, value) = self.profile_selector(network_id)?;
        run_nmcli(&[
            "connection",
            "modify",
            &selector,
            &value,
            "connection.autoconnect",
            "yes",
        ])?;
        Ok(())
    }
}

/// Run nmcli with `args`, returning stdout on success.
fn run_nmcli(args: &[&str]) -> Result<String, WifiError> {
    let output = Command::new("nmcli")
        .args(args)
        .output()
        .map_err(|err| WifiError::CommandFailed(err.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WifiError::CommandFailed(stderr.to_string()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Split one line of `nmcli -t` output into fields.
///
/// Terse output separates fields with `:` and escapes literal colons
/// (BSSIDs are full of them) with a backslash.
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for ch in line.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == ':' {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    fields.push(current);
    fields
}

/// Map NetworkManager's 0-100 signal percentage onto dBm.
///
/// Inverse of the percentage NetworkManager derives from quality, good
/// enough for bucketing: 0% = -100 dBm, 100% = -50 dBm.
fn percent_to_rssi(percent: u8) -> i32 {
    i32::from(percent.min(100)) / 2 - 100
}

/// Rewrite nmcli security words into supplicant-style capability tokens.
fn security_to_capabilities(security: &str) -> String {
    if security.is_empty() || security == "--" {
        return "[ESS]".to_string();
    }

    let wep = security.contains("WEP");
    let wpa1 = security.contains("WPA1");
    let wpa2 = security.contains("WPA2");
    let wpa3 = security.contains("WPA3");
    let eap = security.contains("802.1X");
    let owe = security.contains("OWE");

    if wep {
        return "[WEP]".to_string();
    }
    if eap {
        return if wpa1 && !wpa2 && !wpa3 {
            "[WPA-EAP-TKIP][ESS]".to_string()
        } else {
            "[RSN-EAP-CCMP][ESS]".to_string()
        };
    }
    if wpa2 && wpa3 {
        return "[RSN-PSK+SAE-CCMP][ESS]".to_string();
    }
    if wpa3 {
        return "[RSN-SAE-CCMP][ESS]".to_string();
    }
    if wpa1 && wpa2 {
        return "[WPA-PSK-TKIP][RSN-PSK-CCMP][ESS]".to_string();
    }
    if wpa2 {
        return "[RSN-PSK-CCMP][ESS]".to_string();
    }
    if wpa1 {
        return "[WPA-PSK-TKIP][ESS]".to_string();
    }
    if owe {
        return "[OWE][ESS]".to_string();
    }

    "[ESS]".to_string()
}

/// Parse a frequency field such as `"2412 MHz"`.
fn parse_frequency(field: &str) -> u32 {
    field
        .split_whitespace()
        .next()
        .and_then(|mhz| mhz.parse().ok())
        .unwrap_or(0)
}
