//! WiFi control surface abstraction.
//!
//! This module defines the [`WifiControl`] trait, the narrow interface the
//! tracker core consumes instead of talking to an OS WiFi stack directly,
//! together with the data types flowing across it. Two implementations ship
//! with the crate:
//!
//! - [`crate::nmcli::NmcliControl`] - NetworkManager via the `nmcli` tool
//! - [`crate::mock::MockControl`] - scriptable in-memory surface for tests
//!
//! Everything the core needs from the platform is an explicit field or
//! method here. Backends that cannot supply a field report a neutral
//! default rather than forcing the core to probe for it.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::error::WifiError;

/// Network id value meaning "no saved profile assigned".
pub const INVALID_NETWORK_ID: i32 = -1;

/// State of the WiFi radio itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadioState {
    Disabled,
    Enabling,
    Enabled,
}

/// Low-level authentication handshake status of the live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplicantState {
    Inactive,
    Disconnected,
    Scanning,
    Authenticating,
    Associating,
    Associated,
    FourWayHandshake,
    GroupHandshake,
    /// Key exchange finished; the link is usable once an address is bound.
    Completed,
}

/// Coarse progress of the network layer on top of the WiFi link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkState {
    Connecting,
    Authenticating,
    ObtainingIp,
    Connected,
    Disconnected,
}

/// Key management schemes a saved profile allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyMgmt {
    /// Open network, no key management.
    None,
    WpaPsk,
    WpaEap,
    Ieee8021x,
    Owe,
    Sae,
    SuiteB192,
}

/// EAP method advertised by a carrier-provisioned access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EapMethod {
    Peap,
    Tls,
    Ttls,
    Pwd,
    Sim,
    Aka,
    AkaPrime,
}

/// One raw observation of an access point from a scan sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Network name. Empty for hidden networks.
    pub ssid: String,

    /// Hardware identifier of the access point.
    pub bssid: String,

    /// Capability string with security tokens, e.g. `"[WPA2-PSK-CCMP][ESS]"`.
    pub capabilities: String,

    /// Signal strength in dBm.
    pub level: i32,

    /// Channel frequency in MHz.
    pub frequency: u32,

    /// Whether the AP is provisioned by a mobile carrier.
    pub is_carrier_ap: bool,

    /// EAP method of a carrier AP, when advertised.
    pub carrier_eap: Option<EapMethod>,
}

impl ScanResult {
    /// Convenience constructor for the common non-carrier case.
    pub fn new(ssid: &str, bssid: &str, capabilities: &str, level: i32, frequency: u32) -> Self {
        Self {
            ssid: ssid.to_string(),
            bssid: bssid.to_string(),
            capabilities: capabilities.to_string(),
            level,
            frequency,
            is_carrier_ap: false,
            carrier_eap: None,
        }
    }
}

/// A persisted network profile known to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedConfig {
    /// Platform-assigned identifier, [`INVALID_NETWORK_ID`] until assigned.
    pub network_id: i32,

    pub ssid: String,

    /// Pinned BSSID, if the profile is locked to one AP.
    pub bssid: Option<String>,

    /// Allowed key management schemes.
    pub key_mgmt: Vec<KeyMgmt>,

    /// Whether a WEP key slot is populated.
    pub has_wep_key: bool,

    /// Pre-shared key for PSK/SAE profiles being created. Never reported
    /// back by backends when listing saved profiles.
    pub psk: Option<String>,

    /// Domain name identifying a Passpoint (roaming) profile.
    pub passpoint_fqdn: Option<String>,

    /// Operator display name of a Passpoint profile.
    pub provider_friendly_name: Option<String>,

    /// Profile was added by the platform itself rather than the user.
    pub self_added: bool,

    /// How many times this profile has successfully associated.
    pub num_association: u32,
}

impl SavedConfig {
    /// A blank profile for `ssid` with no key management assigned yet.
    pub fn new(ssid: &str) -> Self {
        Self {
            network_id: INVALID_NETWORK_ID,
            ssid: ssid.to_string(),
            bssid: None,
            key_mgmt: Vec::new(),
            has_wep_key: false,
            psk: None,
            passpoint_fqdn: None,
            provider_friendly_name: None,
            self_added: false,
            num_association: 0,
        }
    }

    pub fn is_passpoint(&self) -> bool {
        self.passpoint_fqdn.is_some()
    }

    pub fn allows(&self, scheme: KeyMgmt) -> bool {
        self.key_mgmt.contains(&scheme)
    }
}

/// Live status of the current WiFi connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub ssid: String,
    pub bssid: String,

    /// Saved profile driving this connection, [`INVALID_NETWORK_ID`] for
    /// ephemeral connections.
    pub network_id: i32,

    /// Bound IPv4 address. `None` until DHCP completes.
    pub ip_address: Option<Ipv4Addr>,

    /// Signal strength in dBm as reported for the live link.
    pub rssi: i32,

    pub supplicant_state: SupplicantState,

    /// FQDN when the connection is to a Passpoint network.
    pub passpoint_fqdn: Option<String>,
}

impl ConnectionInfo {
    /// Whether the connection has a usable (non-zero) address.
    pub fn has_ip(&self) -> bool {
        matches!(self.ip_address, Some(ip) if !ip.is_unspecified())
    }
}

/// External notifications the tracker core reacts to.
///
/// These arrive from whatever event plumbing the embedding has (netlink,
/// D-Bus signals, a broadcast receiver); the core never polls for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiEvent {
    RadioStateChanged(RadioState),
    ScanResultsAvailable,
    RssiChanged,
}

/// The OS WiFi control surface consumed by the tracker core.
///
/// Implementations must be cheap to call from async tasks; all methods are
/// synchronous queries or fire-and-forget commands. Connection completion
/// is observed by polling [`WifiControl::connection_info`], never by
/// blocking inside the trait.
pub trait WifiControl: Send + Sync {
    /// Current state of the WiFi radio.
    fn radio_state(&self) -> RadioState;

    /// Request a scan sweep.
    ///
    /// # Returns
    /// Whether the platform accepted the request. Rejections are routine
    /// (radio busy, scan throttling) and are retried by the scheduler on
    /// its next tick.
    fn request_scan(&self) -> bool;

    /// Most recent batch of scan observations.
    fn scan_results(&self) -> Result<Vec<ScanResult>, WifiError>;

    /// All persisted network profiles.
    fn saved_configs(&self) -> Result<Vec<SavedConfig>, WifiError>;

    /// Live connection status, or `None` when nothing is associated.
    fn connection_info(&self) -> Option<ConnectionInfo>;

    /// Begin connecting to a saved profile by network id.
    fn connect_network(&self, network_id: i32) -> Result<(), WifiError>;

    /// Persist `config` and begin connecting to it.
    ///
    /// # Returns
    /// The network id assigned to the new profile.
    ///
    /// # Errors
    /// [`WifiError::PrivilegeRequired`] when the platform only allows this
    /// from a privileged context (open-network connects on some systems).
    fn connect_config(&self, config: &SavedConfig) -> Result<i32, WifiError>;

    /// Enable a saved profile for auto-association.
    ///
    /// With `exclusive` set, other profiles are demoted so the platform
    /// prefers this one for the next association.
    fn enable_network(&self, network_id: i32, exclusive: bool) -> Result<(), WifiError>;
}
