//! The AccessPoint entity.
//!
//! An [`AccessPoint`] is one logical network: the scan observations that
//! share an identity key, plus the saved profile and live connection state
//! that attach to it. It owns the security classification of its best
//! observation, a jitter-damped signal figure, and the ranking order used
//! to present the network list.
//!
//! # Identity
//!
//! Normal networks key on `"AP:" + (ssid | bssid) + ',' + security tag`;
//! Passpoint networks key on `"FQDN:" + fqdn`. The key is stable across
//! repeated scans of the same physical network and is the correct diff key
//! for callers preserving selection state across refreshes.

use std::cmp::Ordering;

use crate::control::{
    ConnectionInfo, EapMethod, KeyMgmt, NetworkState, SavedConfig, ScanResult, INVALID_NETWORK_ID,
};
use crate::error::WifiError;
use crate::security::{security_label, EapType, PskType, Security};

/// Number of signal buckets used for ranking and display.
pub const SIGNAL_LEVELS: u8 = 5;

/// Sentinel rssi for a network with no usable signal report.
pub const UNREACHABLE_RSSI: i32 = i32::MIN;

/// Sentinel rssi some platforms report for an invalid live reading.
pub const INVALID_RSSI: i32 = -127;

/// SSID sentinel for a hex-encoded unknown network name.
pub const UNKNOWN_SSID: &str = "0x";

const KEY_PREFIX_AP: &str = "AP:";
const KEY_PREFIX_FQDN: &str = "FQDN:";

// Bucketing range in dBm. At or below the floor everything is bucket 0,
// at or above the ceiling everything is the top bucket.
const MIN_RSSI: i32 = -100;
const MAX_RSSI: i32 = -55;

/// Bucket a raw rssi into the coarse 0-4 scale.
///
/// Returns `None` for the unreachable sentinel; such networks have no
/// rankable signal at all, which is distinct from a very weak one.
pub fn signal_level(rssi: i32) -> Option<u8> {
    if rssi == UNREACHABLE_RSSI {
        return None;
    }

    let top = i32::from(SIGNAL_LEVELS) - 1;
    let level = if rssi <= MIN_RSSI {
        0
    } else if rssi >= MAX_RSSI {
        top
    } else {
        (rssi - MIN_RSSI) * top / (MAX_RSSI - MIN_RSSI)
    };
    Some(level as u8)
}

/// Strip one pair of surrounding double quotes, if present.
///
/// Supplicants report SSIDs of UTF-8 networks quoted; saved profiles and
/// scan results do not. Matching across the two forms goes through here.
pub fn strip_quotes(s: &str) -> &str {
    if s.len() > 1 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// One logical network aggregated from scans, profile, and live state.
#[derive(Debug, Clone)]
pub struct AccessPoint {
    key: String,

    pub ssid: String,
    pub bssid: String,
    pub security: Security,
    pub network_id: i32,

    /// Damped signal figure, [`UNREACHABLE_RSSI`] until a scan reports one.
    pub rssi: i32,

    /// Set by the aggregator on the entry matching the live connection.
    pub is_connected: bool,

    pub is_carrier_ap: bool,
    pub carrier_eap: Option<EapMethod>,

    psk_type: PskType,
    eap_type: EapType,

    config: Option<SavedConfig>,
    connection: Option<ConnectionInfo>,
    network_state: Option<NetworkState>,

    scan_results: Vec<ScanResult>,
}

impl AccessPoint {
    fn empty() -> Self {
        Self {
            key: String::new(),
            ssid: String::new(),
            bssid: String::new(),
            security: Security::None,
            network_id: INVALID_NETWORK_ID,
            rssi: UNREACHABLE_RSSI,
            is_connected: false,
            is_carrier_ap: false,
            carrier_eap: None,
            psk_type: PskType::Unknown,
            eap_type: EapType::Unknown,
            config: None,
            connection: None,
            network_state: None,
            scan_results: Vec::new(),
        }
    }

    /// Build an AccessPoint from the scan results of one identity group.
    pub fn from_scan_results(results: Vec<ScanResult>) -> Self {
        let mut ap = Self::empty();
        ap.set_scan_results(results);
        ap.update_key();
        ap
    }

    /// Build an AccessPoint from a saved profile only, for the saved
    /// networks listing.
    pub fn from_config(config: SavedConfig) -> Self {
        let mut ap = Self::empty();
        ap.ssid = strip_quotes(&config.ssid).to_string();
        ap.bssid = config.bssid.clone().unwrap_or_default();
        ap.security = Security::from_config(&config);
        ap.network_id = config.network_id;
        ap.config = Some(config);
        ap.update_key();
        ap
    }

    /// The identity key of this grouping.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Identity key for a raw scan result.
    pub fn key_for_result(result: &ScanResult) -> String {
        Self::key_for(
            &result.ssid,
            &result.bssid,
            Security::from_capabilities(&result.capabilities),
        )
    }

    /// Identity key for a saved profile; Passpoint profiles key on their
    /// FQDN namespace instead of ssid/bssid.
    pub fn key_for_config(config: &SavedConfig) -> String {
        match &config.passpoint_fqdn {
            Some(fqdn) => format!("{KEY_PREFIX_FQDN}{fqdn}"),
            None => Self::key_for(
                strip_quotes(&config.ssid),
                config.bssid.as_deref().unwrap_or(""),
                Security::from_config(config),
            ),
        }
    }

    fn key_for(ssid: &str, bssid: &str, security: Security) -> String {
        let name = if ssid.is_empty() { bssid } else { ssid };
        format!("{KEY_PREFIX_AP}{name},{}", security.tag())
    }

    fn update_key(&mut self) {
        self.key = match self.config.as_ref() {
            Some(config) if config.is_passpoint() => Self::key_for_config(config),
            _ => Self::key_for(&self.ssid, &self.bssid, self.security),
        };
    }

    /// Replace the constituent scan results and refresh derived fields.
    ///
    /// The new rssi is the average of the previous figure and the best of
    /// the batch, so one noisy sweep cannot reorder the list; a first
    /// observation (or a previously unreachable network) takes the batch
    /// value verbatim. Field updates are skipped while this AP is the
    /// active connection, whose live info is authoritative.
    pub fn set_scan_results(&mut self, results: Vec<ScanResult>) {
        if results.is_empty() {
            return;
        }
        self.scan_results = results;

        if self.is_active() {
            return;
        }

        let best = self
            .scan_results
            .iter()
            .max_by_key(|result| result.level)
            .cloned();

        let best_rssi = best.as_ref().map_or(UNREACHABLE_RSSI, |r| r.level);
        self.rssi = if best_rssi != UNREACHABLE_RSSI && self.rssi != UNREACHABLE_RSSI {
            (self.rssi + best_rssi).div_euclid(2)
        } else {
            best_rssi
        };

        if let Some(best) = best {
            self.ssid = best.ssid.clone();
            self.bssid = best.bssid.clone();
            self.security = Security::from_capabilities(&best.capabilities);
            match self.security {
                Security::Psk | Security::Sae | Security::PskSaeTransition => {
                    self.psk_type = PskType::from_capabilities(&best.capabilities);
                }
                Security::Eap => {
                    self.eap_type = EapType::from_capabilities(&best.capabilities);
                }
                _ => {}
            }
            self.is_carrier_ap = best.is_carrier_ap;
            self.carrier_eap = best.carrier_eap;
        }

        // A Passpoint profile tracks the ssid of its best observation.
        if self.is_passpoint() {
            if let Some(config) = self.config.as_mut() {
                config.ssid = self.ssid.clone();
            }
        }
    }

    /// Attach or clear the saved profile for this network.
    pub fn update_config(&mut self, config: Option<SavedConfig>) {
        self.config = config;
        match self.config.as_ref() {
            Some(config) => {
                self.ssid = strip_quotes(&config.ssid).to_string();
                self.network_id = config.network_id;
            }
            None => self.network_id = INVALID_NETWORK_ID,
        }
    }

    /// Merge live connection info into this AccessPoint.
    ///
    /// Decides whether `info` refers to this network (Passpoint FQDN, else
    /// network id, else plain ssid match for ephemeral connections) and
    /// attaches or detaches it accordingly.
    ///
    /// # Returns
    /// Whether externally visible state changed: the rssi moved (ignoring
    /// the [`INVALID_RSSI`] sentinel), the detailed network state changed,
    /// or connection info attached/detached. Callers use this purely to
    /// skip redundant refreshes; correctness never depends on it.
    pub fn update_with_connection(
        &mut self,
        config: Option<&SavedConfig>,
        info: &ConnectionInfo,
        state: NetworkState,
    ) -> bool {
        if self.is_info_for_this_ap(info) {
            if !self.is_passpoint() && self.config.as_ref() != config {
                self.update_config(config.cloned());
            }

            let updated = if self.rssi != info.rssi && info.rssi != INVALID_RSSI {
                self.rssi = info.rssi;
                true
            } else if self.network_state.is_some() && self.network_state != Some(state) {
                true
            } else {
                self.connection.is_none()
            };

            self.connection = Some(info.clone());
            self.network_state = Some(state);
            updated
        } else if self.connection.is_some() {
            self.connection = None;
            self.network_state = None;
            true
        } else {
            false
        }
    }

    fn is_info_for_this_ap(&self, info: &ConnectionInfo) -> bool {
        let info_is_passpoint = info.passpoint_fqdn.is_some();
        if info_is_passpoint || self.is_passpoint() {
            info_is_passpoint
                && self.is_passpoint()
                && info.passpoint_fqdn
                    == self.config.as_ref().and_then(|c| c.passpoint_fqdn.clone())
        } else if self.network_id != INVALID_NETWORK_ID {
            self.network_id == info.network_id
        } else {
            // Ephemeral connection with no assigned profile; ssid is the
            // only handle left.
            self.ssid == strip_quotes(&info.ssid)
        }
    }

    /// Whether this is the active connection. Ephemeral connections (no
    /// network id) only count while not disconnected.
    fn is_active(&self) -> bool {
        self.network_state.is_some()
            && (self.network_id != INVALID_NETWORK_ID
                || self.network_state != Some(NetworkState::Disconnected))
    }

    /// Whether any usable signal has been reported.
    pub fn is_reachable(&self) -> bool {
        self.rssi != UNREACHABLE_RSSI
    }

    pub fn is_saved(&self) -> bool {
        self.config.is_some()
    }

    pub fn is_passpoint(&self) -> bool {
        self.config.as_ref().is_some_and(|c| c.is_passpoint())
    }

    pub fn config(&self) -> Option<&SavedConfig> {
        self.config.as_ref()
    }

    /// Signal bucket on the 0-4 scale, `None` while unreachable.
    pub fn level(&self) -> Option<u8> {
        signal_level(self.rssi)
    }

    /// Display title: Passpoint operator name, else the ssid.
    pub fn title(&self) -> &str {
        if self.is_passpoint() {
            self.config
                .as_ref()
                .and_then(|c| c.provider_friendly_name.as_deref())
                .unwrap_or("")
        } else {
            &self.ssid
        }
    }

    /// Human-readable security label.
    pub fn security_label(&self, concise: bool) -> &'static str {
        // A transition-mode network saved as plain OWE shows its profile's
        // classification, not the transitional one.
        if self.security == Security::OweTransition {
            if let Some(config) = self.config.as_ref() {
                if Security::from_config(config) == Security::Owe {
                    return security_label(
                        Security::Owe,
                        self.psk_type,
                        self.eap_type,
                        concise,
                    );
                }
            }
        }
        security_label(self.security, self.psk_type, self.eap_type, concise)
    }

    /// Number of scan observations backing this entry.
    pub fn scan_result_count(&self) -> usize {
        self.scan_results.len()
    }

    /// Synthesize a profile for joining this network without credentials.
    ///
    /// # Errors
    /// [`WifiError::InvalidSecurityState`] when the network's classification
    /// is not an open one; attempting the connect anyway would hand the
    /// platform a corrupted profile.
    pub fn generate_open_network_config(&mut self) -> Result<(), WifiError> {
        if !self.security.is_open() {
            return Err(WifiError::InvalidSecurityState(
                self.security.tag().to_string(),
            ));
        }
        if self.config.is_some() {
            return Ok(());
        }

        let mut config = SavedConfig::new(&self.ssid);
        config.key_mgmt = if self.security == Security::None {
            vec![KeyMgmt::None]
        } else {
            vec![KeyMgmt::Owe]
        };
        self.config = Some(config);
        Ok(())
    }

    fn level_for_ranking(&self) -> u8 {
        self.level().unwrap_or(0)
    }
}

impl Ord for AccessPoint {
    /// Ranking order, ascending = better. Active first, then reachable,
    /// then saved, then higher signal bucket, then case-insensitive title,
    /// with a case-sensitive ssid comparison as the final tie-break.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.is_active() || other.is_connected)
            .cmp(&(self.is_active() || self.is_connected))
            .then_with(|| other.is_reachable().cmp(&self.is_reachable()))
            .then_with(|| other.is_saved().cmp(&self.is_saved()))
            .then_with(|| other.level_for_ranking().cmp(&self.level_for_ranking()))
            .then_with(|| {
                self.title()
                    .to_lowercase()
                    .cmp(&other.title().to_lowercase())
            })
            .then_with(|| self.ssid.cmp(&other.ssid))
    }
}

impl PartialOrd for AccessPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for AccessPoint {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AccessPoint {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ConnectionInfo, SupplicantState};

    fn result(ssid: &str, bssid: &str, caps: &str, level: i32) -> ScanResult {
        ScanResult::new(ssid, bssid, caps, level, 2412)
    }

    fn info(ssid: &str, network_id: i32, rssi: i32) -> ConnectionInfo {
        ConnectionInfo {
            ssid: ssid.to_string(),
            bssid: "AA:BB:CC:DD:EE:FF".to_string(),
            network_id,
            ip_address: Some("192.168.1.20".parse().unwrap()),
            rssi,
            supplicant_state: SupplicantState::Completed,
            passpoint_fqdn: None,
        }
    }

    #[test]
    fn first_scan_takes_best_rssi_verbatim() {
        let ap = AccessPoint::from_scan_results(vec![
            result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -60),
            result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -50),
        ]);
        assert_eq!(ap.rssi, -50);
        assert_eq!(ap.security, Security::Psk);
    }

    #[test]
    fn rescan_averages_with_previous_rssi() {
        let mut ap =
            AccessPoint::from_scan_results(vec![result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -50)]);
        ap.set_scan_results(vec![result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -60)]);
        assert_eq!(ap.rssi, -55);
    }

    #[test]
    fn rescan_average_floors_odd_sums() {
        let mut ap =
            AccessPoint::from_scan_results(vec![result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -50)]);
        ap.set_scan_results(vec![result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -61)]);
        assert_eq!(ap.rssi, -56);
    }

    #[test]
    fn signal_levels_bucket_as_expected() {
        assert_eq!(signal_level(UNREACHABLE_RSSI), None);
        assert_eq!(signal_level(-100), Some(0));
        assert_eq!(signal_level(-89), Some(0));
        assert_eq!(signal_level(-88), Some(1));
        assert_eq!(signal_level(-55), Some(4));
        assert_eq!(signal_level(-30), Some(4));
    }

    #[test]
    fn key_is_independent_of_scan_order() {
        let a = AccessPoint::from_scan_results(vec![
            result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -50),
            result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -60),
        ]);
        let b = AccessPoint::from_scan_results(vec![
            result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -60),
            result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -50),
        ]);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn key_falls_back_to_bssid_for_hidden_ssid() {
        let key = AccessPoint::key_for_result(&result("", "AA:BB", "[ESS]", -50));
        assert_eq!(key, "AP:AA:BB,none");
    }

    #[test]
    fn passpoint_config_keys_on_fqdn_namespace() {
        let mut config = SavedConfig::new("AnySsid");
        config.passpoint_fqdn = Some("roam.example.net".to_string());
        let key = AccessPoint::key_for_config(&config);
        assert!(key.starts_with("FQDN:"));
        assert_eq!(key, "FQDN:roam.example.net");
    }

    #[test]
    fn connection_merge_ignores_invalid_rssi_sentinel() {
        let mut ap =
            AccessPoint::from_scan_results(vec![result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -50)]);
        // First attach reports updated even without an rssi change.
        assert!(ap.update_with_connection(None, &info("Cafe", -1, INVALID_RSSI), NetworkState::Connected));
        assert_eq!(ap.rssi, -50);

        // Same state again, nothing visible changed.
        assert!(!ap.update_with_connection(None, &info("Cafe", -1, INVALID_RSSI), NetworkState::Connected));

        // A real rssi moves the figure directly, no averaging.
        assert!(ap.update_with_connection(None, &info("Cafe", -1, -42), NetworkState::Connected));
        assert_eq!(ap.rssi, -42);
    }

    #[test]
    fn connection_detach_reports_updated() {
        let mut ap =
            AccessPoint::from_scan_results(vec![result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -50)]);
        assert!(ap.update_with_connection(None, &info("Cafe", -1, -42), NetworkState::Connected));

        // Info for some other network clears the attachment.
        assert!(ap.update_with_connection(None, &info("Other", -1, -42), NetworkState::Connected));
        assert!(!ap.update_with_connection(None, &info("Other", -1, -42), NetworkState::Connected));
    }

    #[test]
    fn detailed_state_change_reports_updated() {
        let mut ap =
            AccessPoint::from_scan_results(vec![result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -50)]);
        ap.update_with_connection(None, &info("Cafe", -1, -42), NetworkState::ObtainingIp);
        assert!(ap.update_with_connection(None, &info("Cafe", -1, -42), NetworkState::Connected));
    }

    #[test]
    fn ranking_prefers_connected_then_reachable_then_saved_then_level() {
        let mut connected =
            AccessPoint::from_scan_results(vec![result("zeta", "00:01", "[RSN-PSK-CCMP]", -80)]);
        connected.is_connected = true;

        let mut saved_strong =
            AccessPoint::from_scan_results(vec![result("mid", "00:02", "[RSN-PSK-CCMP]", -56)]);
        saved_strong.update_config(Some(SavedConfig::new("mid")));

        let unsaved_strong =
            AccessPoint::from_scan_results(vec![result("alpha", "00:03", "[RSN-PSK-CCMP]", -56)]);

        let unreachable = AccessPoint::from_config(SavedConfig::new("ghost"));

        let mut list = vec![
            unsaved_strong.clone(),
            unreachable.clone(),
            saved_strong.clone(),
            connected.clone(),
        ];
        list.sort();

        assert_eq!(list[0].ssid, "zeta");
        assert_eq!(list[1].ssid, "mid");
        assert_eq!(list[2].ssid, "alpha");
        assert_eq!(list[3].ssid, "ghost");
    }

    #[test]
    fn ranking_ties_break_on_title_then_exact_ssid() {
        let a = AccessPoint::from_scan_results(vec![result("cafe", "00:01", "[ESS]", -60)]);
        let b = AccessPoint::from_scan_results(vec![result("Cafe", "00:02", "[ESS]", -60)]);
        // Case-insensitive titles tie; the case-sensitive ssid decides.
        assert_eq!(a.cmp(&b), "cafe".cmp("Cafe"));
    }

    #[test]
    fn open_config_synthesis_rejects_secured_networks() {
        let mut ap =
            AccessPoint::from_scan_results(vec![result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -50)]);
        assert!(matches!(
            ap.generate_open_network_config(),
            Err(WifiError::InvalidSecurityState(_))
        ));

        let mut open = AccessPoint::from_scan_results(vec![result("Open", "AA:BB", "[ESS]", -50)]);
        open.generate_open_network_config().unwrap();
        assert!(open.config().is_some());
        assert!(open.config().unwrap().allows(KeyMgmt::None));
    }

    #[test]
    fn strip_quotes_only_removes_full_pairs() {
        assert_eq!(strip_quotes("\"Cafe\""), "Cafe");
        assert_eq!(strip_quotes("Cafe"), "Cafe");
        assert_eq!(strip_quotes("\"Cafe"), "\"Cafe");
        assert_eq!(strip_quotes("\""), "\"");
    }
}
