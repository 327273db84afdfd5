//! Access point list aggregation.
//!
//! [`make_access_points`] produces the authoritative ranked list for one
//! rendering frame from three inputs: the raw scan batch, the saved
//! profile set, and the last known connection info. The output is a fresh
//! list every time; callers diff against the previous one by identity key
//! to preserve selection state, never by position or object identity.

use std::collections::HashMap;

use crate::access_point::{strip_quotes, AccessPoint};
use crate::control::{ConnectionInfo, NetworkState, SavedConfig, ScanResult, INVALID_NETWORK_ID};

/// Capability token marking an ad-hoc network, which cannot be joined as
/// an infrastructure AP.
const ADHOC_CAPABILITY: &str = "[IBSS]";

/// Build the deduplicated, ranked AccessPoint list for one sweep.
///
/// # Arguments
/// * `scan_results` - the raw scan batch; an empty batch yields an empty list
/// * `configs` - all saved profiles known to the platform
/// * `last_connection` - last known connection info + network state pair,
///   merged into the matching entry
/// * `live_connection` - current connection info, used to mark the single
///   connected entry (ssid match with a bound address, first match wins)
pub fn make_access_points(
    scan_results: Vec<ScanResult>,
    configs: Vec<SavedConfig>,
    last_connection: Option<(&ConnectionInfo, NetworkState)>,
    live_connection: Option<&ConnectionInfo>,
) -> Vec<AccessPoint> {
    if scan_results.is_empty() {
        return Vec::new();
    }

    let mut configured: HashMap<String, SavedConfig> = HashMap::new();
    for config in &configs {
        configured.insert(AccessPoint::key_for_config(config), config.clone());
    }

    let connection_config = last_connection
        .and_then(|(info, _)| config_for_network_id(info.network_id, &configs));

    // Group scan results by identity key, in scan order, skipping results
    // that cannot be joined to a normal network.
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<ScanResult>)> = Vec::new();
    for result in scan_results {
        if result.ssid.is_empty() || result.capabilities.contains(ADHOC_CAPABILITY) {
            continue;
        }

        let key = AccessPoint::key_for_result(&result);
        match group_index.get(&key) {
            Some(&index) => groups[index].1.push(result),
            None => {
                group_index.insert(key.clone(), groups.len());
                groups.push((key, vec![result]));
            }
        }
    }

    let live_ssid = live_connection.map(|info| strip_quotes(&info.ssid).to_string());

    let mut access_points = Vec::with_capacity(groups.len());
    let mut connected_marked = false;
    for (key, results) in groups {
        let mut ap = AccessPoint::from_scan_results(results);

        ap.update_config(configured.get(&key).cloned());
        if let (Some(config), Some((info, state))) = (connection_config.as_ref(), last_connection)
        {
            ap.update_with_connection(Some(config), info, state);
        }

        // Out-of-range networks have nothing to rank.
        if ap.level().is_none() {
            continue;
        }

        if !connected_marked {
            if let (Some(live), Some(live_ssid)) = (live_connection, live_ssid.as_deref()) {
                if ap.ssid == live_ssid && live.has_ip() {
                    ap.is_connected = true;
                    connected_marked = true;
                }
            }
        }

        access_points.push(ap);
    }

    access_points.sort();
    access_points
}

/// Build the saved-networks listing.
///
/// Passpoint profiles are skipped; the platform materializes those only
/// for the duration of a connection attempt.
pub fn make_saved_access_points(configs: Vec<SavedConfig>) -> Vec<AccessPoint> {
    configs
        .into_iter()
        .filter(|config| !config.is_passpoint())
        .map(AccessPoint::from_config)
        .collect()
}

/// Find the saved profile for a network id, ignoring profiles the
/// platform added on its own that never associated.
fn config_for_network_id(network_id: i32, configs: &[SavedConfig]) -> Option<SavedConfig> {
    if network_id == INVALID_NETWORK_ID {
        return None;
    }
    configs
        .iter()
        .find(|config| {
            config.network_id == network_id && (!config.self_added || config.num_association != 0)
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_point::UNREACHABLE_RSSI;
    use crate::control::SupplicantState;
    use crate::security::Security;

    fn result(ssid: &str, bssid: &str, caps: &str, level: i32) -> ScanResult {
        ScanResult::new(ssid, bssid, caps, level, 2412)
    }

    fn live(ssid: &str, with_ip: bool) -> ConnectionInfo {
        ConnectionInfo {
            ssid: ssid.to_string(),
            bssid: "AA:BB:CC:DD:EE:FF".to_string(),
            network_id: INVALID_NETWORK_ID,
            ip_address: with_ip.then(|| "10.0.0.2".parse().unwrap()),
            rssi: -50,
            supplicant_state: SupplicantState::Completed,
            passpoint_fqdn: None,
        }
    }

    #[test]
    fn empty_batch_yields_empty_list() {
        let list = make_access_points(Vec::new(), vec![SavedConfig::new("Home")], None, None);
        assert!(list.is_empty());
    }

    #[test]
    fn hidden_and_adhoc_results_are_excluded() {
        let list = make_access_points(
            vec![
                result("Cafe", "00:01", "[RSN-PSK-CCMP]", -50),
                result("", "00:02", "[ESS]", -40),
                result("Mesh", "00:03", "[IBSS][ESS]", -40),
            ],
            Vec::new(),
            None,
            None,
        );
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].ssid, "Cafe");
    }

    #[test]
    fn same_identity_collapses_into_one_entry() {
        let list = make_access_points(
            vec![
                result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -50),
                result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -60),
            ],
            Vec::new(),
            None,
            None,
        );
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].scan_result_count(), 2);
    }

    #[test]
    fn cafe_sweep_end_to_end() {
        let list = make_access_points(
            vec![
                result("Cafe", "AA:BB", "PSK", -50),
                result("Cafe", "AA:BB", "PSK", -60),
            ],
            Vec::new(),
            None,
            None,
        );
        assert_eq!(list.len(), 1);
        let ap = &list[0];
        assert_eq!(ap.ssid, "Cafe");
        assert_eq!(ap.security, Security::Psk);
        assert_eq!(ap.rssi, -50);
        assert!(!ap.is_connected);
    }

    #[test]
    fn out_of_range_networks_are_dropped() {
        let list = make_access_points(
            vec![
                result("Cafe", "00:01", "[RSN-PSK-CCMP]", -50),
                result("Ghost", "00:02", "[ESS]", UNREACHABLE_RSSI),
            ],
            Vec::new(),
            None,
            None,
        );
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].ssid, "Cafe");
    }

    #[test]
    fn saved_profile_attaches_by_identity_key() {
        let mut config = SavedConfig::new("Cafe");
        config.network_id = 7;
        config.key_mgmt = vec![crate::control::KeyMgmt::WpaPsk];

        let list = make_access_points(
            vec![result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -50)],
            vec![config],
            None,
            None,
        );
        assert_eq!(list.len(), 1);
        assert!(list[0].is_saved());
        assert_eq!(list[0].network_id, 7);
    }

    #[test]
    fn connected_flag_requires_bound_address() {
        let scans = vec![
            result("Cafe", "00:01", "[RSN-PSK-CCMP]", -50),
            result("Bar", "00:02", "[RSN-PSK-CCMP]", -60),
        ];

        let with_ip = live("Cafe", true);
        let list = make_access_points(scans.clone(), Vec::new(), None, Some(&with_ip));
        let connected: Vec<_> = list.iter().filter(|ap| ap.is_connected).collect();
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].ssid, "Cafe");
        // The connected entry ranks first.
        assert_eq!(list[0].ssid, "Cafe");

        let without_ip = live("Cafe", false);
        let list = make_access_points(scans, Vec::new(), None, Some(&without_ip));
        assert!(list.iter().all(|ap| !ap.is_connected));
    }

    #[test]
    fn at_most_one_entry_is_marked_connected() {
        // Same ssid at two security types produces two entries; only the
        // first in scan order may take the connected flag.
        let scans = vec![
            result("Cafe", "00:01", "[RSN-PSK-CCMP]", -50),
            result("Cafe", "00:02", "[ESS]", -60),
        ];
        let info = live("Cafe", true);
        let list = make_access_points(scans, Vec::new(), None, Some(&info));
        assert_eq!(list.len(), 2);
        assert_eq!(list.iter().filter(|ap| ap.is_connected).count(), 1);
    }

    #[test]
    fn self_added_unassociated_profile_is_not_the_connection_config() {
        let mut config = SavedConfig::new("Cafe");
        config.network_id = 3;
        config.self_added = true;
        config.num_association = 0;

        let mut info = live("Cafe", true);
        info.network_id = 3;

        // The profile is rejected as connection config, so the merge path
        // falls back to plain aggregation; the entry still exists.
        let list = make_access_points(
            vec![result("Cafe", "AA:BB", "[RSN-PSK-CCMP]", -50)],
            vec![config],
            Some((&info, NetworkState::Connected)),
            Some(&info),
        );
        assert_eq!(list.len(), 1);
        assert!(list[0].is_connected);
    }

    #[test]
    fn saved_listing_skips_passpoint_profiles() {
        let mut passpoint = SavedConfig::new("roam");
        passpoint.passpoint_fqdn = Some("roam.example.net".to_string());

        let saved = make_saved_access_points(vec![SavedConfig::new("Home"), passpoint]);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].ssid, "Home");
    }
}
