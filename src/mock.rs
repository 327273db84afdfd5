//! Scriptable in-memory control surface.
//!
//! [`MockControl`] implements [`WifiControl`] against plain in-memory
//! state. Tests script it (scan acceptance, result batches, a sequence of
//! connection snapshots) and assert on the calls it records; the CLI uses
//! [`MockControl::demo`] to run every command without touching a real
//! WiFi stack.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::control::{
    ConnectionInfo, KeyMgmt, RadioState, SavedConfig, ScanResult, SupplicantState, WifiControl,
};
use crate::error::WifiError;

#[derive(Default)]
struct MockState {
    radio: Option<RadioState>,
    accept_scans: bool,
    scan_requests: u32,
    scan_results: Vec<ScanResult>,
    saved: Vec<SavedConfig>,
    connection: Option<ConnectionInfo>,
    /// Per-call overrides for `connection_info`, drained front to back.
    connection_script: VecDeque<Option<ConnectionInfo>>,
    privileged: bool,
    next_network_id: i32,
    connect_calls: Vec<i32>,
    config_connects: Vec<SavedConfig>,
    enable_calls: Vec<(i32, bool)>,
}

pub struct MockControl {
    state: Mutex<MockState>,
}

impl MockControl {
    pub fn new() -> Self {
        let state = MockState {
            radio: Some(RadioState::Enabled),
            accept_scans: true,
            privileged: true,
            next_network_id: 100,
            ..MockState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// A populated surface for `--mock` CLI runs: a handful of networks,
    /// one of them saved, one currently connected.
    pub fn demo() -> Self {
        let mock = Self::new();
        mock.set_scan_results(vec![
            ScanResult::new("Home_Fiber_5G", "D8:47:32:11:22:33", "[RSN-PSK-CCMP][ESS]", -48, 5180),
            ScanResult::new("Office_Main", "F0:9F:C2:44:55:66", "[RSN-PSK+SAE-CCMP][ESS]", -61, 5745),
            ScanResult::new("Coffee_Shop_Free", "AC:86:74:77:88:99", "[ESS]", -70, 2437),
            ScanResult::new("Guest_Network", "AC:86:74:77:88:9A", "[RSN-EAP-CCMP][ESS]", -72, 2437),
            ScanResult::new("Linksys_502", "C0:56:27:AA:BB:CC", "[WPA-PSK-TKIP][RSN-PSK-CCMP]", -88, 2412),
        ]);

        let mut home = SavedConfig::new("Home_Fiber_5G");
        home.network_id = 100;
        home.key_mgmt = vec![KeyMgmt::WpaPsk];
        mock.add_saved(home);

        mock.set_connection(Some(ConnectionInfo {
            ssid: "Home_Fiber_5G".to_string(),
            bssid: "D8:47:32:11:22:33".to_string(),
            network_id: 100,
            ip_address: Some("192.168.1.23".parse().unwrap()),
            rssi: -48,
            supplicant_state: SupplicantState::Completed,
            passpoint_fqdn: None,
        }));
        mock
    }

    pub fn set_radio_state(&self, radio: RadioState) {
        self.state.lock().unwrap().radio = Some(radio);
    }

    /// Script whether `request_scan` reports acceptance.
    pub fn set_accept_scans(&self, accept: bool) {
        self.state.lock().unwrap().accept_scans = accept;
    }

    pub fn scan_request_count(&self) -> u32 {
        self.state.lock().unwrap().scan_requests
    }

    pub fn set_scan_results(&self, results: Vec<ScanResult>) {
        self.state.lock().unwrap().scan_results = results;
    }

    pub fn add_saved(&self, config: SavedConfig) {
        self.state.lock().unwrap().saved.push(config);
    }

    /// The steady connection snapshot returned once any script drains.
    pub fn set_connection(&self, connection: Option<ConnectionInfo>) {
        self.state.lock().unwrap().connection = connection;
    }

    /// Queue snapshots returned by successive `connection_info` calls
    /// before falling back to the steady value.
    pub fn script_connection_info(&self, snapshots: Vec<Option<ConnectionInfo>>) {
        self.state
            .lock()
            .unwrap()
            .connection_script
            .extend(snapshots);
    }

    /// Make `connect_config` fail as requiring a privileged context.
    pub fn set_privileged(&self, privileged: bool) {
        self.state.lock().unwrap().privileged = privileged;
    }

    pub fn connect_calls(&self) -> Vec<i32> {
        self.state.lock().unwrap().connect_calls.clone()
    }

    pub fn config_connects(&self) -> Vec<SavedConfig> {
        self.state.lock().unwrap().config_connects.clone()
    }

    pub fn enable_calls(&self) -> Vec<(i32, bool)> {
        self.state.lock().unwrap().enable_calls.clone()
    }
}

impl Default for MockControl {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiControl for MockControl {
    fn radio_state(&self) -> RadioState {
        self.state
            .lock()
            .unwrap()
            .radio
            .unwrap_or(RadioState::Disabled)
    }

    fn request_scan(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        state.scan_requests += 1;
        state.accept_scans
    }

    fn scan_results(&self) -> Result<Vec<ScanResult>, WifiError> {
        Ok(self.state.lock().unwrap().scan_results.clone())
    }

    fn saved_configs(&self) -> Result<Vec<SavedConfig>, WifiError> {
        Ok(self.state.lock().unwrap().saved.clone())
    }

    fn connection_info(&self) -> Option<ConnectionInfo> {
        let mut state = self.state.lock().unwrap();
        match state.connection_script.pop_front() {
            Some(scripted) => scripted,
            None => state.connection.clone(),
        }
    }

    fn connect_network(&self, network_id: i32) -> Result<(), WifiError> {
        self.state.lock().unwrap().connect_calls.push(network_id);
        Ok(())
    }

    fn connect_config(&self, config: &SavedConfig) -> Result<i32, WifiError> {
        let mut state = self.state.lock().unwrap();
        if !state.privileged {
            return Err(WifiError::PrivilegeRequired(
                "open network connect".to_string(),
            ));
        }
        state.config_connects.push(config.clone());
        let id = state.next_network_id;
        state.next_network_id += 1;
        Ok(id)
    }

    fn enable_network(&self, network_id: i32, exclusive: bool) -> Result<(), WifiError> {
        self.state
            .lock()
            .unwrap()
            .enable_calls
            .push((network_id, exclusive));
        Ok(())
    }
}
