//! One tracking session over a control surface.
//!
//! [`Session`] is the explicit owner object tying the pieces together: it
//! holds the ranked AccessPoint list, the scan scheduler, the connector,
//! and the last known connection info. There are no ambient singletons;
//! everything that needs the session gets a reference to it.
//!
//! The list is replaced atomically on every refresh. Readers take owned
//! snapshots and diff by identity key, so a refresh never mutates a list
//! a reader is walking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::access_point::AccessPoint;
use crate::aggregator::make_access_points;
use crate::connection::{ConnectHandle, ConnectPhase, ConnectStart, Connector};
use crate::control::{
    ConnectionInfo, NetworkState, RadioState, SupplicantState, WifiControl, WifiEvent,
};
use crate::error::WifiError;
use crate::scanner::Scanner;

pub struct Session<C: WifiControl + 'static> {
    control: Arc<C>,
    scanner: Scanner<C>,
    connector: Connector<C>,
    access_points: RwLock<Vec<AccessPoint>>,
    last_connection: Mutex<Option<(ConnectionInfo, NetworkState)>>,
    processing: AtomicBool,
    cancel: CancellationToken,
}

impl<C: WifiControl + 'static> Session<C> {
    pub fn new(control: Arc<C>) -> Self {
        let scanner = Scanner::new(control.clone());
        let cancel = CancellationToken::new();
        let connector = Connector::new(control.clone(), scanner.clone(), cancel.clone());
        Self {
            control,
            scanner,
            connector,
            access_points: RwLock::new(Vec::new()),
            last_connection: Mutex::new(None),
            processing: AtomicBool::new(false),
            cancel,
        }
    }

    /// Begin scanning if the radio is already up. A disabled radio is
    /// picked up later through [`WifiEvent::RadioStateChanged`].
    pub fn start(&self) {
        if self.control.radio_state() == RadioState::Enabled {
            self.scanner.resume();
        }
    }

    /// Feed one external notification into the session.
    ///
    /// Events are ignored while the caller has marked the session as
    /// processing a foreground exchange, and scan results are ignored
    /// while a connection attempt is in flight.
    pub fn handle_event(&self, event: WifiEvent) {
        if self.processing.load(Ordering::SeqCst) {
            return;
        }

        match event {
            WifiEvent::RadioStateChanged(RadioState::Enabled) => {
                self.scanner.resume();
                self.clear_last_connection();
            }
            WifiEvent::RadioStateChanged(RadioState::Disabled) => {
                self.scanner.pause();
                self.access_points.write().unwrap().clear();
                self.clear_last_connection();
            }
            WifiEvent::RadioStateChanged(RadioState::Enabling) => {
                self.access_points.write().unwrap().clear();
                self.clear_last_connection();
            }
            WifiEvent::ScanResultsAvailable => {
                if !self.connector.is_connecting() {
                    self.refresh();
                }
            }
            WifiEvent::RssiChanged => {
                self.refresh();
                self.cache_connection_info();
            }
        }
    }

    /// Rebuild the ranked list from the control surface.
    ///
    /// The stored list is replaced in one atomic swap; the returned value
    /// is the fresh snapshot.
    pub fn refresh(&self) -> Vec<AccessPoint> {
        if self.control.radio_state() != RadioState::Enabled {
            self.access_points.write().unwrap().clear();
            return Vec::new();
        }

        let scan_results = match self.control.scan_results() {
            Ok(results) => results,
            Err(err) => {
                warn!(%err, "scan results unavailable, keeping previous list");
                return self.access_points();
            }
        };
        let configs = match self.control.saved_configs() {
            Ok(configs) => configs,
            Err(err) => {
                warn!(%err, "saved configs unavailable, keeping previous list");
                return self.access_points();
            }
        };

        let last = self.last_connection.lock().unwrap().clone();
        let live = self.control.connection_info();

        let list = make_access_points(
            scan_results,
            configs,
            last.as_ref().map(|(info, state)| (info, *state)),
            live.as_ref(),
        );
        debug!(count = list.len(), "access point list rebuilt");

        *self.access_points.write().unwrap() = list.clone();
        list
    }

    /// Owned snapshot of the current ranked list.
    pub fn access_points(&self) -> Vec<AccessPoint> {
        self.access_points.read().unwrap().clone()
    }

    /// Find an entry in the current list by identity key.
    pub fn find(&self, key: &str) -> Option<AccessPoint> {
        self.access_points
            .read()
            .unwrap()
            .iter()
            .find(|ap| ap.key() == key)
            .cloned()
    }

    /// Attempt to connect to the listed AccessPoint with identity `key`.
    pub fn connect(&self, key: &str) -> Result<ConnectStart, WifiError> {
        let ap = self
            .find(key)
            .ok_or_else(|| WifiError::NetworkNotFound(key.to_string()))?;
        self.connector.connect(&ap)
    }

    /// Follow up a [`ConnectStart::NeedsPassword`] with the collected
    /// password.
    pub fn connect_with_password(
        &self,
        key: &str,
        password: &str,
    ) -> Result<ConnectHandle, WifiError> {
        let ap = self
            .find(key)
            .ok_or_else(|| WifiError::NetworkNotFound(key.to_string()))?;
        self.connector.connect_with_password(&ap, password)
    }

    pub fn phase(&self) -> ConnectPhase {
        self.connector.phase()
    }

    pub fn is_connecting(&self) -> bool {
        self.connector.is_connecting()
    }

    /// Mark the session as busy with a foreground exchange (credential
    /// entry, profile editing). Scanning pauses while set and resumes
    /// when cleared, and events are dropped in between.
    pub fn set_processing(&self, processing: bool) {
        self.processing.store(processing, Ordering::SeqCst);
        if processing {
            self.scanner.pause();
        } else {
            self.scanner.resume();
        }
    }

    /// Tear the session down: cancels in-flight confirmation polls and
    /// stops the scheduler. Safe to call more than once.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.scanner.pause();
    }

    pub fn control(&self) -> &Arc<C> {
        &self.control
    }

    /// Re-read the live connection info and remember it for the next
    /// aggregation pass. With the radio down the previous value is kept,
    /// mirroring how a dying radio stops producing trustworthy reads.
    fn cache_connection_info(&self) {
        if self.control.radio_state() != RadioState::Enabled {
            return;
        }
        if let Some(info) = self.control.connection_info() {
            let state = network_state_of(&info);
            *self.last_connection.lock().unwrap() = Some((info, state));
        }
    }

    fn clear_last_connection(&self) {
        *self.last_connection.lock().unwrap() = None;
    }
}

/// Derive the coarse network state from a connection snapshot.
fn network_state_of(info: &ConnectionInfo) -> NetworkState {
    match info.supplicant_state {
        SupplicantState::Completed => {
            if info.has_ip() {
                NetworkState::Connected
            } else {
                NetworkState::ObtainingIp
            }
        }
        SupplicantState::Authenticating
        | SupplicantState::Associating
        | SupplicantState::Associated
        | SupplicantState::FourWayHandshake
        | SupplicantState::GroupHandshake => NetworkState::Authenticating,
        SupplicantState::Scanning => NetworkState::Connecting,
        SupplicantState::Inactive | SupplicantState::Disconnected => NetworkState::Disconnected,
    }
}
