//! Connection attempt state machine.
//!
//! The [`Connector`] drives a single attempt to a terminal outcome without
//! blocking the caller:
//!
//! ```text
//! Idle -> Connecting -> Confirming -> Connected
//!                                  -> Failed
//! ```
//!
//! Scanning is paused for the duration of an attempt so the radio is not
//! contended and the list does not refresh from stale sweeps. Completion
//! is observed by a bounded poll (10 iterations, one second apart) against
//! the live connection info; exhausting the window is an attempt failure,
//! not a system error, and there are no retries beyond it. Terminal
//! outcomes always resume scanning and clear the connecting flag.
//!
//! Starting a new attempt while one is outstanding is not guarded; the
//! newer poll simply races the older one and each reports through its own
//! handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::access_point::{strip_quotes, AccessPoint, UNKNOWN_SSID};
use crate::control::{
    KeyMgmt, RadioState, SavedConfig, SupplicantState, WifiControl, INVALID_NETWORK_ID,
};
use crate::error::WifiError;
use crate::scanner::Scanner;
use crate::security::Security;

/// Poll iterations before a confirmation attempt gives up.
pub const CONFIRM_ATTEMPTS: u32 = 10;

/// Delay between confirmation poll iterations.
pub const CONFIRM_INTERVAL: Duration = Duration::from_secs(1);

/// Observable state of the connection attempt machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPhase {
    Idle,
    Connecting,
    Confirming,
    Connected,
    Failed,
}

/// Immediate result of asking to connect to an AccessPoint.
#[derive(Debug)]
pub enum ConnectStart {
    /// The target already is the live connection; nothing was attempted
    /// and scanning has resumed. A benign no-op, not a failure.
    AlreadyConnected,

    /// The network is secured and unsaved; the caller must collect a
    /// password and follow up with
    /// [`Connector::connect_with_password`]. Scanning stays paused until
    /// the caller finishes or abandons the exchange.
    NeedsPassword,

    /// The network is enterprise (EAP) and unsaved; a full enterprise
    /// profile must be provisioned before an attempt can be issued.
    /// Scanning stays paused, as for [`ConnectStart::NeedsPassword`].
    NeedsEnterpriseSetup,

    /// The attempt was issued; the handle resolves to its outcome.
    Pending(ConnectHandle),
}

/// Terminal outcome of a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    /// The confirmation window elapsed without the link coming up.
    Failed,
    /// The owning session was torn down mid-attempt.
    Cancelled,
}

/// Handle to an in-flight attempt.
#[derive(Debug)]
pub struct ConnectHandle {
    task: JoinHandle<ConnectOutcome>,
    cancel: CancellationToken,
}

impl ConnectHandle {
    /// Wait for the attempt to reach a terminal outcome.
    pub async fn wait(self) -> ConnectOutcome {
        self.task.await.unwrap_or(ConnectOutcome::Cancelled)
    }

    /// Cancel the confirmation poll. The attempt resolves to
    /// [`ConnectOutcome::Cancelled`] at its next suspend point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Drives connection attempts against the control surface.
pub struct Connector<C: WifiControl + 'static> {
    control: Arc<C>,
    scanner: Scanner<C>,
    phase: Arc<Mutex<ConnectPhase>>,
    connecting: Arc<AtomicBool>,
    session_cancel: CancellationToken,
}

impl<C: WifiControl + 'static> Connector<C> {
    pub fn new(control: Arc<C>, scanner: Scanner<C>, session_cancel: CancellationToken) -> Self {
        Self {
            control,
            scanner,
            phase: Arc::new(Mutex::new(ConnectPhase::Idle)),
            connecting: Arc::new(AtomicBool::new(false)),
            session_cancel,
        }
    }

    pub fn phase(&self) -> ConnectPhase {
        *self.phase.lock().unwrap()
    }

    /// Whether an attempt is currently in flight.
    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::SeqCst)
    }

    /// Attempt to connect to `ap`.
    ///
    /// Saved networks connect by their profile id. Unsaved open networks
    /// get a synthesized open profile and a direct connect. Unsaved
    /// secured networks defer to the caller for credentials (password or
    /// enterprise provisioning) instead of failing.
    ///
    /// # Errors
    /// - [`WifiError::RadioDisabled`] when the radio is off
    /// - [`WifiError::PrivilegeRequired`] when the platform only allows
    ///   the synthesized open-network connect from a privileged context
    /// - [`WifiError::InvalidSecurityState`] if open-profile synthesis is
    ///   asked of a secured network
    pub fn connect(&self, ap: &AccessPoint) -> Result<ConnectStart, WifiError> {
        if self.control.radio_state() == RadioState::Disabled {
            return Err(WifiError::RadioDisabled);
        }

        self.scanner.pause();

        // Connecting to the network we are already on is a no-op.
        if let Some(live) = self.control.connection_info() {
            if live.has_ip() && strip_quotes(&live.bssid) == strip_quotes(&ap.bssid) {
                debug!(ssid = %ap.ssid, "already connected, nothing to do");
                self.scanner.resume();
                return Ok(ConnectStart::AlreadyConnected);
            }
        }

        let network_id = match self.find_network_id(&ap.ssid) {
            Ok(id) => id,
            Err(err) => {
                self.scanner.resume();
                return Err(err);
            }
        };
        let ssid = strip_quotes(&ap.ssid).to_string();

        if network_id == INVALID_NETWORK_ID {
            match ap.security {
                Security::None => {
                    // Open network: synthesize a profile and go directly.
                    let mut target = ap.clone();
                    if let Err(err) = target.generate_open_network_config() {
                        self.scanner.resume();
                        return Err(err);
                    }
                    let config = match target.config().cloned() {
                        Some(config) => config,
                        None => {
                            self.scanner.resume();
                            return Err(WifiError::InvalidSecurityState(
                                ap.security.tag().to_string(),
                            ));
                        }
                    };
                    self.issue_config_connect(&config, ssid)
                        .map(ConnectStart::Pending)
                }
                Security::Eap | Security::EapSuiteB => {
                    info!(ssid = %ap.ssid, "enterprise network needs provisioning");
                    Ok(ConnectStart::NeedsEnterpriseSetup)
                }
                _ => {
                    info!(ssid = %ap.ssid, "secured network needs a password");
                    Ok(ConnectStart::NeedsPassword)
                }
            }
        } else {
            self.issue_network_connect(network_id, ssid)
                .map(ConnectStart::Pending)
        }
    }

    /// Connect to a secured network with a freshly collected password.
    ///
    /// Builds the profile the way the target's classification demands
    /// (PSK, SAE, WEP or open), persists and connects it, then confirms.
    pub fn connect_with_password(
        &self,
        ap: &AccessPoint,
        password: &str,
    ) -> Result<ConnectHandle, WifiError> {
        if self.control.radio_state() == RadioState::Disabled {
            return Err(WifiError::RadioDisabled);
        }

        self.scanner.pause();

        let config = match build_password_config(ap, password) {
            Ok(config) => config,
            Err(err) => {
                self.scanner.resume();
                return Err(err);
            }
        };

        self.issue_config_connect(&config, strip_quotes(&ap.ssid).to_string())
    }

    fn issue_network_connect(
        &self,
        network_id: i32,
        ssid: String,
    ) -> Result<ConnectHandle, WifiError> {
        self.begin_attempt();

        let issued = self
            .control
            .enable_network(network_id, true)
            .and_then(|()| self.control.connect_network(network_id));
        if let Err(err) = issued {
            self.finish_attempt(ConnectPhase::Failed);
            return Err(err);
        }

        Ok(self.spawn_confirm(ssid))
    }

    fn issue_config_connect(
        &self,
        config: &SavedConfig,
        ssid: String,
    ) -> Result<ConnectHandle, WifiError> {
        self.begin_attempt();

        let network_id = match self.control.connect_config(config) {
            Ok(id) => id,
            Err(err) => {
                self.finish_attempt(ConnectPhase::Failed);
                return Err(err);
            }
        };
        if let Err(err) = self.control.enable_network(network_id, true) {
            self.finish_attempt(ConnectPhase::Failed);
            return Err(err);
        }

        Ok(self.spawn_confirm(ssid))
    }

    fn begin_attempt(&self) {
        self.connecting.store(true, Ordering::SeqCst);
        *self.phase.lock().unwrap() = ConnectPhase::Connecting;
    }

    fn finish_attempt(&self, phase: ConnectPhase) {
        *self.phase.lock().unwrap() = phase;
        self.connecting.store(false, Ordering::SeqCst);
        self.scanner.resume();
    }

    /// Start the bounded confirmation poll for `ssid`.
    fn spawn_confirm(&self, ssid: String) -> ConnectHandle {
        *self.phase.lock().unwrap() = ConnectPhase::Confirming;

        let cancel = self.session_cancel.child_token();
        let control = self.control.clone();
        let scanner = self.scanner.clone();
        let phase = self.phase.clone();
        let connecting = self.connecting.clone();

        let poll_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let outcome = confirm_connection(control, &ssid, poll_cancel).await;
            match outcome {
                ConnectOutcome::Connected => {
                    info!(%ssid, "connection confirmed");
                    *phase.lock().unwrap() = ConnectPhase::Connected;
                    connecting.store(false, Ordering::SeqCst);
                    scanner.resume();
                }
                ConnectOutcome::Failed => {
                    warn!(%ssid, "connection not confirmed within the poll window");
                    *phase.lock().unwrap() = ConnectPhase::Failed;
                    connecting.store(false, Ordering::SeqCst);
                    scanner.resume();
                }
                ConnectOutcome::Cancelled => {
                    // Session is going away; leave the radio alone.
                    *phase.lock().unwrap() = ConnectPhase::Idle;
                    connecting.store(false, Ordering::SeqCst);
                }
            }
            outcome
        });

        ConnectHandle { task, cancel }
    }

    fn find_network_id(&self, ssid: &str) -> Result<i32, WifiError> {
        let configs = self.control.saved_configs()?;
        Ok(configs
            .iter()
            .find(|config| strip_quotes(&config.ssid) == ssid)
            .map(|config| config.network_id)
            .unwrap_or(INVALID_NETWORK_ID))
    }
}

/// Poll the live connection until it matches `ssid` with a completed
/// handshake and a bound address, up to [`CONFIRM_ATTEMPTS`] iterations.
async fn confirm_connection<C: WifiControl>(
    control: Arc<C>,
    ssid: &str,
    cancel: CancellationToken,
) -> ConnectOutcome {
    for _ in 0..CONFIRM_ATTEMPTS {
        tokio::select! {
            _ = cancel.cancelled() => return ConnectOutcome::Cancelled,
            _ = tokio::time::sleep(CONFIRM_INTERVAL) => {}
        }

        // A hex-encoded unknown ssid can never be confirmed by name.
        if ssid == UNKNOWN_SSID {
            break;
        }

        if let Some(info) = control.connection_info() {
            if strip_quotes(&info.ssid) == ssid
                && info.has_ip()
                && info.supplicant_state == SupplicantState::Completed
            {
                return ConnectOutcome::Connected;
            }
        }
    }

    ConnectOutcome::Failed
}

/// Build the profile for a password-entry connect according to the
/// target's security classification.
fn build_password_config(ap: &AccessPoint, password: &str) -> Result<SavedConfig, WifiError> {
    let mut config = SavedConfig::new(strip_quotes(&ap.ssid));
    match ap.security {
        Security::None => {
            config.key_mgmt = vec![KeyMgmt::None];
        }
        Security::Wep => {
            config.key_mgmt = vec![KeyMgmt::None];
            config.has_wep_key = true;
            config.psk = Some(password.to_string());
        }
        Security::Psk => {
            config.key_mgmt = vec![KeyMgmt::WpaPsk];
            config.psk = Some(password.to_string());
        }
        Security::Sae | Security::PskSaeTransition => {
            config.key_mgmt = vec![KeyMgmt::Sae];
            config.psk = Some(password.to_string());
        }
        Security::Owe | Security::OweTransition => {
            config.key_mgmt = vec![KeyMgmt::Owe];
        }
        Security::Eap | Security::EapSuiteB => {
            // A password alone cannot provision an enterprise profile.
            return Err(WifiError::InvalidSecurityState(
                ap.security.tag().to_string(),
            ));
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ConnectionInfo, ScanResult};
    use crate::mock::MockControl;

    fn ap(ssid: &str, bssid: &str, caps: &str) -> AccessPoint {
        AccessPoint::from_scan_results(vec![ScanResult::new(ssid, bssid, caps, -50, 2412)])
    }

    fn live(ssid: &str, bssid: &str, completed: bool, with_ip: bool) -> ConnectionInfo {
        ConnectionInfo {
            ssid: ssid.to_string(),
            bssid: bssid.to_string(),
            network_id: INVALID_NETWORK_ID,
            ip_address: with_ip.then(|| "10.0.0.9".parse().unwrap()),
            rssi: -50,
            supplicant_state: if completed {
                SupplicantState::Completed
            } else {
                SupplicantState::Associating
            },
            passpoint_fqdn: None,
        }
    }

    fn connector(control: &Arc<MockControl>) -> Connector<MockControl> {
        let scanner = Scanner::new(control.clone());
        Connector::new(control.clone(), scanner, CancellationToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn already_connected_is_a_benign_no_op() {
        let control = Arc::new(MockControl::new());
        control.set_connection(Some(live("Cafe", "AA:BB", true, true)));
        let connector = connector(&control);

        let start = connector.connect(&ap("Cafe", "AA:BB", "[ESS]")).unwrap();
        assert!(matches!(start, ConnectStart::AlreadyConnected));
        assert_eq!(connector.phase(), ConnectPhase::Idle);
        assert!(!connector.is_connecting());
        assert!(!connector.scanner.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn radio_off_rejects_the_attempt() {
        let control = Arc::new(MockControl::new());
        control.set_radio_state(RadioState::Disabled);
        let connector = connector(&control);

        let err = connector.connect(&ap("Cafe", "AA:BB", "[ESS]")).unwrap_err();
        assert!(matches!(err, WifiError::RadioDisabled));
    }

    #[tokio::test(start_paused = true)]
    async fn saved_network_connects_by_id_and_confirms() {
        let control = Arc::new(MockControl::new());
        let mut saved = SavedConfig::new("Cafe");
        saved.network_id = 42;
        control.add_saved(saved);
        // One sample for the pre-connect check, two sleepy poll samples,
        // then the steady value has the link up on iteration 3.
        control.script_connection_info(vec![
            None,
            Some(live("Cafe", "AA:BB", false, false)),
            Some(live("Cafe", "AA:BB", true, false)),
        ]);
        control.set_connection(Some(live("Cafe", "AA:BB", true, true)));

        let connector = connector(&control);
        let start = connector
            .connect(&ap("Cafe", "AA:BB", "[RSN-PSK-CCMP]"))
            .unwrap();
        let handle = match start {
            ConnectStart::Pending(handle) => handle,
            other => panic!("expected Pending, got {other:?}"),
        };

        assert_eq!(connector.phase(), ConnectPhase::Confirming);
        assert!(connector.is_connecting());
        assert_eq!(control.connect_calls(), vec![42]);
        assert_eq!(control.enable_calls(), vec![(42, true)]);

        let before = tokio::time::Instant::now();
        let outcome = handle.wait().await;
        assert_eq!(outcome, ConnectOutcome::Connected);
        // Confirmed on the third sample, well inside the 10 s window.
        assert_eq!(before.elapsed(), CONFIRM_INTERVAL * 3);

        assert_eq!(connector.phase(), ConnectPhase::Connected);
        assert!(!connector.is_connecting());
        assert!(!connector.scanner.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_poll_window_fails_and_resumes_scanning() {
        let control = Arc::new(MockControl::new());
        let mut saved = SavedConfig::new("Cafe");
        saved.network_id = 7;
        control.add_saved(saved);
        // Never completes: association hangs forever.
        control.set_connection(Some(live("Cafe", "AA:BB", false, false)));

        let connector = connector(&control);
        let handle = match connector
            .connect(&ap("Cafe", "AA:BB", "[RSN-PSK-CCMP]"))
            .unwrap()
        {
            ConnectStart::Pending(handle) => handle,
            other => panic!("expected Pending, got {other:?}"),
        };

        let before = tokio::time::Instant::now();
        let outcome = handle.wait().await;
        assert_eq!(outcome, ConnectOutcome::Failed);
        assert_eq!(before.elapsed(), CONFIRM_INTERVAL * CONFIRM_ATTEMPTS);

        assert_eq!(connector.phase(), ConnectPhase::Failed);
        assert!(!connector.is_connecting());
        assert!(!connector.scanner.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_ssid_sentinel_fails_fast() {
        let control = Arc::new(MockControl::new());
        let mut saved = SavedConfig::new(UNKNOWN_SSID);
        saved.network_id = 9;
        control.add_saved(saved);

        let connector = connector(&control);
        let handle = match connector.connect(&ap(UNKNOWN_SSID, "AA:BB", "[ESS]")).unwrap() {
            ConnectStart::Pending(handle) => handle,
            other => panic!("expected Pending, got {other:?}"),
        };

        let before = tokio::time::Instant::now();
        assert_eq!(handle.wait().await, ConnectOutcome::Failed);
        // One sleep, then the sentinel short-circuits the window.
        assert_eq!(before.elapsed(), CONFIRM_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn unsaved_secured_network_defers_for_a_password() {
        let control = Arc::new(MockControl::new());
        let connector = connector(&control);

        let start = connector
            .connect(&ap("Cafe", "AA:BB", "[RSN-PSK-CCMP]"))
            .unwrap();
        assert!(matches!(start, ConnectStart::NeedsPassword));
        // The credentials exchange owns the radio until it finishes.
        assert!(connector.scanner.is_paused());
        assert!(!connector.is_connecting());
    }

    #[tokio::test(start_paused = true)]
    async fn unsaved_enterprise_network_defers_for_provisioning() {
        let control = Arc::new(MockControl::new());
        let connector = connector(&control);

        let start = connector
            .connect(&ap("Corp", "AA:BB", "[RSN-EAP-CCMP]"))
            .unwrap();
        assert!(matches!(start, ConnectStart::NeedsEnterpriseSetup));
    }

    #[tokio::test(start_paused = true)]
    async fn open_network_connects_directly_with_synthesized_config() {
        let control = Arc::new(MockControl::new());
        control.set_connection(Some(live("Open", "AA:BB", true, true)));
        // Keep the pre-connect check from seeing the target as live.
        control.script_connection_info(vec![None]);

        let connector = connector(&control);
        let handle = match connector.connect(&ap("Open", "AA:BB", "[ESS]")).unwrap() {
            ConnectStart::Pending(handle) => handle,
            other => panic!("expected Pending, got {other:?}"),
        };

        let connects = control.config_connects();
        assert_eq!(connects.len(), 1);
        assert!(connects[0].allows(KeyMgmt::None));

        assert_eq!(handle.wait().await, ConnectOutcome::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn unprivileged_open_connect_reports_distinct_outcome() {
        let control = Arc::new(MockControl::new());
        control.set_privileged(false);
        let connector = connector(&control);

        let err = connector.connect(&ap("Open", "AA:BB", "[ESS]")).unwrap_err();
        assert!(matches!(err, WifiError::PrivilegeRequired(_)));
        // Terminal error: scanning resumed, flag cleared.
        assert!(!connector.scanner.is_paused());
        assert!(!connector.is_connecting());
        assert_eq!(connector.phase(), ConnectPhase::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn password_connect_builds_psk_profile_and_confirms() {
        let control = Arc::new(MockControl::new());
        control.set_connection(Some(live("Cafe", "AA:BB", true, true)));

        let connector = connector(&control);
        let handle = connector
            .connect_with_password(&ap("Cafe", "AA:BB", "[RSN-PSK-CCMP]"), "hunter22")
            .unwrap();

        let connects = control.config_connects();
        assert_eq!(connects.len(), 1);
        assert!(connects[0].allows(KeyMgmt::WpaPsk));
        assert_eq!(connects[0].psk.as_deref(), Some("hunter22"));

        assert_eq!(handle.wait().await, ConnectOutcome::Connected);
        assert!(!connector.scanner.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn password_connect_rejects_enterprise_targets() {
        let control = Arc::new(MockControl::new());
        let connector = connector(&control);

        let err = connector
            .connect_with_password(&ap("Corp", "AA:BB", "[RSN-EAP-CCMP]"), "nope")
            .unwrap_err();
        assert!(matches!(err, WifiError::InvalidSecurityState(_)));
        assert!(!connector.scanner.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_poll_without_resuming_scans() {
        let control = Arc::new(MockControl::new());
        let mut saved = SavedConfig::new("Cafe");
        saved.network_id = 5;
        control.add_saved(saved);

        let connector = connector(&control);
        let handle = match connector
            .connect(&ap("Cafe", "AA:BB", "[RSN-PSK-CCMP]"))
            .unwrap()
        {
            ConnectStart::Pending(handle) => handle,
            other => panic!("expected Pending, got {other:?}"),
        };

        handle.cancel();
        assert_eq!(handle.wait().await, ConnectOutcome::Cancelled);
        assert_eq!(connector.phase(), ConnectPhase::Idle);
        assert!(!connector.is_connecting());
        // Teardown owns the scanner; the poll must not restart it.
        assert!(connector.scanner.is_paused());
    }
}
