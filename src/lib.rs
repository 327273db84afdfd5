//! WiFi Tracker Library
//!
//! This library discovers, ranks, and connects to WiFi access points. It
//! merges raw scan results, saved profiles, and live connection state into
//! a stable sorted network list, and drives connection attempts through a
//! bounded confirmation poll, all against a pluggable OS control surface.
//!
//! # Modules
//!
//! - [`access_point`] - the aggregated network entity and ranking order
//! - [`aggregator`] - scan/profile/connection merge into the ranked list
//! - [`config`] - CLI configuration and stored credentials
//! - [`connection`] - connection attempt state machine and poller
//! - [`control`] - the `WifiControl` trait and its data types
//! - [`error`] - crate error type
//! - [`mock`] - scriptable in-memory control surface
//! - [`nmcli`] - NetworkManager-backed control surface
//! - [`scanner`] - periodic rescan scheduler
//! - [`security`] - security classification rule tables
//! - [`session`] - session object wiring the pieces together
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use wifi_tracker::{NmcliControl, Session, WifiEvent};
//!
//! # fn main() -> Result<(), wifi_tracker::WifiError> {
//! let control = Arc::new(NmcliControl::new(None)?);
//! let session = Session::new(control);
//! session.start();
//!
//! // Feed platform notifications in; read ranked snapshots out.
//! session.handle_event(WifiEvent::ScanResultsAvailable);
//! for ap in session.access_points() {
//!     println!("{} ({})", ap.ssid, ap.security_label(true));
//! }
//! # Ok(())
//! # }
//! ```

/// The AccessPoint entity: identity keys, signal smoothing, merge logic,
/// and the ranking comparator.
pub mod access_point;

/// Aggregation of scan results, saved profiles, and connection state into
/// the ranked AccessPoint list.
pub mod aggregator;

/// Configuration module for the CLI: default interface and stored
/// network credentials in a TOML file.
pub mod config;

/// Connection attempt state machine with the bounded confirmation poll.
pub mod connection;

/// The `WifiControl` trait abstracting the OS WiFi surface, plus the data
/// types consumed across it.
pub mod control;

/// Error module defining the crate error type.
/// Uses `thiserror` for ergonomic error handling.
pub mod error;

/// Scriptable in-memory control surface for tests and demo runs.
pub mod mock;

/// NetworkManager (`nmcli`) control surface implementation.
pub mod nmcli;

/// Periodic rescan scheduler with bounded rejection tracking.
pub mod scanner;

/// Security classification rule tables and display labels.
pub mod security;

/// The session object owning the list, scheduler, and connector.
pub mod session;

// Re-export the core entity and list building for convenient access
pub use access_point::{signal_level, AccessPoint, SIGNAL_LEVELS, UNREACHABLE_RSSI};
pub use aggregator::{make_access_points, make_saved_access_points};

// Re-export the connection machinery
pub use connection::{ConnectHandle, ConnectOutcome, ConnectPhase, ConnectStart, Connector};

// Re-export the control surface trait, its data types, and the backends
pub use control::{
    ConnectionInfo, RadioState, SavedConfig, ScanResult, SupplicantState, WifiControl, WifiEvent,
};
pub use mock::MockControl;
pub use nmcli::NmcliControl;

// Re-export the main error type for library users
pub use error::WifiError;

// Re-export the scheduler and session types
pub use scanner::Scanner;
pub use security::Security;
pub use session::Session;
