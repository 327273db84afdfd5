use thiserror::Error;

#[derive(Error, Debug)]
pub enum WifiError {
    #[error("WiFi radio is disabled")]
    RadioDisabled,

    #[error("No WiFi interface found")]
    NoWifiInterface,

    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    #[error("Interface '{0}' is not a WiFi device")]
    NotWifiInterface(String),

    #[error("Failed to execute nmcli: {0}")]
    CommandFailed(String),

    #[error("Failed to parse control surface output: {0}")]
    ParseFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Network '{0}' not found")]
    NetworkNotFound(String),

    #[error("Operation requires a privileged execution context: {0}")]
    PrivilegeRequired(String),

    #[error("Cannot build an open network config for security type {0}")]
    InvalidSecurityState(String),
}
