use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use wifi_tracker::{
    config::{Config, NetworkCredential},
    make_saved_access_points,
    mock::MockControl,
    nmcli::{self, NmcliControl},
    AccessPoint, ConnectHandle, ConnectOutcome, ConnectStart, ConnectionInfo, Session,
    WifiControl, WifiEvent,
};

#[derive(Parser)]
#[command(name = "wifi-tracker")]
#[command(about = "Discover, rank, and connect to WiFi access points")]
#[command(version)]
struct Cli {
    /// Interface to use (defaults to the configured or first WiFi interface)
    #[arg(short, long, global = true)]
    interface: Option<String>,

    /// Run against the built-in mock control surface instead of nmcli
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available WiFi interfaces
    Interfaces,

    /// Scan and print the ranked access point list
    Scan {
        /// Emit the list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the live connection status
    Status {
        /// Emit the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// List saved network profiles
    Saved,

    /// Connect to an access point by SSID
    Connect {
        /// SSID of the network to connect to
        ssid: String,

        /// Password for the network (uses stored credentials if not provided)
        #[arg(short, long)]
        password: Option<String>,

        /// Store the credentials in the config file on success
        #[arg(short, long)]
        save: bool,
    },

    /// Rescan periodically and reprint the ranked list
    Watch {
        /// Number of refresh rounds before exiting
        #[arg(short, long, default_value = "5")]
        rounds: u32,

        /// Seconds between refreshes
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Store network credentials in the config file
    SaveNetwork {
        /// SSID of the network
        ssid: String,

        /// Password for the network
        #[arg(short, long)]
        password: String,
    },

    /// Show the configuration file
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Backend-independent commands first.
    match &cli.command {
        Commands::Interfaces => return cmd_interfaces(),
        Commands::SaveNetwork { ssid, password } => return cmd_save_network(ssid, password),
        Commands::ShowConfig => return cmd_show_config(),
        _ => {}
    }

    let config = Config::load().unwrap_or_default();

    if cli.mock {
        let control = Arc::new(MockControl::demo());
        run_command(control, cli.command, config).await
    } else {
        let interface = cli
            .interface
            .as_deref()
            .or(config.default_interface.as_deref());
        let control = Arc::new(NmcliControl::new(interface)?);
        run_command(control, cli.command, config).await
    }
}

async fn run_command<C: WifiControl + 'static>(
    control: Arc<C>,
    command: Commands,
    config: Config,
) -> Result<()> {
    let session = Session::new(control.clone());

    let result = match command {
        Commands::Scan { json } => cmd_scan(&session, json).await,
        Commands::Status { json } => cmd_status(control.as_ref(), json),
        Commands::Saved => cmd_saved(control.as_ref()),
        Commands::Connect {
            ssid,
            password,
            save,
        } => cmd_connect(&session, &config, &ssid, password.as_deref(), save).await,
        Commands::Watch { rounds, interval } => {
            let interval = interval
                .or(config.scan_interval_secs)
                .map(Duration::from_secs);
            cmd_watch(&session, rounds, interval).await
        }
        // Handled before the backend was built.
        Commands::Interfaces | Commands::SaveNetwork { .. } | Commands::ShowConfig => Ok(()),
    };

    session.shutdown();
    result
}

fn cmd_interfaces() -> Result<()> {
    let interfaces = nmcli::list_wifi_interfaces()?;

    if interfaces.is_empty() {
        println!("No WiFi interfaces found.");
        return Ok(());
    }

    println!("{:<16} {}", "INTERFACE", "STATE");
    println!("{}", "-".repeat(28));
    for iface in interfaces {
        println!("{:<16} {}", iface.name, iface.state);
    }

    Ok(())
}

async fn cmd_scan<C: WifiControl + 'static>(session: &Session<C>, json: bool) -> Result<()> {
    // The scheduler owns scan requests; starting it issues the rescan.
    session.start();

    // Give the radio a moment to sweep before reading results back.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let list = session.refresh();
    if json {
        let views: Vec<ApView> = list.iter().map(ApView::from).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else {
        display_access_points(&list);
    }

    Ok(())
}

fn cmd_status(control: &dyn WifiControl, json: bool) -> Result<()> {
    let info = control.connection_info();
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    match info {
        Some(info) => display_status(&info),
        None => println!("Not connected."),
    }

    Ok(())
}

fn cmd_saved(control: &dyn WifiControl) -> Result<()> {
    let saved = make_saved_access_points(control.saved_configs()?);

    if saved.is_empty() {
        println!("No saved networks.");
        return Ok(());
    }

    println!("{:<32} {:<24} {}", "SSID", "SECURITY", "NETWORK ID");
    println!("{}", "-".repeat(64));
    for ap in saved {
        let label = ap.security_label(false);
        let label = if label.is_empty() { "None" } else { label };
        println!("{:<32} {:<24} {}", truncate(&ap.ssid, 32), label, ap.network_id);
    }

    Ok(())
}

async fn cmd_connect<C: WifiControl + 'static>(
    session: &Session<C>,
    config: &Config,
    ssid: &str,
    password: Option<&str>,
    save: bool,
) -> Result<()> {
    session.refresh();
    let ap = session
        .access_points()
        .into_iter()
        .find(|ap| ap.ssid == ssid);
    let Some(ap) = ap else {
        bail!("Network '{}' not found in scan results", ssid);
    };
    let key = ap.key().to_string();

    println!("Connecting to '{}'...", ssid);
    match session.connect(&key)? {
        ConnectStart::AlreadyConnected => {
            println!("Already connected to '{}'.", ssid);
            return Ok(());
        }
        ConnectStart::NeedsEnterpriseSetup => {
            session.set_processing(false);
            bail!(
                "'{}' is an enterprise network; provision a profile for it first",
                ssid
            );
        }
        ConnectStart::NeedsPassword => {
            let password = match password {
                Some(p) => p.to_string(),
                None => match config.find_network(ssid) {
                    Some(stored) => {
                        println!("Using stored password for '{}'", ssid);
                        stored.password.clone()
                    }
                    None => {
                        session.set_processing(false);
                        bail!("No password provided and no stored credentials for '{}'", ssid);
                    }
                },
            };

            let handle = session.connect_with_password(&key, &password)?;
            finish_connect(session, handle, ssid).await?;

            if save {
                let mut stored = Config::load().unwrap_or_default();
                stored.add_network(NetworkCredential {
                    ssid: ssid.to_string(),
                    password,
                });
                stored.save()?;
                println!("Credentials saved to config.");
            }
        }
        ConnectStart::Pending(handle) => {
            finish_connect(session, handle, ssid).await?;
        }
    }

    Ok(())
}

async fn finish_connect<C: WifiControl + 'static>(
    session: &Session<C>,
    handle: ConnectHandle,
    ssid: &str,
) -> Result<()> {
    match handle.wait().await {
        ConnectOutcome::Connected => {
            println!("Connected successfully!");
            println!();
            if let Some(info) = session.control().connection_info() {
                display_status(&info);
            }
            Ok(())
        }
        ConnectOutcome::Failed => bail!("Connection to '{}' was not confirmed in time", ssid),
        ConnectOutcome::Cancelled => bail!("Connection attempt to '{}' was cancelled", ssid),
    }
}

async fn cmd_watch<C: WifiControl + 'static>(
    session: &Session<C>,
    rounds: u32,
    interval: Option<Duration>,
) -> Result<()> {
    let interval = interval.unwrap_or(Duration::from_secs(5));
    session.start();

    for round in 1..=rounds {
        tokio::time::sleep(interval).await;
        session.handle_event(WifiEvent::ScanResultsAvailable);

        println!("--- round {round}/{rounds} ---");
        display_access_points(&session.access_points());
        println!();
    }

    Ok(())
}

fn cmd_save_network(ssid: &str, password: &str) -> Result<()> {
    let mut config = Config::load().unwrap_or_default();
    config.add_network(NetworkCredential {
        ssid: ssid.to_string(),
        password: password.to_string(),
    });
    config.save()?;

    let path = wifi_tracker::config::config_path()?;
    println!("Saved network '{}' to {}", ssid, path.display());

    Ok(())
}

fn cmd_show_config() -> Result<()> {
    let path = wifi_tracker::config::config_path()?;
    println!("Config file: {}", path.display());
    println!();

    let config = Config::load()?;

    if let Some(iface) = &config.default_interface {
        println!("Default interface: {iface}");
    }
    if config.networks.is_empty() {
        println!("No stored networks.");
    } else {
        println!("{:<24} {}", "SSID", "PASSWORD");
        println!("{}", "-".repeat(40));
        for network in &config.networks {
            let masked = "*".repeat(network.password.len().min(12));
            println!("{:<24} {}", network.ssid, masked);
        }
    }

    Ok(())
}

/// JSON view of one ranked entry.
#[derive(Serialize)]
struct ApView {
    ssid: String,
    bssid: String,
    security: &'static str,
    level: Option<u8>,
    rssi: i32,
    saved: bool,
    connected: bool,
}

impl From<&AccessPoint> for ApView {
    fn from(ap: &AccessPoint) -> Self {
        Self {
            ssid: ap.ssid.clone(),
            bssid: ap.bssid.clone(),
            security: ap.security_label(true),
            level: ap.level(),
            rssi: ap.rssi,
            saved: ap.is_saved(),
            connected: ap.is_connected,
        }
    }
}

fn display_access_points(access_points: &[AccessPoint]) {
    if access_points.is_empty() {
        println!("No networks found.");
        return;
    }

    println!(
        "{:<32} {:>6} {:<6} {:<14} {}",
        "SSID", "RSSI", "SIGNAL", "SECURITY", "FLAGS"
    );
    println!("{}", "-".repeat(70));

    for ap in access_points {
        let mut flags = Vec::new();
        if ap.is_connected {
            flags.push("connected");
        }
        if ap.is_saved() {
            flags.push("saved");
        }

        let label = ap.security_label(true);
        println!(
            "{:<32} {:>6} {:<6} {:<14} {}",
            truncate(ap.title(), 32),
            ap.rssi,
            signal_to_bar(ap.level()),
            if label.is_empty() { "open" } else { label },
            flags.join(",")
        );
    }
}

fn display_status(info: &ConnectionInfo) {
    println!("Connected: {}", info.ssid);
    println!("BSSID:     {}", info.bssid);
    println!("State:     {:?}", info.supplicant_state);
    if let Some(ip) = info.ip_address {
        println!("IP:        {ip}");
    }
    println!("RSSI:      {}", info.rssi);
}

/// Visual bar for a 0-4 signal bucket.
fn signal_to_bar(level: Option<u8>) -> &'static str {
    match level {
        Some(4) => "████",
        Some(3) => "███░",
        Some(2) => "██░░",
        Some(1) => "█░░░",
        _ => "░░░░",
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() > max_len {
        format!("{}...", &s[..max_len - 3])
    } else {
        s.to_string()
    }
}
