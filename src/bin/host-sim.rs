//! Interactive host simulator for the link controller.
//!
//! Runs the real controller against simulated Ethernet, WiFi and portal, so
//! failover and recovery can be watched from a terminal:
//!
//! ```bash
//! RUST_LOG=debug LINK_WIFI_SSID=Workshop LINK_WIFI_PASSWORD=password123 \
//!     cargo run --bin host-sim
//! ```
//!
//! ## Commands
//!
//! - `plug` / `unplug` - Ethernet cable
//! - `wifi <ssid> [password]` / `wifi-off` - WiFi network in range
//! - `submit <ssid> [password]` - Operator uses the config portal
//! - `drop-mode` - Radio falls out of AP+STA
//! - `status` - Show link status
//! - `help` - Show help
//!
//! ## Endpoints
//!
//! - Status: http://localhost:8080/status

use link_arbiter_esp32::config::{credentials_from_lookup, ControllerConfig};
use link_arbiter_esp32::console::{SimCommand, HELP_TEXT};
use link_arbiter_esp32::sim::{SimPortal, SimWiredLink, SimWirelessLink};
use link_arbiter_esp32::{
    Controller, LinkStats, RadioMode, RecoveryPortal, StatusServer, SystemClock, WirelessLink,
    DEFAULT_STATUS_PORT,
};
use log::{error, info, warn};
use std::io::{BufRead, Write};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Controller tick period.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

type HostController = Controller<SimWiredLink, SimWirelessLink, SimPortal, SystemClock>;

fn print_prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== Link arbiter host simulator starting ===");

    let config = match ControllerConfig::from_env("host-sim") {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let fixed = match credentials_from_lookup(|key| std::env::var(key).ok()) {
        Ok(fixed) => fixed,
        Err(e) => {
            error!("Invalid WiFi credentials: {}", e);
            std::process::exit(1);
        }
    };

    // Fixed credentials describe a network that is actually out there.
    let mut wireless = SimWirelessLink::new();
    if let Some(credentials) = &fixed {
        wireless = wireless.with_network(credentials.clone());
    }

    let stats = Arc::new(LinkStats::new(config.hostname.clone()));
    let mut controller = match Controller::new(
        config,
        SimWiredLink::unplugged(),
        wireless,
        SimPortal::new(),
        SystemClock::new(),
    ) {
        Ok(controller) => controller.with_stats(stats.clone()),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Keep server alive - variable intentionally unused except for Drop
    let _status_server = match StatusServer::start(None, DEFAULT_STATUS_PORT, stats.clone()) {
        Ok(server) => {
            info!(
                "Status server running at http://localhost:{}/status",
                server.port()
            );
            Some(server)
        }
        Err(e) => {
            warn!("Failed to start status server: {}", e);
            warn!("Continuing without status server");
            None
        }
    };

    let online = tokio::task::block_in_place(|| controller.bring_up(fixed));
    info!(
        "Bring-up finished: {} ({})",
        if online { "online" } else { "offline" },
        controller.state()
    );

    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nShutting down...");
        }
        signal_cancel.cancel();
    });

    // Plain thread: a blocked stdin read must not hold up runtime shutdown.
    let (command_tx, mut command_rx) = mpsc::channel::<SimCommand>(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if command_tx.blocking_send(SimCommand::parse(&line)).is_err() {
                break;
            }
        }
    });

    println!("Type 'help' for commands");
    print_prompt();

    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            command = command_rx.recv() => match command {
                Some(command) => {
                    handle_command(&mut controller, &stats, command);
                    print_prompt();
                }
                None => {
                    info!("Console closed, running until Ctrl+C");
                    cancel.cancelled().await;
                    break;
                }
            },

            _ = ticker.tick() => {
                tokio::task::block_in_place(|| controller.tick());
            }
        }
    }

    info!("Shutdown complete");
}

fn handle_command(controller: &mut HostController, stats: &LinkStats, command: SimCommand) {
    match command {
        SimCommand::Plug => {
            controller.wired_mut().plug();
            println!("Ethernet cable plugged in");
        }
        SimCommand::Unplug => {
            controller.wired_mut().unplug();
            println!("Ethernet cable pulled");
        }
        SimCommand::Wifi(credentials) => {
            println!("WiFi network {} in range", credentials.ssid());
            controller.wireless_mut().set_network(Some(credentials));
        }
        SimCommand::WifiOff => {
            controller.wireless_mut().set_network(None);
            println!("WiFi network out of range");
        }
        SimCommand::Submit(credentials) => submit(controller, credentials),
        SimCommand::DropMode => {
            controller.wireless_mut().force_mode(RadioMode::Station);
            println!("Radio forced to station mode");
        }
        SimCommand::Status => print_status(controller, stats),
        SimCommand::Help => println!("{}", HELP_TEXT),
        SimCommand::Unknown(msg) => {
            if !msg.is_empty() {
                println!("{}", msg);
            }
        }
    }
}

/// What the portal does with submitted credentials: try them on the station.
fn submit(controller: &mut HostController, credentials: link_arbiter_esp32::WifiCredentials) {
    if !controller.portal().is_running() {
        println!("Config portal is not running");
        return;
    }

    if let Err(e) = controller
        .wireless_mut()
        .connect_with_credentials(&credentials)
    {
        println!("Portal: connect failed: {}", e);
        return;
    }
    if controller.wireless().is_connected() {
        controller.portal_mut().complete();
        println!("Portal: connected to {}", credentials.ssid());
    } else {
        println!("Portal: could not connect to {}", credentials.ssid());
    }
}

fn print_status(controller: &HostController, stats: &LinkStats) {
    let status = controller.status();
    println!();
    println!("=== Link Status ===");
    println!("Hostname:   {}", stats.hostname());
    println!("State:      {}", status.state);
    println!(
        "Ethernet:   {} ({})",
        if status.wired_connected { "up" } else { "down" },
        status.wired_address
    );
    println!(
        "WiFi:       {} ({}, mode {})",
        if status.wireless_connected { "up" } else { "down" },
        status.wireless_address,
        controller.wireless().mode()
    );
    println!(
        "Portal:     {}",
        if status.portal_active { "active" } else { "inactive" }
    );
    println!(
        "Events:     {} failovers, {} portals, {} reconnects",
        stats.failovers.load(Ordering::Relaxed),
        stats.portal_openings.load(Ordering::Relaxed),
        stats.reconnect_attempts.load(Ordering::Relaxed)
    );
    println!("Uptime:     {}s", stats.uptime_secs());
    println!();
}
