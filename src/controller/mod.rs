//! The connectivity controller.
//!
//! A single polled state machine that arbitrates between a preferred wired
//! link and a fallback WiFi radio, and opens a recovery portal when neither
//! can connect on its own. It owns its collaborators and clock; nothing is
//! global and nothing runs concurrently.
//!
//! # Driving it
//!
//! Call [`Controller::bring_up`] once at startup, then [`Controller::tick`]
//! every few tens to hundreds of milliseconds from the main loop.
//!
//! ```
//! use link_arbiter_esp32::config::ControllerConfig;
//! use link_arbiter_esp32::controller::{Controller, LinkState};
//! use link_arbiter_esp32::sim::{SimClock, SimPortal, SimWiredLink, SimWirelessLink};
//!
//! let mut controller = Controller::new(
//!     ControllerConfig::new("sensor-07"),
//!     SimWiredLink::plugged(),
//!     SimWirelessLink::new(),
//!     SimPortal::new(),
//!     SimClock::new(),
//! )
//! .unwrap();
//!
//! assert!(controller.bring_up(None));
//! controller.tick();
//! assert_eq!(controller.state(), LinkState::Wired);
//! ```
//!
//! # Latency
//!
//! Most ticks return immediately. The tick on which the wired link drops runs
//! the WiFi recovery cascade inline: up to two bounded connect attempts
//! (`wifi_connect_timeout` each) plus the portal start-up. That stall is the
//! price of reacting on the same tick; the scheduler must tolerate it.
//! Bring-up blocks for at most the wired bound plus two WiFi bounds.
//!
//! # Priorities
//!
//! Wired always wins. Whenever the wired link has an address, WiFi is
//! disconnected and the portal stopped, regardless of how they came up.

mod connect;
mod portal;
#[cfg(test)]
mod test_support;

use crate::clock::{Clock, Timestamp};
use crate::config::{ConfigError, ControllerConfig};
use crate::link::{RadioMode, RecoveryPortal, WiredLink, WirelessLink};
use crate::status::{LinkEvent, LinkStats, LinkStatus};
use crate::wifi::WifiCredentials;
use log::{debug, info, warn};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Pause after switching radio mode before issuing the next radio command.
const MODE_SETTLE: Duration = Duration::from_millis(100);

/// Which path currently carries connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LinkState {
    /// Wired link up.
    Wired = 0,
    /// WiFi station associated, wired down.
    Wireless = 1,
    /// No connectivity, recovery portal running.
    Portal = 2,
    /// No connectivity, no portal; only idle reconnects.
    Idle = 3,
}

impl LinkState {
    /// Short name for logs and status output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wired => "wired",
            Self::Wireless => "wireless",
            Self::Portal => "portal",
            Self::Idle => "idle",
        }
    }

    /// Inverse of `state as u8`; unknown values map to `Idle`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Wired,
            1 => Self::Wireless,
            2 => Self::Portal,
            _ => Self::Idle,
        }
    }

    /// Whether any interface is carrying traffic.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Wired | Self::Wireless)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controller-owned connectivity state.
#[derive(Debug, Default)]
struct ConnectivityState {
    wired_up: bool,
    wireless_up: bool,
    portal_active: bool,
    previous_wired_up: bool,
    previous_any_up: bool,
    portal_started_at: Timestamp,
    last_reconnect_attempt_at: Timestamp,
    /// Cleared once the portal produces a connection.
    fixed_credentials: Option<WifiCredentials>,
}

/// Link arbitration and recovery state machine.
pub struct Controller<E, W, P, C> {
    config: ControllerConfig,
    wired: E,
    wireless: W,
    portal: P,
    clock: C,
    state: ConnectivityState,
    stats: Option<Arc<LinkStats>>,
}

impl<E, W, P, C> Controller<E, W, P, C>
where
    E: WiredLink,
    W: WirelessLink,
    P: RecoveryPortal,
    C: Clock,
{
    /// Create a controller with no connectivity and no portal.
    ///
    /// Nothing is touched until [`Controller::bring_up`].
    pub fn new(
        config: ControllerConfig,
        wired: E,
        wireless: W,
        portal: P,
        clock: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            wired,
            wireless,
            portal,
            clock,
            state: ConnectivityState::default(),
            stats: None,
        })
    }

    /// Publish status and event counters into `stats` after every tick.
    pub fn with_stats(mut self, stats: Arc<LinkStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Run one maintenance step. See the module docs for blocking behaviour.
    pub fn tick(&mut self) {
        self.wired.maintain();
        self.wireless.maintain();
        let wired_address = self.wired.current_address();
        let wired_now = self.wired.connected() && !wired_address.is_unspecified();
        let mut wireless_now = self.wireless.is_connected();

        if wired_now {
            if !self.state.previous_wired_up {
                info!("Ethernet connected, IP: {}", wired_address);
                self.record(LinkEvent::WiredAcquired);
            }
            if wireless_now {
                info!("Disconnecting WiFi, Ethernet has priority");
                self.wireless.disconnect();
                wireless_now = false;
            }
            self.close_portal();
        } else if !self.state.previous_wired_up
            && self.wired.cable_up()
            && wired_address.is_unspecified()
        {
            debug!("Ethernet cable detected, waiting for IP");
        }

        if self.state.previous_wired_up && !wired_now {
            warn!("Ethernet disconnected");
            wireless_now = self.recover_wireless();
        }

        self.state.wired_up = wired_now;
        self.state.wireless_up = wireless_now;
        let any_now = wired_now || wireless_now;

        if self.state.portal_active {
            self.maintain_portal(any_now);
        }

        if self.state.previous_any_up && !any_now {
            warn!("Connection lost");
            if !self.state.portal_active && !wired_now {
                info!("Opening config portal due to connection loss");
                self.open_portal();
            }
        } else if !self.state.previous_any_up && any_now {
            info!("Connection restored via {}", if wired_now { "Ethernet" } else { "WiFi" });
            self.close_portal();
        }

        if !wired_now && !wireless_now && !self.state.portal_active {
            self.retry_idle();
        }

        self.state.previous_wired_up = wired_now;
        self.state.previous_any_up = any_now;

        if let Some(stats) = &self.stats {
            stats.ticks.fetch_add(1, Ordering::Relaxed);
        }
        self.publish();
    }

    /// Periodic WiFi retry while nothing is connected and no portal runs.
    ///
    /// The attempt is stamped whether or not it is issued successfully.
    fn retry_idle(&mut self) {
        let now = self.clock.now();
        if now.elapsed_since(self.state.last_reconnect_attempt_at) < self.config.reconnect_interval
        {
            return;
        }

        info!("Attempting WiFi reconnect");
        if self.wireless.mode() != RadioMode::Station {
            if let Err(e) = self.wireless.set_mode(RadioMode::Station) {
                warn!("Failed to switch WiFi to station mode: {}", e);
            }
            self.clock.delay(MODE_SETTLE);
        }
        if let Err(e) = self.wireless.reconnect() {
            debug!("WiFi reconnect not issued: {}", e);
        }
        self.state.last_reconnect_attempt_at = now;
        self.record(LinkEvent::ReconnectAttempt);
    }

    fn record(&self, event: LinkEvent) {
        if let Some(stats) = &self.stats {
            stats.record(event);
        }
    }

    fn publish(&self) {
        if let Some(stats) = &self.stats {
            stats.publish(&self.status());
        }
    }

    /// Wired link up, by both the last tick and the driver right now.
    pub fn wired_connected(&self) -> bool {
        self.state.wired_up && self.wired.connected() && self.wired.has_address()
    }

    /// WiFi station associated, by both the last tick and the radio right now.
    pub fn wireless_connected(&self) -> bool {
        self.state.wireless_up && self.wireless.is_connected()
    }

    /// Either interface connected.
    pub fn any_connected(&self) -> bool {
        self.wired_connected() || self.wireless_connected()
    }

    /// Recovery portal running.
    pub fn portal_active(&self) -> bool {
        self.state.portal_active && self.portal.is_running()
    }

    /// Wired address, `0.0.0.0` if none.
    pub fn wired_address(&self) -> Ipv4Addr {
        self.wired.current_address()
    }

    /// WiFi station address, `0.0.0.0` if none.
    pub fn wireless_address(&self) -> Ipv4Addr {
        self.wireless.current_address()
    }

    /// Whether operator-supplied credentials are still held.
    pub fn has_fixed_credentials(&self) -> bool {
        self.state.fixed_credentials.is_some()
    }

    /// Which path currently carries connectivity.
    pub fn state(&self) -> LinkState {
        if self.wired_connected() {
            LinkState::Wired
        } else if self.wireless_connected() {
            LinkState::Wireless
        } else if self.portal_active() {
            LinkState::Portal
        } else {
            LinkState::Idle
        }
    }

    /// Snapshot of all accessors.
    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            state: self.state(),
            wired_connected: self.wired_connected(),
            wireless_connected: self.wireless_connected(),
            portal_active: self.portal_active(),
            wired_address: self.wired_address(),
            wireless_address: self.wireless_address(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The wired link.
    pub fn wired(&self) -> &E {
        &self.wired
    }

    /// Mutable access to the wired link.
    pub fn wired_mut(&mut self) -> &mut E {
        &mut self.wired
    }

    /// The WiFi radio.
    pub fn wireless(&self) -> &W {
        &self.wireless
    }

    /// Mutable access to the WiFi radio.
    pub fn wireless_mut(&mut self) -> &mut W {
        &mut self.wireless
    }

    /// The recovery portal.
    pub fn portal(&self) -> &P {
        &self.portal
    }

    /// Mutable access to the recovery portal.
    pub fn portal_mut(&mut self) -> &mut P {
        &mut self.portal
    }

    /// The clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Mutable access to the clock.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}
