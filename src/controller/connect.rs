//! Bring-up and bounded connect attempts.

use super::{Controller, MODE_SETTLE};
use crate::clock::Clock;
use crate::link::{RadioMode, RecoveryPortal, WiredLink, WirelessLink};
use crate::status::LinkEvent;
use crate::wifi::WifiCredentials;
use log::{debug, info, warn};

impl<E, W, P, C> Controller<E, W, P, C>
where
    E: WiredLink,
    W: WirelessLink,
    P: RecoveryPortal,
    C: Clock,
{
    /// Establish initial connectivity. Runs once at startup and blocks.
    ///
    /// Tries wired first, then stored WiFi credentials, then `fixed`. If all
    /// fail the recovery portal is opened and `false` is returned. `fixed` is
    /// kept for wired-loss recovery until a portal produces a connection.
    pub fn bring_up(&mut self, fixed: Option<WifiCredentials>) -> bool {
        self.state.fixed_credentials = fixed;
        info!("Starting network bring-up as {}", self.config.hostname);

        let connected = if self.connect_wired() {
            self.record(LinkEvent::WiredAcquired);
            true
        } else {
            info!("Ethernet unavailable, falling back to WiFi");
            let mut connected = self.connect_wireless(None);
            if !connected {
                if let Some(credentials) = self.state.fixed_credentials.clone() {
                    connected = self.connect_wireless(Some(&credentials));
                }
            }
            if !connected {
                warn!("No network connection, starting config portal");
                self.open_portal();
            }
            connected
        };

        self.state.previous_wired_up = self.state.wired_up;
        self.state.previous_any_up = self.state.wired_up || self.state.wireless_up;
        self.publish();
        connected
    }

    /// Start the wired driver and wait up to `wired_timeout` for an address.
    pub(super) fn connect_wired(&mut self) -> bool {
        self.state.wired_up = false;

        if let Err(e) = self.wired.begin(&self.config.hostname) {
            warn!("Ethernet init failed: {}", e);
            return false;
        }
        if !self.wired.hardware_present() {
            warn!("Ethernet hardware not found");
            return false;
        }
        if !self.wired.cable_up() {
            info!("Ethernet cable not connected");
            return false;
        }

        info!("Waiting for Ethernet address");
        let start = self.clock.now();
        while !self.wired.has_address()
            && self.clock.now().elapsed_since(start) < self.config.wired_timeout
        {
            self.clock.delay(self.config.poll_interval);
            self.wired.maintain();
        }

        let address = self.wired.current_address();
        let up = self.wired.connected() && !address.is_unspecified();
        if up {
            info!("Ethernet connected, IP: {}", address);
        } else {
            warn!("Ethernet address timeout");
        }
        self.state.wired_up = up;
        up
    }

    /// One bounded WiFi attempt, with `credentials` or the stored ones.
    ///
    /// Waits up to `wifi_connect_timeout` unless the attempt cannot be issued.
    pub(super) fn connect_wireless(&mut self, credentials: Option<&WifiCredentials>) -> bool {
        match credentials {
            Some(c) => info!("Connecting to WiFi {} (fixed credentials)", c.ssid()),
            None => info!("Connecting to WiFi (stored credentials)"),
        }

        if let Err(e) = self.wireless.set_mode(RadioMode::Station) {
            warn!("Failed to switch WiFi to station mode: {}", e);
        }
        self.wireless.disconnect();
        self.clock.delay(MODE_SETTLE);
        if let Err(e) = self.wireless.set_hostname(&self.config.hostname) {
            warn!("Failed to set WiFi hostname: {}", e);
        }

        let issued = match credentials {
            Some(c) => self.wireless.connect_with_credentials(c),
            None => self.wireless.connect_with_stored_credentials(),
        };
        if let Err(e) = issued {
            info!("WiFi connect not started: {}", e);
            self.state.wireless_up = false;
            return false;
        }

        let start = self.clock.now();
        while !self.wireless.is_connected()
            && self.clock.now().elapsed_since(start) < self.config.wifi_connect_timeout
        {
            self.clock.delay(self.config.poll_interval);
        }

        let up = self.wireless.is_connected();
        if up {
            self.wireless.maintain();
            info!("WiFi connected, IP: {}", self.wireless.current_address());
        } else {
            warn!("WiFi connection timeout");
        }
        self.state.wireless_up = up;
        up
    }

    /// Wired-loss cascade: fixed credentials, stored credentials, portal.
    ///
    /// Returns whether WiFi came up.
    pub(super) fn recover_wireless(&mut self) -> bool {
        if let Some(credentials) = self.state.fixed_credentials.clone() {
            if self.connect_wireless(Some(&credentials)) {
                self.record(LinkEvent::Failover);
                return true;
            }
        } else {
            debug!("No fixed WiFi credentials held");
        }

        if self.connect_wireless(None) {
            self.record(LinkEvent::Failover);
            return true;
        }

        warn!("WiFi failover failed, starting config portal");
        self.open_portal();
        false
    }
}
