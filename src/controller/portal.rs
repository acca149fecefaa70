//! Recovery portal lifecycle.

use super::{Controller, LinkEvent};
use crate::clock::{Clock, Timestamp};
use crate::link::{RadioMode, RecoveryPortal, WiredLink, WirelessLink};
use log::{info, warn};
use std::time::Duration;

/// Portal engine iterations run right after start so the AP is serviceable.
const PORTAL_WARMUP_POLLS: usize = 10;

const PORTAL_WARMUP_STEP: Duration = Duration::from_millis(100);

impl<E, W, P, C> Controller<E, W, P, C>
where
    E: WiredLink,
    W: WirelessLink,
    P: RecoveryPortal,
    C: Clock,
{
    /// Start the portal, or restart its timeout window if already running.
    ///
    /// Blocks for the warm-up, about one second.
    pub(super) fn open_portal(&mut self) {
        if self.state.portal_active {
            self.state.portal_started_at = self.clock.now();
            return;
        }

        let ap_name = self.config.portal_ap_name().to_string();
        info!("Starting WiFi configuration portal");
        if let Err(e) = self.wireless.set_mode(RadioMode::AccessPointStation) {
            warn!("Failed to switch WiFi to AP+STA mode: {}", e);
        }
        if let Err(e) = self.portal.start(&ap_name, &self.config.portal_address) {
            warn!("Config portal failed to start: {}", e);
            if let Err(e) = self.wireless.set_mode(RadioMode::Station) {
                warn!("Failed to restore WiFi station mode: {}", e);
            }
            return;
        }

        self.state.portal_active = true;
        self.state.portal_started_at = self.clock.now();
        self.record(LinkEvent::PortalOpened);
        info!("Config portal active: {}", ap_name);
        info!("AP IP: {}", self.config.portal_address.ip);

        for _ in 0..PORTAL_WARMUP_POLLS {
            self.portal.poll();
            self.clock.delay(PORTAL_WARMUP_STEP);
        }
    }

    /// Stop the portal and return the radio to station mode. No-op when closed.
    pub(super) fn close_portal(&mut self) {
        if !self.state.portal_active {
            return;
        }
        info!("Stopping config portal");
        self.portal.stop();
        self.state.portal_active = false;
        if let Err(e) = self.wireless.set_mode(RadioMode::Station) {
            warn!("Failed to restore WiFi station mode: {}", e);
        }
    }

    /// Per-tick portal upkeep: engine poll, mode repair, success and timeout.
    pub(super) fn maintain_portal(&mut self, any_now: bool) {
        self.portal.poll();

        if !self.wireless.mode().has_access_point() {
            warn!("WiFi left AP mode while portal active, restoring AP+STA");
            if let Err(e) = self.wireless.set_mode(RadioMode::AccessPointStation) {
                warn!("Failed to restore AP+STA mode: {}", e);
            }
        }

        if self.portal.resulted_in_connection() || self.state.wireless_up {
            info!("WiFi configured via portal");
            self.state.fixed_credentials = None;
            self.record(LinkEvent::PortalSucceeded);
            self.close_portal();
            return;
        }

        let elapsed = self.clock.now().elapsed_since(self.state.portal_started_at);
        if !any_now && elapsed > self.config.portal_timeout {
            info!("Config portal timeout, stopping");
            self.record(LinkEvent::PortalTimedOut);
            self.close_portal();
            self.state.portal_started_at = Timestamp::ZERO;
        }
    }
}
