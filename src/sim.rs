//! Simulated collaborators and clock.
//!
//! These stand in for the Ethernet driver, WiFi radio, recovery portal and
//! hardware timer so the controller can run on a host: deterministically in
//! unit tests (with [`SimClock`]) and interactively in the `host-sim` binary.
//!
//! Each simulated link records the calls the controller makes so tests can
//! assert on ordering, and exposes "world" knobs (plug a cable, bring a
//! network into range, finish the portal) that the controller itself never
//! touches.

use crate::clock::{Clock, Timestamp};
use crate::config::ApAddress;
use crate::link::{LinkError, RadioMode, RecoveryPortal, WiredLink, WirelessLink};
use crate::wifi::WifiCredentials;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default lease handed out by the simulated wired DHCP server.
pub const SIM_WIRED_LEASE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 42);

/// Default lease handed out by the simulated WiFi access point.
pub const SIM_WIRELESS_LEASE: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);

/// Manually advanced clock. [`Clock::delay`] advances time instantly.
#[derive(Debug, Default)]
pub struct SimClock {
    now: Timestamp,
    delayed: Duration,
}

impl SimClock {
    /// Clock at counter zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at `now`.
    pub fn starting_at(now: Timestamp) -> Self {
        Self {
            now,
            delayed: Duration::ZERO,
        }
    }

    /// Move time forward without counting it as a delay.
    pub fn advance(&mut self, duration: Duration) {
        self.now = self.now.wrapping_add(duration);
    }

    /// Jump to an absolute counter value.
    pub fn set(&mut self, now: Timestamp) {
        self.now = now;
    }

    /// Total time spent in [`Clock::delay`].
    pub fn total_delayed(&self) -> Duration {
        self.delayed
    }
}

impl Clock for SimClock {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn delay(&mut self, duration: Duration) {
        self.delayed += duration;
        self.advance(duration);
    }
}

/// Simulated Ethernet interface with a DHCP server behind the cable.
#[derive(Debug)]
pub struct SimWiredLink {
    present: bool,
    cable: bool,
    dhcp: bool,
    lease: Ipv4Addr,
    address: Ipv4Addr,
    hostname: Option<String>,
    maintain_calls: usize,
}

impl SimWiredLink {
    fn with(present: bool, cable: bool) -> Self {
        Self {
            present,
            cable,
            dhcp: true,
            lease: SIM_WIRED_LEASE,
            address: Ipv4Addr::UNSPECIFIED,
            hostname: None,
            maintain_calls: 0,
        }
    }

    /// No Ethernet controller on the board.
    pub fn absent() -> Self {
        Self::with(false, false)
    }

    /// Hardware present, cable unplugged.
    pub fn unplugged() -> Self {
        Self::with(true, false)
    }

    /// Hardware present, cable plugged into a network with DHCP.
    pub fn plugged() -> Self {
        Self::with(true, true)
    }

    /// Enable or disable the DHCP server behind the cable.
    pub fn with_dhcp(mut self, dhcp: bool) -> Self {
        self.dhcp = dhcp;
        self
    }

    /// Plug the cable in. The address arrives on the next lease cycle.
    pub fn plug(&mut self) {
        self.cable = true;
    }

    /// Pull the cable, losing the lease.
    pub fn unplug(&mut self) {
        self.cable = false;
        self.address = Ipv4Addr::UNSPECIFIED;
    }

    /// Start or stop answering DHCP.
    pub fn set_dhcp(&mut self, dhcp: bool) {
        self.dhcp = dhcp;
    }

    /// Hostname passed to [`WiredLink::begin`].
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Number of [`WiredLink::maintain`] calls.
    pub fn maintain_calls(&self) -> usize {
        self.maintain_calls
    }

    fn try_lease(&mut self) {
        if self.present && self.cable && self.dhcp {
            self.address = self.lease;
        }
    }
}

impl WiredLink for SimWiredLink {
    fn begin(&mut self, hostname: &str) -> Result<(), LinkError> {
        if !self.present {
            return Err(LinkError::HardwareAbsent);
        }
        self.hostname = Some(hostname.to_string());
        self.try_lease();
        Ok(())
    }

    fn hardware_present(&self) -> bool {
        self.present
    }

    fn cable_up(&self) -> bool {
        self.present && self.cable
    }

    fn connected(&self) -> bool {
        self.present && self.cable
    }

    fn current_address(&self) -> Ipv4Addr {
        self.address
    }

    fn maintain(&mut self) {
        self.maintain_calls += 1;
        self.try_lease();
    }
}

/// Calls made on a [`SimWirelessLink`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    SetMode(RadioMode),
    SetHostname(String),
    Disconnect,
    /// Connect with explicit credentials for this SSID.
    ConnectWith(String),
    ConnectStored,
    Reconnect,
}

/// Simulated WiFi radio with at most one network in range.
#[derive(Debug)]
pub struct SimWirelessLink {
    mode: RadioMode,
    in_range: Option<WifiCredentials>,
    stored: Option<WifiCredentials>,
    associated: Option<WifiCredentials>,
    /// Explicit credentials that associated but are not yet persisted.
    pending: Option<WifiCredentials>,
    hostname: Option<String>,
    calls: Vec<RadioCall>,
    maintain_calls: usize,
}

impl Default for SimWirelessLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWirelessLink {
    /// Radio off, no network in range, nothing stored.
    pub fn new() -> Self {
        Self {
            mode: RadioMode::Off,
            in_range: None,
            stored: None,
            associated: None,
            pending: None,
            hostname: None,
            calls: Vec::new(),
            maintain_calls: 0,
        }
    }

    /// Put a network in range; only these exact credentials associate.
    pub fn with_network(mut self, credentials: WifiCredentials) -> Self {
        self.in_range = Some(credentials);
        self
    }

    /// Pre-populate persisted credentials.
    pub fn with_stored(mut self, credentials: WifiCredentials) -> Self {
        self.stored = Some(credentials);
        self
    }

    /// Change the network in range. An association to a vanished network drops.
    pub fn set_network(&mut self, credentials: Option<WifiCredentials>) {
        if self.associated.is_some() && self.associated != credentials {
            self.associated = None;
        }
        self.in_range = credentials;
    }

    /// Change the mode behind the controller's back (platform dropping AP+STA).
    pub fn force_mode(&mut self, mode: RadioMode) {
        self.mode = mode;
    }

    /// Credentials the radio would use for a stored connect.
    pub fn stored(&self) -> Option<&WifiCredentials> {
        self.stored.as_ref()
    }

    /// Hostname last set.
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Every call made so far.
    pub fn calls(&self) -> &[RadioCall] {
        &self.calls
    }

    /// Forget recorded calls.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of [`WirelessLink::maintain`] calls.
    pub fn maintain_calls(&self) -> usize {
        self.maintain_calls
    }

    /// Connect-type calls only, in order.
    pub fn connect_calls(&self) -> Vec<RadioCall> {
        self.calls
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    RadioCall::ConnectWith(_) | RadioCall::ConnectStored | RadioCall::Reconnect
                )
            })
            .cloned()
            .collect()
    }

    /// Try to associate; returns whether it worked.
    fn attempt(&mut self, credentials: WifiCredentials) -> bool {
        let station = matches!(
            self.mode,
            RadioMode::Station | RadioMode::AccessPointStation
        );
        if station && self.in_range.as_ref() == Some(&credentials) {
            self.associated = Some(credentials);
            true
        } else {
            self.associated = None;
            false
        }
    }
}

impl WirelessLink for SimWirelessLink {
    fn set_mode(&mut self, mode: RadioMode) -> Result<(), LinkError> {
        self.calls.push(RadioCall::SetMode(mode));
        self.mode = mode;
        if matches!(mode, RadioMode::Off | RadioMode::AccessPoint) {
            self.associated = None;
        }
        Ok(())
    }

    fn mode(&self) -> RadioMode {
        self.mode
    }

    fn set_hostname(&mut self, hostname: &str) -> Result<(), LinkError> {
        self.calls.push(RadioCall::SetHostname(hostname.to_string()));
        self.hostname = Some(hostname.to_string());
        Ok(())
    }

    fn disconnect(&mut self) {
        self.calls.push(RadioCall::Disconnect);
        self.associated = None;
    }

    fn connect_with_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError> {
        self.calls
            .push(RadioCall::ConnectWith(credentials.ssid().to_string()));
        self.pending = None;
        if self.attempt(credentials.clone()) {
            self.pending = Some(credentials.clone());
        }
        Ok(())
    }

    fn connect_with_stored_credentials(&mut self) -> Result<(), LinkError> {
        self.calls.push(RadioCall::ConnectStored);
        self.pending = None;
        let stored = self.stored.clone().ok_or(LinkError::NotConfigured)?;
        self.attempt(stored);
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), LinkError> {
        self.calls.push(RadioCall::Reconnect);
        let stored = self.stored.clone().ok_or(LinkError::NotConfigured)?;
        self.attempt(stored);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.associated.is_some()
    }

    fn maintain(&mut self) {
        self.maintain_calls += 1;
        if self.associated.is_some() {
            if let Some(credentials) = self.pending.take() {
                self.stored = Some(credentials);
            }
        }
    }

    fn current_address(&self) -> Ipv4Addr {
        if self.is_connected() {
            SIM_WIRELESS_LEASE
        } else {
            Ipv4Addr::UNSPECIFIED
        }
    }
}

/// Simulated recovery portal.
#[derive(Debug, Default)]
pub struct SimPortal {
    running: bool,
    connected: bool,
    fail_start: bool,
    ap_name: Option<String>,
    address: Option<ApAddress>,
    starts: usize,
    stops: usize,
    polls: usize,
}

impl SimPortal {
    /// Stopped portal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent starts fail.
    pub fn fail_starts(&mut self, fail: bool) {
        self.fail_start = fail;
    }

    /// The operator submitted working credentials.
    pub fn complete(&mut self) {
        self.connected = true;
    }

    /// AP name of the last start.
    pub fn ap_name(&self) -> Option<&str> {
        self.ap_name.as_deref()
    }

    /// AP address of the last start.
    pub fn address(&self) -> Option<ApAddress> {
        self.address
    }

    /// Number of successful starts.
    pub fn starts(&self) -> usize {
        self.starts
    }

    /// Number of stop calls.
    pub fn stops(&self) -> usize {
        self.stops
    }

    /// Number of poll calls.
    pub fn polls(&self) -> usize {
        self.polls
    }
}

impl RecoveryPortal for SimPortal {
    fn is_running(&self) -> bool {
        self.running
    }

    fn start(&mut self, ap_name: &str, address: &ApAddress) -> Result<(), LinkError> {
        if self.fail_start {
            return Err(LinkError::Driver("portal failed to start".into()));
        }
        self.running = true;
        self.connected = false;
        self.ap_name = Some(ap_name.to_string());
        self.address = Some(*address);
        self.starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
        self.connected = false;
        self.stops += 1;
    }

    fn poll(&mut self) {
        self.polls += 1;
    }

    fn resulted_in_connection(&self) -> bool {
        self.running && self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> WifiCredentials {
        WifiCredentials::new("Workshop", "password123").unwrap()
    }

    #[test]
    fn test_clock_delay_advances_time() {
        let mut clock = SimClock::starting_at(Timestamp::from_millis(u32::MAX - 5));
        clock.delay(Duration::from_millis(10));
        assert_eq!(clock.now(), Timestamp::from_millis(4));
        assert_eq!(clock.total_delayed(), Duration::from_millis(10));
    }

    #[test]
    fn test_wired_lease_follows_cable() {
        let mut link = SimWiredLink::unplugged();
        link.begin("node").unwrap();
        assert!(!link.has_address());

        link.plug();
        assert!(!link.has_address());
        link.maintain();
        assert_eq!(link.current_address(), SIM_WIRED_LEASE);

        link.unplug();
        assert!(!link.connected());
        assert!(!link.has_address());
    }

    #[test]
    fn test_wired_without_dhcp_never_leases() {
        let mut link = SimWiredLink::plugged().with_dhcp(false);
        link.begin("node").unwrap();
        link.maintain();
        assert!(link.connected());
        assert!(!link.has_address());
    }

    #[test]
    fn test_radio_associates_only_with_matching_credentials() {
        let mut radio = SimWirelessLink::new().with_network(network());
        radio.set_mode(RadioMode::Station).unwrap();

        let wrong = WifiCredentials::new("Workshop", "wrongpassword").unwrap();
        radio.connect_with_credentials(&wrong).unwrap();
        assert!(!radio.is_connected());
        assert!(radio.stored().is_none());

        radio.connect_with_credentials(&network()).unwrap();
        assert!(radio.is_connected());
        assert!(radio.stored().is_none());

        // Persisted on upkeep, not on the status query
        radio.maintain();
        assert_eq!(radio.stored(), Some(&network()));
        assert_eq!(radio.current_address(), SIM_WIRELESS_LEASE);
    }

    #[test]
    fn test_radio_forgets_credentials_that_dropped_before_upkeep() {
        let mut radio = SimWirelessLink::new().with_network(network());
        radio.set_mode(RadioMode::Station).unwrap();
        radio.connect_with_credentials(&network()).unwrap();
        radio.set_network(None);

        radio.maintain();
        assert!(radio.stored().is_none());
        assert_eq!(radio.maintain_calls(), 1);
    }

    #[test]
    fn test_radio_needs_station_mode() {
        let mut radio = SimWirelessLink::new().with_network(network());
        radio.connect_with_credentials(&network()).unwrap();
        assert!(!radio.is_connected());
    }

    #[test]
    fn test_radio_stored_connect_without_credentials() {
        let mut radio = SimWirelessLink::new();
        assert!(matches!(
            radio.connect_with_stored_credentials(),
            Err(LinkError::NotConfigured)
        ));
        assert_eq!(radio.connect_calls(), vec![RadioCall::ConnectStored]);
    }

    #[test]
    fn test_radio_drops_when_network_vanishes() {
        let mut radio = SimWirelessLink::new()
            .with_network(network())
            .with_stored(network());
        radio.set_mode(RadioMode::Station).unwrap();
        radio.reconnect().unwrap();
        assert!(radio.is_connected());

        radio.set_network(None);
        assert!(!radio.is_connected());
    }

    #[test]
    fn test_portal_lifecycle() {
        let mut portal = SimPortal::new();
        portal.start("Setup", &ApAddress::default()).unwrap();
        assert!(portal.is_running());
        assert!(!portal.resulted_in_connection());

        portal.complete();
        assert!(portal.resulted_in_connection());

        portal.stop();
        assert!(!portal.is_running());
        assert!(!portal.resulted_in_connection());
        assert_eq!((portal.starts(), portal.stops()), (1, 1));
    }

    #[test]
    fn test_portal_start_failure() {
        let mut portal = SimPortal::new();
        portal.fail_starts(true);
        assert!(portal.start("Setup", &ApAddress::default()).is_err());
        assert!(!portal.is_running());
        assert_eq!(portal.starts(), 0);
    }
}
