//! Collaborator interfaces consumed by the controller.
//!
//! The controller owns one implementation of each trait and drives them
//! synchronously from a single thread; none of the traits need to be `Send`
//! or reentrant.
//!
//! - [`WiredLink`] - the preferred interface (Ethernet)
//! - [`WirelessLink`] - the fallback radio (WiFi)
//! - [`RecoveryPortal`] - the operator-facing configuration access point
//!
//! On ESP32 the radio is provided by [`crate::wifi::EspWirelessLink`]; on the
//! host, [`crate::sim`] provides scripted stand-ins for all three.

use crate::config::ApAddress;
use crate::wifi::{CredentialsError, WifiCredentials};
use std::fmt;
use std::net::Ipv4Addr;

/// Preferred, hardware-attached interface.
pub trait WiredLink {
    /// Initialise the driver and start address acquisition.
    fn begin(&mut self, hostname: &str) -> Result<(), LinkError>;

    /// Whether the controller chip was detected.
    fn hardware_present(&self) -> bool;

    /// Whether the PHY reports link (cable plugged in).
    fn cable_up(&self) -> bool;

    /// Whether the driver considers the link connected.
    fn connected(&self) -> bool;

    /// Current address, or `0.0.0.0` if none has been acquired.
    fn current_address(&self) -> Ipv4Addr;

    /// Whether a non-zero address has been acquired.
    fn has_address(&self) -> bool {
        !self.current_address().is_unspecified()
    }

    /// Periodic driver upkeep (lease renewal).
    fn maintain(&mut self);
}

/// Operating mode of the WiFi radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    /// Radio stopped.
    Off,
    /// Station only.
    Station,
    /// Access point only.
    AccessPoint,
    /// Access point and station at the same time (portal mode).
    AccessPointStation,
}

impl RadioMode {
    /// Whether the radio is advertising an access point.
    pub fn has_access_point(self) -> bool {
        matches!(self, Self::AccessPoint | Self::AccessPointStation)
    }

    /// Short name for logs and status output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Station => "sta",
            Self::AccessPoint => "ap",
            Self::AccessPointStation => "ap+sta",
        }
    }
}

impl fmt::Display for RadioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fallback radio interface.
///
/// Connect calls only start association; callers poll [`is_connected`]
/// for the outcome.
///
/// [`is_connected`]: WirelessLink::is_connected
pub trait WirelessLink {
    /// Switch radio mode.
    fn set_mode(&mut self, mode: RadioMode) -> Result<(), LinkError>;

    /// Mode the radio is actually in.
    fn mode(&self) -> RadioMode;

    /// Set the DHCP client hostname.
    fn set_hostname(&mut self, hostname: &str) -> Result<(), LinkError>;

    /// Drop the station association, if any.
    fn disconnect(&mut self);

    /// Start associating with explicit credentials.
    fn connect_with_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError>;

    /// Start associating with previously persisted credentials.
    ///
    /// Returns [`LinkError::NotConfigured`] when nothing is stored.
    fn connect_with_stored_credentials(&mut self) -> Result<(), LinkError>;

    /// Retry the last association.
    fn reconnect(&mut self) -> Result<(), LinkError> {
        self.connect_with_stored_credentials()
    }

    /// Whether the station is associated. Must not have side effects.
    fn is_connected(&self) -> bool;

    /// Periodic radio upkeep, called once per tick and after a successful
    /// connect. Adapters persist credentials that just proved to work here.
    fn maintain(&mut self) {}

    /// Station address, or `0.0.0.0`.
    fn current_address(&self) -> Ipv4Addr;
}

/// Operator-facing configuration access point.
pub trait RecoveryPortal {
    /// Whether the portal services are up.
    fn is_running(&self) -> bool;

    /// Bring up the portal on an access point named `ap_name`.
    fn start(&mut self, ap_name: &str, address: &ApAddress) -> Result<(), LinkError>;

    /// Tear down the portal services.
    fn stop(&mut self);

    /// Run one iteration of the portal's internal engine.
    fn poll(&mut self);

    /// Whether the operator's credentials produced a station connection.
    fn resulted_in_connection(&self) -> bool;
}

/// [`WiredLink`] for boards without Ethernet hardware.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWiredLink;

impl WiredLink for NoWiredLink {
    fn begin(&mut self, _hostname: &str) -> Result<(), LinkError> {
        Err(LinkError::HardwareAbsent)
    }

    fn hardware_present(&self) -> bool {
        false
    }

    fn cable_up(&self) -> bool {
        false
    }

    fn connected(&self) -> bool {
        false
    }

    fn current_address(&self) -> Ipv4Addr {
        Ipv4Addr::UNSPECIFIED
    }

    fn maintain(&mut self) {}
}

/// Collaborator failures.
#[derive(Debug)]
pub enum LinkError {
    /// Interface hardware not detected.
    HardwareAbsent,
    /// No stored credentials to connect with.
    NotConfigured,
    /// Credentials rejected before reaching the radio.
    InvalidCredentials(CredentialsError),
    /// Driver-level failure.
    Driver(String),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardwareAbsent => write!(f, "interface hardware not found"),
            Self::NotConfigured => write!(f, "no stored credentials"),
            Self::InvalidCredentials(e) => write!(f, "invalid credentials: {}", e),
            Self::Driver(msg) => write!(f, "driver error: {}", msg),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidCredentials(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CredentialsError> for LinkError {
    fn from(e: CredentialsError) -> Self {
        Self::InvalidCredentials(e)
    }
}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for LinkError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Driver(format!("ESP error: {:?}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_no_wired_link_reports_absent() {
        let mut link = NoWiredLink;
        assert!(matches!(link.begin("node"), Err(LinkError::HardwareAbsent)));
        assert!(!link.hardware_present());
        assert!(!link.connected());
        assert!(!link.has_address());
    }

    #[test]
    fn test_radio_mode_access_point() {
        assert!(RadioMode::AccessPointStation.has_access_point());
        assert!(RadioMode::AccessPoint.has_access_point());
        assert!(!RadioMode::Station.has_access_point());
        assert!(!RadioMode::Off.has_access_point());
        assert_eq!(RadioMode::AccessPointStation.to_string(), "ap+sta");
    }

    #[test]
    fn test_link_error_source() {
        let err = LinkError::from(CredentialsError::SsidEmpty);
        assert_eq!(err.to_string(), "invalid credentials: SSID cannot be empty");
        assert!(err.source().is_some());
        assert!(LinkError::NotConfigured.source().is_none());
    }
}
