//! Shared fixtures for controller tests.

use super::Controller;
use crate::clock::Timestamp;
use crate::config::ControllerConfig;
use crate::sim::{SimClock, SimPortal, SimWiredLink, SimWirelessLink};
use crate::wifi::WifiCredentials;

pub type SimController = Controller<SimWiredLink, SimWirelessLink, SimPortal, SimClock>;

pub fn test_config() -> ControllerConfig {
    ControllerConfig::new("test-node")
}

pub fn network() -> WifiCredentials {
    WifiCredentials::new("Workshop", "password123").unwrap()
}

pub fn other_network() -> WifiCredentials {
    WifiCredentials::new("Backup", "password456").unwrap()
}

/// Default config, working portal, clock at 1000 ms.
pub fn controller(wired: SimWiredLink, wireless: SimWirelessLink) -> SimController {
    controller_with(wired, wireless, SimPortal::new(), Timestamp::from_millis(1_000))
}

pub fn controller_with(
    wired: SimWiredLink,
    wireless: SimWirelessLink,
    portal: SimPortal,
    start: Timestamp,
) -> SimController {
    controller_from(test_config(), wired, wireless, portal, start)
}

pub fn controller_from(
    config: ControllerConfig,
    wired: SimWiredLink,
    wireless: SimWirelessLink,
    portal: SimPortal,
    start: Timestamp,
) -> SimController {
    Controller::new(config, wired, wireless, portal, SimClock::starting_at(start)).unwrap()
}
