//! Link arbitration for ESP32 devices with Ethernet and WiFi.
//!
//! The [`Controller`] keeps a device online by preferring a wired link,
//! failing over to WiFi, and opening a recovery portal when neither works.
//! All policy is platform-independent and tested on the host against the
//! simulated links in [`sim`]; ESP-IDF adapters are behind the `esp32`
//! feature.

pub mod clock;
pub mod config;
pub mod console;
pub mod controller;
pub mod link;
pub mod sim;
pub mod status;
pub mod wifi;

// Re-export commonly used items
pub use clock::{Clock, SystemClock, Timestamp};
pub use config::{ApAddress, ConfigError, ControllerConfig};
pub use controller::{Controller, LinkState};
pub use link::{LinkError, NoWiredLink, RadioMode, RecoveryPortal, WiredLink, WirelessLink};
pub use status::{LinkStats, LinkStatus, StatusServer, DEFAULT_STATUS_PORT};
pub use wifi::{CredentialsError, WifiCredentials};

#[cfg(feature = "esp32")]
pub use clock::EspClock;
#[cfg(feature = "esp32")]
pub use wifi::EspWirelessLink;
