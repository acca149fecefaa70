//! WiFi credentials and the ESP-IDF radio adapter.
//!
//! # Components
//!
//! - [`credentials`] - validated, zeroized SSID/password pair (host-testable)
//! - `connection` - ESP-IDF radio as a [`crate::link::WirelessLink`] (ESP32 only)
//! - `storage` - NVS persistence for stored credentials (ESP32 only)

pub mod credentials;
#[cfg(feature = "esp32")]
mod connection;
#[cfg(feature = "esp32")]
mod storage;

pub use credentials::{
    CredentialsError, WifiCredentials, MAX_PASSWORD_LEN, MAX_SSID_LEN, MIN_PASSWORD_LEN,
};

#[cfg(feature = "esp32")]
pub use connection::EspWirelessLink;
#[cfg(feature = "esp32")]
pub use storage::{clear_credentials, load_credentials, open_nvs, save_credentials};
