//! NVS persistence for the radio's stored credentials.
//!
//! These are the "stored credentials" the controller falls back to: whatever
//! the wireless adapter last connected with, kept across reboots.

use super::credentials::{WifiCredentials, MAX_PASSWORD_LEN, MAX_SSID_LEN};
use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use esp_idf_sys::EspError;
use log::{debug, warn};

/// NVS namespace for WiFi credentials.
const NVS_NAMESPACE: &str = "link_wifi";

/// NVS key for stored credentials.
const NVS_KEY: &str = "credentials";

/// `[ssid_len:1][ssid:32][password_len:1][password:64]`
const MAX_CREDENTIALS_BUFFER_SIZE: usize = 1 + MAX_SSID_LEN + 1 + MAX_PASSWORD_LEN;

/// Load stored credentials.
///
/// Returns `None` if nothing is stored or the stored bytes are corrupted.
pub fn load_credentials(nvs: &EspNvs<NvsDefault>) -> Option<WifiCredentials> {
    let mut buf = zeroize::Zeroizing::new([0u8; MAX_CREDENTIALS_BUFFER_SIZE]);
    let bytes = match nvs.get_raw(NVS_KEY, &mut buf[..]) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            debug!("No stored WiFi credentials");
            return None;
        }
        Err(e) => {
            warn!("Failed to read WiFi credentials from NVS: {:?}", e);
            return None;
        }
    };

    match WifiCredentials::from_bytes(bytes) {
        Ok(creds) => Some(creds),
        Err(e) => {
            warn!("Stored WiFi credentials are unusable: {}", e);
            None
        }
    }
}

/// Persist credentials, replacing any previous value.
pub fn save_credentials(
    nvs: &mut EspNvs<NvsDefault>,
    credentials: &WifiCredentials,
) -> Result<(), EspError> {
    nvs.set_raw(NVS_KEY, &credentials.to_bytes())?;
    Ok(())
}

/// Remove stored credentials.
pub fn clear_credentials(nvs: &mut EspNvs<NvsDefault>) -> Result<(), EspError> {
    nvs.remove(NVS_KEY)?;
    Ok(())
}

/// Open the credentials namespace on the default NVS partition.
pub fn open_nvs(partition: EspNvsPartition<NvsDefault>) -> Result<EspNvs<NvsDefault>, EspError> {
    EspNvs::new(partition, NVS_NAMESPACE, true)
}
