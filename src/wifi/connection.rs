//! ESP-IDF WiFi radio as a [`WirelessLink`].
//!
//! Connects are issued without waiting; the controller owns the bounded wait
//! and polls [`WirelessLink::is_connected`]. Credentials passed to
//! [`WirelessLink::connect_with_credentials`] are written to NVS by
//! [`WirelessLink::maintain`] once the station is associated, so they become
//! the stored credentials only after they have worked. Status queries never
//! touch flash.

use super::credentials::WifiCredentials;
use super::storage::{load_credentials, open_nvs, save_credentials};
use crate::link::{LinkError, RadioMode, WirelessLink};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
};
use esp_idf_sys::EspError;
use log::{debug, info, warn};
use std::net::Ipv4Addr;

/// WiFi radio adapter.
pub struct EspWirelessLink<'a> {
    wifi: EspWifi<'a>,
    nvs: EspNvs<NvsDefault>,
    /// Explicit credentials awaiting a confirmed association.
    pending: Option<WifiCredentials>,
    /// Station side of the current configuration.
    client: ClientConfiguration,
    /// Access point side, used in AP and AP+STA modes.
    access_point: AccessPointConfiguration,
    /// Mode last requested through [`WirelessLink::set_mode`].
    requested: RadioMode,
}

impl<'a> EspWirelessLink<'a> {
    /// Create the adapter. The radio stays stopped until a mode is set.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        partition: EspDefaultNvsPartition,
    ) -> Result<Self, LinkError> {
        let wifi = EspWifi::new(modem, sysloop, Some(partition.clone()))?;
        let nvs = open_nvs(partition)?;

        Ok(Self {
            wifi,
            nvs,
            pending: None,
            client: ClientConfiguration::default(),
            access_point: AccessPointConfiguration::default(),
            requested: RadioMode::Off,
        })
    }

    /// Set the SSID advertised in AP and AP+STA modes (open network).
    pub fn set_access_point_name(&mut self, name: &str) -> Result<(), LinkError> {
        self.access_point = AccessPointConfiguration {
            ssid: name
                .try_into()
                .map_err(|_| LinkError::Driver(format!("AP name too long: {}", name)))?,
            auth_method: AuthMethod::None,
            ..Default::default()
        };
        Ok(())
    }

    /// Push the requested mode and current station/AP settings to the driver.
    fn apply(&mut self) -> Result<(), EspError> {
        let config = match self.requested {
            RadioMode::Off => {
                if self.wifi.is_started()? {
                    self.wifi.stop()?;
                }
                return Ok(());
            }
            RadioMode::Station => Configuration::Client(self.client.clone()),
            RadioMode::AccessPoint => Configuration::AccessPoint(self.access_point.clone()),
            RadioMode::AccessPointStation => {
                Configuration::Mixed(self.client.clone(), self.access_point.clone())
            }
        };

        self.wifi.set_configuration(&config)?;
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }
        Ok(())
    }

    fn station_mode_for_connect(&mut self) {
        // Connecting needs a station interface; keep AP+STA if the portal is up.
        if !matches!(
            self.requested,
            RadioMode::Station | RadioMode::AccessPointStation
        ) {
            self.requested = RadioMode::Station;
        }
    }

    fn begin_connect(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError> {
        self.client = client_configuration(credentials)?;
        self.station_mode_for_connect();
        self.apply()?;
        self.wifi.connect()?;
        Ok(())
    }

    fn commit_pending(&mut self) {
        let Some(credentials) = self.pending.take() else {
            return;
        };
        match save_credentials(&mut self.nvs, &credentials) {
            Ok(()) => info!("Stored WiFi credentials for {}", credentials.ssid()),
            Err(e) => warn!("Failed to store WiFi credentials: {:?}", e),
        }
    }
}

fn client_configuration(credentials: &WifiCredentials) -> Result<ClientConfiguration, LinkError> {
    let auth_method = if credentials.is_open() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };

    Ok(ClientConfiguration {
        ssid: credentials
            .ssid()
            .try_into()
            .map_err(|_| LinkError::Driver("SSID not representable".into()))?,
        password: credentials
            .password()
            .try_into()
            .map_err(|_| LinkError::Driver("password not representable".into()))?,
        auth_method,
        ..Default::default()
    })
}

impl<'a> WirelessLink for EspWirelessLink<'a> {
    fn set_mode(&mut self, mode: RadioMode) -> Result<(), LinkError> {
        debug!("WiFi mode -> {}", mode);
        self.requested = mode;
        self.apply()?;
        Ok(())
    }

    fn mode(&self) -> RadioMode {
        match self.wifi.get_configuration() {
            Ok(Configuration::Client(_)) => RadioMode::Station,
            Ok(Configuration::AccessPoint(_)) => RadioMode::AccessPoint,
            Ok(Configuration::Mixed(_, _)) => RadioMode::AccessPointStation,
            _ => RadioMode::Off,
        }
    }

    fn set_hostname(&mut self, hostname: &str) -> Result<(), LinkError> {
        self.wifi.sta_netif_mut().set_hostname(hostname)?;
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            debug!("WiFi disconnect: {:?}", e);
        }
    }

    fn connect_with_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError> {
        info!("Connecting to WiFi: {}", credentials.ssid());
        self.pending = Some(credentials.clone());
        self.begin_connect(credentials)
    }

    fn connect_with_stored_credentials(&mut self) -> Result<(), LinkError> {
        self.pending = None;
        let credentials = load_credentials(&self.nvs).ok_or(LinkError::NotConfigured)?;
        info!("Connecting to stored WiFi: {}", credentials.ssid());
        self.begin_connect(&credentials)
    }

    fn reconnect(&mut self) -> Result<(), LinkError> {
        if self.client.ssid.is_empty() {
            return self.connect_with_stored_credentials();
        }
        self.station_mode_for_connect();
        self.apply()?;
        self.wifi.connect()?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn maintain(&mut self) {
        if self.pending.is_some() && self.is_connected() {
            self.commit_pending();
        }
    }

    fn current_address(&self) -> Ipv4Addr {
        self.wifi
            .sta_netif()
            .get_ip_info()
            .map(|info| info.ip)
            .unwrap_or(Ipv4Addr::UNSPECIFIED)
    }
}
