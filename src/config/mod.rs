//! Controller configuration.
//!
//! Defaults match a typical deployment: 15 s per connect attempt, a 5 s idle
//! reconnect cadence and a five minute recovery portal on 192.168.4.1/24.
//! Every field can be overridden from `LINK_*` environment keys via
//! [`ControllerConfig::from_env`]; the portal address is given as
//! `LINK_PORTAL_ADDRESS=ip/prefix`.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use link_arbiter_esp32::config::ControllerConfig;
//!
//! let config = ControllerConfig::new("sensor-07");
//! assert!(config.validate().is_ok());
//! assert_eq!(config.reconnect_interval, Duration::from_secs(5));
//! assert_eq!(config.portal_ap_name(), "LinkArbiter_Config");
//! ```

use crate::wifi::{CredentialsError, WifiCredentials, MAX_SSID_LEN};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

/// Access point name used when none is configured.
pub const DEFAULT_PORTAL_AP_NAME: &str = "LinkArbiter_Config";

/// Wired address-acquisition bound during bring-up.
pub const DEFAULT_WIRED_TIMEOUT: Duration = Duration::from_secs(15);

/// Bound on a single wireless connect attempt.
pub const DEFAULT_WIFI_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Minimum spacing of idle reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// How long the portal stays up without producing connectivity.
pub const DEFAULT_PORTAL_TIMEOUT: Duration = Duration::from_secs(300);

/// Poll step inside bounded waits.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// DHCP hostnames are kept to the length most clients accept.
pub const MAX_HOSTNAME_LEN: usize = 32;

/// Longest duration the wrapping millisecond clock can measure unambiguously.
pub const MAX_DURATION: Duration = Duration::from_millis(i32::MAX as u64);

/// Static addressing of the portal's access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApAddress {
    /// Address of the access point itself.
    pub ip: Ipv4Addr,
    /// Gateway advertised to portal clients.
    pub gateway: Ipv4Addr,
    /// Subnet prefix length.
    pub prefix_len: u8,
}

impl ApAddress {
    /// Create an AP address.
    pub const fn new(ip: Ipv4Addr, gateway: Ipv4Addr, prefix_len: u8) -> Self {
        Self {
            ip,
            gateway,
            prefix_len,
        }
    }

    /// Subnet mask for the prefix length.
    pub fn netmask(&self) -> Ipv4Addr {
        let bits = match self.prefix_len {
            0 => 0,
            n => u32::MAX << (32 - u32::from(n.min(32))),
        };
        Ipv4Addr::from(bits)
    }
}

impl Default for ApAddress {
    fn default() -> Self {
        let ip = Ipv4Addr::new(192, 168, 4, 1);
        Self::new(ip, ip, 24)
    }
}

/// Parses `ip/prefix`, or a bare `ip` as /24. The gateway is the AP itself.
impl FromStr for ApAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidAddress(s.to_string());
        let (ip, prefix_len) = match s.trim().split_once('/') {
            Some((ip, prefix)) => (ip, prefix.parse::<u8>().map_err(|_| invalid())?),
            None => (s.trim(), 24),
        };
        let ip = ip.parse::<Ipv4Addr>().map_err(|_| invalid())?;
        Ok(Self::new(ip, ip, prefix_len))
    }
}

impl fmt::Display for ApAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix_len)
    }
}

/// Controller tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// DHCP hostname for both interfaces.
    pub hostname: String,
    /// Portal access point name; [`DEFAULT_PORTAL_AP_NAME`] when unset.
    pub portal_ap_name: Option<String>,
    /// Wired address-acquisition bound during bring-up.
    pub wired_timeout: Duration,
    /// Bound on each wireless connect attempt.
    pub wifi_connect_timeout: Duration,
    /// Minimum spacing of idle reconnect attempts.
    pub reconnect_interval: Duration,
    /// Portal lifetime without connectivity.
    pub portal_timeout: Duration,
    /// Poll step inside bounded waits.
    pub poll_interval: Duration,
    /// Portal access point addressing.
    pub portal_address: ApAddress,
}

impl ControllerConfig {
    /// Configuration with default tunables.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            portal_ap_name: None,
            wired_timeout: DEFAULT_WIRED_TIMEOUT,
            wifi_connect_timeout: DEFAULT_WIFI_CONNECT_TIMEOUT,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            portal_timeout: DEFAULT_PORTAL_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            portal_address: ApAddress::default(),
        }
    }

    /// Effective portal access point name.
    pub fn portal_ap_name(&self) -> &str {
        self.portal_ap_name
            .as_deref()
            .unwrap_or(DEFAULT_PORTAL_AP_NAME)
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hostname.is_empty() {
            return Err(ConfigError::HostnameEmpty);
        }
        if self.hostname.len() > MAX_HOSTNAME_LEN {
            return Err(ConfigError::HostnameTooLong {
                len: self.hostname.len(),
                max: MAX_HOSTNAME_LEN,
            });
        }

        let ap_name = self.portal_ap_name();
        if ap_name.is_empty() || ap_name.len() > MAX_SSID_LEN {
            return Err(ConfigError::PortalNameInvalid {
                len: ap_name.len(),
                max: MAX_SSID_LEN,
            });
        }

        for (name, value) in [
            ("wired_timeout", self.wired_timeout),
            ("wifi_connect_timeout", self.wifi_connect_timeout),
            ("reconnect_interval", self.reconnect_interval),
            ("portal_timeout", self.portal_timeout),
            ("poll_interval", self.poll_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
            if value > MAX_DURATION {
                return Err(ConfigError::DurationTooLong {
                    name,
                    max: MAX_DURATION,
                });
            }
        }

        if self.portal_address.prefix_len == 0 || self.portal_address.prefix_len > 30 {
            return Err(ConfigError::InvalidPrefix(self.portal_address.prefix_len));
        }

        Ok(())
    }

    /// Build a configuration from `LINK_*` keys.
    ///
    /// `lookup` returns the value for a key, if set. `LINK_HOSTNAME` falls back
    /// to `default_hostname`; durations are given in milliseconds.
    pub fn from_lookup<F>(default_hostname: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let hostname = lookup("LINK_HOSTNAME").unwrap_or_else(|| default_hostname.to_string());
        let mut config = Self::new(hostname);

        config.portal_ap_name = lookup("LINK_PORTAL_AP_NAME").filter(|name| !name.is_empty());

        let millis = |key: &'static str, current: Duration| -> Result<Duration, ConfigError> {
            match lookup(key) {
                None => Ok(current),
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
            }
        };
        config.wired_timeout = millis("LINK_WIRED_TIMEOUT_MS", config.wired_timeout)?;
        config.wifi_connect_timeout = millis("LINK_WIFI_TIMEOUT_MS", config.wifi_connect_timeout)?;
        config.reconnect_interval =
            millis("LINK_RECONNECT_INTERVAL_MS", config.reconnect_interval)?;
        config.portal_timeout = millis("LINK_PORTAL_TIMEOUT_MS", config.portal_timeout)?;
        config.poll_interval = millis("LINK_POLL_INTERVAL_MS", config.poll_interval)?;

        if let Some(raw) = lookup("LINK_PORTAL_ADDRESS") {
            config.portal_address = raw.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from the process environment.
    pub fn from_env(default_hostname: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(default_hostname, |key| std::env::var(key).ok())
    }
}

/// Fixed credentials from `LINK_WIFI_SSID` / `LINK_WIFI_PASSWORD`.
///
/// An unset or empty SSID means no fixed credentials.
pub fn credentials_from_lookup<F>(lookup: F) -> Result<Option<WifiCredentials>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(ssid) = lookup("LINK_WIFI_SSID").filter(|ssid| !ssid.is_empty()) else {
        return Ok(None);
    };
    let password = zeroize::Zeroizing::new(lookup("LINK_WIFI_PASSWORD").unwrap_or_default());
    let credentials =
        WifiCredentials::new(ssid, password.as_str()).map_err(ConfigError::Credentials)?;
    Ok(Some(credentials))
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Hostname is empty.
    HostnameEmpty,
    /// Hostname exceeds maximum length.
    HostnameTooLong { len: usize, max: usize },
    /// Portal AP name is empty or longer than an SSID may be.
    PortalNameInvalid { len: usize, max: usize },
    /// A duration that must be positive is zero.
    ZeroDuration(&'static str),
    /// A duration exceeds what the wrapping clock can measure.
    DurationTooLong { name: &'static str, max: Duration },
    /// Portal subnet prefix outside 1..=30.
    InvalidPrefix(u8),
    /// Portal address is not `ip` or `ip/prefix`.
    InvalidAddress(String),
    /// A numeric key did not parse.
    InvalidNumber { key: &'static str, value: String },
    /// Fixed credentials are invalid.
    Credentials(CredentialsError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostnameEmpty => write!(f, "hostname cannot be empty"),
            Self::HostnameTooLong { len, max } => {
                write!(f, "hostname too long: {} bytes (max {})", len, max)
            }
            Self::PortalNameInvalid { len, max } => {
                write!(f, "portal AP name must be 1-{} bytes, got {}", max, len)
            }
            Self::ZeroDuration(name) => write!(f, "{} must be greater than zero", name),
            Self::DurationTooLong { name, max } => {
                write!(f, "{} exceeds {} ms", name, max.as_millis())
            }
            Self::InvalidPrefix(prefix) => write!(f, "invalid portal prefix length /{}", prefix),
            Self::InvalidAddress(value) => {
                write!(f, "portal address must be ip or ip/prefix, got {:?}", value)
            }
            Self::InvalidNumber { key, value } => {
                write!(f, "{}: expected milliseconds, got {:?}", key, value)
            }
            Self::Credentials(e) => write!(f, "fixed credentials: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Credentials(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::new("node");
        assert_eq!(config.wifi_connect_timeout, Duration::from_secs(15));
        assert_eq!(config.wired_timeout, Duration::from_secs(15));
        assert_eq!(config.reconnect_interval, Duration::from_secs(5));
        assert_eq!(config.portal_timeout, Duration::from_secs(300));
        assert_eq!(config.portal_address.ip, Ipv4Addr::new(192, 168, 4, 1));
        assert_eq!(config.portal_ap_name(), DEFAULT_PORTAL_AP_NAME);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ap_address_netmask() {
        let ap = ApAddress::default();
        assert_eq!(ap.netmask(), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(ap.to_string(), "192.168.4.1/24");

        let wide = ApAddress::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 1), 8);
        assert_eq!(wide.netmask(), Ipv4Addr::new(255, 0, 0, 0));
    }

    #[test]
    fn test_hostname_validation() {
        assert_eq!(
            ControllerConfig::new("").validate(),
            Err(ConfigError::HostnameEmpty)
        );
        assert!(matches!(
            ControllerConfig::new("h".repeat(33)).validate(),
            Err(ConfigError::HostnameTooLong { len: 33, .. })
        ));
    }

    #[test]
    fn test_portal_name_validation() {
        let mut config = ControllerConfig::new("node");
        config.portal_ap_name = Some("x".repeat(33));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PortalNameInvalid { len: 33, .. })
        ));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let mut config = ControllerConfig::new("node");
        config.reconnect_interval = Duration::ZERO;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration("reconnect_interval"))
        );
    }

    #[test]
    fn test_duration_beyond_clock_range_rejected() {
        let mut config = ControllerConfig::new("node");
        config.portal_timeout = Duration::from_secs(30 * 24 * 3600);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DurationTooLong {
                name: "portal_timeout",
                ..
            })
        ));
    }

    #[test]
    fn test_prefix_validation() {
        let mut config = ControllerConfig::new("node");
        config.portal_address.prefix_len = 31;
        assert_eq!(config.validate(), Err(ConfigError::InvalidPrefix(31)));
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = ControllerConfig::from_lookup("fallback", lookup_from(&[])).unwrap();
        assert_eq!(config, ControllerConfig::new("fallback"));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ControllerConfig::from_lookup(
            "fallback",
            lookup_from(&[
                ("LINK_HOSTNAME", "gate-3"),
                ("LINK_PORTAL_AP_NAME", "Gate3_Setup"),
                ("LINK_WIFI_TIMEOUT_MS", "5000"),
                ("LINK_RECONNECT_INTERVAL_MS", " 2500 "),
                ("LINK_PORTAL_TIMEOUT_MS", "60000"),
                ("LINK_WIRED_TIMEOUT_MS", "8000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.hostname, "gate-3");
        assert_eq!(config.portal_ap_name(), "Gate3_Setup");
        assert_eq!(config.wifi_connect_timeout, Duration::from_secs(5));
        assert_eq!(config.reconnect_interval, Duration::from_millis(2500));
        assert_eq!(config.portal_timeout, Duration::from_secs(60));
        assert_eq!(config.wired_timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_from_lookup_portal_address_and_poll_interval() {
        let config = ControllerConfig::from_lookup(
            "node",
            lookup_from(&[
                ("LINK_PORTAL_ADDRESS", "10.1.1.1/16"),
                ("LINK_POLL_INTERVAL_MS", "250"),
            ]),
        )
        .unwrap();

        assert_eq!(config.portal_address.ip, Ipv4Addr::new(10, 1, 1, 1));
        assert_eq!(config.portal_address.gateway, Ipv4Addr::new(10, 1, 1, 1));
        assert_eq!(config.portal_address.netmask(), Ipv4Addr::new(255, 255, 0, 0));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_portal_address_parsing() {
        let bare: ApAddress = "192.168.8.1".parse().unwrap();
        assert_eq!(bare.to_string(), "192.168.8.1/24");
        assert_eq!(
            "192.168.4.300/24".parse::<ApAddress>(),
            Err(ConfigError::InvalidAddress("192.168.4.300/24".into()))
        );
        assert!("10.0.0.1/x".parse::<ApAddress>().is_err());

        // Out-of-range prefixes parse but fail validation
        let result = ControllerConfig::from_lookup(
            "node",
            lookup_from(&[("LINK_PORTAL_ADDRESS", "10.0.0.1/31")]),
        );
        assert_eq!(result, Err(ConfigError::InvalidPrefix(31)));
    }

    #[test]
    fn test_from_lookup_bad_number() {
        let result =
            ControllerConfig::from_lookup("node", lookup_from(&[("LINK_WIFI_TIMEOUT_MS", "15s")]));
        assert_eq!(
            result,
            Err(ConfigError::InvalidNumber {
                key: "LINK_WIFI_TIMEOUT_MS",
                value: "15s".to_string()
            })
        );
    }

    #[test]
    fn test_from_lookup_validates() {
        let result = ControllerConfig::from_lookup(
            "node",
            lookup_from(&[("LINK_PORTAL_TIMEOUT_MS", "0")]),
        );
        assert_eq!(result, Err(ConfigError::ZeroDuration("portal_timeout")));
    }

    #[test]
    fn test_credentials_from_lookup() {
        assert_eq!(credentials_from_lookup(lookup_from(&[])), Ok(None));
        assert_eq!(
            credentials_from_lookup(lookup_from(&[("LINK_WIFI_SSID", "")])),
            Ok(None)
        );

        let creds = credentials_from_lookup(lookup_from(&[
            ("LINK_WIFI_SSID", "Workshop"),
            ("LINK_WIFI_PASSWORD", "password123"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(creds.ssid(), "Workshop");

        let open = credentials_from_lookup(lookup_from(&[("LINK_WIFI_SSID", "Lobby")]))
            .unwrap()
            .unwrap();
        assert!(open.is_open());
    }

    #[test]
    fn test_credentials_from_lookup_invalid() {
        let result = credentials_from_lookup(lookup_from(&[
            ("LINK_WIFI_SSID", "Workshop"),
            ("LINK_WIFI_PASSWORD", "short"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::Credentials(
                CredentialsError::PasswordTooShort { .. }
            ))
        ));
    }
}
