//! WiFi credentials supplied by the operator or persisted by the radio.
//!
//! Validation happens at construction, so a `WifiCredentials` value always
//! carries a usable SSID. The password is wiped from memory when the value is
//! dropped and is never printed by `Debug`.
//!
//! # Example
//!
//! ```
//! use link_arbiter_esp32::wifi::WifiCredentials;
//!
//! let creds = WifiCredentials::new("Workshop", "hunter2hunter2").unwrap();
//! assert_eq!(creds.ssid(), "Workshop");
//! assert!(!format!("{:?}", creds).contains("hunter2"));
//! ```

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Maximum SSID length per IEEE 802.11.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum WPA2 passphrase length.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Minimum WPA2 passphrase length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// SSID and password for a station connection.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct WifiCredentials {
    ssid: String,
    password: String,
}

impl WifiCredentials {
    /// Create validated credentials.
    pub fn new(
        ssid: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let creds = Self {
            ssid: ssid.into(),
            password: password.into(),
        };
        creds.validate()?;
        Ok(creds)
    }

    /// Credentials for an open network (no password).
    pub fn open(ssid: impl Into<String>) -> Result<Self, CredentialsError> {
        Self::new(ssid, String::new())
    }

    fn validate(&self) -> Result<(), CredentialsError> {
        if self.ssid.is_empty() {
            return Err(CredentialsError::SsidEmpty);
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(CredentialsError::SsidTooLong {
                len: self.ssid.len(),
                max: MAX_SSID_LEN,
            });
        }

        // Empty is fine (open network)
        if !self.password.is_empty() && self.password.len() < MIN_PASSWORD_LEN {
            return Err(CredentialsError::PasswordTooShort {
                len: self.password.len(),
                min: MIN_PASSWORD_LEN,
            });
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(CredentialsError::PasswordTooLong {
                len: self.password.len(),
                max: MAX_PASSWORD_LEN,
            });
        }

        Ok(())
    }

    /// Network SSID.
    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Network passphrase. Empty for open networks.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Whether this is an open network.
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    /// Encode for NVS storage.
    ///
    /// Format: `[ssid_len:1][ssid:N][password_len:1][password:M]`
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Vec::with_capacity(2 + self.ssid.len() + self.password.len());
        bytes.push(self.ssid.len() as u8);
        bytes.extend_from_slice(self.ssid.as_bytes());
        bytes.push(self.password.len() as u8);
        bytes.extend_from_slice(self.password.as_bytes());
        Zeroizing::new(bytes)
    }

    /// Decode from the NVS storage format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CredentialsError> {
        let (&ssid_len, rest) = bytes
            .split_first()
            .ok_or(CredentialsError::InvalidFormat("empty data"))?;
        let ssid_len = ssid_len as usize;
        if rest.len() < ssid_len + 1 {
            return Err(CredentialsError::InvalidFormat("truncated SSID"));
        }
        let (ssid, rest) = rest.split_at(ssid_len);

        let password_len = rest[0] as usize;
        let password = rest[1..]
            .get(..password_len)
            .ok_or(CredentialsError::InvalidFormat("truncated password"))?;

        let ssid = std::str::from_utf8(ssid)
            .map_err(|_| CredentialsError::InvalidFormat("invalid SSID UTF-8"))?;
        let password = std::str::from_utf8(password)
            .map_err(|_| CredentialsError::InvalidFormat("invalid password UTF-8"))?;

        Self::new(ssid, password)
    }
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &if self.is_open() { "" } else { "<redacted>" })
            .finish()
    }
}

/// Reasons credentials are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsError {
    /// SSID is empty.
    SsidEmpty,
    /// SSID exceeds maximum length.
    SsidTooLong { len: usize, max: usize },
    /// Password is too short for WPA2.
    PasswordTooShort { len: usize, min: usize },
    /// Password exceeds maximum length.
    PasswordTooLong { len: usize, max: usize },
    /// Stored bytes could not be decoded.
    InvalidFormat(&'static str),
}

impl fmt::Display for CredentialsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::SsidTooLong { len, max } => {
                write!(f, "SSID too long: {} bytes (max {})", len, max)
            }
            Self::PasswordTooShort { len, min } => {
                write!(f, "password too short: {} bytes (min {})", len, min)
            }
            Self::PasswordTooLong { len, max } => {
                write!(f, "password too long: {} bytes (max {})", len, max)
            }
            Self::InvalidFormat(msg) => write!(f, "invalid format: {}", msg),
        }
    }
}

impl std::error::Error for CredentialsError {}
