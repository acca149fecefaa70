//! Command parsing for the host simulator console.
//!
//! Commands change the simulated world around the controller (cables,
//! networks in range, the operator using the portal); the controller reacts
//! on its next tick.

use crate::wifi::WifiCredentials;

/// Parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCommand {
    /// Plug the Ethernet cable in.
    Plug,
    /// Pull the Ethernet cable.
    Unplug,
    /// Put a WiFi network in range.
    Wifi(WifiCredentials),
    /// Take the WiFi network out of range.
    WifiOff,
    /// Operator submits credentials through the portal.
    Submit(WifiCredentials),
    /// Platform drops the radio out of AP+STA mode.
    DropMode,
    /// Show controller status.
    Status,
    /// Show help.
    Help,
    /// Unknown or invalid command, with a message for the user.
    Unknown(String),
}

impl SimCommand {
    /// Parse a command from an input line.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return SimCommand::Unknown(String::new());
        }

        let mut parts = input.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("");
        let args = parts.next().unwrap_or("").trim();

        match cmd.to_lowercase().as_str() {
            "plug" | "p" => SimCommand::Plug,
            "unplug" | "u" => SimCommand::Unplug,
            "wifi" | "w" => match parse_credentials(args, "wifi") {
                Ok(credentials) => SimCommand::Wifi(credentials),
                Err(msg) => SimCommand::Unknown(msg),
            },
            "wifi-off" | "wo" => SimCommand::WifiOff,
            "submit" => match parse_credentials(args, "submit") {
                Ok(credentials) => SimCommand::Submit(credentials),
                Err(msg) => SimCommand::Unknown(msg),
            },
            "drop-mode" => SimCommand::DropMode,
            "status" | "stat" | "s" => SimCommand::Status,
            "help" | "h" | "?" => SimCommand::Help,
            _ => SimCommand::Unknown(format!(
                "Unknown command: {}. Type 'help' for commands.",
                cmd
            )),
        }
    }
}

/// `<ssid> [password]`; an absent password means an open network.
fn parse_credentials(args: &str, cmd: &str) -> Result<WifiCredentials, String> {
    let mut parts = args.splitn(2, ' ');
    let ssid = parts.next().unwrap_or("");
    let password = parts.next().unwrap_or("").trim();
    if ssid.is_empty() {
        return Err(format!("Usage: {} <ssid> [password]", cmd));
    }

    let credentials = if password.is_empty() {
        WifiCredentials::open(ssid)
    } else {
        WifiCredentials::new(ssid, password)
    };
    credentials.map_err(|e| format!("Invalid credentials: {}", e))
}

/// Help text for available commands.
pub const HELP_TEXT: &str = r#"
Available commands:
  plug                     - Plug in the Ethernet cable
  unplug                   - Pull the Ethernet cable
  wifi <ssid> [password]   - Put a WiFi network in range
  wifi-off                 - Take the WiFi network out of range
  submit <ssid> [password] - Enter credentials in the config portal
  drop-mode                - Knock the radio out of AP+STA mode
  status                   - Show link status
  help                     - Show this help
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(SimCommand::parse("plug"), SimCommand::Plug);
        assert_eq!(SimCommand::parse("  UNPLUG "), SimCommand::Unplug);
        assert_eq!(SimCommand::parse("wifi-off"), SimCommand::WifiOff);
        assert_eq!(SimCommand::parse("drop-mode"), SimCommand::DropMode);
        assert_eq!(SimCommand::parse("s"), SimCommand::Status);
        assert_eq!(SimCommand::parse("?"), SimCommand::Help);
    }

    #[test]
    fn test_parse_wifi_with_password() {
        let expected = WifiCredentials::new("Workshop", "password123").unwrap();
        assert_eq!(
            SimCommand::parse("wifi Workshop password123"),
            SimCommand::Wifi(expected)
        );
    }

    #[test]
    fn test_parse_password_keeps_spaces() {
        match SimCommand::parse("submit Workshop correct horse battery") {
            SimCommand::Submit(credentials) => {
                assert_eq!(credentials.ssid(), "Workshop");
                assert_eq!(credentials.password(), "correct horse battery");
            }
            other => panic!("Expected Submit command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_open_network() {
        match SimCommand::parse("wifi CafeGuest") {
            SimCommand::Wifi(credentials) => assert!(credentials.is_open()),
            other => panic!("Expected Wifi command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_bad_credentials() {
        assert!(matches!(SimCommand::parse("wifi"), SimCommand::Unknown(_)));
        match SimCommand::parse("submit Workshop short") {
            SimCommand::Unknown(msg) => assert!(msg.starts_with("Invalid credentials")),
            other => panic!("Expected Unknown, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(SimCommand::parse(""), SimCommand::Unknown(String::new()));
        assert!(matches!(SimCommand::parse("reboot"), SimCommand::Unknown(_)));
    }
}
