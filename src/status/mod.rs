//! Connectivity status for diagnostics.
//!
//! The controller publishes a [`LinkStatus`] snapshot and [`LinkEvent`]
//! counters into a shared [`LinkStats`] after every tick. Readers (the HTTP
//! [`StatusServer`], a console command) see a consistent-enough view through
//! atomics without ever touching the controller.
//!
//! # Example Response
//!
//! ```json
//! {
//!   "hostname": "gate-3",
//!   "uptime_secs": 3600,
//!   "state": "wireless",
//!   "wired": { "connected": false, "ip": "0.0.0.0" },
//!   "wireless": { "connected": true, "ip": "192.168.1.50" },
//!   "portal_active": false,
//!   "events": {
//!     "wired_acquired": 1, "failovers": 1, "portal_openings": 0,
//!     "portal_successes": 0, "portal_timeouts": 0, "reconnect_attempts": 0
//!   },
//!   "ticks": 36000
//! }
//! ```

mod server;

pub use server::{StatusServer, DEFAULT_STATUS_PORT};

use crate::controller::LinkState;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::time::Instant;

/// Point-in-time view of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    pub state: LinkState,
    pub wired_connected: bool,
    pub wireless_connected: bool,
    pub portal_active: bool,
    pub wired_address: Ipv4Addr,
    pub wireless_address: Ipv4Addr,
}

/// Transitions worth counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Wired link came up.
    WiredAcquired,
    /// Wired link lost and WiFi took over.
    Failover,
    /// Recovery portal started.
    PortalOpened,
    /// Portal produced a connection.
    PortalSucceeded,
    /// Portal gave up without connectivity.
    PortalTimedOut,
    /// Idle reconnect issued.
    ReconnectAttempt,
}

/// Shared status published by the controller.
#[derive(Debug)]
pub struct LinkStats {
    start_time: Instant,
    hostname: String,
    state: AtomicU8,
    wired_connected: AtomicBool,
    wireless_connected: AtomicBool,
    portal_active: AtomicBool,
    wired_address: AtomicU32,
    wireless_address: AtomicU32,
    /// Times the wired link came up.
    pub wired_acquired: AtomicUsize,
    /// Wired losses recovered over WiFi.
    pub failovers: AtomicUsize,
    /// Portal starts.
    pub portal_openings: AtomicUsize,
    /// Portals that produced a connection.
    pub portal_successes: AtomicUsize,
    /// Portals that timed out.
    pub portal_timeouts: AtomicUsize,
    /// Idle reconnect attempts.
    pub reconnect_attempts: AtomicUsize,
    /// Completed ticks.
    pub ticks: AtomicUsize,
}

impl LinkStats {
    /// Empty stats for `hostname`; state starts as idle.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            start_time: Instant::now(),
            hostname: hostname.into(),
            state: AtomicU8::new(LinkState::Idle as u8),
            wired_connected: AtomicBool::new(false),
            wireless_connected: AtomicBool::new(false),
            portal_active: AtomicBool::new(false),
            wired_address: AtomicU32::new(0),
            wireless_address: AtomicU32::new(0),
            wired_acquired: AtomicUsize::new(0),
            failovers: AtomicUsize::new(0),
            portal_openings: AtomicUsize::new(0),
            portal_successes: AtomicUsize::new(0),
            portal_timeouts: AtomicUsize::new(0),
            reconnect_attempts: AtomicUsize::new(0),
            ticks: AtomicUsize::new(0),
        }
    }

    /// Store a snapshot.
    pub fn publish(&self, status: &LinkStatus) {
        self.state.store(status.state as u8, Ordering::Relaxed);
        self.wired_connected
            .store(status.wired_connected, Ordering::Relaxed);
        self.wireless_connected
            .store(status.wireless_connected, Ordering::Relaxed);
        self.portal_active
            .store(status.portal_active, Ordering::Relaxed);
        self.wired_address
            .store(u32::from(status.wired_address), Ordering::Relaxed);
        self.wireless_address
            .store(u32::from(status.wireless_address), Ordering::Relaxed);
    }

    /// Count an event.
    pub fn record(&self, event: LinkEvent) {
        let counter = match event {
            LinkEvent::WiredAcquired => &self.wired_acquired,
            LinkEvent::Failover => &self.failovers,
            LinkEvent::PortalOpened => &self.portal_openings,
            LinkEvent::PortalSucceeded => &self.portal_successes,
            LinkEvent::PortalTimedOut => &self.portal_timeouts,
            LinkEvent::ReconnectAttempt => &self.reconnect_attempts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Last published snapshot.
    pub fn snapshot(&self) -> LinkStatus {
        LinkStatus {
            state: LinkState::from_u8(self.state.load(Ordering::Relaxed)),
            wired_connected: self.wired_connected.load(Ordering::Relaxed),
            wireless_connected: self.wireless_connected.load(Ordering::Relaxed),
            portal_active: self.portal_active.load(Ordering::Relaxed),
            wired_address: Ipv4Addr::from(self.wired_address.load(Ordering::Relaxed)),
            wireless_address: Ipv4Addr::from(self.wireless_address.load(Ordering::Relaxed)),
        }
    }

    /// Hostname the stats belong to.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Get uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> String {
        let status = self.snapshot();
        let count = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        format!(
            concat!(
                r#"{{"hostname":"{}","uptime_secs":{},"state":"{}","#,
                r#""wired":{{"connected":{},"ip":"{}"}},"#,
                r#""wireless":{{"connected":{},"ip":"{}"}},"#,
                r#""portal_active":{},"#,
                r#""events":{{"wired_acquired":{},"failovers":{},"portal_openings":{},"#,
                r#""portal_successes":{},"portal_timeouts":{},"reconnect_attempts":{}}},"#,
                r#""ticks":{}}}"#
            ),
            json_escape(&self.hostname),
            self.uptime_secs(),
            status.state,
            status.wired_connected,
            status.wired_address,
            status.wireless_connected,
            status.wireless_address,
            status.portal_active,
            count(&self.wired_acquired),
            count(&self.failovers),
            count(&self.portal_openings),
            count(&self.portal_successes),
            count(&self.portal_timeouts),
            count(&self.reconnect_attempts),
            count(&self.ticks),
        )
    }
}

fn json_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wireless_status() -> LinkStatus {
        LinkStatus {
            state: LinkState::Wireless,
            wired_connected: false,
            wireless_connected: true,
            portal_active: false,
            wired_address: Ipv4Addr::UNSPECIFIED,
            wireless_address: Ipv4Addr::new(192, 168, 1, 50),
        }
    }

    #[test]
    fn test_new_stats_are_idle() {
        let stats = LinkStats::new("node");
        let status = stats.snapshot();
        assert_eq!(status.state, LinkState::Idle);
        assert!(!status.portal_active);
        assert_eq!(status.wired_address, Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn test_publish_and_snapshot() {
        let stats = LinkStats::new("node");
        stats.publish(&wireless_status());
        assert_eq!(stats.snapshot(), wireless_status());
    }

    #[test]
    fn test_record_events() {
        let stats = LinkStats::new("node");
        stats.record(LinkEvent::Failover);
        stats.record(LinkEvent::Failover);
        stats.record(LinkEvent::PortalTimedOut);
        assert_eq!(stats.failovers.load(Ordering::Relaxed), 2);
        assert_eq!(stats.portal_timeouts.load(Ordering::Relaxed), 1);
        assert_eq!(stats.portal_openings.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_json() {
        let stats = LinkStats::new("gate-3");
        stats.publish(&wireless_status());
        stats.record(LinkEvent::Failover);

        let json = stats.to_json();
        assert!(json.starts_with('{') && json.ends_with('}'));
        assert!(json.contains(r#""hostname":"gate-3""#));
        assert!(json.contains(r#""state":"wireless""#));
        assert!(json.contains(r#""wireless":{"connected":true,"ip":"192.168.1.50"}"#));
        assert!(json.contains(r#""failovers":1"#));
        assert!(json.contains(r#""portal_active":false"#));
    }

    #[test]
    fn test_json_escapes_hostname() {
        let stats = LinkStats::new("a\"b");
        assert!(stats.to_json().contains(r#""hostname":"a\"b""#));
    }
}
