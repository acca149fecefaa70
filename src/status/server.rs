//! HTTP status endpoint.
//!
//! Serves [`LinkStats`] as JSON at `GET /status`. Uses `tiny_http`, which works
//! on both host and ESP32 (via std::net).

use super::LinkStats;
use log::{error, info, warn};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};

/// Default port for the status server.
pub const DEFAULT_STATUS_PORT: u16 = 8080;

/// How long a blocking receive waits before rechecking the shutdown flag.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// HTTP status server running on a background thread.
pub struct StatusServer {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    port: u16,
}

impl StatusServer {
    /// Start serving `stats`.
    ///
    /// Binds to 0.0.0.0 when `bind_addr` is `None`. Port 0 picks a free port;
    /// see [`StatusServer::port`]. Drop the handle to stop the server.
    pub fn start(
        bind_addr: Option<IpAddr>,
        port: u16,
        stats: Arc<LinkStats>,
    ) -> Result<Self, std::io::Error> {
        let addr = match bind_addr {
            Some(ip) => format!("{}:{}", ip, port),
            None => format!("0.0.0.0:{}", port),
        };

        let server = Server::http(&addr)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::AddrInUse, format!("{}", e)))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|a| a.port())
            .unwrap_or(port);

        info!("Status server listening on port {} (/status)", port);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let handle = thread::spawn(move || {
            Self::run_server(server, stats, shutdown_clone);
        });

        Ok(Self {
            handle: Some(handle),
            shutdown,
            port,
        })
    }

    /// Port the server is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    fn run_server(server: Server, stats: Arc<LinkStats>, shutdown: Arc<AtomicBool>) {
        loop {
            if shutdown.load(Ordering::Acquire) {
                info!("Status server shutting down");
                break;
            }

            match server.recv_timeout(RECV_TIMEOUT) {
                Ok(Some(request)) => Self::handle(request, &stats),
                Ok(None) => {}
                Err(e) => {
                    error!("Status server error: {}", e);
                    break;
                }
            }
        }
    }

    fn handle(request: Request, stats: &LinkStats) {
        let (status, body, header) = route(request.method(), request.url(), stats);
        let mut response = Response::from_string(body).with_status_code(status);
        if let Some((name, value)) = header {
            if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
                response = response.with_header(header);
            }
        }
        if let Err(e) = request.respond(response) {
            warn!("Failed to send status response: {}", e);
        }
    }

    /// Stop the server. May take up to one receive timeout.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatusServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Response for a request: status code, body and an optional extra header.
fn route(
    method: &Method,
    path: &str,
    stats: &LinkStats,
) -> (u16, String, Option<(&'static str, &'static str)>) {
    if method != &Method::Get {
        return (
            405,
            "Method Not Allowed".to_string(),
            Some(("Allow", "GET")),
        );
    }

    match path {
        "/status" | "/status/" => (
            200,
            stats.to_json(),
            Some(("Content-Type", "application/json")),
        ),
        "/" => (
            302,
            "See /status for link status".to_string(),
            Some(("Location", "/status")),
        ),
        _ => (404, "Not Found".to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{Ipv4Addr, TcpStream};

    #[test]
    fn test_route_status() {
        let stats = LinkStats::new("node");
        let (code, body, header) = route(&Method::Get, "/status", &stats);
        assert_eq!(code, 200);
        assert!(body.contains(r#""hostname":"node""#));
        assert_eq!(header, Some(("Content-Type", "application/json")));
    }

    #[test]
    fn test_route_redirect_and_not_found() {
        let stats = LinkStats::new("node");
        assert_eq!(route(&Method::Get, "/", &stats).0, 302);
        assert_eq!(route(&Method::Get, "/stats", &stats).0, 404);
    }

    #[test]
    fn test_route_rejects_post() {
        let stats = LinkStats::new("node");
        let (code, _, header) = route(&Method::Post, "/status", &stats);
        assert_eq!(code, 405);
        assert_eq!(header, Some(("Allow", "GET")));
    }

    #[test]
    fn test_server_serves_status() {
        let stats = Arc::new(LinkStats::new("loopback"));
        let mut server =
            StatusServer::start(Some(IpAddr::V4(Ipv4Addr::LOCALHOST)), 0, stats).unwrap();

        let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, server.port())).unwrap();
        stream
            .write_all(b"GET /status HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains(r#""hostname":"loopback""#));
        server.stop();
    }
}
