//! Runtime settings for the game server

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Events fetched per multiplexer wait
pub const DEFAULT_MAX_EVENTS: usize = 1000;

/// Bytes read from a client per read call
pub const DEFAULT_READ_BUFFER: usize = 2048;

/// Read calls made for one readiness event before yielding to other connections
pub const DEFAULT_READS_PER_EVENT: usize = 16;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listening socket binds to
    pub bind_addr: SocketAddr,
    /// Upper bound on readiness events handled per loop iteration
    pub max_events: usize,
    /// Size of the shared read buffer
    pub read_buffer_size: usize,
    /// Cap on read calls per readiness event; leftover input is picked up on a later turn
    pub reads_per_event: usize,
    /// Wait timeout; `None` blocks until something is ready
    pub poll_timeout: Option<Duration>,
    /// Whether a line on standard input starts draining
    pub stdin_control: bool,
    /// Candidate words; empty selects the default word
    pub words: Vec<String>,
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            max_events: DEFAULT_MAX_EVENTS,
            read_buffer_size: DEFAULT_READ_BUFFER,
            reads_per_event: DEFAULT_READS_PER_EVENT,
            poll_timeout: None,
            stdin_control: true,
            words: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.max_events, 1000);
        assert_eq!(config.read_buffer_size, 2048);
        assert_eq!(config.reads_per_event, DEFAULT_READS_PER_EVENT);
        assert!(config.poll_timeout.is_none());
        assert!(config.stdin_control);
        assert!(config.words.is_empty());
    }

    #[test]
    fn test_new_overrides_address_only() {
        let addr: SocketAddr = "0.0.0.0:9000".parse().unwrap();
        let config = ServerConfig::new(addr);
        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_events, DEFAULT_MAX_EVENTS);
    }
}
