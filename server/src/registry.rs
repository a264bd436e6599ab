//! Connection bookkeeping for the dispatch loop
//!
//! The registry is the single source of truth for which connections are live.
//! A token is present here exactly while its stream is registered with the
//! multiplexer; the listener and control tokens never appear.

use crate::session::Session;
use log::info;
use mio::net::TcpStream;
use mio::{Interest, Token};
use std::collections::HashMap;
use std::io::{self, ErrorKind, Write};
use std::net::SocketAddr;

/// First token handed out to client connections; lower values are reserved
pub const FIRST_CONNECTION_TOKEN: usize = 2;

/// An accepted client and the session it plays
#[derive(Debug)]
pub struct Connection {
    pub stream: TcpStream,
    pub peer_addr: SocketAddr,
    pub session: Session,
    /// Bytes accepted for sending that the socket has not taken yet
    pub outbox: Vec<u8>,
    /// Set once the game is won; the connection closes after `outbox` drains
    pub closing: bool,
    /// Whether write interest is currently registered
    pub awaiting_writable: bool,
    /// Input left over after the per-event read cap; skipped instead of guessed
    pub discarding_input: bool,
}

impl Connection {
    pub fn new(stream: TcpStream, peer_addr: SocketAddr, session: Session) -> Self {
        Self {
            stream,
            peer_addr,
            session,
            outbox: Vec::new(),
            closing: false,
            awaiting_writable: false,
            discarding_input: false,
        }
    }

    /// Interest set the stream should currently be registered with
    pub fn interest(&self) -> Interest {
        if self.awaiting_writable {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        }
    }

    /// Writes as much of the outbox as the socket accepts.
    ///
    /// Returns `Ok(true)` once everything has been written and `Ok(false)` when
    /// the socket would block with bytes still pending.
    pub fn flush(&mut self) -> io::Result<bool> {
        while !self.outbox.is_empty() {
            match self.stream.write(&self.outbox) {
                Ok(0) => return Err(ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.outbox.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }
}

/// Live connections keyed by their multiplexer token
pub struct ConnectionRegistry {
    connections: HashMap<Token, Connection>,
    /// Next token to hand out; tokens are never reused
    next_token: usize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            next_token: FIRST_CONNECTION_TOKEN,
        }
    }

    /// Reserves a fresh token for a connection about to be registered
    pub fn allocate_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    /// Adds a connection under `token`.
    ///
    /// Refuses to replace an existing entry, so at most one session exists per
    /// token. Returns the connection back on refusal.
    pub fn insert(&mut self, token: Token, connection: Connection) -> Result<(), Connection> {
        if self.connections.contains_key(&token) {
            return Err(connection);
        }
        info!(
            "Connection {} opened from {}",
            token.0, connection.peer_addr
        );
        self.connections.insert(token, connection);
        Ok(())
    }

    /// Removes a connection; `None` if it was already gone
    pub fn remove(&mut self, token: Token) -> Option<Connection> {
        self.connections.remove(&token)
    }

    #[cfg(test)]
    pub(crate) fn get(&self, token: Token) -> Option<&Connection> {
        self.connections.get(&token)
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut Connection> {
        self.connections.get_mut(&token)
    }

    pub fn contains(&self, token: Token) -> bool {
        self.connections.contains_key(&token)
    }

    /// Snapshot of all live tokens
    pub fn tokens(&self) -> Vec<Token> {
        self.connections.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::net::TcpListener;
    use std::io::Read;
    use std::thread;
    use std::time::Duration;

    /// Returns a connected (server side, client side) pair
    fn socket_pair() -> (TcpStream, SocketAddr, std::net::TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();

        for _ in 0..100 {
            match listener.accept() {
                Ok((stream, addr)) => return (stream, addr, client),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(10))
                }
                Err(e) => panic!("accept failed: {e}"),
            }
        }
        panic!("connection never arrived");
    }

    fn test_connection(word: &str) -> (Connection, std::net::TcpStream) {
        let (stream, addr, client) = socket_pair();
        let session = Session::new(word.as_bytes().to_vec(), word.len() as u32);
        (Connection::new(stream, addr, session), client)
    }

    #[test]
    fn test_registry_creation() {
        let registry = ConnectionRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_tokens_are_unique_and_skip_reserved() {
        let mut registry = ConnectionRegistry::new();
        let first = registry.allocate_token();
        let second = registry.allocate_token();

        assert_eq!(first, Token(FIRST_CONNECTION_TOKEN));
        assert_ne!(first, second);
    }

    #[test]
    fn test_insert_and_remove() {
        let mut registry = ConnectionRegistry::new();
        let token = registry.allocate_token();
        let (connection, _client) = test_connection("cat");

        assert!(registry.insert(token, connection).is_ok());
        assert!(registry.contains(token));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.tokens(), vec![token]);

        let removed = registry.remove(token).unwrap();
        assert_eq!(removed.session.content(), b"cat");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_twice() {
        let mut registry = ConnectionRegistry::new();
        let token = registry.allocate_token();
        let (connection, _client) = test_connection("cat");
        registry.insert(token, connection).unwrap();

        assert!(registry.remove(token).is_some());
        assert!(registry.remove(token).is_none());
        assert!(!registry.contains(token));
    }

    #[test]
    fn test_insert_refuses_duplicate_token() {
        let mut registry = ConnectionRegistry::new();
        let token = registry.allocate_token();
        let (first, _client1) = test_connection("cat");
        let (second, _client2) = test_connection("dog");

        registry.insert(token, first).unwrap();
        let rejected = registry.insert(token, second).unwrap_err();

        assert_eq!(rejected.session.content(), b"dog");
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get_mut(token).unwrap().session.content(),
            b"cat"
        );
    }

    #[test]
    fn test_flush_delivers_outbox() {
        let (mut connection, mut client) = test_connection("cat");
        connection.outbox.extend_from_slice(b"c**\n");

        assert!(connection.flush().unwrap());
        assert!(connection.outbox.is_empty());

        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"c**\n");
    }

    #[test]
    fn test_interest_follows_pending_output() {
        let (mut connection, _client) = test_connection("cat");
        assert_eq!(connection.interest(), Interest::READABLE);

        connection.awaiting_writable = true;
        assert_eq!(connection.interest(), Interest::READABLE | Interest::WRITABLE);
    }

    #[test]
    fn test_flush_empty_outbox() {
        let (mut connection, _client) = test_connection("cat");
        assert!(connection.flush().unwrap());
    }
}
