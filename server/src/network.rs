//! Server event loop: startup, readiness dispatch, teardown and shutdown

use crate::config::ServerConfig;
use crate::content::{self, ContentGenerator};
use crate::error::{Result, ServerError};
use crate::multiplexer::{Multiplexer, ReadyEvent};
use crate::registry::{Connection, ConnectionRegistry};
use crate::session::Session;
use log::{debug, error, info, trace, warn};
use mio::net::{TcpListener, TcpStream};
use mio::{Interest, Token, Waker};
use shared::{parse_guess, SUCCESS_MSG};
use std::io::{self, ErrorKind, Read};
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

/// Token of the listening socket
pub const LISTENER: Token = Token(0);
/// Token shared by operator input and the in-process shutdown handle
pub const CONTROL: Token = Token(1);

/// Phases of the server's life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Initializing,
    Accepting,
    /// No new connections; runs until the last session ends
    Draining,
    ShutDown,
}

/// Why a connection was torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Completed,
    PeerClosed,
    IoError,
    Forced,
}

/// Counters reported when the server stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServerStats {
    pub accepted: u64,
    pub completed: u64,
    pub disconnected: u64,
    pub forced: u64,
}

/// Starts draining a running server from any thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    /// Makes the control handle readable, which the loop treats like operator input
    pub fn drain(&self) -> io::Result<()> {
        self.waker.wake()
    }
}

/// What a drained read produced
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ReadOutcome {
    guess: Option<u8>,
    eof: bool,
    /// The read cap was hit before the socket would block
    more: bool,
}

/// How an accept loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptEnd {
    /// The backlog is empty
    Drained,
    /// A hard error stopped the loop with connections possibly still queued
    Failed,
}

/// Single-threaded game server.
///
/// Owns the listener, the watch set and every session; all mutation happens on
/// the thread calling [`Server::run`].
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    multiplexer: Multiplexer,
    registry: ConnectionRegistry,
    generator: Box<dyn ContentGenerator>,
    waker: Arc<Waker>,
    read_buffer: Vec<u8>,
    reads_per_event: usize,
    /// Connections that stopped at the read cap with input possibly left
    unfinished_reads: Vec<Token>,
    state: LifecycleState,
    stats: ServerStats,
}

impl Server {
    /// Binds, creates the multiplexer and registers the listener and control
    /// handles, using the configured word list.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        Self::bind(config, content::from_words(&config.words))
    }

    /// Like [`Server::new`] with an explicit content generator
    pub fn bind(config: &ServerConfig, generator: Box<dyn ContentGenerator>) -> Result<Self> {
        let mut state = LifecycleState::Initializing;
        debug!("{:?} server on {}", state, config.bind_addr);

        let bind_error = |source| ServerError::Bind {
            addr: config.bind_addr,
            source,
        };
        let mut listener = TcpListener::bind(config.bind_addr).map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let multiplexer = Multiplexer::new(config.max_events, config.poll_timeout)?;
        multiplexer.register(&mut listener, LISTENER, Interest::READABLE)?;
        let waker = Arc::new(multiplexer.waker(CONTROL)?);
        if config.stdin_control {
            register_stdin(&multiplexer);
        }

        state = LifecycleState::Accepting;
        info!("Server listening on {}", local_addr);

        Ok(Self {
            listener: Some(listener),
            local_addr,
            multiplexer,
            registry: ConnectionRegistry::new(),
            generator,
            waker,
            read_buffer: vec![0; config.read_buffer_size.max(1)],
            reads_per_event: config.reads_per_event.max(1),
            unfinished_reads: Vec::new(),
            state,
            stats: ServerStats::default(),
        })
    }

    /// Address actually bound, useful when binding port 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn stats(&self) -> ServerStats {
        self.stats
    }

    /// Number of live sessions
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            waker: Arc::clone(&self.waker),
        }
    }

    /// Runs the event loop until draining finishes, then shuts down.
    ///
    /// A failed wait aborts the loop; remaining sessions are still closed
    /// before the error is returned.
    pub fn run(&mut self) -> Result<ServerStats> {
        if self.state == LifecycleState::ShutDown {
            return Ok(self.stats);
        }

        info!("Server started");
        let outcome = self.event_loop();
        if let Err(e) = &outcome {
            error!("Event loop aborted: {}", e);
        }
        self.shutdown();
        outcome.map(|()| self.stats)
    }

    fn event_loop(&mut self) -> Result<()> {
        while !self.is_drained() {
            self.turn()?;
        }
        Ok(())
    }

    /// One wait plus dispatch of the whole batch.
    ///
    /// Reads cut short by the cap on an earlier turn are resumed after the
    /// batch; while any are outstanding the wait does not block.
    pub(crate) fn turn(&mut self) -> Result<()> {
        let resumed = std::mem::take(&mut self.unfinished_reads);
        let batch = if resumed.is_empty() {
            self.multiplexer.wait()?
        } else {
            self.multiplexer.wait_timeout(Some(Duration::ZERO))?
        };

        for event in batch {
            self.process_event(event);
        }
        for token in resumed {
            if self.registry.contains(token) {
                self.handle_readable(token);
            }
        }
        Ok(())
    }

    fn is_drained(&self) -> bool {
        self.state == LifecycleState::Draining && self.registry.is_empty()
    }

    /// Routes one readiness event.
    ///
    /// For client connections peer closure wins over readability, then reads
    /// are handled before writes.
    pub(crate) fn process_event(&mut self, event: ReadyEvent) {
        match event.token {
            LISTENER => {
                if self.state == LifecycleState::Accepting {
                    self.accept_connections();
                } else {
                    trace!("Listener readiness ignored while {:?}", self.state);
                }
            }
            CONTROL => self.begin_draining(),
            token => {
                if !self.registry.contains(token) {
                    trace!("Event for closed connection {}", token.0);
                    return;
                }
                if event.peer_closed {
                    self.close_connection(token, CloseReason::PeerClosed);
                    return;
                }
                if event.readable {
                    self.handle_readable(token);
                }
                if event.writable && self.registry.contains(token) {
                    self.flush_connection(token, false);
                }
            }
        }
    }

    fn begin_draining(&mut self) {
        if self.state == LifecycleState::Accepting {
            self.state = LifecycleState::Draining;
            info!(
                "Draining: no longer accepting, waiting on {} sessions",
                self.registry.len()
            );
        } else {
            debug!("Control input ignored while {:?}", self.state);
        }
    }

    fn accept_connections(&mut self) {
        let Some(mut listener) = self.listener.take() else {
            return;
        };

        let end = accept_until_blocked(
            || listener.accept(),
            |(stream, peer_addr)| self.open_connection(stream, peer_addr),
        );
        if end == AcceptEnd::Failed {
            self.rearm_listener(&mut listener);
        }
        self.listener = Some(listener);
    }

    /// Asks for a fresh readiness report on the listener so a backlog left
    /// behind by a failed accept is retried on a later turn
    fn rearm_listener(&self, listener: &mut TcpListener) {
        if let Err(e) = self
            .multiplexer
            .reregister(listener, LISTENER, Interest::READABLE)
        {
            error!("Listener could not be re-armed: {}", e);
        }
    }

    fn open_connection(&mut self, mut stream: TcpStream, peer_addr: SocketAddr) {
        let token = self.registry.allocate_token();
        if let Err(e) = self
            .multiplexer
            .register(&mut stream, token, Interest::READABLE)
        {
            warn!("Dropping connection from {}: {}", peer_addr, e);
            return;
        }

        let content = self.generator.generate_content();
        let attempts = self.generator.attempt_budget(&content);
        let session = Session::new(content, attempts);
        debug!(
            "Connection {} plays a {}-symbol word with {} attempts",
            token.0,
            session.content().len(),
            attempts
        );

        match self
            .registry
            .insert(token, Connection::new(stream, peer_addr, session))
        {
            Ok(()) => self.stats.accepted += 1,
            Err(mut rejected) => {
                warn!("Token {} already in use, dropping {}", token.0, peer_addr);
                self.multiplexer.deregister(&mut rejected.stream);
            }
        }
    }

    fn handle_readable(&mut self, token: Token) {
        let Some(connection) = self.registry.get_mut(token) else {
            return;
        };

        let outcome = match read_guess(
            &mut connection.stream,
            &mut self.read_buffer,
            self.reads_per_event,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!("Read from connection {} failed: {}", token.0, e);
                self.close_connection(token, CloseReason::IoError);
                return;
            }
        };

        let skipped = connection.discarding_input || connection.closing;
        connection.discarding_input = outcome.more;
        if outcome.more && !self.unfinished_reads.contains(&token) {
            trace!("Connection {} hit the read cap, resuming next turn", token.0);
            self.unfinished_reads.push(token);
        }

        let Some(symbol) = outcome.guess.filter(|_| !skipped) else {
            if outcome.eof {
                self.close_connection(token, CloseReason::PeerClosed);
            }
            return;
        };

        let complete = connection.session.apply_guess(symbol);
        debug!(
            "Connection {} guessed {:?}, {} attempts left",
            token.0,
            symbol as char,
            connection.session.remaining_attempts()
        );

        connection.outbox.extend(connection.session.render());
        if complete {
            connection.outbox.extend_from_slice(SUCCESS_MSG);
            connection.closing = true;
        }

        self.flush_connection(token, outcome.eof);
    }

    /// Pushes pending output and settles what happens to the connection next.
    ///
    /// `peer_gone` means end-of-stream was already seen on the read side.
    fn flush_connection(&mut self, token: Token, peer_gone: bool) {
        let Some(connection) = self.registry.get_mut(token) else {
            return;
        };

        let flushed = connection.flush();
        let closing = connection.closing;

        match flushed {
            Ok(true) if closing => {
                self.close_connection(token, CloseReason::Completed);
            }
            Ok(_) if peer_gone => {
                self.close_connection(token, CloseReason::PeerClosed);
            }
            Ok(all_sent) if all_sent == connection.awaiting_writable => {
                connection.awaiting_writable = !all_sent;
                trace!(
                    "Connection {} has {} bytes pending",
                    token.0,
                    connection.outbox.len()
                );
                let interest = connection.interest();
                if let Err(e) = self
                    .multiplexer
                    .reregister(&mut connection.stream, token, interest)
                {
                    warn!("{}", e);
                    self.close_connection(token, CloseReason::IoError);
                }
            }
            Ok(_) => {}
            Err(e) => {
                debug!("Write to connection {} failed: {}", token.0, e);
                self.close_connection(token, CloseReason::IoError);
            }
        }
    }

    /// Tears a connection down: transport, watch set, then registry.
    ///
    /// Returns `false` when the connection was already gone, which is not an
    /// error.
    pub fn close_connection(&mut self, token: Token, reason: CloseReason) -> bool {
        let Some(connection) = self.registry.get_mut(token) else {
            debug!("Connection {} already closed", token.0);
            return false;
        };

        if let Err(e) = connection.stream.shutdown(Shutdown::Both) {
            debug!("Shutdown of connection {} reported: {}", token.0, e);
        }
        self.multiplexer.deregister(&mut connection.stream);

        let Some(connection) = self.registry.remove(token) else {
            return false;
        };

        match reason {
            CloseReason::Completed => self.stats.completed += 1,
            CloseReason::PeerClosed | CloseReason::IoError => self.stats.disconnected += 1,
            CloseReason::Forced => self.stats.forced += 1,
        }
        info!(
            "Connection {} from {} closed ({:?})",
            token.0, connection.peer_addr, reason
        );
        true
    }

    /// Force-closes leftover sessions and releases the listener
    fn shutdown(&mut self) {
        for token in self.registry.tokens() {
            self.close_connection(token, CloseReason::Forced);
        }
        if let Some(mut listener) = self.listener.take() {
            self.multiplexer.deregister(&mut listener);
        }
        self.state = LifecycleState::ShutDown;

        let stats = self.stats;
        info!(
            "Server shut down: {} accepted, {} completed, {} disconnected, {} force-closed",
            stats.accepted, stats.completed, stats.disconnected, stats.forced
        );
    }
}

/// Reads until the socket would block, keeping only the first byte seen.
///
/// At most `max_reads` chunks are read; `more` reports that the cap was hit.
fn read_guess<R: Read>(
    stream: &mut R,
    buffer: &mut [u8],
    max_reads: usize,
) -> io::Result<ReadOutcome> {
    let mut outcome = ReadOutcome::default();
    let mut reads = 0;
    loop {
        if reads == max_reads {
            outcome.more = true;
            return Ok(outcome);
        }
        match stream.read(buffer) {
            Ok(0) => {
                outcome.eof = true;
                return Ok(outcome);
            }
            Ok(n) => {
                reads += 1;
                if outcome.guess.is_none() {
                    outcome.guess = parse_guess(&buffer[..n]);
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(outcome),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Accepts until the backlog is empty, skipping connections that died in it
fn accept_until_blocked<T, A, H>(mut accept: A, mut handle: H) -> AcceptEnd
where
    A: FnMut() -> io::Result<T>,
    H: FnMut(T),
{
    loop {
        match accept() {
            Ok(accepted) => handle(accepted),
            Err(e) if e.kind() == ErrorKind::WouldBlock => return AcceptEnd::Drained,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::Interrupted
                        | ErrorKind::ConnectionAborted
                        | ErrorKind::ConnectionReset
                ) =>
            {
                debug!("Transient accept error: {}", e);
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                return AcceptEnd::Failed;
            }
        }
    }
}

#[cfg(unix)]
fn register_stdin(multiplexer: &Multiplexer) {
    use std::os::unix::io::AsRawFd;

    match register_control_fd(multiplexer, io::stdin().as_raw_fd()) {
        Ok(()) => info!("Press <enter> to stop the server"),
        Err(e) => warn!("Operator input unavailable: {}", e),
    }
}

/// Watches `fd` under the control token; any input on it starts draining
#[cfg(unix)]
fn register_control_fd(multiplexer: &Multiplexer, fd: std::os::unix::io::RawFd) -> Result<()> {
    use mio::unix::SourceFd;

    multiplexer.register(&mut SourceFd(&fd), CONTROL, Interest::READABLE)
}

#[cfg(not(unix))]
fn register_stdin(_multiplexer: &Multiplexer) {
    warn!("Operator input is only supported on unix");
}
