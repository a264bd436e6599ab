//! Readiness multiplexer built on `mio`
//!
//! Owns the OS notification primitive (epoll on Linux) and the event buffer it
//! fills. Every wait hands back an owned batch of [`ReadyEvent`]s so the
//! dispatcher can mutate server state while walking the batch.

use crate::error::{Result, ServerError};
use log::{debug, trace};
use mio::event::{Event, Source};
use mio::{Events, Interest, Poll, Token, Waker};
use std::io::ErrorKind;
use std::time::Duration;

/// One readiness notification for a single handle.
///
/// The flags are not mutually exclusive. A closing peer usually reports
/// `readable` together with `peer_closed`; callers must check `peer_closed`
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyEvent {
    pub token: Token,
    pub readable: bool,
    pub writable: bool,
    pub peer_closed: bool,
}

impl ReadyEvent {
    #[cfg(test)]
    pub(crate) fn readable(token: Token) -> Self {
        Self {
            token,
            readable: true,
            writable: false,
            peer_closed: false,
        }
    }
}

impl From<&Event> for ReadyEvent {
    fn from(event: &Event) -> Self {
        Self {
            token: event.token(),
            readable: event.is_readable(),
            writable: event.is_writable(),
            peer_closed: event.is_read_closed() || event.is_error(),
        }
    }
}

/// Watch set plus the reusable event buffer
pub struct Multiplexer {
    poll: Poll,
    events: Events,
    timeout: Option<Duration>,
}

impl Multiplexer {
    /// Creates the readiness primitive with room for `max_batch` events per wait.
    ///
    /// A `timeout` of `None` makes [`Multiplexer::wait`] block until something
    /// is ready.
    pub fn new(max_batch: usize, timeout: Option<Duration>) -> Result<Self> {
        let poll = Poll::new().map_err(ServerError::Multiplexer)?;
        Ok(Self {
            poll,
            events: Events::with_capacity(max_batch.max(1)),
            timeout,
        })
    }

    /// Starts delivering readiness events for `source` under `token`
    pub fn register<S>(&self, source: &mut S, token: Token, interest: Interest) -> Result<()>
    where
        S: Source + ?Sized,
    {
        self.poll
            .registry()
            .register(source, token, interest)
            .map_err(|source| ServerError::Registration { token, source })
    }

    /// Replaces the interest set of an already registered source
    pub fn reregister<S>(&self, source: &mut S, token: Token, interest: Interest) -> Result<()>
    where
        S: Source + ?Sized,
    {
        self.poll
            .registry()
            .reregister(source, token, interest)
            .map_err(|source| ServerError::Registration { token, source })
    }

    /// Stops delivering events for `source`.
    ///
    /// Removing a source that is not (or no longer) watched is a no-op.
    /// Returns whether the source was actually removed.
    pub fn deregister<S>(&self, source: &mut S) -> bool
    where
        S: Source + ?Sized,
    {
        match self.poll.registry().deregister(source) {
            Ok(()) => true,
            Err(e) => {
                debug!("Deregister ignored: {}", e);
                false
            }
        }
    }

    /// Creates a waker that makes `token` readable from any thread
    pub fn waker(&self, token: Token) -> Result<Waker> {
        Waker::new(self.poll.registry(), token)
            .map_err(|source| ServerError::Registration { token, source })
    }

    /// Blocks until at least one watched handle is ready.
    ///
    /// An interrupted wait yields an empty batch; the caller simply waits again.
    pub fn wait(&mut self) -> Result<Vec<ReadyEvent>> {
        self.wait_timeout(self.timeout)
    }

    /// Like [`Multiplexer::wait`] with an explicit timeout; `Some(ZERO)` only
    /// collects what is already ready.
    pub fn wait_timeout(&mut self, timeout: Option<Duration>) -> Result<Vec<ReadyEvent>> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(e) => return Err(ServerError::Wait(e)),
        }

        let batch: Vec<ReadyEvent> = self.events.iter().map(ReadyEvent::from).collect();
        trace!("Readiness batch of {} events", batch.len());
        Ok(batch)
    }
}
