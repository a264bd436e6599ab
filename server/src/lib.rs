//! # Word Game Server Library
//!
//! A letter-guessing game served over plain TCP. Every client that connects
//! gets its own hidden word; each chunk of bytes it sends is one guess, and the
//! server answers with the word so far, unguessed letters masked with `*`.
//! Once every letter is revealed the server sends a completion notice and
//! hangs up.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Readiness Loop
//! One thread blocks on a readiness multiplexer (epoll through `mio`) and
//! handles each batch of ready events in order. All session state is owned by
//! that thread, so nothing is locked and no two events ever race on the same
//! session.
//!
//! ### Non-Blocking I/O
//! The listener and every client socket are non-blocking. A read or write that
//! would block means "nothing to do this cycle"; the next readiness event picks
//! up where the last one stopped. Output that the socket cannot take yet stays
//! queued on the connection until it becomes writable.
//!
//! A single event reads at most a fixed number of chunks from one client, so a
//! client flooding its socket cannot hold the loop. Whatever is left is read
//! (and thrown away) on the following turns.
//!
//! ### Lifecycle
//! `Initializing → Accepting → Draining → ShutDown`. A line on standard input
//! (or [`network::ShutdownHandle::drain`]) moves the server to `Draining`: new
//! connections are no longer accepted, but open sessions are played to the end
//! or until their client leaves. The loop exits once the last session is gone.
//!
//! ## Module Organization
//!
//! ### Multiplexer Module (`multiplexer`)
//! Registration, deregistration and batched waits over the OS primitive.
//!
//! ### Registry Module (`registry`)
//! Live connections keyed by token, each owning its socket, session and
//! pending output.
//!
//! ### Session Module (`session`)
//! The per-connection game: guess application, completion, reveal rendering.
//!
//! ### Content Module (`content`)
//! Chooses the word and attempt budget for each new session.
//!
//! ### Network Module (`network`)
//! The server itself: startup, dispatch, teardown and shutdown.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new("127.0.0.1:8080".parse()?);
//!     let mut server = Server::new(&config)?;
//!
//!     // Serves clients until <enter> is pressed and every game has ended
//!     let stats = server.run()?;
//!     println!("{} games completed", stats.completed);
//!     Ok(())
//! }
//! ```
//!
//! ## Known Limits
//!
//! Idle connections are never timed out, so a client that connects and goes
//! silent holds its session until it disconnects or the server is stopped.

pub mod config;
pub mod content;
pub mod error;
pub mod multiplexer;
pub mod network;
pub mod registry;
pub mod session;
