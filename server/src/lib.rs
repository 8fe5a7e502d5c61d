//! # Game Server Library
//!
//! This library provides the authoritative server for the two-player networked
//! tic-tac-toe game. It owns the only copy of the game session, arbitrates turns,
//! and answers the polling requests that keep each client's view in sync.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Session
//! The server holds the definitive board, roster and turn pointers. Clients never
//! mutate their own view directly; they submit moves and then observe the result
//! by polling.
//!
//! ### Turn Arbitration
//! Every move is checked against the session phase, the mover's identity, the
//! previous mover and the target cell before the board changes. Rejections are
//! reported back to the client with a typed reason instead of being dropped.
//!
//! ### Request/Response Serving
//! Clients speak a small fixed command set over TCP. Every decoded request gets
//! exactly one response; there is no push channel.
//!
//! ## Architecture Design
//!
//! ### Task Per Connection
//! Each accepted connection runs in its own tokio task. All tasks share the one
//! session through a single mutex, which is held for exactly one logical
//! operation and released before any network I/O.
//!
//! ### Framed TCP Transport
//! Messages are bincode bodies behind a 4-byte length prefix, so message
//! boundaries survive arbitrary splitting or coalescing by the transport. Reads
//! and writes are bounded by timeouts.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! Tracks the two seats of the session:
//! - Registration in arrival order with mark assignment
//! - Lookup by client identity
//! - Removal and reset
//!
//! ### Win Module (`win`)
//! Pure win detection over the board, checking rows, then columns, then
//! diagonals.
//!
//! ### Session Module (`session`)
//! The session state machine: phase transitions, turn arbitration, board
//! mutation and command dispatch.
//!
//! ### Network Module (`network`)
//! TCP accept loop and the per-connection read/dispatch/write loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:12345", ServerConfig::default()).await?;
//!
//!     // Accepts clients forever, one task per connection
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod registry;
pub mod session;
pub mod win;
