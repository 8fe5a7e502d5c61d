//! # Game Client Library
//!
//! This library provides the client side of the networked tic-tac-toe game. It
//! talks to the authoritative server over TCP, keeps a local copy of the board
//! in sync by polling, and hands every observed change to a presentation layer.
//!
//! ## Architecture Overview
//!
//! The server never pushes anything. Instead the client is built from three
//! cooperating parts:
//!
//! ### Request Proxy
//! One method per protocol command. Each call sends a single framed request and
//! waits, with a timeout, for its single response. Calls are serialized on one
//! connection, and a broken connection is reopened on the next call.
//!
//! ### Polling Bridge
//! A background task that asks the server whether the game has started, and
//! once it has, whether someone won and what the latest board change was. Its
//! findings are queued as events on an unbounded channel.
//!
//! ### Queue Consumer
//! Drained by the front end on a fixed interval. Draining never blocks; each
//! event updates the local board and is forwarded to a [`consumer::Presenter`].
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! - Connection management and per-request timeouts
//! - Typed wrappers for the eight protocol commands
//! - Rejections surfaced as [`network::ClientError`]
//!
//! ### Bridge Module (`bridge`)
//! - Shared lifecycle flags (running, in progress, game over)
//! - The polling loop and the events it produces
//!
//! ### Consumer Module (`consumer`)
//! - Local board cache with per-cell enablement
//! - The presenter seam for whatever renders the game
//!
//! ### Controller Module (`controller`)
//! Wires the three parts together and exposes join, move, reset and leave.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::{controller::GameController, ClientConfig};
//!
//! # async fn play() -> Result<(), client::network::ClientError> {
//! let config = ClientConfig::default();
//! let mut controller = GameController::connect(&config).await?;
//!
//! if let Some(mark) = controller.register("Alice").await? {
//!     println!("Playing {}", mark);
//! }
//!
//! controller.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod consumer;
pub mod controller;
pub mod network;

pub use network::{ClientError, GameClient};

use std::time::Duration;

/// Default delay between two polling iterations
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Default delay between two queue drains
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_millis(500);

/// Default bound on one request/response round trip
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client tuning knobs
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address as `host:port`
    pub server: String,
    pub poll_interval: Duration,
    pub drain_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: format!("127.0.0.1:{}", shared::DEFAULT_PORT),
            poll_interval: DEFAULT_POLL_INTERVAL,
            drain_interval: DEFAULT_DRAIN_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}
