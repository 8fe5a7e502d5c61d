//! Background polling bridge
//!
//! The server never pushes. A background task polls it on a fixed interval and
//! turns what it learns into [`ServerEvent`]s on an unbounded channel, which the
//! front end drains on its own schedule.

use crate::network::GameClient;
use log::{debug, info, warn};
use shared::ModelChangeEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// What the poller observed, tagged with the command that produced it
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// A real winner was reported; carries the winner's display name
    CheckForWin { winner: String },
    /// The latest board change
    GetModel { change: ModelChangeEvent },
    /// The session started (`true`) or was reset underneath us (`false`)
    CheckForReady { ready: bool },
}

/// Lifecycle flags shared by the poller and the front end
#[derive(Debug)]
pub struct ClientFlags {
    running: AtomicBool,
    in_progress: AtomicBool,
    game_over: AtomicBool,
    stopped: Notify,
}

impl Default for ClientFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientFlags {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            in_progress: AtomicBool::new(false),
            game_over: AtomicBool::new(false),
            stopped: Notify::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Asks the poller to exit, cutting its current sleep short.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stopped.notify_one();
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    pub fn set_in_progress(&self) {
        self.in_progress.store(true, Ordering::SeqCst);
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over.load(Ordering::SeqCst)
    }

    pub fn set_game_over(&self) {
        self.game_over.store(true, Ordering::SeqCst);
    }

    /// Back to "waiting for the game to start".
    pub fn clear_game(&self) {
        self.in_progress.store(false, Ordering::SeqCst);
        self.game_over.store(false, Ordering::SeqCst);
    }
}

pub struct PollingBridge {
    client: Arc<GameClient>,
    flags: Arc<ClientFlags>,
    events: mpsc::UnboundedSender<ServerEvent>,
    interval: Duration,
    seen_change: AtomicBool,
}

impl PollingBridge {
    pub fn new(
        client: Arc<GameClient>,
        flags: Arc<ClientFlags>,
        events: mpsc::UnboundedSender<ServerEvent>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            flags,
            events,
            interval,
            seen_change: AtomicBool::new(false),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Polls until the running flag is cleared or the consumer goes away.
    pub async fn run(self) {
        info!("Polling {} every {:?}", self.client.server_addr(), self.interval);

        while self.flags.is_running() {
            if self.events.is_closed() {
                debug!("Event consumer dropped, stopping poller");
                break;
            }
            self.poll_once().await;

            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = self.flags.stopped.notified() => break,
            }
        }

        info!("Poller stopped");
    }

    /// One polling iteration. Returns the number of events queued.
    ///
    /// Before the game starts only readiness is checked. Once it is in progress
    /// readiness is confirmed first, then a win check is followed by a model
    /// fetch; the change is queued ahead of any winner so the final move always
    /// reaches the board first. A session that is no longer ready, or that lost
    /// the board change already seen, was reset by another client: the flags
    /// are cleared and a reset event is queued. After a winner has been seen
    /// nothing is polled until the flags are cleared. Request failures are
    /// logged and end the iteration.
    pub async fn poll_once(&self) -> usize {
        if self.flags.is_game_over() {
            return 0;
        }

        if !self.flags.is_in_progress() {
            return match self.client.check_for_ready().await {
                Ok(true) => {
                    info!("Game started, please play");
                    self.seen_change.store(false, Ordering::SeqCst);
                    self.flags.set_in_progress();
                    self.push(ServerEvent::CheckForReady { ready: true })
                }
                Ok(false) => {
                    debug!("Waiting for other players");
                    0
                }
                Err(e) => {
                    warn!("Readiness check failed: {}", e);
                    0
                }
            };
        }

        match self.client.check_for_ready().await {
            Ok(true) => {}
            Ok(false) => return self.session_reset(),
            Err(e) => {
                warn!("Readiness check failed: {}", e);
                return 0;
            }
        }

        let winner = match self.client.check_for_win().await {
            Ok(record) if record.is_winner() => Some(record.name),
            Ok(_) => None,
            Err(e) => {
                warn!("Win check failed: {}", e);
                return 0;
            }
        };

        let mut queued = 0;

        match self.client.get_model().await {
            Ok(Some(change)) => {
                self.seen_change.store(true, Ordering::SeqCst);
                queued += self.push(ServerEvent::GetModel { change });
            }
            Ok(None) if self.seen_change.load(Ordering::SeqCst) => return self.session_reset(),
            Ok(None) => debug!("No board change yet"),
            Err(e) => warn!("Model fetch failed: {}", e),
        }

        if let Some(winner) = winner {
            self.flags.set_game_over();
            queued += self.push(ServerEvent::CheckForWin { winner });
        }

        queued
    }

    fn session_reset(&self) -> usize {
        info!("Session was reset, waiting for players again");
        self.flags.clear_game();
        self.seen_change.store(false, Ordering::SeqCst);
        self.push(ServerEvent::CheckForReady { ready: false })
    }

    fn push(&self, event: ServerEvent) -> usize {
        match self.events.send(event) {
            Ok(()) => 1,
            Err(_) => 0,
        }
    }
}
