//! Queue consumer
//!
//! Drains whatever the poller has queued and applies it to the local view of
//! the board. Draining never waits: an empty queue is simply nothing to do.

use crate::bridge::{ClientFlags, ServerEvent};
use log::{debug, info, warn};
use shared::{Board, Cell, GameError, ModelChangeEvent, GRID_SIZE};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Whatever shows the game to the player
pub trait Presenter {
    /// A cell gained a mark.
    fn cell_changed(&mut self, change: &ModelChangeEvent);

    /// The game ended with `winner`.
    fn game_over(&mut self, winner: &str);

    /// Both seats are taken and moves are accepted.
    fn game_started(&mut self) {}

    /// The session was reset by someone else; the board is empty again.
    fn session_reset(&mut self) {}
}

/// Client-side copy of the board plus which cells still accept a click
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalBoard {
    board: Board,
    disabled: [[bool; GRID_SIZE]; GRID_SIZE],
}

impl LocalBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<Cell> {
        self.board.get(row, column)
    }

    pub fn is_enabled(&self, row: usize, column: usize) -> bool {
        Board::in_bounds(row, column) && !self.disabled[row][column]
    }

    /// Stops further clicks on a cell the player already picked.
    pub fn disable(&mut self, row: usize, column: usize) {
        if Board::in_bounds(row, column) {
            self.disabled[row][column] = true;
        }
    }

    /// Records a server-reported change. Returns whether the view changed.
    pub fn apply(&mut self, change: &ModelChangeEvent) -> bool {
        let (row, column) = (change.row, change.column);
        match self.board.place(row, column, change.mark) {
            Ok(()) => {
                self.disabled[row][column] = true;
                true
            }
            Err(GameError::CellOccupied { .. }) => {
                if self.board.get(row, column) != Some(Some(change.mark)) {
                    warn!("Ignoring conflicting change {}", change);
                }
                false
            }
            Err(e) => {
                warn!("Ignoring change {}: {}", change, e);
                false
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub applied: usize,
    /// Last winner announced in this pass
    pub winner: Option<String>,
    pub started: bool,
    /// A reset was seen after the last winner in this pass
    pub reset: bool,
}

pub struct QueueConsumer {
    events: mpsc::UnboundedReceiver<ServerEvent>,
    flags: Arc<ClientFlags>,
    board: LocalBoard,
}

impl QueueConsumer {
    pub fn new(events: mpsc::UnboundedReceiver<ServerEvent>, flags: Arc<ClientFlags>) -> Self {
        Self {
            events,
            flags,
            board: LocalBoard::new(),
        }
    }

    pub fn board(&self) -> &LocalBoard {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut LocalBoard {
        &mut self.board
    }

    /// Applies every queued event in arrival order without blocking.
    ///
    /// Each event reaches the presenter as soon as it is dequeued, so a winner
    /// is announced exactly where the poller queued it. Repeated deltas for a
    /// cell that is already marked are ignored.
    pub fn drain<P: Presenter + ?Sized>(&mut self, presenter: &mut P) -> DrainReport {
        let mut report = DrainReport::default();

        while let Ok(event) = self.events.try_recv() {
            match event {
                ServerEvent::GetModel { change } => {
                    if self.board.apply(&change) {
                        debug!("Applied {}", change);
                        presenter.cell_changed(&change);
                        report.applied += 1;
                    }
                }
                ServerEvent::CheckForWin { winner } => {
                    info!("Game over, winner: {}", winner);
                    self.flags.set_game_over();
                    presenter.game_over(&winner);
                    report.winner = Some(winner);
                    report.reset = false;
                }
                ServerEvent::CheckForReady { ready: true } => {
                    presenter.game_started();
                    report.started = true;
                }
                ServerEvent::CheckForReady { ready: false } => {
                    info!("Session reset by another player");
                    self.board.clear();
                    presenter.session_reset();
                    report.reset = true;
                }
            }
        }

        report
    }

    /// Forgets the local board and anything still queued from the last game.
    pub fn clear(&mut self) {
        while self.events.try_recv().is_ok() {}
        self.board.clear();
    }
}
