//! Authoritative game session: phase tracking, turn arbitration and board updates.

use crate::registry::{PlayerRegistry, MAX_PLAYERS};
use crate::win::detect_winner;
use log::{debug, info, warn};
use shared::{
    Board, ClientId, Command, GameError, Mark, ModelChangeEvent, Payload, PlayerRecord, Request,
    Response,
};
use std::fmt;

/// Coarse lifecycle of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingForPlayers,
    Ready,
    InProgress,
    GameOver,
}

impl Phase {
    /// Moves are accepted once both players are in and until somebody wins.
    pub fn accepts_moves(self) -> bool {
        matches!(self, Phase::Ready | Phase::InProgress)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::WaitingForPlayers => "WAITING_FOR_PLAYERS",
            Phase::Ready => "READY",
            Phase::InProgress => "IN_PROGRESS",
            Phase::GameOver => "GAME_OVER",
        };
        f.write_str(name)
    }
}

/// The one session a server process hosts. Reset in place, never replaced.
#[derive(Debug)]
pub struct Session {
    phase: Phase,
    board: Board,
    registry: PlayerRegistry,
    whose_turn: Option<ClientId>,
    previous_turn: Option<ClientId>,
    announced_turn: Option<ClientId>,
    winner: Option<PlayerRecord>,
    last_change: Option<ModelChangeEvent>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::WaitingForPlayers,
            board: Board::new(),
            registry: PlayerRegistry::new(),
            whose_turn: None,
            previous_turn: None,
            announced_turn: None,
            winner: None,
            last_change: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn whose_turn(&self) -> Option<ClientId> {
        self.whose_turn
    }

    pub fn winner(&self) -> Option<&PlayerRecord> {
        self.winner.as_ref()
    }

    /// Routes a decoded request to the matching operation and builds its response.
    pub fn handle(&mut self, request: &Request) -> Response {
        let client_id = request.client_id;
        let kind = request.command.kind();
        debug!("Command {} ({}) from client {}", kind, kind.code(), client_id);

        let payload = match &request.command {
            Command::RegisterUser { player_name } => {
                Payload::Mark(self.register(client_id, player_name))
            }
            Command::UnRegisterUser { .. } => {
                self.unregister(client_id);
                Payload::Ack
            }
            Command::UpdateModel { row, column, .. } => {
                match self.update_model(client_id, *row, *column) {
                    Ok(_) => Payload::Ack,
                    Err(e) => Payload::Rejected(e),
                }
            }
            Command::Reset => {
                self.reset();
                Payload::Ack
            }
            Command::CheckForWin => Payload::Winner(self.check_for_win()),
            Command::NextTurn { .. } => match self.next_turn(client_id) {
                Ok(id) => Payload::Turn(id),
                Err(e) => Payload::Rejected(e),
            },
            Command::GetModel => Payload::Model(self.get_model()),
            Command::CheckForReady => Payload::Ready(self.check_for_ready()),
        };

        if let Payload::Rejected(e) = &payload {
            warn!("{} from client {} rejected: {}", kind, client_id, e);
        }

        Response::new(kind, payload)
    }

    /// Registers a player, returning its mark or None when the seat is refused.
    pub fn register(&mut self, client_id: ClientId, name: &str) -> Option<Mark> {
        match self.registry.register(client_id, name) {
            Ok(mark) => {
                self.sync_ready();
                Some(mark)
            }
            Err(e) => {
                info!("Registration refused: {}", e);
                None
            }
        }
    }

    pub fn unregister(&mut self, client_id: ClientId) {
        if self.registry.unregister(client_id).is_none() {
            debug!("Unregister from unknown client {}", client_id);
            return;
        }

        if self.previous_turn == Some(client_id) {
            self.previous_turn = None;
        }
        if self.whose_turn == Some(client_id) {
            self.whose_turn = None;
        }

        info!(
            "Player left, {} of {} seats taken",
            self.registry.len(),
            MAX_PLAYERS
        );
    }

    /// Applies a move for `client_id` at `(row, column)`.
    ///
    /// Nothing is mutated unless every check passes. An accepted move becomes the
    /// latest change event and may end the game.
    pub fn update_model(
        &mut self,
        client_id: ClientId,
        row: usize,
        column: usize,
    ) -> Result<ModelChangeEvent, GameError> {
        if !self.phase.accepts_moves() || !self.registry.is_ready() {
            return Err(self.invalid_state());
        }

        let mover = self
            .registry
            .find(client_id)
            .ok_or(GameError::UnknownPlayer { client_id })?;
        let mark = mover.mark;

        if self.previous_turn == Some(client_id) {
            return Err(GameError::NotYourTurn { client_id });
        }

        self.board.place(row, column, mark)?;

        let change = ModelChangeEvent::new(row, column, mark);
        info!("Player '{}' placed {}", mover.name, change);

        self.last_change = Some(change);
        self.previous_turn = Some(client_id);
        self.whose_turn = self.registry.opponent_of(client_id).map(|p| p.id());
        self.phase = Phase::InProgress;

        if self.record_winner().is_none() && self.board.is_full() {
            info!("Board full without a winner, reset to play again");
        }
        Ok(change)
    }

    /// Restores the freshly started state.
    pub fn reset(&mut self) {
        info!("Session reset");
        self.phase = Phase::WaitingForPlayers;
        self.board = Board::new();
        self.registry.clear();
        self.whose_turn = None;
        self.previous_turn = None;
        self.announced_turn = None;
        self.winner = None;
        self.last_change = None;
    }

    /// Returns the winner's record, or the "No Winner" placeholder.
    pub fn check_for_win(&mut self) -> PlayerRecord {
        match self.phase {
            Phase::WaitingForPlayers => PlayerRecord::no_winner(),
            Phase::GameOver => self
                .winner
                .clone()
                .unwrap_or_else(PlayerRecord::no_winner),
            Phase::Ready | Phase::InProgress => self
                .record_winner()
                .unwrap_or_else(PlayerRecord::no_winner),
        }
    }

    /// Remembers which client announced it is taking the next turn.
    pub fn next_turn(&mut self, client_id: ClientId) -> Result<ClientId, GameError> {
        if self.phase == Phase::WaitingForPlayers {
            return Err(self.invalid_state());
        }
        if let Some(previous) = self.announced_turn.replace(client_id) {
            debug!("Client {} takes the turn after {}", client_id, previous);
        }
        Ok(client_id)
    }

    pub fn get_model(&self) -> Option<ModelChangeEvent> {
        self.last_change
    }

    /// True once two players are registered, until the session is reset.
    pub fn check_for_ready(&mut self) -> bool {
        self.sync_ready();
        self.phase != Phase::WaitingForPlayers
    }

    fn sync_ready(&mut self) {
        if self.phase == Phase::WaitingForPlayers && self.registry.is_ready() {
            info!("Both players registered, session {}", Phase::Ready);
            self.phase = Phase::Ready;
        }
    }

    fn record_winner(&mut self) -> Option<PlayerRecord> {
        let record = detect_winner(&self.board, self.registry.players());
        if !record.is_winner() {
            return None;
        }

        info!("Winner is '{}' with mark {}", record.name, record.mark);
        self.phase = Phase::GameOver;
        self.winner = Some(record.clone());
        Some(record)
    }

    fn invalid_state(&self) -> GameError {
        match self.phase {
            Phase::GameOver => {
                GameError::InvalidState("Game over, reset to play again".to_string())
            }
            _ => GameError::InvalidState(format!(
                "Not enough players {} waiting for others to join",
                self.registry.len()
            )),
        }
    }
}
