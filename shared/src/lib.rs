use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod codec;

pub const DEFAULT_PORT: u16 = 12345;
pub const GRID_SIZE: usize = 3;

pub const NO_WINNER_ID: &str = "000";
pub const NO_WINNER_NAME: &str = "No Winner";
pub const NO_WINNER_MARK: &str = "--";

/// Opaque identity chosen by each client when it starts.
pub type ClientId = u32;

/// Symbol a player places on the board.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }

    pub fn other(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A board cell: empty or holding one mark.
pub type Cell = Option<Mark>;

/// The 3x3 playing grid.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Board {
    cells: [[Cell; GRID_SIZE]; GRID_SIZE],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_bounds(row: usize, column: usize) -> bool {
        row < GRID_SIZE && column < GRID_SIZE
    }

    /// Returns the cell at `(row, column)`, or `None` when the coordinates are off the board.
    pub fn get(&self, row: usize, column: usize) -> Option<Cell> {
        if Self::in_bounds(row, column) {
            Some(self.cells[row][column])
        } else {
            None
        }
    }

    /// Writes `mark` into an empty cell.
    ///
    /// Marked cells are never overwritten, so a cell only becomes empty again
    /// when the whole board is replaced.
    pub fn place(&mut self, row: usize, column: usize, mark: Mark) -> Result<(), GameError> {
        match self.get(row, column) {
            None => Err(GameError::OutOfBounds { row, column }),
            Some(Some(_)) => Err(GameError::CellOccupied { row, column }),
            Some(None) => {
                self.cells[row][column] = Some(mark);
                Ok(())
            }
        }
    }

    pub fn rows(&self) -> &[[Cell; GRID_SIZE]; GRID_SIZE] {
        &self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().flatten().all(Option::is_none)
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(Option::is_some)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.cells.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let line: Vec<&str> = row
                .iter()
                .map(|cell| cell.map_or("_", |mark| mark.as_str()))
                .collect();
            write!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

/// The most recent accepted move. Only the latest one is kept by the server.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ModelChangeEvent {
    pub row: usize,
    pub column: usize,
    pub mark: Mark,
}

impl ModelChangeEvent {
    pub fn new(row: usize, column: usize, mark: Mark) -> Self {
        Self { row, column, mark }
    }
}

impl fmt::Display for ModelChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.row, self.column, self.mark)
    }
}

/// Player details as they travel over the wire. Every field is text.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub id: String,
    pub name: String,
    pub mark: String,
    pub is_registered: String,
}

impl PlayerRecord {
    /// Placeholder returned by a win check while nobody has won.
    pub fn no_winner() -> Self {
        Self {
            id: NO_WINNER_ID.to_string(),
            name: NO_WINNER_NAME.to_string(),
            mark: NO_WINNER_MARK.to_string(),
            is_registered: bool_text(false).to_string(),
        }
    }

    pub fn is_winner(&self) -> bool {
        self.is_registered == bool_text(true)
    }
}

/// Renders a boolean the way the protocol spells it.
pub fn bool_text(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Numeric protocol codes. The declaration order matches the wire tag of
/// each [`Command`] variant.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandKind {
    RegisterUser = 0,
    UnRegisterUser = 1,
    UpdateModel = 2,
    Reset = 3,
    CheckForWin = 4,
    NextTurn = 5,
    GetModel = 6,
    CheckForReady = 7,
}

impl CommandKind {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::RegisterUser => "REGISTER_USER",
            CommandKind::UnRegisterUser => "UN_REGISTER_USER",
            CommandKind::UpdateModel => "UPDATE_MODEL",
            CommandKind::Reset => "RESET",
            CommandKind::CheckForWin => "CHECK_FOR_WIN",
            CommandKind::NextTurn => "NEXT_TURN",
            CommandKind::GetModel => "GET_MODEL",
            CommandKind::CheckForReady => "CHECK_FOR_READY",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Command {
    RegisterUser {
        player_name: String,
    },
    UnRegisterUser {
        player_name: String,
        player_marker: Option<Mark>,
    },
    UpdateModel {
        player_marker: Option<Mark>,
        row: usize,
        column: usize,
    },
    Reset,
    CheckForWin,
    NextTurn {
        player_name: String,
    },
    GetModel,
    CheckForReady,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::RegisterUser { .. } => CommandKind::RegisterUser,
            Command::UnRegisterUser { .. } => CommandKind::UnRegisterUser,
            Command::UpdateModel { .. } => CommandKind::UpdateModel,
            Command::Reset => CommandKind::Reset,
            Command::CheckForWin => CommandKind::CheckForWin,
            Command::NextTurn { .. } => CommandKind::NextTurn,
            Command::GetModel => CommandKind::GetModel,
            Command::CheckForReady => CommandKind::CheckForReady,
        }
    }
}

/// A request always names the client that sent it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Request {
    pub client_id: ClientId,
    pub command: Command,
}

impl Request {
    pub fn new(client_id: ClientId, command: Command) -> Self {
        Self { client_id, command }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Mark assigned by a registration, empty when the registration was refused.
    Mark(Option<Mark>),
    Ack,
    Winner(PlayerRecord),
    Turn(ClientId),
    /// Latest board change, absent until the first move is accepted.
    Model(Option<ModelChangeEvent>),
    Ready(bool),
    Rejected(GameError),
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Mark(Some(mark)) => write!(f, "{}", mark),
            Payload::Mark(None) | Payload::Ack | Payload::Model(None) => Ok(()),
            Payload::Winner(record) => f.write_str(&record.name),
            Payload::Turn(client_id) => write!(f, "{}", client_id),
            Payload::Model(Some(change)) => write!(f, "{}", change),
            Payload::Ready(ready) => f.write_str(bool_text(*ready)),
            Payload::Rejected(err) => write!(f, "{}", err),
        }
    }
}

/// Exactly one response is sent per decoded request, tagged with the command it answers.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Response {
    pub command: CommandKind,
    pub payload: Payload,
}

impl Response {
    pub fn new(command: CommandKind, payload: Payload) -> Self {
        Self { command, payload }
    }
}

/// Reasons the server refuses a command. The session is left untouched in every case.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("{0}")]
    InvalidState(String),
    #[error("player {client_id} is attempting to play out of turn")]
    NotYourTurn { client_id: ClientId },
    #[error("client {client_id} is already registered or the game is full")]
    DuplicateRegistration { client_id: ClientId },
    #[error("cell ({row}, {column}) is outside the board")]
    OutOfBounds { row: usize, column: usize },
    #[error("cell ({row}, {column}) is already marked")]
    CellOccupied { row: usize, column: usize },
    #[error("client {client_id} is not a registered player")]
    UnknownPlayer { client_id: ClientId },
}

impl GameError {
    /// True for rejections caused by the requested coordinates.
    pub fn is_invalid_move(&self) -> bool {
        matches!(
            self,
            GameError::OutOfBounds { .. } | GameError::CellOccupied { .. }
        )
    }
}
