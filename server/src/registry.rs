//! Player registration for the game session
//!
//! This module tracks the (at most two) players taking part in the session:
//! - Registration and mark assignment in arrival order
//! - Lookup by client identity for turn arbitration
//! - Removal on request, and wholesale clearing on reset
//!
//! The registry never talks to the network; the session owns it and decides
//! what each outcome means for the game phase.

use log::{info, warn};
use shared::{bool_text, ClientId, GameError, Mark, PlayerRecord};

/// Maximum number of players in one session
pub const MAX_PLAYERS: usize = 2;

/// Mark handed to the first registrant
pub const FIRST_MARK: Mark = Mark::X;

/// A registered participant
///
/// Each player carries:
/// - The identity its client generated (immutable once created)
/// - The display name typed by the user
/// - The mark it places on the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Client-chosen identity used to match incoming requests
    id: ClientId,
    /// Name shown to the opponent and in win announcements
    pub name: String,
    /// Symbol this player places on the board
    pub mark: Mark,
    /// Registration flag, cleared when the player leaves
    pub is_registered: bool,
}

impl Player {
    /// Creates a registered player with the given identity, name and mark
    pub fn new(id: ClientId, name: impl Into<String>, mark: Mark) -> Self {
        Self {
            id,
            name: name.into(),
            mark,
            is_registered: true,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Converts the player to its text-only wire representation
    pub fn to_record(&self) -> PlayerRecord {
        PlayerRecord {
            id: self.id.to_string(),
            name: self.name.clone(),
            mark: self.mark.to_string(),
            is_registered: bool_text(self.is_registered).to_string(),
        }
    }
}

/// Ordered roster of the session's players
///
/// Player #1 is always at index 0. Marks are handed out so that the two
/// players never share one.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: Vec<Player>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: Vec::with_capacity(MAX_PLAYERS),
        }
    }

    /// Registers a player and returns the assigned mark
    ///
    /// Fails without touching the roster when the identity is already
    /// registered or when both seats are taken.
    pub fn register(&mut self, id: ClientId, name: &str) -> Result<Mark, GameError> {
        if self.find(id).is_some() {
            info!("Player with client id {} already registered", id);
            return Err(GameError::DuplicateRegistration { client_id: id });
        }

        if self.players.len() >= MAX_PLAYERS {
            warn!("Registration from {} refused: game is full", id);
            return Err(GameError::DuplicateRegistration { client_id: id });
        }

        let mark = match self.players.first() {
            Some(existing) => existing.mark.other(),
            None => FIRST_MARK,
        };

        let player = Player::new(id, name, mark);
        info!(
            "Registered player {} '{}' with mark {}",
            self.players.len() + 1,
            player.name,
            mark
        );
        self.players.push(player);

        Ok(mark)
    }

    /// Removes the player with the given identity
    ///
    /// Returns the removed player, or None if nobody matched.
    pub fn unregister(&mut self, id: ClientId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == id)?;
        let mut player = self.players.remove(index);
        player.is_registered = false;
        info!("Unregistered player '{}' (client id {})", player.name, id);
        Some(player)
    }

    /// True once both seats are taken
    pub fn is_ready(&self) -> bool {
        self.players.len() == MAX_PLAYERS
    }

    pub fn find(&self, id: ClientId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Players in registration order
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// The other registered player, if any
    pub fn opponent_of(&self, id: ClientId) -> Option<&Player> {
        self.players.iter().find(|p| p.id != id)
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
