//! Game controller
//!
//! Owns the request proxy, the background poller and the queue consumer, and
//! exposes the few actions a front end needs: join, move, drain, reset, leave.

use crate::bridge::{ClientFlags, PollingBridge};
use crate::consumer::{DrainReport, LocalBoard, Presenter, QueueConsumer};
use crate::network::{ClientError, GameClient};
use crate::ClientConfig;
use log::{info, warn};
use shared::{Board, CommandKind, GameError, Mark};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct GameController {
    client: Arc<GameClient>,
    flags: Arc<ClientFlags>,
    consumer: QueueConsumer,
    poller: Option<JoinHandle<()>>,
    player_name: Option<String>,
    player_mark: Option<Mark>,
}

impl GameController {
    /// Connects to the configured server and starts polling it.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = GameClient::connect(&config.server, config.request_timeout).await?;
        Ok(Self::start(Arc::new(client), config.poll_interval))
    }

    /// Starts the poller for an already connected client.
    pub fn start(client: Arc<GameClient>, poll_interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let flags = Arc::new(ClientFlags::new());

        let poller =
            PollingBridge::new(Arc::clone(&client), Arc::clone(&flags), tx, poll_interval).spawn();

        Self {
            client,
            flags: Arc::clone(&flags),
            consumer: QueueConsumer::new(rx, flags),
            poller: Some(poller),
            player_name: None,
            player_mark: None,
        }
    }

    pub fn client(&self) -> &GameClient {
        &self.client
    }

    pub fn flags(&self) -> &ClientFlags {
        &self.flags
    }

    pub fn board(&self) -> &LocalBoard {
        self.consumer.board()
    }

    pub fn player_name(&self) -> Option<&str> {
        self.player_name.as_deref()
    }

    pub fn player_mark(&self) -> Option<Mark> {
        self.player_mark
    }

    pub fn is_registered(&self) -> bool {
        self.player_name.is_some()
    }

    /// Joins the session as `name`.
    ///
    /// The server is always asked first: registration is skipped when the
    /// session already has two players, so a third client does not try to take
    /// a seat. Returns the assigned mark, or None when no seat was available.
    pub async fn register(&mut self, name: &str) -> Result<Option<Mark>, ClientError> {
        if self.client.check_for_ready().await? {
            info!("Game already has two players");
            return Ok(None);
        }

        let mark = self.client.register_user(name).await?;
        match mark {
            Some(mark) => {
                info!("Registered as {} playing {}", name, mark);
                self.player_name = Some(name.to_string());
                self.player_mark = Some(mark);
            }
            None => info!("Registration as {} refused", name),
        }

        Ok(mark)
    }

    /// Asks the server to place this player's mark at `(row, column)`.
    ///
    /// Nothing is sent until the poller has seen the game start. The cell is
    /// disabled locally once the server accepts the move.
    pub async fn submit_move(&mut self, row: usize, column: usize) -> Result<(), ClientError> {
        if !self.flags.is_in_progress() || self.flags.is_game_over() {
            info!("Waiting for players, move not sent");
            return Err(ClientError::NotStarted);
        }

        if !Board::in_bounds(row, column) {
            return Err(ClientError::Rejected {
                command: CommandKind::UpdateModel,
                reason: GameError::OutOfBounds { row, column },
            });
        }

        self.client
            .update_model(self.player_mark, row, column)
            .await?;
        self.consumer.board_mut().disable(row, column);
        Ok(())
    }

    /// Drains queued events into `presenter`.
    ///
    /// When the drain reports a winner the session is reset so a new game can
    /// be played. When the poller saw the session reset by someone else the
    /// registration is dropped locally, since the server no longer holds it.
    pub async fn tick<P: Presenter + ?Sized>(
        &mut self,
        presenter: &mut P,
    ) -> Result<DrainReport, ClientError> {
        let report = self.consumer.drain(presenter);
        if report.reset {
            self.forget_game();
        } else if report.winner.is_some() {
            self.reset().await?;
        }
        Ok(report)
    }

    /// Resets the server session and forgets the local game.
    ///
    /// The player must register again afterwards.
    pub async fn reset(&mut self) -> Result<(), ClientError> {
        self.client.reset().await?;
        self.forget_game();
        Ok(())
    }

    /// Gives up this player's seat.
    pub async fn leave(&mut self) -> Result<(), ClientError> {
        if let Some(name) = self.player_name.take() {
            self.client.un_register_user(&name, self.player_mark).await?;
            info!("{} left the game", name);
        }
        self.forget_game();
        Ok(())
    }

    /// Stops the poller and waits for it to finish.
    pub async fn shutdown(mut self) {
        self.flags.stop();
        if let Some(poller) = self.poller.take() {
            if let Err(e) = poller.await {
                warn!("Poller ended abnormally: {}", e);
            }
        }
    }

    fn forget_game(&mut self) {
        self.flags.clear_game();
        self.consumer.clear();
        self.player_name = None;
        self.player_mark = None;
    }
}

impl Drop for GameController {
    fn drop(&mut self) {
        self.flags.stop();
    }
}
