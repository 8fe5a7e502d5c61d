//! Request proxy for the game server
//!
//! Every protocol command is one framed request followed by one framed
//! response on a single TCP connection. Calls from different tasks are
//! serialized so request/response pairs never interleave on the socket.

use log::{debug, info, warn};
use shared::codec::{read_message, write_message, CodecError};
use shared::{
    ClientId, Command, CommandKind, GameError, Mark, ModelChangeEvent, Payload, PlayerRecord,
    Request, Response,
};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("server rejected {command}: {reason}")]
    Rejected {
        command: CommandKind,
        reason: GameError,
    },
    #[error("expected a response to {expected}, got {actual}")]
    Mismatch {
        expected: CommandKind,
        actual: CommandKind,
    },
    #[error("unexpected payload for {command}: {payload:?}")]
    UnexpectedPayload { command: CommandKind, payload: Payload },
    #[error("the game has not started yet")]
    NotStarted,
}

impl ClientError {
    /// The server's reason, when the request was refused rather than lost.
    pub fn rejection(&self) -> Option<&GameError> {
        match self {
            ClientError::Rejected { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Generates the opaque identity a client presents with every request.
pub fn generate_client_id() -> ClientId {
    rand::random()
}

pub struct GameClient {
    client_id: ClientId,
    server_addr: String,
    request_timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl GameClient {
    /// Connects to `server_addr` under a freshly generated identity.
    pub async fn connect(
        server_addr: &str,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        Self::connect_with_id(server_addr, generate_client_id(), request_timeout).await
    }

    pub async fn connect_with_id(
        server_addr: &str,
        client_id: ClientId,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let stream = open_stream(server_addr, request_timeout).await?;
        info!("Connected to {} as client {}", server_addr, client_id);

        Ok(GameClient {
            client_id,
            server_addr: server_addr.to_string(),
            request_timeout,
            stream: Mutex::new(Some(stream)),
        })
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    pub async fn register_user(&self, player_name: &str) -> Result<Option<Mark>, ClientError> {
        let command = Command::RegisterUser {
            player_name: player_name.to_string(),
        };
        match self.call(command).await? {
            Payload::Mark(mark) => Ok(mark),
            other => Err(unexpected(CommandKind::RegisterUser, other)),
        }
    }

    pub async fn un_register_user(
        &self,
        player_name: &str,
        player_marker: Option<Mark>,
    ) -> Result<(), ClientError> {
        let command = Command::UnRegisterUser {
            player_name: player_name.to_string(),
            player_marker,
        };
        self.call(command).await.map(|_| ())
    }

    pub async fn update_model(
        &self,
        player_marker: Option<Mark>,
        row: usize,
        column: usize,
    ) -> Result<(), ClientError> {
        let command = Command::UpdateModel {
            player_marker,
            row,
            column,
        };
        self.call(command).await.map(|_| ())
    }

    pub async fn reset(&self) -> Result<(), ClientError> {
        self.call(Command::Reset).await.map(|_| ())
    }

    /// Returns the winner's record or the "No Winner" placeholder.
    pub async fn check_for_win(&self) -> Result<PlayerRecord, ClientError> {
        match self.call(Command::CheckForWin).await? {
            Payload::Winner(record) => Ok(record),
            other => Err(unexpected(CommandKind::CheckForWin, other)),
        }
    }

    pub async fn next_turn(&self, player_name: &str) -> Result<ClientId, ClientError> {
        let command = Command::NextTurn {
            player_name: player_name.to_string(),
        };
        match self.call(command).await? {
            Payload::Turn(id) => Ok(id),
            other => Err(unexpected(CommandKind::NextTurn, other)),
        }
    }

    /// Latest board change, or None before the first accepted move.
    pub async fn get_model(&self) -> Result<Option<ModelChangeEvent>, ClientError> {
        match self.call(Command::GetModel).await? {
            Payload::Model(change) => Ok(change),
            other => Err(unexpected(CommandKind::GetModel, other)),
        }
    }

    pub async fn check_for_ready(&self) -> Result<bool, ClientError> {
        match self.call(Command::CheckForReady).await? {
            Payload::Ready(ready) => Ok(ready),
            other => Err(unexpected(CommandKind::CheckForReady, other)),
        }
    }

    /// Sends one request and waits for its response.
    ///
    /// A transport failure drops the connection; the next call reconnects, so a
    /// late response can never be mistaken for the answer to a newer request.
    async fn call(&self, command: Command) -> Result<Payload, ClientError> {
        let expected = command.kind();
        let request = Request::new(self.client_id, command);

        let mut guard = self.stream.lock().await;
        if guard.is_none() {
            debug!("Reconnecting to {}", self.server_addr);
            *guard = Some(open_stream(&self.server_addr, self.request_timeout).await?);
        }

        let result = match guard.as_mut() {
            Some(stream) => exchange(stream, &request, self.request_timeout).await,
            None => Err(CodecError::Closed),
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("{} to {} failed: {}", expected, self.server_addr, e);
                *guard = None;
                return Err(e.into());
            }
        };
        drop(guard);

        if response.command != expected {
            return Err(ClientError::Mismatch {
                expected,
                actual: response.command,
            });
        }

        match response.payload {
            Payload::Rejected(reason) => Err(ClientError::Rejected {
                command: expected,
                reason,
            }),
            payload => Ok(payload),
        }
    }
}

async fn open_stream(server_addr: &str, limit: Duration) -> Result<TcpStream, CodecError> {
    let stream = timeout(limit, TcpStream::connect(server_addr))
        .await
        .map_err(|_| CodecError::Timeout(limit))??;
    stream.set_nodelay(true)?;
    Ok(stream)
}

async fn exchange(
    stream: &mut TcpStream,
    request: &Request,
    limit: Duration,
) -> Result<Response, CodecError> {
    let round_trip = async {
        write_message(stream, request).await?;
        read_message(stream).await
    };

    timeout(limit, round_trip)
        .await
        .map_err(|_| CodecError::Timeout(limit))?
}

fn unexpected(command: CommandKind, payload: Payload) -> ClientError {
    ClientError::UnexpectedPayload { command, payload }
}
