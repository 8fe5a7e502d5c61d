//! Server network layer: TCP accept loop and per-connection request handling

use crate::session::Session;
use log::{debug, error, info, warn};
use shared::codec::{read_message, write_message, CodecError};
use shared::{Request, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Session shared by every connection handler
pub type SharedSession = Arc<Mutex<Session>>;

/// Transport limits applied to every connection
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How long a connection may stay silent before it is closed
    pub read_timeout: Duration,
    /// Upper bound on writing one response
    pub write_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(300),
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Main server accepting clients and serving the single game session
pub struct Server {
    listener: TcpListener,
    session: SharedSession,
    config: ServerConfig,
}

impl Server {
    pub async fn bind(
        addr: &str,
        config: ServerConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            session: Arc::new(Mutex::new(Session::new())),
            config,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    /// Accepts connections forever, spawning one handler task per client
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Server started successfully");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Could not disable Nagle for {}: {}", peer, e);
                    }

                    let session = Arc::clone(&self.session);
                    let config = self.config.clone();
                    tokio::spawn(async move {
                        let served = handle_connection(stream, peer, session, config).await;
                        info!("Connection {} closed after {} requests", peer, served);
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Serves one client until it disconnects, times out, or breaks the framing
///
/// Each decoded request gets exactly one response. Undecodable frames are
/// logged and skipped. The session lock is held only while the request is
/// applied, never across reads or writes. Returns the number of requests served.
pub async fn handle_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    session: SharedSession,
    config: ServerConfig,
) -> usize
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!("Client connected from {}", peer);
    let mut served = 0;

    loop {
        let request: Request = match timeout(config.read_timeout, read_message(&mut stream)).await
        {
            Ok(Ok(request)) => request,
            Ok(Err(e)) if e.is_recoverable() => {
                warn!("Discarding malformed request from {}: {}", peer, e);
                continue;
            }
            Ok(Err(CodecError::Closed)) => {
                info!("Client {} disconnected", peer);
                break;
            }
            Ok(Err(e)) => {
                error!("Error reading from {}: {}", peer, e);
                break;
            }
            Err(_) => {
                info!(
                    "Client {} idle for {:?}, closing connection",
                    peer, config.read_timeout
                );
                break;
            }
        };

        let response: Response = {
            let mut session = session.lock().await;
            session.handle(&request)
        };

        match timeout(config.write_timeout, write_message(&mut stream, &response)).await {
            Ok(Ok(())) => served += 1,
            Ok(Err(e)) => {
                error!("Failed to send response to {}: {}", peer, e);
                break;
            }
            Err(_) => {
                error!(
                    "Sending response to {} timed out after {:?}",
                    peer, config.write_timeout
                );
                break;
            }
        }
    }

    served
}
