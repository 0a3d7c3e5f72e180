//! WebSocket listener and per-controller connection handling.

use crate::config::ServerConfig;
use crate::hub::{ClientOutbox, Hub};
use controller_core::{decode, encode, CodecError, Message, RegistryError, SessionId};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("connection closed before connect")]
    Closed,

    #[error("timed out waiting for connect")]
    TimedOut,

    #[error("expected connect, got {0}")]
    UnexpectedMessage(&'static str),

    #[error("expected a text frame")]
    NotText,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Bind the controller port. A taken port is expected while a development
/// server is running, so failure is logged and reported as `None`.
pub async fn bind(addr: SocketAddr) -> Option<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Some(listener),
        Err(e) => {
            warn!(
                "Could not bind controller port {}: {}. Controllers will not be able to connect.",
                addr, e
            );
            None
        }
    }
}

/// Run the WebSocket server. Returns immediately if the port is taken.
pub async fn run_server(config: Arc<ServerConfig>, hub: Arc<Hub>) -> anyhow::Result<()> {
    let Some(listener) = bind(config.addr()).await else {
        return Ok(());
    };
    serve(listener, config, hub).await
}

/// Accept connections on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    config: Arc<ServerConfig>,
    hub: Arc<Hub>,
) -> anyhow::Result<()> {
    info!(
        "Controller hub listening on {}{}",
        listener.local_addr()?,
        config.controller_path
    );

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let config = Arc::clone(&config);
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, config, hub).await {
                warn!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

fn not_found(path: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(format!("No controller endpoint at {}", path)));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    config: Arc<ServerConfig>,
    hub: Arc<Hub>,
) -> anyhow::Result<()> {
    let path_config = Arc::clone(&config);
    let ws_stream = accept_hdr_async(stream, move |request: &Request, response: Response| {
        let path = request.uri().path();
        if path_config.is_controller_path(path) {
            Ok(response)
        } else {
            Err(not_found(path))
        }
    })
    .await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let name = match timeout(config.handshake_timeout, await_connect(&mut ws_receiver)).await {
        Ok(Ok(name)) => name,
        Ok(Err(e)) => {
            warn!("Handshake with {} failed: {}", addr, e);
            let _ = ws_sender.close().await;
            return Ok(());
        }
        Err(_) => {
            warn!("Handshake with {} failed: {}", addr, HandshakeError::TimedOut);
            let _ = ws_sender.close().await;
            return Ok(());
        }
    };

    // Create channel for outgoing messages
    let (outbox, mut rx) = ClientOutbox::channel();

    let session_id = match hub.join(&name, outbox) {
        Ok(id) => id,
        Err(reason) => {
            warn!("Refused {} from {}: {}", name, addr, reason);
            let text = encode(&Message::ConnectFailure { reason })?;
            ws_sender.send(WsMessage::Text(text)).await?;
            ws_sender.close().await?;
            return Ok(());
        }
    };

    // Forward messages from the outbox to the socket. The outbox closes when
    // the registry drops the session, including when it fell too far behind.
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match encode(&msg) {
                Ok(text) => text,
                Err(e) => {
                    error!("Could not encode {} message: {}", msg.kind(), e);
                    continue;
                }
            };
            if ws_sender.send(WsMessage::Text(text)).await.is_err() {
                return;
            }
        }
        let _ = ws_sender.close().await;
    });

    // Handle incoming messages
    let writer_finished = loop {
        tokio::select! {
            frame = ws_receiver.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => handle_frame(&hub, session_id, &text),
                Some(Ok(WsMessage::Binary(_))) => {
                    warn!("Dropping binary frame from {}", session_id);
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("Client {} closing connection", session_id);
                    break false;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error from {}: {}", session_id, e);
                    break false;
                }
            },
            _ = &mut send_task => break true,
        }
    };

    // Clean up on disconnect
    match hub.disconnect(session_id) {
        Ok(()) => {}
        Err(RegistryError::UnknownSession(_)) if writer_finished => {
            debug!("Session {} was already evicted", session_id);
        }
        Err(e) => error!("{}", e),
    }
    send_task.abort();

    info!("Connection closed for {}", session_id);
    Ok(())
}

/// Wait for the `connect` frame that opens every session.
async fn await_connect(
    receiver: &mut SplitStream<WebSocketStream<TcpStream>>,
) -> Result<String, HandshakeError> {
    while let Some(frame) = receiver.next().await {
        match frame? {
            WsMessage::Text(text) => {
                return match decode(&text)? {
                    Message::Connect { name } => Ok(name),
                    other => Err(HandshakeError::UnexpectedMessage(other.kind())),
                };
            }
            WsMessage::Binary(_) => return Err(HandshakeError::NotText),
            WsMessage::Close(_) => return Err(HandshakeError::Closed),
            _ => {}
        }
    }
    Err(HandshakeError::Closed)
}

/// Decode and route one text frame. Bad frames are dropped, the connection
/// stays open.
fn handle_frame(hub: &Hub, session_id: SessionId, text: &str) {
    let message = match decode(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Dropping frame from {}: {}", session_id, e);
            return;
        }
    };

    if let Err(e) = hub.submit(session_id, message) {
        warn!("Dropping frame from {}: {}", session_id, e);
    }
}
