//! Per-connection worker: upgrade handshake, frame loop and cleanup.
//!
//! Each accepted socket is driven by one [`ClientConnection`]. Reading happens
//! on the worker task itself; writing happens on a companion task fed through
//! the connection's [`PlayerHandle`], so sessions can push messages to a
//! player without touching the socket.

use crate::command::Dispatcher;
use crate::config::ServerConfig;
use crate::connection::{ConnectionId, Outgoing, PlayerHandle};
use crate::error::ProtocolError;
use crate::protocol::frame::{CLOSE_NORMAL, CLOSE_PROTOCOL_ERROR, CLOSE_TOO_BIG};
use crate::protocol::handshake::{self, BAD_REQUEST_RESPONSE};
use crate::protocol::{upgrade, Frame, HandshakeRequest, Message, MessageAssembler, PayloadCipher};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Largest request head accepted during the upgrade.
const MAX_HANDSHAKE_SIZE: usize = 8 * 1024;

const READ_CHUNK: usize = 4096;

/// Lifecycle of a connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Handshaking,
    Active,
    Closed,
}

/// An individual client connection.
#[derive(Debug)]
pub struct ClientConnection {
    id: ConnectionId,
    remote_addr: SocketAddr,
    connected_at: SystemTime,
    state: ConnectionState,
}

/// What the read loop does after handling a message.
enum Flow {
    Continue,
    Close(u16),
}

impl ClientConnection {
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            id: ConnectionId::new(),
            remote_addr,
            connected_at: SystemTime::now(),
            state: ConnectionState::Connecting,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn connected_at(&self) -> SystemTime {
        self.connected_at
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!("Connection {} {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    /// Drives the connection until the client leaves or breaks the protocol.
    ///
    /// Whatever the exit path, the player is released from every session it
    /// was seated in before this returns.
    pub async fn run(
        mut self,
        mut stream: TcpStream,
        dispatcher: Dispatcher,
        config: Arc<ServerConfig>,
    ) -> Result<(), ProtocolError> {
        self.transition(ConnectionState::Handshaking);
        let (outbound, inbound, leftover) = match self.handshake(&mut stream, &config).await {
            Ok(negotiated) => negotiated,
            Err(err) => {
                self.transition(ConnectionState::Closed);
                return Err(err);
            }
        };

        let (reader, writer) = stream.into_split();
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = PlayerHandle::new(self.id, sender);
        let writer_task = tokio::spawn(write_outgoing(self.id, writer, receiver, outbound));

        self.transition(ConnectionState::Active);
        info!("🔗 Connection {} established from {}", self.id, self.remote_addr);

        let result = self
            .read_loop(reader, leftover, inbound, &handle, &dispatcher, config.max_frame_size)
            .await;

        let code = match &result {
            Ok(code) => *code,
            Err(ProtocolError::FrameTooLarge { .. }) => CLOSE_TOO_BIG,
            Err(_) => CLOSE_PROTOCOL_ERROR,
        };

        dispatcher.release(&handle).await;
        handle.queue(Outgoing::Close(code));
        drop(handle);
        if let Err(err) = writer_task.await {
            warn!("Writer for connection {} failed: {}", self.id, err);
        }

        self.transition(ConnectionState::Closed);
        info!("🔌 Connection {} closed", self.id);
        result.map(|_| ())
    }

    // Reads the upgrade request, answers it and returns the negotiated
    // ciphers along with any bytes received after the request head.
    async fn handshake(
        &mut self,
        stream: &mut TcpStream,
        config: &ServerConfig,
    ) -> Result<(PayloadCipher, PayloadCipher, Vec<u8>), ProtocolError> {
        let mut buffer = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        let end = loop {
            if let Some(end) = handshake::request_end(&buffer) {
                break end;
            }
            if buffer.len() >= 3 && !handshake::is_handshake(&buffer) {
                return Err(reject(stream, "first message is not an upgrade request").await);
            }
            if buffer.len() > MAX_HANDSHAKE_SIZE {
                return Err(reject(stream, "request head too large").await);
            }

            let read = stream.read(&mut chunk).await?;
            if read == 0 {
                return Err(ProtocolError::MalformedHandshake(
                    "connection closed during handshake".to_string(),
                ));
            }
            buffer.extend_from_slice(&chunk[..read]);
        };

        let negotiated = std::str::from_utf8(&buffer[..end])
            .map_err(|_| ProtocolError::MalformedHandshake("request head is not UTF-8".to_string()))
            .and_then(HandshakeRequest::parse)
            .and_then(|request| upgrade(&request, config.protocol.shared_secret.as_deref()));

        let upgraded = match negotiated {
            Ok(upgraded) => upgraded,
            Err(err) => {
                stream.write_all(BAD_REQUEST_RESPONSE.as_bytes()).await.ok();
                return Err(err);
            }
        };

        stream.write_all(upgraded.response.as_bytes()).await?;
        if upgraded.inbound.is_encrypted() {
            debug!("Connection {} negotiated the payload cipher", self.id);
        }
        Ok((upgraded.outbound, upgraded.inbound, buffer.split_off(end)))
    }

    // Returns the close code to answer with when the loop ends cleanly.
    async fn read_loop(
        &mut self,
        mut reader: OwnedReadHalf,
        mut buffer: Vec<u8>,
        mut inbound: PayloadCipher,
        handle: &PlayerHandle,
        dispatcher: &Dispatcher,
        max_frame_size: usize,
    ) -> Result<u16, ProtocolError> {
        let mut assembler = MessageAssembler::new(max_frame_size);
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            while let Some((frame, used)) = Frame::decode(&buffer, max_frame_size, true)? {
                buffer.drain(..used);
                let Some(message) = assembler.push(frame)? else {
                    continue;
                };
                if let Flow::Close(code) = self.on_message(message, &mut inbound, handle, dispatcher).await? {
                    return Ok(code);
                }
            }

            let read = reader.read(&mut chunk).await?;
            if read == 0 {
                debug!("Connection {} reached end of stream", self.id);
                return Ok(CLOSE_NORMAL);
            }
            buffer.extend_from_slice(&chunk[..read]);
        }
    }

    async fn on_message(
        &mut self,
        message: Message,
        inbound: &mut PayloadCipher,
        handle: &PlayerHandle,
        dispatcher: &Dispatcher,
    ) -> Result<Flow, ProtocolError> {
        match message {
            Message::Text(text) => {
                let command = inbound.open(&text)?;
                dispatcher.dispatch(handle, &command).await;
            }
            Message::Ping(payload) => {
                handle.queue(Outgoing::Pong(payload));
            }
            Message::Pong(_) => {}
            Message::Binary(payload) => {
                debug!("Ignoring {} byte binary message from {}", payload.len(), self.id);
            }
            Message::Close(code) => {
                debug!("Connection {} sent close {:?}", self.id, code);
                return Ok(Flow::Close(CLOSE_NORMAL));
            }
        }
        Ok(Flow::Continue)
    }
}

// Answers a non-upgrade request with 400 and produces the matching error.
async fn reject(stream: &mut TcpStream, reason: &str) -> ProtocolError {
    stream.write_all(BAD_REQUEST_RESPONSE.as_bytes()).await.ok();
    ProtocolError::MalformedHandshake(reason.to_string())
}

/// Writes queued messages to the socket until a close is sent or every
/// handle to the connection is gone.
async fn write_outgoing(
    id: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut receiver: mpsc::UnboundedReceiver<Outgoing>,
    mut outbound: PayloadCipher,
) {
    while let Some(message) = receiver.recv().await {
        let (frame, last) = match message {
            Outgoing::Text(text) => match outbound.seal(&text) {
                Ok(sealed) => (Frame::text(&sealed), false),
                Err(err) => {
                    warn!("Dropping message to {}: {}", id, err);
                    continue;
                }
            },
            Outgoing::Pong(payload) => (Frame::pong(payload), false),
            Outgoing::Close(code) => (Frame::close(Some(code)), true),
        };

        if let Err(err) = writer.write_all(&frame.encode()).await {
            debug!("Socket for {} no longer writable: {}", id, err);
            break;
        }
        if last {
            break;
        }
    }
    writer.shutdown().await.ok();
}
