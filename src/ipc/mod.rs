//! Session-keyed bridge between sessions and a remote UI process.
//!
//! Requests flow in over an mpsc command channel with per-request
//! `oneshot` responders; session output flows out as [`BridgeEvent`]s.
//! Chunks are marshalled as tagged text/binary values so raw bytes
//! survive a serialization boundary unmangled.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};

use crate::session::{ClaudeSession, SessionEvent};

const BRIDGE_BUFFER: usize = 16;
const BRIDGE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bridge channel disconnected")]
    Disconnected,
    #[error("bridge request timed out")]
    Timeout,
    #[error("unknown session '{0}'")]
    UnknownSession(String),
    #[error("session error: {0}")]
    Session(String),
}

/// A data chunk marshalled for a serialization boundary.
///
/// Valid UTF-8 travels as text; anything else as a byte array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum WireChunk {
    Text(String),
    Binary(Vec<u8>),
}

impl WireChunk {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => WireChunk::Text(text.to_string()),
            Err(_) => WireChunk::Binary(bytes.to_vec()),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            WireChunk::Text(text) => text.into_bytes(),
            WireChunk::Binary(bytes) => bytes,
        }
    }
}

/// Requests a remote UI can issue against a registered session.
pub enum BridgeCommand {
    Spawn {
        session_id: String,
        respond_to: oneshot::Sender<Result<(), BridgeError>>,
    },
    Write {
        session_id: String,
        chunk: WireChunk,
        respond_to: oneshot::Sender<Result<(), BridgeError>>,
    },
    Resize {
        session_id: String,
        cols: u16,
        rows: u16,
        respond_to: oneshot::Sender<Result<(), BridgeError>>,
    },
    Kill {
        session_id: String,
        respond_to: oneshot::Sender<Result<(), BridgeError>>,
    },
    Clear {
        session_id: String,
        respond_to: oneshot::Sender<Result<(), BridgeError>>,
    },
    Cleanup {
        session_id: String,
        respond_to: oneshot::Sender<Result<(), BridgeError>>,
    },
}

/// Session output and lifecycle notifications forwarded to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    Ready { session_id: String },
    Data { session_id: String, chunk: WireChunk },
    State { session_id: String, state: String },
    Exit { session_id: String, code: u32 },
    Error { session_id: String, message: String },
}

pub struct BridgeLayer;

impl BridgeLayer {
    pub fn new() -> (
        BridgeClient,
        BridgeServer,
        mpsc::UnboundedReceiver<BridgeEvent>,
    ) {
        let (sender, receiver) = mpsc::channel(BRIDGE_BUFFER);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        (
            BridgeClient { sender },
            BridgeServer {
                receiver,
                sessions: HashMap::new(),
                outbound,
            },
            outbound_rx,
        )
    }
}

#[derive(Clone)]
pub struct BridgeClient {
    sender: mpsc::Sender<BridgeCommand>,
}

impl BridgeClient {
    pub async fn spawn(&self, session_id: String) -> Result<(), BridgeError> {
        let (respond_to, receiver) = oneshot::channel();
        self.sender
            .send(BridgeCommand::Spawn {
                session_id,
                respond_to,
            })
            .await
            .map_err(|_| BridgeError::Disconnected)?;
        recv_with_timeout(receiver).await?
    }

    pub async fn write(&self, session_id: String, chunk: WireChunk) -> Result<(), BridgeError> {
        let (respond_to, receiver) = oneshot::channel();
        self.sender
            .send(BridgeCommand::Write {
                session_id,
                chunk,
                respond_to,
            })
            .await
            .map_err(|_| BridgeError::Disconnected)?;
        recv_with_timeout(receiver).await?
    }

    pub async fn resize(
        &self,
        session_id: String,
        cols: u16,
        rows: u16,
    ) -> Result<(), BridgeError> {
        let (respond_to, receiver) = oneshot::channel();
        self.sender
            .send(BridgeCommand::Resize {
                session_id,
                cols,
                rows,
                respond_to,
            })
            .await
            .map_err(|_| BridgeError::Disconnected)?;
        recv_with_timeout(receiver).await?
    }

    pub async fn kill(&self, session_id: String) -> Result<(), BridgeError> {
        let (respond_to, receiver) = oneshot::channel();
        self.sender
            .send(BridgeCommand::Kill {
                session_id,
                respond_to,
            })
            .await
            .map_err(|_| BridgeError::Disconnected)?;
        recv_with_timeout(receiver).await?
    }

    pub async fn clear(&self, session_id: String) -> Result<(), BridgeError> {
        let (respond_to, receiver) = oneshot::channel();
        self.sender
            .send(BridgeCommand::Clear {
                session_id,
                respond_to,
            })
            .await
            .map_err(|_| BridgeError::Disconnected)?;
        recv_with_timeout(receiver).await?
    }

    pub async fn cleanup_session(&self, session_id: String) -> Result<(), BridgeError> {
        let (respond_to, receiver) = oneshot::channel();
        self.sender
            .send(BridgeCommand::Cleanup {
                session_id,
                respond_to,
            })
            .await
            .map_err(|_| BridgeError::Disconnected)?;
        recv_with_timeout(receiver).await?
    }
}

pub struct BridgeServer {
    receiver: mpsc::Receiver<BridgeCommand>,
    sessions: HashMap<String, ClaudeSession>,
    outbound: mpsc::UnboundedSender<BridgeEvent>,
}

impl BridgeServer {
    /// Register a session and start forwarding its events outbound.
    pub fn register_session(
        &mut self,
        session: ClaudeSession,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let session_id = session.id();
        self.sessions.insert(session_id.clone(), session);
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let forwarded = match event {
                    SessionEvent::Ready => Some(BridgeEvent::Ready {
                        session_id: session_id.clone(),
                    }),
                    SessionEvent::RawData(bytes) => Some(BridgeEvent::Data {
                        session_id: session_id.clone(),
                        chunk: WireChunk::from_bytes(&bytes),
                    }),
                    SessionEvent::StateChange(state) => Some(BridgeEvent::State {
                        session_id: session_id.clone(),
                        state: state.as_str().to_string(),
                    }),
                    SessionEvent::Exit(code) => Some(BridgeEvent::Exit {
                        session_id: session_id.clone(),
                        code,
                    }),
                    SessionEvent::Error(message) => Some(BridgeEvent::Error {
                        session_id: session_id.clone(),
                        message,
                    }),
                    _ => None,
                };
                if let Some(event) = forwarded {
                    if outbound.send(event).is_err() {
                        break;
                    }
                }
            }
        });
    }

    pub async fn run(mut self) {
        while let Some(command) = self.receiver.recv().await {
            match command {
                BridgeCommand::Spawn {
                    session_id,
                    respond_to,
                } => {
                    let result = match self.sessions.get(&session_id) {
                        Some(session) => session
                            .initialize()
                            .await
                            .map_err(|e| BridgeError::Session(e.to_string())),
                        None => Err(BridgeError::UnknownSession(session_id)),
                    };
                    respond(respond_to, result, "Spawn");
                }
                BridgeCommand::Write {
                    session_id,
                    chunk,
                    respond_to,
                } => {
                    let result = self.with_session(&session_id, |session| {
                        session
                            .write_raw(&chunk.into_bytes())
                            .map_err(|e| BridgeError::Session(e.to_string()))
                    });
                    respond(respond_to, result, "Write");
                }
                BridgeCommand::Resize {
                    session_id,
                    cols,
                    rows,
                    respond_to,
                } => {
                    let result = self.with_session(&session_id, |session| {
                        session
                            .resize(cols, rows)
                            .map_err(|e| BridgeError::Session(e.to_string()))
                    });
                    respond(respond_to, result, "Resize");
                }
                BridgeCommand::Kill {
                    session_id,
                    respond_to,
                } => {
                    let result = self.with_session(&session_id, |session| {
                        session.stop();
                        Ok(())
                    });
                    respond(respond_to, result, "Kill");
                }
                BridgeCommand::Clear {
                    session_id,
                    respond_to,
                } => {
                    let result = self.with_session(&session_id, |session| {
                        session.clear_buffer();
                        Ok(())
                    });
                    respond(respond_to, result, "Clear");
                }
                BridgeCommand::Cleanup {
                    session_id,
                    respond_to,
                } => {
                    let result = match self.sessions.remove(&session_id) {
                        Some(session) => {
                            session.stop();
                            Ok(())
                        }
                        None => Err(BridgeError::UnknownSession(session_id)),
                    };
                    respond(respond_to, result, "Cleanup");
                }
            }
        }
        // Command channel closed: stop every remaining session.
        for (_, session) in self.sessions.drain() {
            session.stop();
        }
    }

    fn with_session<F>(&self, session_id: &str, action: F) -> Result<(), BridgeError>
    where
        F: FnOnce(&ClaudeSession) -> Result<(), BridgeError>,
    {
        match self.sessions.get(session_id) {
            Some(session) => action(session),
            None => Err(BridgeError::UnknownSession(session_id.to_string())),
        }
    }
}

fn respond(
    respond_to: oneshot::Sender<Result<(), BridgeError>>,
    result: Result<(), BridgeError>,
    command: &str,
) {
    if respond_to.send(result).is_err() {
        tracing::trace!(command, "bridge response dropped (receiver gone)");
    }
}

async fn recv_with_timeout<T>(receiver: oneshot::Receiver<T>) -> Result<T, BridgeError> {
    match tokio::time::timeout(BRIDGE_TIMEOUT, receiver).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_)) => Err(BridgeError::Disconnected),
        Err(_) => Err(BridgeError::Timeout),
    }
}

/// Drain any immediately available outbound events (test helper).
pub fn drain_events(receiver: &mut mpsc::UnboundedReceiver<BridgeEvent>) -> Vec<BridgeEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ClaudeSession, SessionOptions};

    #[test]
    fn wire_chunk_tags_text_and_binary() {
        let text = WireChunk::from_bytes(b"hello");
        assert_eq!(
            serde_json::to_value(&text).unwrap(),
            serde_json::json!({"type": "text", "data": "hello"})
        );

        let binary = WireChunk::from_bytes(&[0xff, 0x00, 0x7f]);
        assert_eq!(
            serde_json::to_value(&binary).unwrap(),
            serde_json::json!({"type": "binary", "data": [255, 0, 127]})
        );
    }

    #[test]
    fn wire_chunk_round_trips_through_json() {
        let original = WireChunk::Binary(vec![1, 2, 3, 255]);
        let json = serde_json::to_string(&original).unwrap();
        let decoded: WireChunk = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.into_bytes(), vec![1, 2, 3, 255]);
    }

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let (client, server, _events) = BridgeLayer::new();
        let server_task = tokio::spawn(server.run());

        let err = client
            .write("nope".to_string(), WireChunk::Text("x".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownSession(_)));

        drop(client);
        let _ = server_task.await;
    }

    #[tokio::test]
    async fn disconnect_returns_error() {
        let (client, server, _events) = BridgeLayer::new();
        drop(server);
        let result = client.kill("any".to_string()).await;
        assert!(matches!(result, Err(BridgeError::Disconnected)));
    }

    #[tokio::test]
    async fn hung_server_returns_timeout() {
        let (client, mut server, _events) = BridgeLayer::new();

        // A "slow" server that receives but never responds.
        let server_task = tokio::spawn(async move {
            if let Some(_command) = server.receiver.recv().await {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
        });

        let result = client.kill("any".to_string()).await;
        assert!(matches!(result, Err(BridgeError::Timeout)));

        server_task.abort();
    }

    #[tokio::test]
    async fn write_to_unspawned_session_surfaces_session_error() {
        let (client, mut server, _events) = BridgeLayer::new();
        let (session, session_events) = ClaudeSession::new(SessionOptions::default());
        let session_id = session.id();
        server.register_session(session, session_events);
        let server_task = tokio::spawn(server.run());

        let err = client
            .write(session_id, WireChunk::Text("data".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Session(_)));

        drop(client);
        let _ = server_task.await;
    }

    #[tokio::test]
    async fn registered_session_state_changes_are_forwarded() {
        let (client, mut server, mut events) = BridgeLayer::new();
        let (session, session_events) = ClaudeSession::new(SessionOptions::default());
        let session_id = session.id();
        server.register_session(session, session_events);
        let server_task = tokio::spawn(server.run());

        client.kill(session_id.clone()).await.unwrap();
        // Let the forwarder task drain the session channel.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let forwarded = drain_events(&mut events);
        assert!(forwarded.iter().any(|event| matches!(
            event,
            BridgeEvent::State { session_id: id, state } if *id == session_id && state == "terminated"
        )));

        drop(client);
        let _ = server_task.await;
    }
}
