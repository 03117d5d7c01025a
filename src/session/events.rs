//! Session-level states, messages, and outbound events.

use std::time::SystemTime;

use crate::term::processor::Update;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Initializing,
    Ready,
    Processing,
    Error,
    Terminated,
}

impl SessionState {
    /// Wire-friendly name, stable across releases.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Processing => "processing",
            SessionState::Error => "error",
            SessionState::Terminated => "terminated",
        }
    }
}

/// How the session talks to the CLI.
///
/// `Interactive` keeps one long-lived process and detects response
/// completion by prompt pattern; `Print` runs the CLI in one-shot print
/// mode, signals end-of-input after each message, and treats process
/// exit as response completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Interactive,
    Print,
}

impl std::str::FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interactive" => Ok(TransportMode::Interactive),
            "print" => Ok(TransportMode::Print),
            other => Err(format!("unknown transport mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One exchange entry in the session history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: SystemTime,
}

/// Events published by a session to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Ready,
    StateChange(SessionState),
    Message(Message),
    TerminalUpdate(Update),
    Title(String),
    /// Raw bytes as received from the PTY, before decoding.
    RawData(Vec<u8>),
    /// Decoded text streamed while a response is in flight.
    Stream(String),
    Resized { cols: u16, rows: u16 },
    Exit(u32),
    Error(String),
    Stopped,
}
