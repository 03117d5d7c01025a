//! claudetty — a PTY session engine for the Claude CLI.
//!
//! Spawns the CLI under a pseudo-terminal and maintains a virtual screen
//! from its output: a byte-stream-safe decoder, an ANSI/VT100 escape
//! parser, a styled cell grid with main/alternate buffers, and the
//! encode-side mirror for keystrokes, pastes, and mouse events. The
//! `session` module ties the pieces into a chat-style exchange loop; the
//! `ipc` module bridges a session to a remote UI process.

pub mod config;
pub mod input;
pub mod ipc;
pub mod pty;
pub mod session;
pub mod term;
