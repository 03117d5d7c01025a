//! Terminal emulation core: byte decoding, escape parsing, and the
//! virtual screen model.
//!
//! Data flows decoder → parser → processor. The decoder turns raw PTY
//! chunks into text while carrying split UTF-8 sequences across chunk
//! boundaries; the parser turns text into discrete events; the processor
//! applies events to a styled cell grid.

pub mod cell;
pub mod decoder;
pub mod parser;
pub mod processor;
pub mod state;

pub use cell::{Cell, Color, Line, Style};
pub use decoder::{BinaryDecoder, DecodeResult};
pub use parser::{AnsiParser, CsiAction, ParserEvent, SgrAttr};
pub use processor::{OutputProcessor, Update};
pub use state::{CursorSnapshot, Screen, TerminalState};
