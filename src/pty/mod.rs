//! Pseudo-terminal process layer.

pub mod manager;
pub mod options;
pub mod resize;
pub mod ring;

pub use manager::{ProcessState, PtyError, PtyEvent, PtyManager};
pub use options::{PtyOptions, PtyOptionsOverlay};
pub use resize::ResizeWatcher;
pub use ring::OutputRing;
