//! Spawn options for the PTY child process.

use std::path::PathBuf;

pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 1024 * 1024;

/// Options merged with the manager's defaults at spawn time.
#[derive(Debug, Clone)]
pub struct PtyOptions {
    pub cols: u16,
    pub rows: u16,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Budget for the recent-output ring buffer.
    pub max_buffer_bytes: usize,
}

impl Default for PtyOptions {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            cwd: None,
            env: vec![("TERM".to_string(), "xterm-256color".to_string())],
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
        }
    }
}

impl PtyOptions {
    /// Overlay caller-provided values on these defaults. `None` fields
    /// keep the default; env vars are appended (later wins at spawn).
    pub fn merged_with(&self, overlay: &PtyOptionsOverlay) -> PtyOptions {
        let mut merged = self.clone();
        if let Some(cols) = overlay.cols {
            merged.cols = cols;
        }
        if let Some(rows) = overlay.rows {
            merged.rows = rows;
        }
        if let Some(cwd) = &overlay.cwd {
            merged.cwd = Some(cwd.clone());
        }
        merged.env.extend(overlay.env.iter().cloned());
        merged
    }
}

/// Caller-side overrides for a single spawn.
#[derive(Debug, Clone, Default)]
pub struct PtyOptionsOverlay {
    pub cols: Option<u16>,
    pub rows: Option<u16>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

/// Rewrite a command through the console host when the target platform
/// needs one for script files (`.cmd`/`.bat`). Transparent to callers:
/// the manager applies this with the compile-target flag.
pub fn rewrite_for_console_host(
    command: &str,
    args: &[String],
    windows: bool,
) -> (String, Vec<String>) {
    let lower = command.to_ascii_lowercase();
    if windows && (lower.ends_with(".cmd") || lower.ends_with(".bat")) {
        let mut host_args = vec!["/c".to_string(), command.to_string()];
        host_args.extend(args.iter().cloned());
        ("cmd.exe".to_string(), host_args)
    } else {
        (command.to_string(), args.to_vec())
    }
}
