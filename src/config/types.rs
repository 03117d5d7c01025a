use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub terminal: TerminalDefaults,
    #[serde(default)]
    pub session: SessionDefaults,
}

/// Virtual terminal defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalDefaults {
    /// Screen width in columns (default: 120).
    #[serde(default = "default_cols")]
    pub cols: u16,
    /// Screen height in rows (default: 40).
    #[serde(default = "default_rows")]
    pub rows: u16,
    /// Budget for the recent-output ring buffer (default: 1 MiB).
    #[serde(default = "default_max_buffer_bytes")]
    pub max_buffer_bytes: usize,
}

impl Default for TerminalDefaults {
    fn default() -> Self {
        Self {
            cols: default_cols(),
            rows: default_rows(),
            max_buffer_bytes: default_max_buffer_bytes(),
        }
    }
}

/// Session and transport defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDefaults {
    /// CLI command to spawn (default: "claude").
    #[serde(default = "default_command")]
    pub command: String,
    /// Extra arguments passed on every spawn.
    #[serde(default)]
    pub args: Vec<String>,
    /// Transport mode: "interactive" or "print".
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Markers that signal the CLI is waiting for input. Matched
    /// against the end of output with trailing whitespace ignored.
    #[serde(default = "default_prompt_patterns")]
    pub prompt_patterns: Vec<String>,
    /// How long to wait for the first prompt at startup (default: 5s).
    #[serde(default = "default_prompt_timeout_ms")]
    pub prompt_timeout_ms: u64,
    /// Watchdog for an in-flight response (default: 30s).
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            mode: default_mode(),
            prompt_patterns: default_prompt_patterns(),
            prompt_timeout_ms: default_prompt_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

fn default_cols() -> u16 {
    120
}

fn default_rows() -> u16 {
    40
}

fn default_max_buffer_bytes() -> usize {
    1024 * 1024
}

fn default_command() -> String {
    "claude".to_string()
}

fn default_mode() -> String {
    "interactive".to_string()
}

fn default_prompt_patterns() -> Vec<String> {
    crate::session::default_prompt_patterns()
}

fn default_prompt_timeout_ms() -> u64 {
    5_000
}

fn default_response_timeout_ms() -> u64 {
    30_000
}
