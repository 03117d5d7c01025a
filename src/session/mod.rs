//! A chat session over the Claude CLI.
//!
//! Composes the PTY manager, binary decoder, output processor, and
//! input encoder into one session: PTY data flows through the decode
//! pipeline into the virtual screen while the raw decoded text is
//! accumulated for response-completion detection; outbound messages go
//! through the encoder to the child's stdin.
//!
//! Response completion is detected either by a prompt-pattern match in
//! the output or by process exit. The patterns are a heuristic over CLI
//! output and are configurable; they are version-dependent by nature.

pub mod events;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;

use crate::config::Config;
use crate::input::{InputEncoder, Platform};
use crate::pty::{PtyError, PtyEvent, PtyManager, PtyOptions, PtyOptionsOverlay};
use crate::term::decoder::BinaryDecoder;
use crate::term::processor::{OutputProcessor, Update};
use crate::term::state::Screen;

pub use events::{Message, Role, SessionEvent, SessionState, TransportMode};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is not ready (state {state:?})")]
    NotReady { state: SessionState },
    #[error("session is already initialized (state {state:?})")]
    AlreadyInitialized { state: SessionState },
    #[error(transparent)]
    Pty(#[from] PtyError),
    #[error("timed out waiting for session exit")]
    ExitTimeout,
}

/// Session configuration, merged from [`Config`] and caller overrides.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub command: String,
    pub args: Vec<String>,
    pub mode: TransportMode,
    pub cols: u16,
    pub rows: u16,
    pub cwd: Option<PathBuf>,
    pub platform: Platform,
    pub prompt_patterns: Vec<String>,
    pub prompt_timeout: Duration,
    pub response_timeout: Duration,
    pub max_buffer_bytes: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            args: Vec::new(),
            mode: TransportMode::Interactive,
            cols: 120,
            rows: 40,
            cwd: None,
            platform: Platform::host(),
            prompt_patterns: default_prompt_patterns(),
            prompt_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(30),
            max_buffer_bytes: crate::pty::options::DEFAULT_MAX_BUFFER_BYTES,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            command: config.session.command.clone(),
            args: config.session.args.clone(),
            mode: config
                .session
                .mode
                .parse()
                .unwrap_or(TransportMode::Interactive),
            cols: config.terminal.cols,
            rows: config.terminal.rows,
            prompt_patterns: config.session.prompt_patterns.clone(),
            prompt_timeout: Duration::from_millis(config.session.prompt_timeout_ms),
            response_timeout: Duration::from_millis(config.session.response_timeout_ms),
            max_buffer_bytes: config.terminal.max_buffer_bytes,
            ..defaults
        }
    }
}

pub fn default_prompt_patterns() -> Vec<String> {
    vec![
        "Human:".to_string(),
        ">".to_string(),
        "Assistant:".to_string(),
    ]
}

/// A point-in-time description of the session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: String,
    pub state: SessionState,
    pub mode: TransportMode,
    pub platform: Platform,
    pub cols: u16,
    pub rows: u16,
    pub message_count: usize,
    pub waiting_for_response: bool,
}

struct SessionInner {
    options: SessionOptions,
    session_id: String,
    state: SessionState,
    manager: PtyManager,
    pty_events: Option<std::sync::mpsc::Receiver<PtyEvent>>,
    decoder: BinaryDecoder,
    processor: OutputProcessor,
    encoder: InputEncoder,
    messages: Vec<Message>,
    current_response: String,
    init_buffer: String,
    waiting: bool,
    response_generation: u64,
    exit_code: Option<u32>,
    events: UnboundedSender<SessionEvent>,
}

impl SessionInner {
    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.emit(SessionEvent::StateChange(state));
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("session event dropped (receiver gone)");
        }
    }

    /// Assemble the in-flight response into an assistant message,
    /// stripping trailing prompt markers. Clears the waiting flag; the
    /// caller decides the follow-up state transition.
    fn finalize_response(&mut self) {
        self.waiting = false;
        let patterns = self.options.prompt_patterns.clone();
        let mut clean = self.current_response.trim_end().to_string();
        for pattern in &patterns {
            if let Some(stripped) = clean.trim_end().strip_suffix(pattern.as_str()) {
                clean = stripped.to_string();
            }
        }
        let content = clean.trim().to_string();
        if !content.is_empty() {
            let message = Message {
                role: Role::Assistant,
                content,
                timestamp: SystemTime::now(),
            };
            self.messages.push(message.clone());
            self.emit(SessionEvent::Message(message));
        }
        self.current_response.clear();
    }
}

/// Cloneable handle to one session. The session owns its PTY manager
/// exclusively; the screen model's lifetime is bound to the session.
#[derive(Clone)]
pub struct ClaudeSession {
    inner: Arc<Mutex<SessionInner>>,
    prompt_notify: Arc<Notify>,
    exit_notify: Arc<Notify>,
}

impl ClaudeSession {
    /// Create a session and the receiving end of its event channel.
    pub fn new(options: SessionOptions) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (manager, pty_events) = PtyManager::new(PtyOptions {
            cols: options.cols,
            rows: options.rows,
            cwd: options.cwd.clone(),
            max_buffer_bytes: options.max_buffer_bytes,
            ..PtyOptions::default()
        });
        let session_id = format!("claude-{}", uuid::Uuid::new_v4());
        let processor = OutputProcessor::new(options.cols, options.rows);
        let encoder = InputEncoder::new(options.platform);
        let session = Self {
            inner: Arc::new(Mutex::new(SessionInner {
                options,
                session_id,
                state: SessionState::Idle,
                manager,
                pty_events: Some(pty_events),
                decoder: BinaryDecoder::new(),
                processor,
                encoder,
                messages: Vec::new(),
                current_response: String::new(),
                init_buffer: String::new(),
                waiting: false,
                response_generation: 0,
                exit_code: None,
                events,
            })),
            prompt_notify: Arc::new(Notify::new()),
            exit_notify: Arc::new(Notify::new()),
        };
        (session, events_rx)
    }

    /// Spawn the CLI and wire its output through the decode pipeline.
    ///
    /// In interactive mode this waits for a prompt pattern with a
    /// bounded timeout before declaring the session ready; the timeout
    /// is not fatal, the session proceeds optimistically.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        let (mode, prompt_timeout) = {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Idle {
                return Err(SessionError::AlreadyInitialized { state: inner.state });
            }
            inner.set_state(SessionState::Initializing);
            (inner.options.mode, inner.options.prompt_timeout)
        };

        let spawn_result = {
            let mut inner = self.inner.lock();
            let command = inner.options.command.clone();
            let mut args = inner.options.args.clone();
            if inner.options.mode == TransportMode::Print {
                args.push("--print".to_string());
            }
            let overlay = PtyOptionsOverlay {
                env: vec![
                    ("FORCE_COLOR".to_string(), "1".to_string()),
                    ("TERM".to_string(), "xterm-256color".to_string()),
                ],
                ..PtyOptionsOverlay::default()
            };
            inner.manager.spawn(&command, &args, &overlay)
        };
        if let Err(err) = spawn_result {
            let mut inner = self.inner.lock();
            inner.set_state(SessionState::Error);
            inner.emit(SessionEvent::Error(err.to_string()));
            return Err(err.into());
        }

        self.start_pump();

        if mode == TransportMode::Interactive {
            let waited = tokio::time::timeout(prompt_timeout, self.prompt_notify.notified()).await;
            if waited.is_err() {
                tracing::debug!("no prompt within timeout, proceeding optimistically");
            }
        }

        let mut inner = self.inner.lock();
        inner.set_state(SessionState::Ready);
        inner.emit(SessionEvent::Ready);
        Ok(())
    }

    /// Drive PTY events through the session in strict arrival order.
    /// The decoder and parser both carry cross-chunk state, so chunks
    /// must never be reordered or processed concurrently.
    fn start_pump(&self) {
        let receiver = self.inner.lock().pty_events.take();
        let Some(receiver) = receiver else {
            return;
        };
        let session = self.clone();
        thread::spawn(move || {
            for event in receiver.iter() {
                match event {
                    PtyEvent::Data(bytes) => session.handle_raw_data(&bytes),
                    PtyEvent::Exit(code) => session.handle_exit(code),
                    PtyEvent::Error(message) => session.handle_process_error(message),
                    PtyEvent::Spawned { pid, command, .. } => {
                        tracing::debug!(?pid, command = %command, "session child started");
                    }
                }
            }
        });
    }

    fn handle_raw_data(&self, bytes: &[u8]) {
        let mut inner = self.inner.lock();
        let decoded = inner.decoder.decode(bytes);
        if !decoded.errors.is_empty() {
            tracing::debug!(count = decoded.errors.len(), "malformed utf-8 in child output");
        }
        let updates = inner.processor.process(&decoded.text);
        for update in updates {
            if let Update::Title(title) = &update {
                inner.emit(SessionEvent::Title(title.clone()));
            }
            inner.emit(SessionEvent::TerminalUpdate(update));
        }
        if inner.state == SessionState::Initializing {
            inner.init_buffer.push_str(&decoded.text);
            if detect_prompt(&inner.init_buffer, &inner.options.prompt_patterns) {
                self.prompt_notify.notify_one();
            }
        }
        if inner.waiting {
            inner.current_response.push_str(&decoded.text);
            inner.emit(SessionEvent::Stream(decoded.text.clone()));
            if detect_prompt(&decoded.text, &inner.options.prompt_patterns) {
                inner.finalize_response();
                if inner.state == SessionState::Processing {
                    inner.set_state(SessionState::Ready);
                }
            }
        }
        inner.emit(SessionEvent::RawData(bytes.to_vec()));
    }

    fn handle_exit(&self, code: u32) {
        let mut inner = self.inner.lock();
        inner.exit_code = Some(code);
        if inner.waiting {
            // One-shot transports complete their response on exit.
            inner.finalize_response();
        }
        if inner.state != SessionState::Terminated {
            inner.set_state(SessionState::Terminated);
        }
        inner.emit(SessionEvent::Exit(code));
        self.exit_notify.notify_one();
    }

    fn handle_process_error(&self, message: String) {
        let mut inner = self.inner.lock();
        inner.set_state(SessionState::Error);
        inner.emit(SessionEvent::Error(message));
    }

    /// Record and send a user message. Rejects unless the session is
    /// `Ready`; the state guard enforces one in-flight exchange at a
    /// time.
    pub async fn send_message(&self, text: &str) -> Result<(), SessionError> {
        let (generation, response_timeout) = {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Ready {
                return Err(SessionError::NotReady { state: inner.state });
            }
            inner.set_state(SessionState::Processing);
            let message = Message {
                role: Role::User,
                content: text.to_string(),
                timestamp: SystemTime::now(),
            };
            inner.messages.push(message.clone());
            inner.emit(SessionEvent::Message(message));
            inner.current_response.clear();
            inner.waiting = true;
            inner.response_generation += 1;

            let mut payload = inner.encoder.encode_text(text);
            payload.push_str(inner.encoder.newline());
            if inner.options.mode == TransportMode::Print {
                // One-shot transport: close stdin so the child exits
                // after producing its single response.
                payload.push_str(inner.options.platform.eof_marker());
            }
            if let Err(err) = inner.manager.write(payload.as_bytes()) {
                inner.waiting = false;
                inner.set_state(SessionState::Error);
                inner.emit(SessionEvent::Error(err.to_string()));
                return Err(err.into());
            }
            (inner.response_generation, inner.options.response_timeout)
        };

        // Watchdog: the session returns to Ready even if the child
        // never produces a recognizable prompt.
        let session = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(response_timeout).await;
            session.expire_response(generation);
        });
        Ok(())
    }

    fn expire_response(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.waiting && inner.response_generation == generation {
            tracing::warn!("response timed out, returning session to ready");
            inner.finalize_response();
            if inner.state == SessionState::Processing {
                inner.set_state(SessionState::Ready);
            }
        }
    }

    /// Encode and send a named special key (arrows, function keys,
    /// Ctrl/Alt chords).
    pub fn send_key(&self, name: &str) -> Result<(), SessionError> {
        let inner = self.inner.lock();
        let encoded = inner.encoder.encode_key(name);
        inner.manager.write(encoded.as_bytes())?;
        Ok(())
    }

    /// Write raw bytes straight to the child, bypassing encoding. Used
    /// by passthrough drivers and the IPC bridge.
    pub fn write_raw(&self, bytes: &[u8]) -> Result<(), SessionError> {
        let inner = self.inner.lock();
        inner.manager.write(bytes)?;
        Ok(())
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        inner.options.cols = cols;
        inner.options.rows = rows;
        inner.manager.resize(cols, rows)?;
        let update = inner.processor.resize(cols, rows);
        inner.emit(SessionEvent::TerminalUpdate(update));
        inner.emit(SessionEvent::Resized { cols, rows });
        Ok(())
    }

    pub fn screen(&self) -> Screen {
        self.inner.lock().processor.screen()
    }

    pub fn history(&self) -> Vec<Message> {
        self.inner.lock().messages.clone()
    }

    /// Recent raw output retained by the PTY ring buffer.
    pub fn recent_output(&self) -> Vec<u8> {
        self.inner.lock().manager.recent_output()
    }

    /// Clear the retained output, the screen model, and any partially
    /// accumulated response.
    pub fn clear_buffer(&self) {
        let mut inner = self.inner.lock();
        inner.manager.clear_buffer();
        inner.processor.reset();
        inner.decoder.reset();
        inner.current_response.clear();
    }

    /// Kill the child and terminate the session. Safe to call in any
    /// state; any response in flight is discarded.
    pub fn stop(&self) {
        let kill_result = {
            let inner = self.inner.lock();
            inner.manager.kill(None)
        };
        if let Err(err) = kill_result {
            tracing::warn!(error = %err, "kill during stop failed");
        }
        let mut inner = self.inner.lock();
        inner.waiting = false;
        if inner.state != SessionState::Terminated {
            inner.set_state(SessionState::Terminated);
        }
        inner.emit(SessionEvent::Stopped);
    }

    /// Resolve with the child's exit code, or fail after `timeout`.
    pub async fn wait_for_exit(&self, timeout: Duration) -> Result<u32, SessionError> {
        if let Some(code) = self.inner.lock().exit_code {
            return Ok(code);
        }
        match tokio::time::timeout(timeout, self.exit_notify.notified()).await {
            Ok(()) => self
                .inner
                .lock()
                .exit_code
                .ok_or(SessionError::ExitTimeout),
            Err(_) => Err(SessionError::ExitTimeout),
        }
    }

    pub fn id(&self) -> String {
        self.inner.lock().session_id.clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().manager.is_running()
    }

    pub fn info(&self) -> SessionInfo {
        let inner = self.inner.lock();
        SessionInfo {
            session_id: inner.session_id.clone(),
            state: inner.state,
            mode: inner.options.mode,
            platform: inner.options.platform,
            cols: inner.options.cols,
            rows: inner.options.rows,
            message_count: inner.messages.len(),
            waiting_for_response: inner.waiting,
        }
    }
}

/// Prompt detection: does the output end (ignoring trailing blanks)
/// with one of the configured markers? A heuristic over raw CLI output.
fn detect_prompt(text: &str, patterns: &[String]) -> bool {
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        return false;
    }
    patterns.iter().any(|p| trimmed.ends_with(p.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_prompt_matches_trailing_markers() {
        let patterns = default_prompt_patterns();
        assert!(detect_prompt("some output\nHuman: ", &patterns));
        assert!(detect_prompt("> ", &patterns));
        assert!(detect_prompt("done\n>\n", &patterns));
        assert!(!detect_prompt("still thinking...", &patterns));
        assert!(!detect_prompt("", &patterns));
    }

    #[test]
    fn new_session_is_idle_with_unique_id() {
        let (a, _rx_a) = ClaudeSession::new(SessionOptions::default());
        let (b, _rx_b) = ClaudeSession::new(SessionOptions::default());
        assert_eq!(a.state(), SessionState::Idle);
        assert!(a.id().starts_with("claude-"));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn send_message_rejects_when_not_ready() {
        let (session, _rx) = ClaudeSession::new(SessionOptions::default());
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let err = runtime.block_on(session.send_message("hi")).unwrap_err();
        assert!(matches!(
            err,
            SessionError::NotReady {
                state: SessionState::Idle
            }
        ));
    }

    #[test]
    fn send_key_before_spawn_surfaces_pty_error() {
        let (session, _rx) = ClaudeSession::new(SessionOptions::default());
        let err = session.send_key("UP").unwrap_err();
        assert!(matches!(err, SessionError::Pty(PtyError::NotRunning { .. })));
    }

    #[test]
    fn stop_on_fresh_session_is_safe_and_terminates() {
        let (session, mut rx) = ClaudeSession::new(SessionOptions::default());
        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Terminated);
        let mut saw_stopped = false;
        while let Ok(event) = rx.try_recv() {
            if event == SessionEvent::Stopped {
                saw_stopped = true;
            }
        }
        assert!(saw_stopped);
    }

    #[test]
    fn screen_reflects_processor_dimensions() {
        let (session, _rx) = ClaudeSession::new(SessionOptions {
            cols: 12,
            rows: 3,
            ..SessionOptions::default()
        });
        assert_eq!(session.screen().lines.len(), 3);
        session.resize(20, 5).unwrap();
        assert_eq!(session.screen().lines.len(), 5);
    }

    #[test]
    fn info_reports_geometry_and_counts() {
        let (session, _rx) = ClaudeSession::new(SessionOptions::default());
        let info = session.info();
        assert_eq!(info.state, SessionState::Idle);
        assert_eq!((info.cols, info.rows), (120, 40));
        assert_eq!(info.message_count, 0);
        assert!(!info.waiting_for_response);
    }

    #[test]
    fn finalize_strips_trailing_prompt_markers() {
        let (session, mut rx) = ClaudeSession::new(SessionOptions::default());
        {
            let mut inner = session.inner.lock();
            inner.current_response = "The answer is 42.\n\nHuman: ".to_string();
            inner.waiting = true;
            inner.finalize_response();
            assert!(!inner.waiting);
            assert_eq!(inner.messages.len(), 1);
            assert_eq!(inner.messages[0].content, "The answer is 42.");
            assert_eq!(inner.messages[0].role, Role::Assistant);
        }
        let mut saw_message = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SessionEvent::Message(_)) {
                saw_message = true;
            }
        }
        assert!(saw_message);
    }

    #[test]
    fn finalize_with_only_prompt_text_emits_nothing() {
        let (session, _rx) = ClaudeSession::new(SessionOptions::default());
        let mut inner = session.inner.lock();
        inner.current_response = "\n> ".to_string();
        inner.waiting = true;
        inner.finalize_response();
        assert!(inner.messages.is_empty());
    }
}
