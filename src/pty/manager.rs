//! Owns the pseudo-terminal child process: spawn, write, resize,
//! graceful-then-forced termination, and bounded retention of recent
//! output.

use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;

use crate::pty::options::{rewrite_for_console_host, PtyOptions, PtyOptionsOverlay};
use crate::pty::ring::OutputRing;

/// Grace period between the termination signal and the forced kill.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle of the managed child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("process is already running")]
    AlreadyRunning,
    #[error("process is not running (state {state:?})")]
    NotRunning { state: ProcessState },
    #[error("failed to spawn '{command}': {message}")]
    Spawn { command: String, message: String },
    #[error("resize failed: {0}")]
    Resize(String),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out waiting for process exit")]
    ExitTimeout,
}

/// Events published by the manager over its channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyEvent {
    Spawned {
        pid: Option<u32>,
        command: String,
        args: Vec<String>,
    },
    Data(Vec<u8>),
    Exit(u32),
    Error(String),
}

struct Inner {
    state: ProcessState,
    options: PtyOptions,
    master: Option<Box<dyn MasterPty + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    killer: Option<Box<dyn ChildKiller + Send + Sync>>,
    pid: Option<u32>,
    exit_code: Option<u32>,
    output: OutputRing,
    /// Bumped on every spawn so threads from an earlier child cannot
    /// touch the state of a later one.
    generation: u64,
}

/// One live child handle per manager. `spawn` fails while a child is
/// running; after it exits the manager can spawn again.
pub struct PtyManager {
    inner: Arc<Mutex<Inner>>,
    exit_cond: Arc<Condvar>,
    events: Sender<PtyEvent>,
}

impl PtyManager {
    /// Create a manager and the receiving end of its event channel.
    pub fn new(options: PtyOptions) -> (Self, Receiver<PtyEvent>) {
        let (events, events_rx) = mpsc::channel();
        let output = OutputRing::new(options.max_buffer_bytes);
        let manager = Self {
            inner: Arc::new(Mutex::new(Inner {
                state: ProcessState::Idle,
                options,
                master: None,
                writer: None,
                killer: None,
                pid: None,
                exit_code: None,
                output,
                generation: 0,
            })),
            exit_cond: Arc::new(Condvar::new()),
            events,
        };
        (manager, events_rx)
    }

    /// Spawn the child under a new pseudo-terminal.
    ///
    /// Caller options are merged over the manager defaults. On Windows
    /// targets, `.cmd`/`.bat` scripts are rewritten through the console
    /// host transparently.
    pub fn spawn(
        &mut self,
        command: &str,
        args: &[String],
        overlay: &PtyOptionsOverlay,
    ) -> Result<(), PtyError> {
        {
            let mut inner = self.inner.lock();
            match inner.state {
                ProcessState::Starting | ProcessState::Running | ProcessState::Stopping => {
                    return Err(PtyError::AlreadyRunning);
                }
                _ => {}
            }
            inner.state = ProcessState::Starting;
            inner.options = inner.options.merged_with(overlay);
            inner.exit_code = None;
        }
        match self.spawn_child(command, args) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.inner.lock().state = ProcessState::Error;
                let _ = self.events.send(PtyEvent::Error(err.to_string()));
                Err(err)
            }
        }
    }

    fn spawn_child(&mut self, command: &str, args: &[String]) -> Result<(), PtyError> {
        let (cols, rows, cwd, env) = {
            let inner = self.inner.lock();
            (
                inner.options.cols,
                inner.options.rows,
                inner.options.cwd.clone(),
                inner.options.env.clone(),
            )
        };
        let (command, args) = rewrite_for_console_host(command, args, cfg!(windows));
        let spawn_err = |message: String| PtyError::Spawn {
            command: command.clone(),
            message,
        };

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| spawn_err(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&command);
        cmd.args(&args);
        match &cwd {
            Some(dir) => cmd.cwd(dir),
            None => cmd.cwd(std::env::current_dir()?),
        }
        for (key, value) in &env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| spawn_err(e.to_string()))?;
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| spawn_err(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| spawn_err(e.to_string()))?;
        let killer = child.clone_killer();
        let pid = child.process_id();

        let generation = {
            let mut inner = self.inner.lock();
            inner.master = Some(pair.master);
            inner.writer = Some(writer);
            inner.killer = Some(killer);
            inner.pid = pid;
            inner.state = ProcessState::Running;
            inner.generation += 1;
            inner.generation
        };
        tracing::debug!(?pid, command = %command, "pty child spawned");
        let _ = self.events.send(PtyEvent::Spawned { pid, command, args });

        let reader_inner = Arc::clone(&self.inner);
        let reader_events = self.events.clone();
        thread::spawn(move || {
            let mut reader = reader;
            let mut buffer = [0u8; 8192];
            loop {
                let count = match reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(count) => count,
                    Err(_) => break,
                };
                {
                    let mut inner = reader_inner.lock();
                    if inner.generation != generation {
                        break;
                    }
                    inner.output.push(&buffer[..count]);
                }
                let _ = reader_events.send(PtyEvent::Data(buffer[..count].to_vec()));
            }
        });

        // The exit wait runs on its own thread so a grandchild holding
        // the PTY slave open cannot delay exit detection.
        let waiter_inner = Arc::clone(&self.inner);
        let exit_cond = Arc::clone(&self.exit_cond);
        let waiter_events = self.events.clone();
        thread::spawn(move || {
            let mut child = child;
            let code = child.wait().map(|status| status.exit_code()).unwrap_or(1);
            {
                let mut inner = waiter_inner.lock();
                if inner.generation != generation {
                    return;
                }
                inner.state = ProcessState::Stopped;
                inner.exit_code = Some(code);
                inner.writer = None;
                inner.master = None;
                inner.killer = None;
            }
            exit_cond.notify_all();
            tracing::debug!(code, "pty child exited");
            let _ = waiter_events.send(PtyEvent::Exit(code));
        });
        Ok(())
    }

    /// Write bytes to the child's stdin. Fails unless `Running`.
    pub fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        let mut inner = self.inner.lock();
        if inner.state != ProcessState::Running {
            return Err(PtyError::NotRunning { state: inner.state });
        }
        let state = inner.state;
        let writer = inner
            .writer
            .as_mut()
            .ok_or(PtyError::NotRunning { state })?;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }

    /// Store new dimensions and apply them to the live PTY if any.
    /// When not running the size is applied lazily on the next spawn.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        let mut inner = self.inner.lock();
        inner.options.cols = cols;
        inner.options.rows = rows;
        if let Some(master) = &inner.master {
            master
                .resize(PtySize {
                    rows,
                    cols,
                    pixel_width: 0,
                    pixel_height: 0,
                })
                .map_err(|e| PtyError::Resize(e.to_string()))?;
        }
        Ok(())
    }

    /// Terminate the child: a termination signal first (where the
    /// platform has POSIX signals), then a forced kill after the grace
    /// period. A no-op when nothing is running.
    pub fn kill(&self, signal: Option<&str>) -> Result<(), PtyError> {
        {
            let mut inner = self.inner.lock();
            match inner.state {
                ProcessState::Running | ProcessState::Starting | ProcessState::Stopping => {}
                _ => return Ok(()),
            }
            inner.state = ProcessState::Stopping;
            #[cfg(unix)]
            if let Some(pid) = inner.pid {
                let signo = signal_number(signal);
                tracing::debug!(pid, signo, "sending termination signal");
                unsafe {
                    libc::kill(pid as i32, signo);
                }
            }
            #[cfg(not(unix))]
            {
                // No POSIX signal semantics: terminate unconditionally.
                let _ = signal;
                if let Some(killer) = inner.killer.as_mut() {
                    let _ = killer.kill();
                }
            }
        }
        if self.wait_for_exit(KILL_GRACE).is_ok() {
            return Ok(());
        }
        tracing::warn!("graceful termination timed out, forcing kill");
        {
            let mut inner = self.inner.lock();
            if let Some(killer) = inner.killer.as_mut() {
                let _ = killer.kill();
            }
        }
        self.wait_for_exit(KILL_GRACE).map(|_| ())
    }

    /// Block until the child exits, up to `timeout`.
    pub fn wait_for_exit(&self, timeout: Duration) -> Result<u32, PtyError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if let Some(code) = inner.exit_code {
                return Ok(code);
            }
            if inner.state == ProcessState::Idle {
                return Err(PtyError::NotRunning {
                    state: ProcessState::Idle,
                });
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(PtyError::ExitTimeout);
            }
            self.exit_cond.wait_for(&mut inner, deadline - now);
        }
    }

    pub fn state(&self) -> ProcessState {
        self.inner.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == ProcessState::Running
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.lock().pid
    }

    /// Exit code, set once the child reaches `Stopped`.
    pub fn exit_code(&self) -> Option<u32> {
        self.inner.lock().exit_code
    }

    pub fn size(&self) -> (u16, u16) {
        let inner = self.inner.lock();
        (inner.options.cols, inner.options.rows)
    }

    /// Recent output retained by the ring buffer, oldest first.
    pub fn recent_output(&self) -> Vec<u8> {
        self.inner.lock().output.snapshot()
    }

    pub fn clear_buffer(&self) {
        self.inner.lock().output.clear();
    }
}

impl Drop for PtyManager {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if let Some(killer) = inner.killer.as_mut() {
            let _ = killer.kill();
        }
    }
}

#[cfg(unix)]
fn signal_number(signal: Option<&str>) -> i32 {
    match signal {
        Some("SIGINT") => libc::SIGINT,
        Some("SIGKILL") => libc::SIGKILL,
        Some("SIGHUP") => libc::SIGHUP,
        _ => libc::SIGTERM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_before_spawn_fails_with_state_error() {
        let (manager, _events) = PtyManager::new(PtyOptions::default());
        let err = manager.write(b"data").unwrap_err();
        assert!(matches!(
            err,
            PtyError::NotRunning {
                state: ProcessState::Idle
            }
        ));
    }

    #[test]
    fn kill_on_idle_manager_is_a_noop() {
        let (manager, _events) = PtyManager::new(PtyOptions::default());
        assert!(manager.kill(None).is_ok());
        assert_eq!(manager.state(), ProcessState::Idle);
    }

    #[test]
    fn resize_before_spawn_stores_dimensions() {
        let (manager, _events) = PtyManager::new(PtyOptions::default());
        manager.resize(132, 50).unwrap();
        assert_eq!(manager.size(), (132, 50));
    }

    #[test]
    fn wait_for_exit_on_idle_manager_errors() {
        let (manager, _events) = PtyManager::new(PtyOptions::default());
        let err = manager.wait_for_exit(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, PtyError::NotRunning { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn spawn_runs_a_real_child_and_reports_exit() {
        let (mut manager, events) = PtyManager::new(PtyOptions::default());
        manager
            .spawn(
                "sh",
                &["-c".to_string(), "printf ok".to_string()],
                &PtyOptionsOverlay::default(),
            )
            .unwrap();
        let code = manager.wait_for_exit(Duration::from_secs(10)).unwrap();
        assert_eq!(code, 0);
        assert_eq!(manager.state(), ProcessState::Stopped);

        let mut data = Vec::new();
        let mut saw_spawned = false;
        while let Ok(event) = events.try_recv() {
            match event {
                PtyEvent::Data(chunk) => data.extend_from_slice(&chunk),
                PtyEvent::Spawned { .. } => saw_spawned = true,
                _ => {}
            }
        }
        assert!(saw_spawned);
        assert!(String::from_utf8_lossy(&data).contains("ok"));
        assert!(String::from_utf8_lossy(&manager.recent_output()).contains("ok"));
    }

    #[cfg(unix)]
    #[test]
    fn spawn_while_running_fails_without_side_effects() {
        let (mut manager, _events) = PtyManager::new(PtyOptions::default());
        manager
            .spawn(
                "sh",
                &["-c".to_string(), "sleep 5".to_string()],
                &PtyOptionsOverlay::default(),
            )
            .unwrap();
        let pid_before = manager.pid();
        let err = manager
            .spawn("sh", &[], &PtyOptionsOverlay::default())
            .unwrap_err();
        assert!(matches!(err, PtyError::AlreadyRunning));
        assert_eq!(manager.pid(), pid_before);
        assert_eq!(manager.state(), ProcessState::Running);
        manager.kill(None).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn kill_terminates_a_long_running_child() {
        let (mut manager, _events) = PtyManager::new(PtyOptions::default());
        manager
            .spawn(
                "sh",
                &["-c".to_string(), "sleep 60".to_string()],
                &PtyOptionsOverlay::default(),
            )
            .unwrap();
        manager.kill(Some("SIGTERM")).unwrap();
        assert_eq!(manager.state(), ProcessState::Stopped);
        assert!(manager.exit_code().is_some());
    }

    #[test]
    fn spawn_failure_transitions_to_error_state() {
        let (mut manager, events) = PtyManager::new(PtyOptions::default());
        let result = manager.spawn(
            "definitely-not-a-real-command-xyz",
            &[],
            &PtyOptionsOverlay::default(),
        );
        if result.is_err() {
            assert_eq!(manager.state(), ProcessState::Error);
            assert!(matches!(events.try_recv(), Ok(PtyEvent::Error(_))));
        } else {
            // Some PTY backends only surface a bad command after the
            // fork; the child then exits nonzero instead.
            let code = manager.wait_for_exit(Duration::from_secs(10)).unwrap();
            assert_ne!(code, 0);
        }
    }
}
