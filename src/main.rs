use std::io::{self, Read, Write};
use std::thread;

use anyhow::Context;
use clap::Parser;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, size as terminal_size};

use claudetty::config::Config;
use claudetty::pty::ResizeWatcher;
use claudetty::session::{ClaudeSession, SessionEvent, SessionOptions, TransportMode};

/// Run the Claude CLI under a managed PTY session.
#[derive(Debug, Parser)]
#[command(name = "claudetty", version)]
struct Args {
    /// Run the CLI in one-shot print mode.
    #[arg(long)]
    print: bool,

    /// Override the configured CLI command.
    #[arg(long)]
    command: Option<String>,

    /// Arguments passed through to the CLI.
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("claudetty=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load().context("failed to load configuration")?;
    let mut options = SessionOptions::from_config(&config);
    if let Some(command) = args.command {
        options.command = command;
    }
    options.args.extend(args.args);
    if args.print {
        options.mode = TransportMode::Print;
    }
    if let Ok((cols, rows)) = terminal_size() {
        options.cols = cols;
        options.rows = rows;
    }

    let (session, mut events) = ClaudeSession::new(options);
    session.initialize().await.context("failed to start session")?;

    let raw_mode = RawModeGuard::new()?;
    let watcher = ResizeWatcher::start(session.clone())?;

    let input_session = session.clone();
    thread::spawn(move || {
        let mut stdin = io::stdin();
        let mut buffer = [0u8; 1024];
        loop {
            let count = match stdin.read(&mut buffer) {
                Ok(0) => break,
                Ok(count) => count,
                Err(_) => break,
            };
            if input_session.write_raw(&buffer[..count]).is_err() {
                break;
            }
        }
    });

    let mut exit_code = 0u32;
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::RawData(bytes) => {
                let mut stdout = io::stdout();
                let _ = stdout.write_all(&bytes);
                let _ = stdout.flush();
            }
            SessionEvent::Exit(code) => {
                exit_code = code;
                break;
            }
            SessionEvent::Error(message) => {
                tracing::error!(%message, "session error");
            }
            _ => {}
        }
    }

    session.stop();
    if let Some(watcher) = watcher {
        watcher.stop();
    }
    drop(raw_mode);

    if exit_code != 0 {
        std::process::exit(exit_code as i32);
    }
    Ok(())
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}
