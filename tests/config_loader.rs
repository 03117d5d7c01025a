use std::fs;

use claudetty::config::{Config, ConfigError};

fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
    assert_eq!(config.terminal.cols, 120);
    assert_eq!(config.terminal.rows, 40);
    assert_eq!(config.session.command, "claude");
    assert_eq!(config.session.mode, "interactive");
}

#[test]
fn partial_file_fills_in_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[terminal]
cols = 200

[session]
mode = "print"
"#,
    );
    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.terminal.cols, 200);
    assert_eq!(config.terminal.rows, 40);
    assert_eq!(config.session.mode, "print");
    assert_eq!(config.session.response_timeout_ms, 30_000);
    assert!(!config.session.prompt_patterns.is_empty());
}

#[test]
fn full_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[terminal]
cols = 100
rows = 30
max_buffer_bytes = 4096

[session]
command = "claude"
args = ["--model", "opus"]
mode = "interactive"
prompt_patterns = ["$ "]
prompt_timeout_ms = 1000
response_timeout_ms = 10000
"#,
    );
    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.terminal.max_buffer_bytes, 4096);
    assert_eq!(config.session.args, vec!["--model", "opus"]);
    assert_eq!(config.session.prompt_patterns, vec!["$ "]);
    assert_eq!(config.session.prompt_timeout_ms, 1000);
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[terminal\ncols = ");
    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}

#[test]
fn zero_dimensions_fail_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[terminal]\ncols = 0\n");
    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError { .. }));
}

#[test]
fn empty_command_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[session]\ncommand = \" \"\n");
    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError { .. }));
}

#[test]
fn unknown_mode_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[session]\nmode = \"batch\"\n");
    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError { .. }));
}
