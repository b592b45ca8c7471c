use std::fs;
use std::time::Duration;

use clap::Parser;
use pretty_assertions::assert_eq;
use wikipath_app::cli::Cli;
use wikipath_app::config::{AppConfig, BackoffConfig};
use wikipath_core::BackoffPolicy;

fn cli(args: &[&str]) -> Cli {
    let mut argv = vec!["wikipath", "A", "B"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).expect("valid arguments")
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wikipath.ron");

    assert_eq!(AppConfig::load_from(&path).unwrap(), None);
    let config = AppConfig::load(Some(path.as_path())).unwrap();
    assert_eq!(config, AppConfig::default());

    let session = config.session_settings();
    assert_eq!(session.initial_poll_delay, Duration::from_millis(2000));
    assert_eq!(session.backoff, BackoffPolicy::Fixed(Duration::from_millis(2000)));
    assert_eq!(session.log_capacity, 500);
    assert_eq!(config.client_settings().base_url, "http://127.0.0.1:5001");
}

#[test]
fn partial_file_overrides_only_given_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wikipath.ron");
    fs::write(
        &path,
        r#"(
            server: "http://search.internal:8080",
            backoff: Escalating(initial_ms: 1000, escalated_ms: 60000, escalate_after: 2),
            log_reconnect_delay_ms: None,
            session_token: Some("tab-7"),
        )"#,
    )
    .unwrap();

    let config = AppConfig::load(Some(path.as_path())).unwrap();
    assert_eq!(config.server, "http://search.internal:8080");
    assert_eq!(config.request_timeout_ms, 30_000);

    let session = config.session_settings();
    assert_eq!(
        session.backoff,
        BackoffPolicy::Escalating {
            initial: Duration::from_secs(1),
            escalated: Duration::from_secs(60),
            escalate_after: 2,
        }
    );
    assert_eq!(session.log_reconnect_delay, None);
    assert_eq!(session.session_token.as_deref(), Some("tab-7"));
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wikipath.ron");
    fs::write(&path, "(server: 42").unwrap();

    let err = AppConfig::load(Some(path.as_path())).unwrap_err();
    assert!(format!("{err:#}").contains("parsing config file"));
}

#[test]
fn command_line_wins_over_file() {
    let mut config = AppConfig {
        server: "http://from-file:5001".to_string(),
        backoff: BackoffConfig::Fixed { interval_ms: 500 },
        ..AppConfig::default()
    };

    config.apply_cli(&cli(&[
        "--server",
        "http://from-cli:5001",
        "--backoff",
        "escalating",
    ]));
    assert_eq!(config.server, "http://from-cli:5001");
    assert_eq!(config.session_settings().backoff, BackoffPolicy::escalating());

    config.apply_cli(&cli(&["--backoff", "fixed"]));
    assert_eq!(config.backoff, BackoffConfig::Fixed { interval_ms: 2000 });
    assert_eq!(config.server, "http://from-cli:5001");
}
