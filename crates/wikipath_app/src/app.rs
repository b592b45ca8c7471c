use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use wikipath_core::{JobStatus, LogLine, Phase, SearchParameters, SessionState};
use wikipath_engine::{HttpJobClient, HttpLogSource, SearchSession};
use wikipath_logging::{wikipath_info, wikipath_warn};

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::render;

/// Runs one search to completion, echoing progress and live log lines.
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_cli(&cli);

    let client_settings = config.client_settings();
    let client = HttpJobClient::new(client_settings.clone())
        .with_context(|| format!("configuring client for {}", config.server))?;
    let logs = HttpLogSource::new(client_settings)
        .with_context(|| format!("configuring log stream for {}", config.server))?;
    let session = SearchSession::new(Arc::new(client), Arc::new(logs), config.session_settings());

    let mut params = SearchParameters::new(cli.start.as_str(), cli.finish.as_str());
    if let Some(method) = cli.method {
        params = params.with_method(method.into());
    }
    if let Some(heuristic) = cli.heuristic {
        params = params.with_heuristic(heuristic.into());
    }

    let mut updates = session.subscribe();
    session.start(params).await?;

    let mut echo = ProgressEcho::default();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut interrupted = false;

    let settled = loop {
        tokio::select! {
            notification = updates.recv() => {
                let Some(notification) = notification else {
                    anyhow::bail!("search session ended unexpectedly");
                };
                let state = notification.state;
                echo.show(&state);
                if state.phase() != Phase::Idle && !state.is_active() {
                    break state;
                }
            }
            result = &mut interrupt, if !interrupted => {
                interrupted = true;
                result.context("listening for Ctrl-C")?;
                wikipath_info!("Interrupted; cancelling search");
                session.cancel().await?;
            }
        }
    };

    for line in render::render(&settled.view()) {
        println!("{line}");
    }
    session.shutdown().await;
    Ok(exit_code(&settled))
}

fn exit_code(state: &SessionState) -> ExitCode {
    if state.abandoned().is_some() {
        return ExitCode::FAILURE;
    }
    match state.status() {
        Some(JobStatus::Completed { .. }) | Some(JobStatus::NotFound { .. }) => ExitCode::SUCCESS,
        Some(JobStatus::Aborted) => ExitCode::from(130),
        Some(JobStatus::Failed { reason }) => {
            wikipath_warn!("Search failed: {}", reason);
            ExitCode::FAILURE
        }
        Some(JobStatus::InProgress { .. }) | None => ExitCode::FAILURE,
    }
}

/// Prints what changed between consecutive snapshots.
#[derive(Default)]
struct ProgressEcho {
    progress: String,
    last_log: Option<LogLine>,
    notice: Option<String>,
}

impl ProgressEcho {
    fn show(&mut self, state: &SessionState) {
        let view = state.view();

        // Every mutation adds at most one log line.
        let latest = state.logs().last();
        if let Some(line) = latest {
            if self.last_log.as_ref() != Some(line) {
                println!("  | {}", line.text);
            }
        }
        self.last_log = latest.cloned();

        if state.is_active() {
            let progress = render::progress_line(&view);
            if progress != self.progress {
                println!("{progress}");
                self.progress = progress;
            }
        }

        if view.notice != self.notice {
            if let Some(notice) = &view.notice {
                eprintln!("Note: {notice}");
            }
            self.notice = view.notice;
        }
    }
}
