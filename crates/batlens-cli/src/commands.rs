//! Subcommand execution.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::info;

use batlens_detector_client::{DetectionService, DetectorClient, DetectorClientConfig, DetectorError};
use batlens_media::{MediaConfig, MediaError, MediaSourceManager};
use batlens_models::{AlertNotification, AnalysisResult};
use batlens_report::{summarize, ChartRenderer, ExportEngine, ExportFormat};
use batlens_session::{AnalysisSession, DispatchOutcome, SessionConfig, SessionError, SessionSnapshot};

use crate::cli::{Cli, Command};

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_VALIDATION: i32 = 2;
pub const EXIT_TRANSPORT: i32 = 3;
pub const EXIT_APPLICATION: i32 = 4;

/// Load the session, run one command and persist the session again.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut client_config = DetectorClientConfig::from_env();
    if let Some(url) = cli.service_url {
        client_config.base_url = url;
    }
    let client = Arc::new(DetectorClient::new(client_config)?);

    let mut config = SessionConfig::from_env();
    if let Some(enabled) = cli.command.fallback_override() {
        config = config.with_fallback(enabled);
    }

    let media = MediaSourceManager::new(MediaConfig::from_env());
    let mut session = AnalysisSession::new(&config, media, client.clone());
    let snapshot = SessionSnapshot::load(&cli.session)?;
    session.restore(snapshot);
    let mut alerts = session.orchestrator().subscribe();

    let outcome = execute(&mut session, &client, cli.command).await;

    print_alerts(&mut alerts);
    session
        .snapshot()
        .save(&cli.session)
        .with_context(|| format!("saving session to {}", cli.session.display()))?;
    info!("Session saved to {}", cli.session.display());

    outcome
}

async fn execute(session: &mut AnalysisSession, client: &DetectorClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::SelectFile { path } => {
            let duration = session.select_file(&path).await?;
            let segment = session.segment();
            println!(
                "Selected {} ({:.1}s), segment {:.1}-{:.1}",
                path.display(),
                duration,
                segment.start,
                segment.end
            );
        }
        Command::SetSegment { start, end } => {
            if !session.segment_enabled() {
                return Err(SessionError::validation("no video with a known duration is selected").into());
            }
            let segment = session.set_segment(start, end);
            println!("Segment {:.1}-{:.1}", segment.start, segment.end);
            if let Err(e) = session.ready() {
                println!("Not ready for analysis: {}", e);
            }
        }
        Command::SetSensitivity { value } => {
            let pending = session.set_sensitivity(value);
            println!("Sensitivity {:.2}", pending);
        }
        Command::Analyze { .. } => {
            match session.analyze().await? {
                DispatchOutcome::Succeeded(id) => println!("Analysis {} complete", id),
                DispatchOutcome::Fallback(id) => println!("Analysis {} produced simulated results", id),
                DispatchOutcome::Superseded(id) => println!("Analysis {} was superseded", id),
            }
            if let Some(result) = session.result() {
                print_result(&result);
            }
        }
        Command::Export { format, out } => {
            let result = session
                .result()
                .ok_or_else(|| SessionError::validation("no analysis result to export"))?;
            export(&result, format.into(), &out)?;
        }
        Command::Health => {
            let health = client.health().await?;
            println!("Detection service {}: {}", client.config().base_url, health.status());
            for check in health.failing_checks() {
                println!("  failing: {}", check);
            }
            if !health.is_healthy() {
                return Err(DetectorError::ServiceUnavailable(format!("status {}", health.status())).into());
            }
        }
        Command::Status => print_status(session),
    }
    Ok(())
}

fn export(result: &AnalysisResult, format: ExportFormat, out: &Path) -> anyhow::Result<()> {
    let engine = ExportEngine::default();
    let mut renderer = ChartRenderer::default();
    if format == ExportFormat::Png {
        renderer.render(result);
    }

    match engine.export(format, result, renderer.surface())? {
        Some(artifact) => {
            let path = engine.save(&artifact, out)?;
            println!("Wrote {} ({})", path.display(), artifact.content_type);
        }
        None => println!("No chart to export"),
    }

    renderer.teardown();
    Ok(())
}

fn print_result(result: &AnalysisResult) {
    println!(
        "{} detections in {} frames at {:.1} fps (analysis time {})",
        result.detection_count, result.total_frames, result.fps, result.analysis_time
    );
    println!("{}", summarize(result));
}

fn print_status(session: &AnalysisSession) {
    match session.source() {
        Some(source) => println!(
            "Source: {} ({} bytes, {:.1}s)",
            source.path.display(),
            source.size_bytes,
            source.duration
        ),
        None => println!("Source: none"),
    }

    let segment = session.segment();
    println!(
        "Segment: {:.1}-{:.1}{}",
        segment.start,
        segment.end,
        if session.segment_enabled() { "" } else { " (disabled)" }
    );
    println!("Sensitivity: {:.2}", session.sensitivity());
    println!(
        "Phase: {} (last request {})",
        session.phase().as_str(),
        session.orchestrator().last_id()
    );
    match session.ready() {
        Ok(_) => println!("Ready: yes"),
        Err(e) => println!("Ready: no ({})", e),
    }
    if let Some(result) = session.result() {
        print_result(&result);
    }
    if let Some(alert) = session.last_alert() {
        println!("Last alert: {}", alert);
    }
}

fn print_alerts(alerts: &mut broadcast::Receiver<AlertNotification>) {
    while let Ok(alert) = alerts.try_recv() {
        println!("{}", alert);
    }
}

/// Map a failure onto the process exit code.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<SessionError>() {
        return match e {
            SessionError::Validation(_) => EXIT_VALIDATION,
            SessionError::Transport(_) => EXIT_TRANSPORT,
            SessionError::Application(_) => EXIT_APPLICATION,
            _ => EXIT_FAILURE,
        };
    }
    if let Some(e) = err.downcast_ref::<DetectorError>() {
        return if e.is_application() {
            EXIT_APPLICATION
        } else if e.is_retryable() {
            EXIT_TRANSPORT
        } else {
            EXIT_FAILURE
        };
    }
    if let Some(e) = err.downcast_ref::<MediaError>() {
        if e.is_validation() {
            return EXIT_VALIDATION;
        }
    }
    EXIT_FAILURE
}
