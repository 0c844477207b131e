//! Record a region from the terminal.
//!
//! Runs the same session state machine as the overlay app, with a headless
//! surface host standing in for the selection windows.

use std::time::Duration;

use spancap_capture_engine::{
    session_channel, CaptureController, FfmpegLauncher, HeadlessSurfaceHost, Outcome,
    SelectionRect, SessionEvent, SessionState,
};
use spancap_common::config::AppConfig;
use spancap_platform_linux::x11_display_name;

pub async fn run(
    config: AppConfig,
    display: usize,
    rect: SelectionRect,
    duration: Option<f64>,
) -> anyhow::Result<()> {
    let duration = match duration {
        Some(secs) if !(secs.is_finite() && secs > 0.0) => {
            anyhow::bail!("--duration must be a positive number of seconds")
        }
        other => other.map(Duration::from_secs_f64),
    };

    let provider = spancap_capture_engine::detect_provider(&config);
    let (tx, mut rx) = session_channel();
    let mut controller = CaptureController::new(
        config,
        provider,
        HeadlessSurfaceHost::new(),
        FfmpegLauncher::current(),
        tx,
    )
    .with_x11_display(x11_display_name());

    if let Outcome::Failed { error } = controller.request_start() {
        return Err(error.into());
    }

    let Some(surface) = controller
        .surfaces()
        .into_iter()
        .find(|s| s.display.index == display)
    else {
        controller.handle(SessionEvent::SelectionCancelled);
        anyhow::bail!("No display with index {display} (see `spancap displays`)");
    };

    match controller.on_selection_completed(rect, surface.id) {
        Outcome::Transitioned { .. } => {}
        Outcome::Rejected { reason } => {
            controller.handle(SessionEvent::SelectionCancelled);
            anyhow::bail!("Selection rejected: {reason}");
        }
        Outcome::Failed { error } => return Err(error.into()),
        Outcome::Ignored => anyhow::bail!("Selection was not accepted"),
    }

    tracing::debug!(
        pid = ?controller.encoder_pid(),
        surface = %surface.id,
        "Headless recording running"
    );
    if let (Some(path), Some(crop)) = (controller.output_path(), controller.active_crop()) {
        println!("Recording {}x{} on {}", crop.width, crop.height, surface.display.name);
        println!("  Output: {}", path.display());
    }
    match duration {
        Some(d) => println!("Stopping after {:.1}s or on Ctrl+C...", d.as_secs_f64()),
        None => println!("Press Ctrl+C to stop recording..."),
    }
    println!();

    let timer = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(timer);

    let mut stop_sent = false;
    while controller.state() != SessionState::Idle {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => {
                    controller.handle(event);
                }
                None => break,
            },
            result = tokio::signal::ctrl_c(), if !stop_sent => {
                result?;
                tracing::info!("Interrupted; stopping encoder");
                println!("Stopping...");
                controller.request_stop();
                stop_sent = true;
            }
            _ = &mut timer, if !stop_sent => {
                tracing::info!(
                    duration_secs = ?duration.map(|d| d.as_secs_f64()),
                    "Duration elapsed; stopping encoder"
                );
                controller.request_stop();
                stop_sent = true;
            }
        }
    }

    let Some(report) = controller.last_exit() else {
        anyhow::bail!("Encoder exit was never reported");
    };
    if report.is_graceful() {
        println!(
            "Recording saved to: {} ({:.1}s)",
            report.output_path.display(),
            report.duration_secs
        );
        Ok(())
    } else {
        tracing::warn!(
            code = ?report.code,
            output = %report.output_path.display(),
            "Recording did not finish cleanly"
        );
        anyhow::bail!(
            "Encoder exited with {:?} after {:.1}s; output may be incomplete: {}",
            report.code,
            report.duration_secs,
            report.output_path.display()
        )
    }
}
