//! Dry run: show what a selection would record without spawning anything.

use spancap_capture_engine::encoder::{CaptureRegion, EncoderInvocation};
use spancap_capture_engine::geometry::{clamp_to_bounds, map_to_crop};
use spancap_capture_engine::SelectionRect;
use spancap_common::clock::RecordingClock;
use spancap_common::config::AppConfig;
use spancap_platform_core::resolve;
use spancap_platform_linux::x11_display_name;

pub fn run(config: &AppConfig, display: usize, rect: SelectionRect) -> anyhow::Result<()> {
    let provider = spancap_capture_engine::detect_provider(config);
    let topology = resolve(provider.as_ref())?;
    let target = super::display_at(&topology, display)?;

    let mapped = map_to_crop(rect, target, &topology.bounds);
    if mapped.is_empty() {
        anyhow::bail!("Selection {}x{} is empty", rect.width, rect.height);
    }
    let (crop, clamped) = clamp_to_bounds(mapped, &topology.bounds);
    let margin_px = config.overlay.ui_margin_px;
    if !crop.fits_margin(margin_px) {
        anyhow::bail!(
            "Selection {}x{} is too small for the {margin_px}px edge margin",
            crop.width,
            crop.height
        );
    }

    let output_path = config.output_dir.join(format!(
        "capture-{}.{}",
        RecordingClock::start().file_stamp(),
        config.encoder.container.trim_start_matches('.')
    ));
    let region = CaptureRegion {
        bounds: topology.bounds,
        crop,
        margin_px,
    };
    let invocation =
        EncoderInvocation::build(&config.encoder, &region, &x11_display_name(), output_path);

    println!("Display: [{}] {} (scale: {}x)", target.index, target.name, target.scale_factor);
    println!(
        "Virtual desktop: {}x{} at ({}, {})",
        topology.bounds.width, topology.bounds.height, topology.bounds.x, topology.bounds.y
    );
    println!(
        "Crop: {}x{} at ({}, {}){}",
        crop.width,
        crop.height,
        crop.x,
        crop.y,
        if clamped { " (clamped)" } else { "" }
    );
    println!(
        "Recorded frame: {}x{}",
        crop.width - 2 * margin_px,
        crop.height - 2 * margin_px
    );
    println!();
    println!("{}", invocation.command_line());

    Ok(())
}
