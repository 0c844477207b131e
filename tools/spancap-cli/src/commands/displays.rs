//! Show the resolved display layout.

use spancap_common::config::AppConfig;
use spancap_platform_core::resolve;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let provider = spancap_capture_engine::detect_provider(config);
    let topology = resolve(provider.as_ref())?;

    println!("Displays ({}):", provider.name());
    for d in &topology.displays {
        println!(
            "  [{}] {} {}x{}+{}+{} (scale: {}x, logical {}x{}) {}",
            d.index,
            d.name,
            d.width,
            d.height,
            d.x,
            d.y,
            d.scale_factor,
            d.logical_width(),
            d.logical_height(),
            if d.primary { "(primary)" } else { "" }
        );
    }
    println!();

    let b = topology.bounds;
    println!("Virtual desktop: {}x{} at ({}, {})", b.width, b.height, b.x, b.y);

    Ok(())
}
