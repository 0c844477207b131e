//! Check system capabilities.

use spancap_common::config::AppConfig;
use spancap_platform_core::resolve;
use spancap_platform_linux::permissions::{check_capabilities, print_capability_report};
use spancap_platform_linux::{detect_display_server, DisplayServer};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("SpanCap System Check");
    println!("{}", "=".repeat(50));

    // Display server
    match detect_display_server() {
        DisplayServer::X11 => println!("[OK] Display server: X11"),
        DisplayServer::Wayland => println!("[WARN] Display server: Wayland (XWayland grabbing only)"),
        DisplayServer::Unknown => println!("[WARN] Display server: Unknown"),
    }

    // Check displays
    let provider = spancap_capture_engine::detect_provider(config);
    match resolve(provider.as_ref()) {
        Ok(topology) => {
            println!(
                "[OK] Displays detected: {} via {}",
                topology.displays.len(),
                provider.name()
            );
            println!(
                "     Virtual desktop: {}x{} at ({}, {})",
                topology.bounds.width, topology.bounds.height, topology.bounds.x, topology.bounds.y
            );
        }
        Err(e) => println!("[FAIL] Displays: {e}"),
    }

    // Check helpers
    let capabilities = check_capabilities(&config.encoder.binary);
    println!();
    print_capability_report(&capabilities);

    let all_required_ok = capabilities
        .iter()
        .filter(|c| c.required)
        .all(|c| c.available);

    println!();
    if all_required_ok {
        println!("All required capabilities are available. SpanCap is ready.");
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}
