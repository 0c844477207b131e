//! Capability detection and guidance for Linux.
//!
//! SpanCap grabs the X11 root window through the external encoder, so the
//! checks here are about the session type and the helper binaries on `PATH`.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::display::{detect_display_server, DisplayServer};

/// A system capability that SpanCap may need.
#[derive(Debug, Clone)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub available: bool,
    pub required: bool,
    pub fix_instructions: Option<String>,
}

/// Check all capabilities and report status.
pub fn check_capabilities(encoder_binary: &Path) -> Vec<Capability> {
    vec![
        check_x11_session(),
        check_xrandr(),
        check_encoder(encoder_binary),
        check_audio_server(),
    ]
}

/// Check that the encoder can grab the screen through X11.
fn check_x11_session() -> Capability {
    let server = detect_display_server();
    let available = std::env::var("DISPLAY").is_ok();

    Capability {
        name: "X11 Display".to_string(),
        description: "X11 (or XWayland) display for root-window grabbing".to_string(),
        available,
        required: true,
        fix_instructions: match (available, server) {
            (false, _) => Some("Run from a graphical session with DISPLAY set".to_string()),
            (true, DisplayServer::Wayland) => Some(
                "Wayland session detected: only XWayland windows will be captured".to_string(),
            ),
            _ => None,
        },
    }
}

/// Check that `xrandr` can enumerate monitors.
fn check_xrandr() -> Capability {
    let available = binary_responds(Path::new("xrandr"), "--version");

    Capability {
        name: "xrandr".to_string(),
        description: "Monitor layout enumeration".to_string(),
        available,
        required: false, // topology.displays in the config file is the fallback
        fix_instructions: if available {
            None
        } else {
            Some(
                "Install x11-xserver-utils, or declare topology.displays in the config file"
                    .to_string(),
            )
        },
    }
}

/// Check that the encoder binary starts.
fn check_encoder(binary: &Path) -> Capability {
    let available = binary_responds(binary, "-version");

    Capability {
        name: "Encoder".to_string(),
        description: format!("{} for screen + audio encoding", binary.display()),
        available,
        required: true,
        fix_instructions: if available {
            None
        } else {
            Some(
                "Install ffmpeg (sudo apt install ffmpeg) or set encoder.binary in the config file"
                    .to_string(),
            )
        },
    }
}

/// Check audio capture capability.
fn check_audio_server() -> Capability {
    let available = binary_responds(Path::new("pactl"), "info");

    Capability {
        name: "Audio Server".to_string(),
        description: "PulseAudio/PipeWire source for system audio".to_string(),
        available,
        required: false,
        fix_instructions: if available {
            None
        } else {
            Some("Install pipewire-pulse or pulseaudio-utils".to_string())
        },
    }
}

fn binary_responds(binary: &Path, arg: &str) -> bool {
    Command::new(binary)
        .arg(arg)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Print a user-friendly capability report.
pub fn print_capability_report(capabilities: &[Capability]) {
    println!("SpanCap System Capabilities:");
    println!("{}", "-".repeat(60));

    for cap in capabilities {
        let status = if cap.available {
            "[OK]"
        } else if cap.required {
            "[MISSING - REQUIRED]"
        } else {
            "[MISSING - OPTIONAL]"
        };

        println!("  {} {}: {}", status, cap.name, cap.description);

        if let Some(ref fix) = cap.fix_instructions {
            println!("    Fix: {fix}");
        }
    }
}
