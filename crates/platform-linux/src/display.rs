//! Display/monitor detection and DPI handling.

use std::process::Command;

use spancap_common::error::{SpancapError, SpancapResult};
use spancap_platform_core::{Display, DisplayProvider};

/// Enumerates X11 monitors through `xrandr --listmonitors`.
#[derive(Debug, Clone, Default)]
pub struct XrandrProvider {
    scale_override: Option<f64>,
}

impl XrandrProvider {
    pub fn new(scale_override: Option<f64>) -> Self {
        Self { scale_override }
    }

    fn scale_factor(&self) -> f64 {
        self.scale_override
            .or_else(|| {
                std::env::var("GDK_SCALE")
                    .ok()
                    .and_then(|raw| parse_scale(&raw))
            })
            .unwrap_or(1.0)
    }
}

impl DisplayProvider for XrandrProvider {
    fn displays(&self) -> SpancapResult<Vec<Display>> {
        tracing::debug!("Detecting monitors via xrandr");

        let output = Command::new("xrandr")
            .arg("--listmonitors")
            .output()
            .map_err(|e| SpancapError::platform(format!("Failed to run xrandr: {e}")))?;

        if !output.status.success() {
            return Err(SpancapError::platform(format!(
                "xrandr exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_listmonitors(&stdout, self.scale_factor()))
    }

    fn name(&self) -> &str {
        "xrandr"
    }
}

/// Parse the output of `xrandr --listmonitors`.
///
/// ```text
/// Monitors: 2
///  0: +*DP-1 1920/527x1080/296+0+0  DP-1
///  1: +HDMI-1 2560/597x1440/336+1920+0  HDMI-1
/// ```
///
/// Lines that do not match the geometry pattern are skipped.
pub fn parse_listmonitors(output: &str, scale_factor: f64) -> Vec<Display> {
    output
        .lines()
        .filter_map(parse_monitor_line)
        .enumerate()
        .map(|(index, (name, primary, x, y, width, height))| Display {
            index,
            name,
            x,
            y,
            width,
            height,
            scale_factor,
            primary,
        })
        .collect()
}

fn parse_monitor_line(line: &str) -> Option<(String, bool, i32, i32, u32, u32)> {
    let (slot, rest) = line.trim().split_once(':')?;
    slot.trim().parse::<u32>().ok()?;

    let mut fields = rest.split_whitespace();
    let flagged_name = fields.next()?;
    let geometry = fields.next()?;

    let name = flagged_name.trim_start_matches(['+', '*']);
    let primary = flagged_name.contains('*');

    // 1920/527x1080/296+0+0, offsets are signed (-1920-120)
    let (width_part, rest) = geometry.split_once('x')?;
    let width = width_part.split('/').next()?.parse::<u32>().ok()?;

    let offset_start = rest.find(['+', '-'])?;
    let height = rest[..offset_start].split('/').next()?.parse::<u32>().ok()?;
    let (x, y) = parse_offsets(&rest[offset_start..])?;

    Some((name.to_string(), primary, x, y, width, height))
}

fn parse_offsets(raw: &str) -> Option<(i32, i32)> {
    let second = raw[1..].find(['+', '-'])? + 1;
    let x = raw[..second].trim_start_matches('+').parse::<i32>().ok()?;
    let y = raw[second..].trim_start_matches('+').parse::<i32>().ok()?;
    Some((x, y))
}

fn parse_scale(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s > 0.0)
}

/// Detect the current display server.
pub fn detect_display_server() -> DisplayServer {
    if std::env::var("WAYLAND_DISPLAY").is_ok() {
        DisplayServer::Wayland
    } else if std::env::var("DISPLAY").is_ok() {
        DisplayServer::X11
    } else {
        DisplayServer::Unknown
    }
}

/// Display server type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    Wayland,
    X11,
    Unknown,
}

/// X11 display name passed to `x11grab` as the input device.
pub fn x11_display_name() -> String {
    std::env::var("DISPLAY").unwrap_or_else(|_| ":0.0".to_string())
}
