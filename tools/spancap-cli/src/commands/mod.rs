//! Subcommand implementations.

use std::path::Path;

use spancap_capture_engine::SelectionRect;
use spancap_common::config::AppConfig;
use spancap_platform_core::{Display, Topology};

pub mod check;
pub mod displays;
pub mod plan;
pub mod record;

/// Load the config from `path`, or from the standard location when `None`.
///
/// An explicit path must exist and parse; the standard location falls back to
/// defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display())),
        None => Ok(AppConfig::load()),
    }
}

/// Parse `x,y,width,height` in logical pixels.
pub fn parse_rect(raw: &str) -> Result<SelectionRect, String> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid number in '{raw}': {e}"))?;

    match parts.as_slice() {
        [x, y, w, h] if [x, y, w, h].iter().all(|v| v.is_finite()) => {
            if *w < 0.0 || *h < 0.0 {
                return Err(format!("width and height must not be negative in '{raw}'"));
            }
            Ok(SelectionRect::new(*x, *y, *w, *h))
        }
        [_, _, _, _] => Err(format!("non-finite value in '{raw}'")),
        _ => Err(format!(
            "expected x,y,width,height but got {} values",
            parts.len()
        )),
    }
}

/// Display at `index`, or an error listing what is available.
pub fn display_at(topology: &Topology, index: usize) -> anyhow::Result<&Display> {
    topology.displays.get(index).ok_or_else(|| {
        anyhow::anyhow!(
            "No display with index {index}; {} connected (see `spancap displays`)",
            topology.displays.len()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rect() {
        assert_eq!(
            parse_rect("100,50,301,201").unwrap(),
            SelectionRect::new(100.0, 50.0, 301.0, 201.0)
        );
        assert_eq!(
            parse_rect(" 1.5, 2 ,3,4").unwrap(),
            SelectionRect::new(1.5, 2.0, 3.0, 4.0)
        );
    }

    #[test]
    fn rejects_malformed_rect() {
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_rect("1,2,3,4,5").is_err());
        assert!(parse_rect("a,2,3,4").is_err());
        assert!(parse_rect("1,2,-3,4").is_err());
        assert!(parse_rect("1,2,inf,4").is_err());
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let missing = std::env::temp_dir().join("spancap-cli-no-such-config.json");
        assert!(load_config(Some(&missing)).is_err());
    }
}
