//! Platform display provider selection.

use spancap_common::config::AppConfig;
use spancap_platform_core::{DisplayProvider, StaticDisplays};
use spancap_platform_linux::XrandrProvider;

/// Pick the display provider for this machine.
///
/// A layout declared in `topology.displays` always wins; otherwise X11
/// monitors are enumerated with xrandr.
pub fn detect_provider(config: &AppConfig) -> Box<dyn DisplayProvider> {
    if !config.topology.displays.is_empty() {
        tracing::info!(
            displays = config.topology.displays.len(),
            "Using display layout from configuration"
        );
        return Box::new(StaticDisplays::from_overrides(&config.topology.displays));
    }

    if cfg!(not(target_os = "linux")) {
        tracing::warn!(
            "No display enumeration on this platform; declare topology.displays in the config file"
        );
    }
    Box::new(XrandrProvider::new(config.topology.scale_factor))
}
