//! Surface host backed by egui viewports.
//!
//! Creating a surface only records it; the app renders one immediate viewport
//! per recorded surface every frame, and a surface disappears once it is no
//! longer rendered.

use std::collections::BTreeMap;

use spancap_capture_engine::{SurfaceHost, SurfaceId};
use spancap_common::error::{SpancapError, SpancapResult};
use spancap_platform_core::Display;

#[derive(Debug)]
pub struct EguiSurfaceHost {
    surfaces: BTreeMap<SurfaceId, Display>,
    control_visible: bool,
    control_changed: bool,
}

impl EguiSurfaceHost {
    pub fn new() -> Self {
        Self {
            surfaces: BTreeMap::new(),
            control_visible: true,
            control_changed: false,
        }
    }

    /// Surfaces to render this frame.
    pub fn surfaces(&self) -> Vec<(SurfaceId, Display)> {
        self.surfaces
            .iter()
            .map(|(id, display)| (*id, display.clone()))
            .collect()
    }

    /// New control window visibility, once per change.
    pub fn take_control_change(&mut self) -> Option<bool> {
        std::mem::take(&mut self.control_changed).then_some(self.control_visible)
    }
}

impl SurfaceHost for EguiSurfaceHost {
    fn create_surface(&mut self, id: SurfaceId, display: &Display) -> SpancapResult<()> {
        if display.logical_width() == 0 || display.logical_height() == 0 {
            return Err(SpancapError::surface(format!(
                "display {} has no visible area",
                display.name
            )));
        }
        self.surfaces.insert(id, display.clone());
        Ok(())
    }

    fn destroy_surface(&mut self, id: SurfaceId) {
        self.surfaces.remove(&id);
    }

    fn set_control_visible(&mut self, visible: bool) {
        if self.control_visible != visible {
            self.control_visible = visible;
            self.control_changed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display(width: u32) -> Display {
        Display {
            index: 0,
            name: "DP-1".to_string(),
            x: 0,
            y: 0,
            width,
            height: 1080,
            scale_factor: 1.0,
            primary: true,
        }
    }

    #[test]
    fn control_change_is_reported_once() {
        let mut host = EguiSurfaceHost::new();
        assert_eq!(host.take_control_change(), None);

        host.set_control_visible(false);
        host.set_control_visible(false);
        assert_eq!(host.take_control_change(), Some(false));
        assert_eq!(host.take_control_change(), None);

        host.set_control_visible(true);
        assert_eq!(host.take_control_change(), Some(true));
    }

    #[test]
    fn zero_sized_display_is_refused() {
        let mut host = EguiSurfaceHost::new();
        assert!(host.create_surface(SurfaceId(1), &display(0)).is_err());
        assert!(host.surfaces().is_empty());

        host.create_surface(SurfaceId(2), &display(1920)).unwrap();
        host.destroy_surface(SurfaceId(2));
        host.destroy_surface(SurfaceId(2));
        assert!(host.surfaces().is_empty());
    }
}
