//! Selection overlay surfaces.
//!
//! One full-screen, always-on-top surface per display. The manager owns the
//! tracking set; a [`SurfaceHost`] does the actual windowing.

use std::collections::BTreeMap;
use std::fmt;

use spancap_common::error::SpancapResult;
use spancap_platform_core::Display;

/// Identity of an overlay surface, unique for the lifetime of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// A live overlay surface and the display it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySurface {
    pub id: SurfaceId,
    pub display: Display,
}

/// Windowing backend for overlay surfaces and the control window.
pub trait SurfaceHost {
    /// Create a borderless surface exactly covering `display`, above every
    /// other window and hidden from taskbars/switchers.
    fn create_surface(&mut self, id: SurfaceId, display: &Display) -> SpancapResult<()>;

    /// Destroy a surface. Unknown ids are ignored.
    fn destroy_surface(&mut self, id: SurfaceId);

    /// Show or hide the primary control window.
    fn set_control_visible(&mut self, visible: bool);
}

/// Tracks the overlay surfaces currently shown.
pub struct OverlayManager<H> {
    host: H,
    surfaces: BTreeMap<SurfaceId, OverlaySurface>,
    next_id: u64,
}

impl<H: SurfaceHost> OverlayManager<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            surfaces: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Create one surface per display.
    ///
    /// If any surface fails, those already created are destroyed and the
    /// error is returned; the tracking set is left empty.
    pub fn show(&mut self, displays: &[Display]) -> SpancapResult<Vec<OverlaySurface>> {
        for target in displays {
            let id = SurfaceId(self.next_id);
            self.next_id += 1;

            if let Err(e) = self.host.create_surface(id, target) {
                tracing::warn!(%id, display = %target.name, error = %e, "Overlay surface creation failed");
                self.hide_all();
                return Err(e);
            }

            tracing::debug!(
                %id,
                display = %target.name,
                x = target.x,
                y = target.y,
                width = target.width,
                height = target.height,
                "Overlay surface shown"
            );
            self.surfaces.insert(
                id,
                OverlaySurface {
                    id,
                    display: target.clone(),
                },
            );
        }
        Ok(self.surfaces())
    }

    /// Destroy every surface and clear the tracking set. Safe to call when
    /// nothing is shown.
    pub fn hide_all(&mut self) {
        let surfaces = std::mem::take(&mut self.surfaces);
        for id in surfaces.into_keys() {
            self.host.destroy_surface(id);
        }
    }

    pub fn get(&self, id: SurfaceId) -> Option<&OverlaySurface> {
        self.surfaces.get(&id)
    }

    /// Snapshot of the tracked surfaces in creation order.
    pub fn surfaces(&self) -> Vec<OverlaySurface> {
        self.surfaces.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn set_control_visible(&mut self, visible: bool) {
        self.host.set_control_visible(visible);
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

/// Surface host without a window system.
///
/// Keeps the same bookkeeping a real host would so callers can drive the
/// session from a terminal.
#[derive(Debug, Default)]
pub struct HeadlessSurfaceHost {
    live: BTreeMap<SurfaceId, Display>,
    control_visible: bool,
}

impl HeadlessSurfaceHost {
    pub fn new() -> Self {
        Self {
            live: BTreeMap::new(),
            control_visible: true,
        }
    }

    pub fn live_surfaces(&self) -> usize {
        self.live.len()
    }

    pub fn control_visible(&self) -> bool {
        self.control_visible
    }
}

impl SurfaceHost for HeadlessSurfaceHost {
    fn create_surface(&mut self, id: SurfaceId, target: &Display) -> SpancapResult<()> {
        tracing::info!(%id, display = %target.name, "Selection surface ready");
        self.live.insert(id, target.clone());
        Ok(())
    }

    fn destroy_surface(&mut self, id: SurfaceId) {
        if self.live.remove(&id).is_some() {
            tracing::debug!(%id, "Selection surface closed");
        }
    }

    fn set_control_visible(&mut self, visible: bool) {
        self.control_visible = visible;
    }
}
