//! Display topology resolution.

use serde::{Deserialize, Serialize};

use spancap_common::config::DisplayOverride;
use spancap_common::error::{SpancapError, SpancapResult};

/// Snapshot of one connected display, taken at resolution time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Display {
    /// Enumeration order at snapshot time.
    pub index: usize,
    /// Output name (`DP-1`, `HDMI-A-0`, ...).
    pub name: String,
    /// Position in the virtual desktop (physical pixels).
    pub x: i32,
    pub y: i32,
    /// Resolution in physical pixels.
    pub width: u32,
    pub height: u32,
    /// Ratio of physical to logical pixels (1.0, 1.25, 2.0, ...).
    pub scale_factor: f64,
    pub primary: bool,
}

impl Display {
    /// Right edge (exclusive) in virtual-desktop pixels.
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Bottom edge (exclusive) in virtual-desktop pixels.
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Logical resolution (physical / scale).
    pub fn logical_width(&self) -> u32 {
        (self.width as f64 / self.scale_factor) as u32
    }

    /// Logical resolution (physical / scale).
    pub fn logical_height(&self) -> u32 {
        (self.height as f64 / self.scale_factor) as u32
    }

    /// Whether two snapshots describe the same output.
    pub fn same_output(&self, other: &Display) -> bool {
        self.name == other.name
    }
}

/// Bounding box of every display, in physical pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VirtualBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl VirtualBounds {
    /// Compute the union of all display rectangles.
    ///
    /// Returns `None` for an empty slice.
    pub fn covering(displays: &[Display]) -> Option<Self> {
        let min_x = displays.iter().map(|d| d.x as i64).min()?;
        let min_y = displays.iter().map(|d| d.y as i64).min()?;
        let max_x = displays.iter().map(Display::right).max()?;
        let max_y = displays.iter().map(Display::bottom).max()?;

        Some(Self {
            x: min_x as i32,
            y: min_y as i32,
            width: (max_x - min_x) as u32,
            height: (max_y - min_y) as u32,
        })
    }

    /// Whether `display` lies entirely within these bounds.
    pub fn contains(&self, display: &Display) -> bool {
        display.x >= self.x
            && display.y >= self.y
            && display.right() <= self.x as i64 + self.width as i64
            && display.bottom() <= self.y as i64 + self.height as i64
    }
}

/// Displays plus the virtual desktop they form.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    pub displays: Vec<Display>,
    pub bounds: VirtualBounds,
}

impl Topology {
    /// Build a topology from enumerated displays. Empty input is a fatal
    /// configuration error.
    pub fn from_displays(displays: Vec<Display>) -> SpancapResult<Self> {
        let bounds = VirtualBounds::covering(&displays)
            .ok_or_else(|| SpancapError::config("no displays could be resolved"))?;
        Ok(Self { displays, bounds })
    }

    /// Find the snapshot of the same output in this topology.
    pub fn find_output(&self, display: &Display) -> Option<&Display> {
        self.displays.iter().find(|d| d.same_output(display))
    }

    pub fn primary(&self) -> Option<&Display> {
        self.displays
            .iter()
            .find(|d| d.primary)
            .or_else(|| self.displays.first())
    }
}

/// Source of display snapshots.
pub trait DisplayProvider {
    /// Enumerate active displays in virtual-desktop order.
    fn displays(&self) -> SpancapResult<Vec<Display>>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Query the provider and compute the virtual bounds.
pub fn resolve(provider: &dyn DisplayProvider) -> SpancapResult<Topology> {
    let displays = provider.displays()?;
    let topology = Topology::from_displays(displays)?;
    tracing::debug!(
        provider = provider.name(),
        displays = topology.displays.len(),
        virtual_x = topology.bounds.x,
        virtual_y = topology.bounds.y,
        virtual_width = topology.bounds.width,
        virtual_height = topology.bounds.height,
        "Resolved display topology"
    );
    Ok(topology)
}

/// A fixed display layout.
#[derive(Debug, Clone, Default)]
pub struct StaticDisplays {
    displays: Vec<Display>,
}

impl StaticDisplays {
    pub fn new(displays: Vec<Display>) -> Self {
        let displays = displays
            .into_iter()
            .enumerate()
            .map(|(index, display)| Display { index, ..display })
            .collect();
        Self { displays }
    }

    /// Build from the `topology.displays` configuration section.
    pub fn from_overrides(overrides: &[DisplayOverride]) -> Self {
        Self::new(
            overrides
                .iter()
                .map(|o| Display {
                    index: 0,
                    name: o.name.clone(),
                    x: o.x,
                    y: o.y,
                    width: o.width,
                    height: o.height,
                    scale_factor: o.scale_factor,
                    primary: o.primary,
                })
                .collect(),
        )
    }
}

impl DisplayProvider for StaticDisplays {
    fn displays(&self) -> SpancapResult<Vec<Display>> {
        Ok(self.displays.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn display(name: &str, x: i32, y: i32, width: u32, height: u32) -> Display {
        Display {
            index: 0,
            name: name.to_string(),
            x,
            y,
            width,
            height,
            scale_factor: 1.0,
            primary: false,
        }
    }

    #[test]
    fn virtual_bounds_cover_side_by_side_layout() {
        let topology = Topology::from_displays(vec![
            display("A", 0, 0, 1920, 1080),
            display("B", 1920, 0, 1920, 1080),
        ])
        .unwrap();
        assert_eq!(
            topology.bounds,
            VirtualBounds {
                x: 0,
                y: 0,
                width: 3840,
                height: 1080
            }
        );
    }

    #[test]
    fn virtual_bounds_cover_negative_origin_layout() {
        let bounds = VirtualBounds::covering(&[
            display("left", -1920, 0, 1920, 1080),
            display("main", 0, 0, 2560, 1440),
        ])
        .unwrap();
        assert_eq!(bounds.x, -1920);
        assert_eq!(bounds.y, 0);
        assert_eq!(bounds.width, 4480);
        assert_eq!(bounds.height, 1440);
    }

    #[test]
    fn empty_topology_is_fatal() {
        let err = resolve(&StaticDisplays::default()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn static_displays_are_reindexed() {
        let provider = StaticDisplays::new(vec![
            display("A", 0, 0, 800, 600),
            display("B", 800, 0, 800, 600),
        ]);
        let displays = provider.displays().unwrap();
        assert_eq!(displays[0].index, 0);
        assert_eq!(displays[1].index, 1);
    }

    #[test]
    fn primary_falls_back_to_first_display() {
        let topology = Topology::from_displays(vec![
            display("A", 0, 0, 800, 600),
            display("B", 800, 0, 800, 600),
        ])
        .unwrap();
        assert_eq!(topology.primary().unwrap().name, "A");
    }

    fn arb_display() -> impl Strategy<Value = Display> {
        (-8000i32..8000, -8000i32..8000, 1u32..8000, 1u32..8000)
            .prop_map(|(x, y, w, h)| display("d", x, y, w, h))
    }

    proptest! {
        #[test]
        fn bounds_contain_every_display(displays in prop::collection::vec(arb_display(), 1..8)) {
            let bounds = VirtualBounds::covering(&displays).unwrap();
            for d in &displays {
                prop_assert!(bounds.contains(d));
            }
        }
    }
}
