//! SpanCap Linux Platform Integration
//!
//! Platform-specific implementations for Linux:
//! - **Display Detection:** X11 monitor enumeration via `xrandr` and DPI handling
//! - **Permissions:** Capability detection and user guidance

pub mod display;
pub mod permissions;

pub use display::*;
