//! SpanCap platform core contracts.
//!
//! Display snapshots, the virtual desktop they span, and the provider trait
//! that concrete OS backends implement. Nothing here talks to a display
//! server directly.

pub mod topology;

pub use topology::*;
