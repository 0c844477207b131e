//! SpanCap Capture Engine
//!
//! Orchestrates a region recording across every connected display: shows a
//! selection overlay per display, maps the drawn rectangle into the virtual
//! desktop, and drives an external encoder process until it is stopped.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                CaptureController                 │
//! │  ┌──────────────┐ ┌──────────┐ ┌──────────────┐  │
//! │  │ Overlay      │ │ Geometry │ │ Encoder      │  │
//! │  │ Manager      │ │ Mapper   │ │ Launcher     │  │
//! │  └──────┬───────┘ └────┬─────┘ └──────┬───────┘  │
//! │         │              │              │          │
//! │         ▼              ▼              ▼          │
//! │   SurfaceHost    DisplayProvider   ffmpeg ──▶ capture-*.mov
//! └──────────────────────────────────────────────────┘
//!            ▲                               │
//!            └──── SessionEvent channel ◀────┘
//! ```

pub mod backend;
pub mod encoder;
pub mod event;
pub mod geometry;
pub mod overlay;
pub mod session;

pub use backend::detect_provider;
pub use encoder::{EncoderControl, EncoderInvocation, EncoderLauncher, FfmpegLauncher};
pub use event::{session_channel, EventReceiver, EventSender, SessionEvent, SessionId};
pub use geometry::{CropBox, SelectionRect};
pub use overlay::{HeadlessSurfaceHost, OverlaySurface, SurfaceHost, SurfaceId};
pub use session::*;
