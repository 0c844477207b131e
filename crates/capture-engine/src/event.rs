//! Events consumed by the session state machine.

use std::fmt;

use tokio::sync::mpsc;

use crate::geometry::SelectionRect;
use crate::overlay::SurfaceId;

/// Identity of one recording, used to match encoder exits to the session
/// that spawned them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Inputs to [`crate::session::CaptureController::handle`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The user asked to start a capture.
    StartRequested,
    /// A drag finished on an overlay surface.
    SelectionCompleted {
        rect: SelectionRect,
        surface: SurfaceId,
    },
    /// The user dismissed the overlay without selecting.
    SelectionCancelled,
    /// The user asked to stop the running capture.
    StopRequested,
    /// The encoder process terminated. `code` is `None` when it was killed
    /// by a signal or its status could not be read.
    EncoderExited {
        session: SessionId,
        code: Option<i32>,
    },
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Channel through which asynchronous observers (encoder supervision, UI
/// threads) post events back to the single-threaded state machine.
pub fn session_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
