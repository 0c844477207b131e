//! Capture session state machine.
//!
//! ```text
//!  Idle ──start──▶ AwaitingSelection ──selection──▶ Recording ──stop──▶ Stopping
//!   ▲                  │ cancel                         │ exit             │ exit
//!   └──────────────────┴────────────────────────────────┴──────────────────┘
//! ```
//!
//! The controller is driven one event at a time through `&mut self`, so a
//! transition always runs to completion before the next one starts. All
//! mutable session data (overlay surfaces, encoder handle, output path) lives
//! in the controller; nothing is shared.

use std::path::{Path, PathBuf};

use spancap_common::clock::RecordingClock;
use spancap_common::config::AppConfig;
use spancap_common::error::SpancapError;
use spancap_platform_core::{resolve, DisplayProvider, Topology};

use crate::encoder::{
    CaptureRegion, EncoderControl, EncoderInvocation, EncoderLauncher, OutputNamer,
};
use crate::event::{EventSender, SessionEvent, SessionId};
use crate::geometry::{clamp_to_bounds, map_to_crop, CropBox, SelectionRect};
use crate::overlay::{OverlayManager, OverlaySurface, SurfaceHost, SurfaceId};

/// State of the capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing shown, nothing running.
    Idle,
    /// Overlays are up, waiting for the user to drag a region.
    AwaitingSelection,
    /// The encoder is running.
    Recording,
    /// Stop was sent; waiting for the encoder to exit.
    Stopping,
}

/// Result of feeding one event to the controller.
#[derive(Debug)]
pub enum Outcome {
    /// The event moved the machine to a new state.
    Transitioned {
        from: SessionState,
        to: SessionState,
    },
    /// The event was dropped because it is not valid in the current state.
    Ignored,
    /// The selection was unusable; the overlay stays up.
    Rejected { reason: String },
    /// The transition failed and the machine was reset to `Idle`.
    Failed { error: SpancapError },
}

impl Outcome {
    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Transitioned { .. })
    }
}

/// How the last recording ended.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitReport {
    pub session: SessionId,
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub output_path: PathBuf,
    /// Whether a graceful stop had been requested before the exit.
    pub requested: bool,
    pub duration_secs: f64,
}

impl ExitReport {
    /// Clean exit after we asked for it.
    pub fn is_graceful(&self) -> bool {
        self.requested && self.code == Some(0)
    }
}

/// The in-flight recording.
struct CaptureSession {
    id: SessionId,
    encoder: Box<dyn EncoderControl>,
    output_path: PathBuf,
    crop: CropBox,
    clock: RecordingClock,
}

/// Orchestrates overlays, coordinate mapping and the encoder process.
pub struct CaptureController<H, L> {
    config: AppConfig,
    x11_display: String,
    provider: Box<dyn DisplayProvider>,
    overlays: OverlayManager<H>,
    launcher: L,
    events: EventSender,
    state: SessionState,
    session: Option<CaptureSession>,
    next_session: u64,
    namer: OutputNamer,
    last_exit: Option<ExitReport>,
}

impl<H: SurfaceHost, L: EncoderLauncher> CaptureController<H, L> {
    /// `events` must be the sending half of the channel whose receiver feeds
    /// [`Self::handle`]; encoder exits are posted there.
    pub fn new(
        config: AppConfig,
        provider: Box<dyn DisplayProvider>,
        host: H,
        launcher: L,
        events: EventSender,
    ) -> Self {
        Self {
            config,
            x11_display: ":0.0".to_string(),
            provider,
            overlays: OverlayManager::new(host),
            launcher,
            events,
            state: SessionState::Idle,
            session: None,
            next_session: 1,
            namer: OutputNamer::new(),
            last_exit: None,
        }
    }

    /// X server the encoder grabs from (`$DISPLAY`).
    pub fn with_x11_display(mut self, display: impl Into<String>) -> Self {
        self.x11_display = display.into();
        self
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Overlay surfaces currently shown.
    pub fn surfaces(&self) -> Vec<OverlaySurface> {
        self.overlays.surfaces()
    }

    /// Output file of the running recording.
    pub fn output_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.output_path.as_path())
    }

    /// Crop of the running recording.
    pub fn active_crop(&self) -> Option<CropBox> {
        self.session.as_ref().map(|s| s.crop)
    }

    /// Seconds since the running recording started.
    pub fn elapsed_secs(&self) -> Option<f64> {
        self.session.as_ref().map(|s| s.clock.elapsed_secs())
    }

    pub fn encoder_pid(&self) -> Option<u32> {
        self.session.as_ref().and_then(|s| s.encoder.pid())
    }

    pub fn last_exit(&self) -> Option<&ExitReport> {
        self.last_exit.as_ref()
    }

    pub fn surface_host(&self) -> &H {
        self.overlays.host()
    }

    pub fn surface_host_mut(&mut self) -> &mut H {
        self.overlays.host_mut()
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn request_start(&mut self) -> Outcome {
        self.handle(SessionEvent::StartRequested)
    }

    pub fn request_stop(&mut self) -> Outcome {
        self.handle(SessionEvent::StopRequested)
    }

    pub fn on_selection_completed(&mut self, rect: SelectionRect, surface: SurfaceId) -> Outcome {
        self.handle(SessionEvent::SelectionCompleted { rect, surface })
    }

    /// Apply one event.
    pub fn handle(&mut self, event: SessionEvent) -> Outcome {
        let from = self.state;
        let outcome = match (from, event) {
            (SessionState::Idle, SessionEvent::StartRequested) => self.start(),
            (SessionState::AwaitingSelection, SessionEvent::SelectionCompleted { rect, surface }) => {
                self.select(rect, surface)
            }
            (SessionState::AwaitingSelection, SessionEvent::SelectionCancelled) => {
                tracing::info!("Selection cancelled");
                self.reset_to_idle();
                self.transitioned(from)
            }
            (SessionState::Recording, SessionEvent::StopRequested) => self.stop(),
            (
                SessionState::Recording | SessionState::Stopping,
                SessionEvent::EncoderExited { session, code },
            ) => self.finish(session, code),
            (state, event) => {
                tracing::trace!(?state, ?event, "Ignoring event");
                Outcome::Ignored
            }
        };

        if let Outcome::Transitioned { from, to } = &outcome {
            tracing::debug!(?from, ?to, "Session state changed");
        }
        outcome
    }

    fn transitioned(&self, from: SessionState) -> Outcome {
        Outcome::Transitioned {
            from,
            to: self.state,
        }
    }

    fn start(&mut self) -> Outcome {
        if !self.overlays.is_empty() {
            return Outcome::Ignored;
        }

        let topology = match resolve(self.provider.as_ref()) {
            Ok(topology) => topology,
            Err(error) => return self.fail(error),
        };

        self.overlays.set_control_visible(false);
        if let Err(error) = self.overlays.show(&topology.displays) {
            return self.fail(error);
        }

        tracing::info!(
            displays = topology.displays.len(),
            virtual_width = topology.bounds.width,
            virtual_height = topology.bounds.height,
            "Awaiting region selection"
        );
        self.state = SessionState::AwaitingSelection;
        self.transitioned(SessionState::Idle)
    }

    fn select(&mut self, rect: SelectionRect, surface: SurfaceId) -> Outcome {
        if self.session.is_some() {
            return Outcome::Ignored;
        }

        let Some(source) = self.overlays.get(surface).map(|s| s.display.clone()) else {
            return self.reject(format!("selection from unknown {surface}"));
        };

        // Displays may have changed while the overlay was up.
        let topology = match resolve(self.provider.as_ref()) {
            Ok(topology) => topology,
            Err(error) => return self.fail(error),
        };
        let display = topology.find_output(&source).unwrap_or(&source);

        let crop = map_to_crop(rect, display, &topology.bounds);
        if crop.is_empty() {
            return self.reject(format!(
                "empty selection {}x{} on {}",
                crop.width, crop.height, display.name
            ));
        }

        let crop = self.clamp(crop, &topology);
        let margin_px = self.config.overlay.ui_margin_px;
        if !crop.fits_margin(margin_px) {
            return self.reject(format!(
                "selection {}x{} is too small for the {margin_px}px edge margin",
                crop.width, crop.height
            ));
        }

        let clock = RecordingClock::start();
        let output_path = match self.namer.allocate(
            &self.config.output_dir,
            &clock.file_stamp(),
            &self.config.encoder.container,
        ) {
            Ok(path) => path,
            Err(error) => return self.fail(error),
        };

        let region = CaptureRegion {
            bounds: topology.bounds,
            crop,
            margin_px,
        };
        let invocation = EncoderInvocation::build(
            &self.config.encoder,
            &region,
            &self.x11_display,
            output_path.clone(),
        );

        let id = SessionId(self.next_session);
        self.next_session += 1;

        let encoder = match self.launcher.launch(id, &invocation, self.events.clone()) {
            Ok(encoder) => encoder,
            Err(error) => return self.fail(error),
        };

        let display_name = &display.name;
        tracing::info!(
            %id,
            display = %display_name,
            crop_x = crop.x,
            crop_y = crop.y,
            crop_width = crop.width,
            crop_height = crop.height,
            output = %output_path.display(),
            "Recording started"
        );

        self.session = Some(CaptureSession {
            id,
            encoder,
            output_path,
            crop,
            clock,
        });
        self.state = SessionState::Recording;
        self.transitioned(SessionState::AwaitingSelection)
    }

    fn clamp(&self, crop: CropBox, topology: &Topology) -> CropBox {
        let (clamped, changed) = clamp_to_bounds(crop, &topology.bounds);
        if changed {
            tracing::warn!(
                requested = ?crop,
                clamped = ?clamped,
                virtual_width = topology.bounds.width,
                virtual_height = topology.bounds.height,
                "Selection extends past the virtual desktop; clamped"
            );
        }
        clamped
    }

    fn stop(&mut self) -> Outcome {
        let Some(session) = self.session.as_mut() else {
            return Outcome::Ignored;
        };

        tracing::info!(id = %session.id, pid = ?session.encoder.pid(), "Stopping recording");
        session.encoder.request_stop();
        self.state = SessionState::Stopping;
        self.transitioned(SessionState::Recording)
    }

    fn finish(&mut self, id: SessionId, code: Option<i32>) -> Outcome {
        let from = self.state;
        let is_current = self.session.as_ref().is_some_and(|s| s.id == id);
        if !is_current {
            tracing::debug!(%id, "Ignoring exit of a stale encoder");
            return Outcome::Ignored;
        }
        let Some(session) = self.session.take() else {
            return Outcome::Ignored;
        };

        self.reset_to_idle();

        let report = ExitReport {
            session: session.id,
            code,
            output_path: session.output_path,
            requested: from == SessionState::Stopping,
            duration_secs: session.clock.elapsed_secs(),
        };
        if report.is_graceful() {
            tracing::info!(
                id = %report.session,
                code = ?report.code,
                duration_secs = report.duration_secs,
                output = %report.output_path.display(),
                "Recording saved"
            );
        } else {
            tracing::warn!(
                id = %report.session,
                code = ?report.code,
                requested = report.requested,
                duration_secs = report.duration_secs,
                output = %report.output_path.display(),
                "Encoder exited unexpectedly"
            );
        }
        self.last_exit = Some(report);
        self.transitioned(from)
    }

    fn reject(&self, reason: String) -> Outcome {
        tracing::warn!(%reason, "Selection rejected");
        Outcome::Rejected { reason }
    }

    /// Undo whatever the current transition set up and go back to `Idle`.
    fn fail(&mut self, error: SpancapError) -> Outcome {
        tracing::error!(error = %error, state = ?self.state, "Capture failed");
        self.reset_to_idle();
        Outcome::Failed { error }
    }

    fn reset_to_idle(&mut self) {
        self.overlays.hide_all();
        self.overlays.set_control_visible(true);
        self.state = SessionState::Idle;
    }
}
