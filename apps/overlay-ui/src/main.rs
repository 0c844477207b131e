//! SpanCap overlay: a small control window plus one selection surface per
//! display, driving the capture session state machine.

use std::collections::HashMap;
use std::time::Duration;

use eframe::egui::{self, Color32};
use spancap_capture_engine::{
    session_channel, CaptureController, EventReceiver, FfmpegLauncher, Outcome, SelectionRect,
    SessionEvent, SessionState, SurfaceId,
};
use spancap_common::config::AppConfig;

mod selection;
mod surface_host;

use selection::{DragState, SurfaceAction};
use surface_host::EguiSurfaceHost;

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load();
    spancap_common::logging::init_logging(&config.logging);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;
    let app = OverlayApp::new(config, runtime);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("SpanCap")
            .with_always_on_top()
            .with_resizable(false)
            .with_inner_size([320.0, 140.0]),
        ..Default::default()
    };

    eframe::run_native("SpanCap", options, Box::new(|_cc| Box::new(app)))
        .map_err(|e| anyhow::anyhow!("overlay launch failed: {e}"))
}

struct OverlayApp {
    controller: CaptureController<EguiSurfaceHost, FfmpegLauncher>,
    events: EventReceiver,
    drags: HashMap<SurfaceId, DragState>,
    /// Selection being recorded and the surface it was drawn on.
    selection: Option<(SurfaceId, SelectionRect)>,
    status: String,
    quit_when_idle: bool,
    /// Runs encoder supervision; declared last so it is dropped last.
    _runtime: tokio::runtime::Runtime,
}

impl OverlayApp {
    fn new(config: AppConfig, runtime: tokio::runtime::Runtime) -> Self {
        let provider = spancap_capture_engine::detect_provider(&config);
        let (tx, events) = session_channel();
        let launcher = FfmpegLauncher::new(runtime.handle().clone());
        let controller =
            CaptureController::new(config, provider, EguiSurfaceHost::new(), launcher, tx)
                .with_x11_display(spancap_platform_linux::x11_display_name());

        Self {
            controller,
            events,
            drags: HashMap::new(),
            selection: None,
            status: "Ready".to_string(),
            quit_when_idle: false,
            _runtime: runtime,
        }
    }

    /// Feed encoder exits posted since the last frame.
    fn pump_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: SessionEvent) {
        let selected = match &event {
            SessionEvent::SelectionCompleted { rect, surface } => Some((*surface, *rect)),
            _ => None,
        };

        match self.controller.handle(event) {
            Outcome::Transitioned { from, to } => self.on_transition(from, to, selected),
            Outcome::Rejected { reason } => {
                tracing::debug!(%reason, "Selection not accepted; overlay stays up");
                self.status = format!("Try again: {reason}");
            }
            Outcome::Failed { error } => {
                tracing::error!(error = %error, "Capture could not start");
                self.clear_selection();
                self.status = format!("Error: {error}");
            }
            Outcome::Ignored => {}
        }
    }

    fn on_transition(
        &mut self,
        from: SessionState,
        to: SessionState,
        selected: Option<(SurfaceId, SelectionRect)>,
    ) {
        match to {
            SessionState::AwaitingSelection => {
                self.status = "Drag a region on any display".to_string();
            }
            SessionState::Recording => {
                self.selection = selected;
                self.status = match self.controller.output_path() {
                    Some(path) => format!("Recording to {}", path.display()),
                    None => "Recording".to_string(),
                };
            }
            SessionState::Stopping => self.status = "Finishing recording...".to_string(),
            SessionState::Idle => {
                self.clear_selection();
                self.status = if from == SessionState::AwaitingSelection {
                    "Selection cancelled".to_string()
                } else {
                    match self.controller.last_exit() {
                        Some(report) if report.is_graceful() => {
                            format!("Saved {}", report.output_path.display())
                        }
                        Some(report) => format!(
                            "Encoder exited with {:?}; check {}",
                            report.code,
                            report.output_path.display()
                        ),
                        None => "Ready".to_string(),
                    }
                };
            }
        }
    }

    fn clear_selection(&mut self) {
        self.selection = None;
        self.drags.clear();
    }

    /// Closing the control window stops a running recording first.
    fn on_close_requested(&mut self, ctx: &egui::Context) {
        match self.controller.state() {
            SessionState::Idle => {}
            SessionState::AwaitingSelection => self.apply(SessionEvent::SelectionCancelled),
            SessionState::Recording | SessionState::Stopping => {
                tracing::info!("Control window closed; stopping the recording before exit");
                ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
                self.apply(SessionEvent::StopRequested);
                self.quit_when_idle = true;
            }
        }
    }

    fn show_control(&mut self, ctx: &egui::Context) {
        let state = self.controller.state();
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("SpanCap");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("{state:?}"));
                });
            });
            ui.separator();

            let start = egui::Button::new("Select region")
                .fill(Color32::from_rgb(200, 52, 52))
                .stroke(egui::Stroke::new(1.0, Color32::from_rgb(230, 120, 120)));
            if ui
                .add_enabled(state == SessionState::Idle, start)
                .clicked()
            {
                self.apply(SessionEvent::StartRequested);
            }

            ui.add_space(6.0);
            ui.label(self.status.as_str());
        });
    }

    fn show_surfaces(&mut self, ctx: &egui::Context) {
        let state = self.controller.state();
        let recording = matches!(state, SessionState::Recording | SessionState::Stopping);
        let elapsed = self.controller.elapsed_secs().unwrap_or_default();
        let mut actions = Vec::new();

        for (id, display) in self.controller.surface_host().surfaces() {
            let selection = self
                .selection
                .filter(|(surface, _)| *surface == id)
                .map(|(_, rect)| rect);
            let drag = self.drags.entry(id).or_default();

            let action = ctx.show_viewport_immediate(
                egui::ViewportId::from_hash_of(("spancap-surface", id.0)),
                selection::surface_viewport(&display, recording),
                |ctx, _class| {
                    if recording {
                        selection::show_recording(ctx, selection);
                        None
                    } else {
                        selection::show_selecting(ctx, drag)
                    }
                },
            );
            actions.extend(action.map(|a| (id, a)));

            if let (SessionState::Recording, Some(rect)) = (state, selection) {
                let (viewport, builder) = selection::stop_viewport(id, &display, rect);
                let action = ctx.show_viewport_immediate(viewport, builder, |ctx, _class| {
                    selection::show_stop_button(ctx, elapsed)
                });
                actions.extend(action.map(|a| (id, a)));
            }
        }

        for (surface, action) in actions {
            let event = match action {
                SurfaceAction::Selected(rect) => SessionEvent::SelectionCompleted { rect, surface },
                SurfaceAction::Cancelled => SessionEvent::SelectionCancelled,
                SurfaceAction::Stop => SessionEvent::StopRequested,
            };
            self.apply(event);
        }
    }
}

impl eframe::App for OverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint_after(Duration::from_millis(100));
        self.pump_events();

        if ctx.input(|i| i.viewport().close_requested()) {
            self.on_close_requested(ctx);
        }

        self.show_control(ctx);
        self.show_surfaces(ctx);

        if let Some(visible) = self.controller.surface_host_mut().take_control_change() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Visible(visible));
        }
        if self.quit_when_idle && self.controller.state() == SessionState::Idle {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }
}
