//! Selection overlay viewports.
//!
//! Each display gets a borderless, transparent, always-on-top viewport. While
//! awaiting a selection it dims the screen and tracks a pointer drag; while
//! recording it only outlines the captured region and lets input through, and
//! a separate small viewport carries the Stop button.

use eframe::egui::{self, Color32, Pos2, Rect, Stroke};
use spancap_capture_engine::{SelectionRect, SurfaceId};
use spancap_platform_core::Display;

const DIM: Color32 = Color32::from_rgba_premultiplied(0, 0, 0, 110);
const ACCENT: Color32 = Color32::from_rgb(230, 64, 64);
const STOP_BUTTON_SIZE: [f32; 2] = [96.0, 30.0];
const STOP_BUTTON_GAP: f32 = 6.0;

/// What the user did on a surface this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceAction {
    Selected(SelectionRect),
    Cancelled,
    Stop,
}

/// In-progress drag on one surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct DragState {
    start: Option<Pos2>,
    current: Option<Pos2>,
}

impl DragState {
    fn rect(&self) -> Option<Rect> {
        Some(Rect::from_two_pos(self.start?, self.current?))
    }
}

/// Top-left corner of `display` in global logical points.
fn logical_origin(display: &Display) -> Pos2 {
    let scale = display.scale_factor as f32;
    egui::pos2(display.x as f32 / scale, display.y as f32 / scale)
}

pub fn surface_viewport(display: &Display, recording: bool) -> egui::ViewportBuilder {
    egui::ViewportBuilder::default()
        .with_title(format!("SpanCap selection ({})", display.name))
        .with_position(logical_origin(display))
        .with_inner_size([
            display.logical_width() as f32,
            display.logical_height() as f32,
        ])
        .with_decorations(false)
        .with_transparent(true)
        .with_always_on_top()
        .with_resizable(false)
        .with_taskbar(false)
        .with_mouse_passthrough(recording)
}

/// Draw the selection surface while awaiting a selection.
pub fn show_selecting(ctx: &egui::Context, drag: &mut DragState) -> Option<SurfaceAction> {
    let mut action = None;

    if ctx.input(|i| i.key_pressed(egui::Key::Escape) || i.viewport().close_requested()) {
        *drag = DragState::default();
        return Some(SurfaceAction::Cancelled);
    }

    egui::CentralPanel::default()
        .frame(egui::Frame::none())
        .show(ctx, |ui| {
            let full = ui.max_rect();
            let response = ui.allocate_rect(full, egui::Sense::drag());

            if response.drag_started() {
                drag.start = response.interact_pointer_pos();
                drag.current = drag.start;
            } else if response.dragged() {
                if let Some(pos) = response.interact_pointer_pos() {
                    drag.current = Some(pos);
                }
            }

            let painter = ui.painter();
            match drag.rect() {
                Some(selection) => {
                    dim_outside(painter, full, selection);
                    painter.rect_stroke(selection, 0.0, Stroke::new(1.0, ACCENT));
                    painter.text(
                        selection.left_top() + egui::vec2(0.0, -4.0),
                        egui::Align2::LEFT_BOTTOM,
                        format!("{:.0} × {:.0}", selection.width(), selection.height()),
                        egui::FontId::proportional(13.0),
                        Color32::WHITE,
                    );
                }
                None => {
                    painter.rect_filled(full, 0.0, DIM);
                    painter.text(
                        full.center(),
                        egui::Align2::CENTER_CENTER,
                        "Drag to select a region  ·  Esc to cancel",
                        egui::FontId::proportional(18.0),
                        Color32::from_gray(230),
                    );
                }
            }

            if response.drag_stopped() {
                if let (Some(start), Some(end)) = (drag.start, drag.current) {
                    action = Some(SurfaceAction::Selected(SelectionRect::from_drag(
                        (start.x as f64, start.y as f64),
                        (end.x as f64, end.y as f64),
                    )));
                }
                *drag = DragState::default();
            }
        });

    ctx.set_cursor_icon(egui::CursorIcon::Crosshair);
    action
}

/// Outline the region being recorded. The outline sits just outside the
/// selection so the encoder's edge trim keeps it out of the video.
pub fn show_recording(ctx: &egui::Context, selection: Option<SelectionRect>) {
    egui::CentralPanel::default()
        .frame(egui::Frame::none())
        .show(ctx, |ui| {
            if let Some(rect) = selection.map(to_egui_rect) {
                ui.painter()
                    .rect_stroke(rect.expand(1.0), 0.0, Stroke::new(2.0, ACCENT));
            }
        });
}

/// Stop button viewport placed above the selection, or below it when the
/// selection touches the top of the display.
pub fn stop_viewport(
    surface: SurfaceId,
    display: &Display,
    selection: SelectionRect,
) -> (egui::ViewportId, egui::ViewportBuilder) {
    let origin = logical_origin(display);
    let rect = to_egui_rect(selection);
    let above = rect.top() - STOP_BUTTON_GAP - STOP_BUTTON_SIZE[1];
    let y = if above >= 0.0 {
        above
    } else {
        rect.bottom() + STOP_BUTTON_GAP
    };
    let position = origin + egui::vec2(rect.left(), y);

    let builder = egui::ViewportBuilder::default()
        .with_title("SpanCap stop")
        .with_position(position)
        .with_inner_size(STOP_BUTTON_SIZE)
        .with_decorations(false)
        .with_transparent(true)
        .with_always_on_top()
        .with_resizable(false)
        .with_taskbar(false);
    (egui::ViewportId::from_hash_of(("spancap-stop", surface.0)), builder)
}

pub fn show_stop_button(ctx: &egui::Context, elapsed_secs: f64) -> Option<SurfaceAction> {
    let mut action = None;
    egui::CentralPanel::default()
        .frame(egui::Frame::none())
        .show(ctx, |ui| {
            let button = egui::Button::new(
                egui::RichText::new(format!("■ Stop {}", format_elapsed(elapsed_secs)))
                    .color(Color32::WHITE),
            )
            .fill(ACCENT)
            .min_size(ui.available_size());
            if ui.add(button).clicked() {
                action = Some(SurfaceAction::Stop);
            }
        });
    action
}

fn to_egui_rect(selection: SelectionRect) -> Rect {
    Rect::from_min_size(
        egui::pos2(selection.x as f32, selection.y as f32),
        egui::vec2(selection.width as f32, selection.height as f32),
    )
}

/// Dim everything except `hole`.
fn dim_outside(painter: &egui::Painter, full: Rect, hole: Rect) {
    let hole = hole.intersect(full);
    let bands = [
        Rect::from_min_max(full.min, egui::pos2(full.max.x, hole.min.y)),
        Rect::from_min_max(egui::pos2(full.min.x, hole.max.y), full.max),
        Rect::from_min_max(
            egui::pos2(full.min.x, hole.min.y),
            egui::pos2(hole.min.x, hole.max.y),
        ),
        Rect::from_min_max(
            egui::pos2(hole.max.x, hole.min.y),
            egui::pos2(full.max.x, hole.max.y),
        ),
    ];
    for band in bands {
        if band.is_positive() {
            painter.rect_filled(band, 0.0, DIM);
        }
    }
}

fn format_elapsed(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
