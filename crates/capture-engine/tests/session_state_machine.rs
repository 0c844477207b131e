use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use spancap_capture_engine::encoder::{EncoderControl, EncoderInvocation, EncoderLauncher};
use spancap_capture_engine::{
    session_channel, CaptureController, EventReceiver, EventSender, HeadlessSurfaceHost, Outcome,
    SelectionRect, SessionEvent, SessionId, SessionState, SurfaceId,
};
use spancap_common::config::{AppConfig, VideoGrabber};
use spancap_common::error::{SpancapError, SpancapResult};
use spancap_platform_core::{Display, DisplayProvider};

/// Shared, swappable display list so tests can hot-plug between events.
#[derive(Clone, Default)]
struct FakeDisplays(Arc<Mutex<Vec<Display>>>);

impl FakeDisplays {
    fn set(&self, displays: Vec<Display>) {
        *self.0.lock().unwrap() = displays;
    }
}

impl DisplayProvider for FakeDisplays {
    fn displays(&self) -> SpancapResult<Vec<Display>> {
        Ok(self.0.lock().unwrap().clone())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
struct LaunchLog {
    invocations: Vec<(SessionId, EncoderInvocation)>,
}

struct FakeLauncher {
    log: Arc<Mutex<LaunchLog>>,
    stops: Arc<AtomicUsize>,
    fail: bool,
}

impl FakeLauncher {
    fn launches(&self) -> usize {
        self.log.lock().unwrap().invocations.len()
    }

    fn last_invocation(&self) -> EncoderInvocation {
        self.log.lock().unwrap().invocations.last().unwrap().1.clone()
    }

    fn stop_requests(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

struct FakeControl {
    stops: Arc<AtomicUsize>,
}

impl EncoderControl for FakeControl {
    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    fn request_stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

impl EncoderLauncher for FakeLauncher {
    fn launch(
        &mut self,
        session: SessionId,
        invocation: &EncoderInvocation,
        _events: EventSender,
    ) -> SpancapResult<Box<dyn EncoderControl>> {
        if self.fail {
            return Err(SpancapError::encoder("ffmpeg: No such file or directory"));
        }
        self.log
            .lock()
            .unwrap()
            .invocations
            .push((session, invocation.clone()));
        Ok(Box::new(FakeControl {
            stops: self.stops.clone(),
        }))
    }
}

fn display(name: &str, x: i32, primary: bool) -> Display {
    Display {
        index: 0,
        name: name.to_string(),
        x,
        y: 0,
        width: 1920,
        height: 1080,
        scale_factor: 1.0,
        primary,
    }
}

struct Harness {
    controller: CaptureController<HeadlessSurfaceHost, FakeLauncher>,
    displays: FakeDisplays,
    _events: EventReceiver,
    output_dir: PathBuf,
}

impl Harness {
    fn new(name: &str) -> Self {
        Self::with_launcher(name, false)
    }

    fn with_launcher(name: &str, fail: bool) -> Self {
        let displays = FakeDisplays::default();
        displays.set(vec![display("A", 0, true), display("B", 1920, false)]);

        let output_dir = std::env::temp_dir().join(format!(
            "spancap-session-{name}-{}",
            std::process::id()
        ));
        let mut config = AppConfig::default();
        config.output_dir = output_dir.clone();
        config.encoder.grabber = VideoGrabber::X11grab;

        let (tx, rx) = session_channel();
        let launcher = FakeLauncher {
            log: Arc::new(Mutex::new(LaunchLog::default())),
            stops: Arc::new(AtomicUsize::new(0)),
            fail,
        };
        let controller = CaptureController::new(
            config,
            Box::new(displays.clone()),
            HeadlessSurfaceHost::new(),
            launcher,
            tx,
        )
        .with_x11_display(":1");

        Self {
            controller,
            displays,
            _events: rx,
            output_dir,
        }
    }

    fn surface_on(&self, name: &str) -> SurfaceId {
        self.controller
            .surfaces()
            .into_iter()
            .find(|s| s.display.name == name)
            .map(|s| s.id)
            .expect("surface for display")
    }

    fn start_recording(&mut self) -> SessionId {
        self.controller.request_start();
        let surface = self.surface_on("B");
        let outcome = self
            .controller
            .on_selection_completed(SelectionRect::new(100.0, 50.0, 301.0, 201.0), surface);
        assert!(outcome.is_transition(), "unexpected {outcome:?}");
        self.controller
            .launcher()
            .log
            .lock()
            .unwrap()
            .invocations
            .last()
            .unwrap()
            .0
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.output_dir);
    }
}

#[test]
fn start_shows_one_surface_per_display_and_hides_control() {
    let mut h = Harness::new("start");
    let outcome = h.controller.request_start();

    assert!(matches!(
        outcome,
        Outcome::Transitioned {
            from: SessionState::Idle,
            to: SessionState::AwaitingSelection
        }
    ));
    assert_eq!(h.controller.surfaces().len(), 2);
    assert!(!h.controller.surface_host().control_visible());
}

#[test]
fn repeated_start_does_not_duplicate_surfaces() {
    let mut h = Harness::new("double-start");
    h.controller.request_start();
    let second = h.controller.request_start();

    assert!(matches!(second, Outcome::Ignored));
    assert_eq!(h.controller.state(), SessionState::AwaitingSelection);
    assert_eq!(h.controller.surfaces().len(), 2);
    assert_eq!(h.controller.surface_host().live_surfaces(), 2);
}

#[test]
fn selection_on_second_display_records_expected_crop() {
    let mut h = Harness::new("crop");
    h.start_recording();

    assert_eq!(h.controller.state(), SessionState::Recording);
    let crop = h.controller.active_crop().unwrap();
    assert_eq!((crop.x, crop.y, crop.width, crop.height), (2020, 50, 302, 202));

    let invocation = h.controller.launcher().last_invocation();
    let video_size = invocation
        .args
        .iter()
        .position(|a| a == "-video_size")
        .map(|i| invocation.args[i + 1].as_str());
    assert_eq!(video_size, Some("3840x1080"));
    assert!(invocation.args.iter().any(|a| a == ":1+0,0"));
    assert!(invocation
        .args
        .iter()
        .any(|a| a.starts_with("[0:v]crop=302:202:2020:50,crop=iw-4:ih-4:2:2")));
    assert!(invocation.output_path.starts_with(&h.output_dir));
    assert_eq!(
        h.controller.output_path(),
        Some(invocation.output_path.as_path())
    );
}

#[test]
fn zero_width_selection_is_rejected() {
    let mut h = Harness::new("zero");
    h.controller.request_start();
    let surface = h.surface_on("A");
    let outcome = h
        .controller
        .on_selection_completed(SelectionRect::new(10.0, 10.0, 0.0, 100.0), surface);

    assert!(matches!(outcome, Outcome::Rejected { .. }));
    assert_eq!(h.controller.state(), SessionState::AwaitingSelection);
    assert_eq!(h.controller.launcher().launches(), 0);
    assert_eq!(h.controller.surfaces().len(), 2);
}

#[test]
fn selection_smaller_than_margin_is_rejected() {
    let mut h = Harness::new("tiny");
    h.controller.request_start();
    let surface = h.surface_on("A");
    let outcome = h
        .controller
        .on_selection_completed(SelectionRect::new(10.0, 10.0, 3.0, 100.0), surface);

    assert!(matches!(outcome, Outcome::Rejected { .. }));
    assert_eq!(h.controller.launcher().launches(), 0);
}

#[test]
fn selection_from_unknown_surface_is_dropped() {
    let mut h = Harness::new("unknown-surface");
    h.controller.request_start();
    let outcome = h
        .controller
        .on_selection_completed(SelectionRect::new(0.0, 0.0, 100.0, 100.0), SurfaceId(999));

    assert!(matches!(outcome, Outcome::Rejected { .. }));
    assert_eq!(h.controller.state(), SessionState::AwaitingSelection);
}

#[test]
fn selection_past_virtual_desktop_is_clamped() {
    let mut h = Harness::new("clamp");
    h.controller.request_start();
    let surface = h.surface_on("B");
    h.controller
        .on_selection_completed(SelectionRect::new(1800.0, 1000.0, 400.0, 200.0), surface);

    let crop = h.controller.active_crop().unwrap();
    assert_eq!((crop.x, crop.y, crop.width, crop.height), (3720, 1000, 120, 80));
}

#[test]
fn selection_uses_fresh_topology() {
    let mut h = Harness::new("hotplug");
    h.controller.request_start();
    let surface = h.surface_on("B");

    // A third display appears to the left while the overlay is up.
    h.displays.set(vec![
        display("L", -1920, false),
        display("A", 0, true),
        display("B", 1920, false),
    ]);
    h.controller
        .on_selection_completed(SelectionRect::new(100.0, 50.0, 301.0, 201.0), surface);

    let crop = h.controller.active_crop().unwrap();
    assert_eq!((crop.x, crop.y), (3940, 50));
    let invocation = h.controller.launcher().last_invocation();
    assert!(invocation.args.iter().any(|a| a == "5760x1080"));
}

#[test]
fn stray_selection_while_recording_is_ignored() {
    let mut h = Harness::new("stray");
    h.start_recording();
    let outcome = h
        .controller
        .on_selection_completed(SelectionRect::new(0.0, 0.0, 100.0, 100.0), SurfaceId(1));

    assert!(matches!(outcome, Outcome::Ignored));
    assert_eq!(h.controller.launcher().launches(), 1);
}

#[test]
fn start_while_recording_is_ignored() {
    let mut h = Harness::new("start-recording");
    h.start_recording();
    for _ in 0..3 {
        assert!(matches!(h.controller.request_start(), Outcome::Ignored));
    }
    assert_eq!(h.controller.state(), SessionState::Recording);
    assert_eq!(h.controller.launcher().launches(), 1);
}

#[test]
fn stop_without_recording_has_no_effect() {
    let mut h = Harness::new("idle-stop");
    assert!(matches!(h.controller.request_stop(), Outcome::Ignored));
    assert_eq!(h.controller.state(), SessionState::Idle);

    h.controller.request_start();
    assert!(matches!(h.controller.request_stop(), Outcome::Ignored));
    assert_eq!(h.controller.state(), SessionState::AwaitingSelection);
    assert_eq!(h.controller.launcher().stop_requests(), 0);
    assert_eq!(h.controller.launcher().launches(), 0);
}

#[test]
fn graceful_stop_returns_to_idle() {
    let mut h = Harness::new("graceful");
    let session = h.start_recording();

    assert!(h.controller.request_stop().is_transition());
    assert_eq!(h.controller.state(), SessionState::Stopping);
    assert_eq!(h.controller.launcher().stop_requests(), 1);

    // A second stop while already stopping is not forwarded.
    assert!(matches!(h.controller.request_stop(), Outcome::Ignored));
    assert_eq!(h.controller.launcher().stop_requests(), 1);

    let outcome = h.controller.handle(SessionEvent::EncoderExited {
        session,
        code: Some(0),
    });
    assert!(matches!(
        outcome,
        Outcome::Transitioned {
            from: SessionState::Stopping,
            to: SessionState::Idle
        }
    ));
    assert_eq!(h.controller.state(), SessionState::Idle);
    assert!(h.controller.surfaces().is_empty());
    assert_eq!(h.controller.surface_host().live_surfaces(), 0);
    assert!(h.controller.surface_host().control_visible());
    assert!(h.controller.output_path().is_none());

    let report = h.controller.last_exit().unwrap();
    assert!(report.is_graceful());
    assert_eq!(report.code, Some(0));
}

#[test]
fn encoder_crash_while_recording_returns_to_idle() {
    let mut h = Harness::new("crash");
    let session = h.start_recording();

    h.controller.handle(SessionEvent::EncoderExited {
        session,
        code: Some(1),
    });

    assert_eq!(h.controller.state(), SessionState::Idle);
    assert!(h.controller.surfaces().is_empty());
    let report = h.controller.last_exit().unwrap();
    assert!(!report.is_graceful());
    assert!(!report.requested);
    assert_eq!(report.code, Some(1));
}

#[test]
fn stale_exit_event_is_ignored() {
    let mut h = Harness::new("stale");
    let session = h.start_recording();

    let outcome = h.controller.handle(SessionEvent::EncoderExited {
        session: SessionId(session.0 + 100),
        code: Some(0),
    });
    assert!(matches!(outcome, Outcome::Ignored));
    assert_eq!(h.controller.state(), SessionState::Recording);
}

#[test]
fn spawn_failure_cleans_up_synchronously() {
    let mut h = Harness::with_launcher("spawn-fail", true);
    h.controller.request_start();
    let surface = h.surface_on("A");
    let outcome = h
        .controller
        .on_selection_completed(SelectionRect::new(0.0, 0.0, 640.0, 480.0), surface);

    assert!(matches!(outcome, Outcome::Failed { .. }));
    assert_eq!(h.controller.state(), SessionState::Idle);
    assert!(h.controller.surfaces().is_empty());
    assert!(h.controller.surface_host().control_visible());

    // The machine is usable again.
    assert!(h.controller.request_start().is_transition());
}

#[test]
fn start_without_displays_fails_and_restores_control() {
    let mut h = Harness::new("no-displays");
    h.displays.set(Vec::new());
    let outcome = h.controller.request_start();

    match outcome {
        Outcome::Failed { error } => assert!(error.is_fatal()),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(h.controller.state(), SessionState::Idle);
    assert!(h.controller.surface_host().control_visible());
}

#[test]
fn cancel_hides_overlay() {
    let mut h = Harness::new("cancel");
    h.controller.request_start();
    assert!(h.controller.handle(SessionEvent::SelectionCancelled).is_transition());
    assert_eq!(h.controller.state(), SessionState::Idle);
    assert!(h.controller.surfaces().is_empty());
    assert!(h.controller.surface_host().control_visible());
}

#[test]
fn consecutive_recordings_use_distinct_outputs() {
    let mut h = Harness::new("distinct");
    let first = h.start_recording();
    let first_path = h.controller.output_path().unwrap().to_path_buf();
    h.controller.request_stop();
    h.controller.handle(SessionEvent::EncoderExited {
        session: first,
        code: Some(0),
    });

    let second = h.start_recording();
    assert_ne!(first, second);
    assert_ne!(h.controller.output_path().unwrap(), first_path.as_path());
}

#[test]
fn selection_far_outside_desktop_is_rejected() {
    let mut h = Harness::new("far-off");
    h.controller.request_start();
    let surface = h.surface_on("B");
    let far = (1u64 << 32) as f64 - 1820.0;
    let outcome = h
        .controller
        .on_selection_completed(SelectionRect::new(far, 50.0, 300.0, 200.0), surface);

    assert!(matches!(outcome, Outcome::Rejected { .. }));
    assert_eq!(h.controller.state(), SessionState::AwaitingSelection);
    assert_eq!(h.controller.launcher().launches(), 0);
}
