//! Drives the real process supervisor with small shell scripts standing in
//! for the encoder.

#![cfg(unix)]

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use spancap_capture_engine::encoder::{EncoderInvocation, EncoderLauncher, FfmpegLauncher};
use spancap_capture_engine::{session_channel, SessionEvent, SessionId};

fn script(body: &str) -> EncoderInvocation {
    EncoderInvocation {
        program: PathBuf::from("sh"),
        args: vec!["-c".to_string(), body.to_string()],
        output_path: std::env::temp_dir().join("spancap-encoder-process.mp4"),
    }
}

async fn next_exit(rx: &mut spancap_capture_engine::EventReceiver) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("encoder exit within timeout")
        .expect("channel open")
}

#[tokio::test]
async fn stop_request_writes_q_and_closes_stdin() {
    let (tx, mut rx) = session_channel();
    let mut launcher = FfmpegLauncher::current();

    // Exits 0 only if it reads exactly "q" before EOF.
    let mut control = launcher
        .launch(
            SessionId(7),
            &script(r#"echo starting >&2; read c; [ "$c" = q ]"#),
            tx,
        )
        .unwrap();
    assert!(control.pid().is_some());

    control.request_stop();
    control.request_stop();

    assert_eq!(
        next_exit(&mut rx).await,
        SessionEvent::EncoderExited {
            session: SessionId(7),
            code: Some(0)
        }
    );
    // Exactly one exit is reported.
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn unrequested_exit_is_reported_with_code() {
    let (tx, mut rx) = session_channel();
    let mut launcher = FfmpegLauncher::current();
    let _control = launcher
        .launch(SessionId(3), &script("echo 'device busy' >&2; exit 3"), tx)
        .unwrap();

    assert_eq!(
        next_exit(&mut rx).await,
        SessionEvent::EncoderExited {
            session: SessionId(3),
            code: Some(3)
        }
    );
}

#[tokio::test]
async fn missing_binary_fails_to_launch() {
    let (tx, mut rx) = session_channel();
    let mut launcher = FfmpegLauncher::current();
    let invocation = EncoderInvocation {
        program: PathBuf::from("/nonexistent/spancap-ffmpeg"),
        args: Vec::new(),
        output_path: PathBuf::from("/tmp/unused.mp4"),
    };

    let err = launcher
        .launch(SessionId(1), &invocation, tx)
        .err()
        .expect("spawn should fail");
    assert!(err.to_string().contains("spancap-ffmpeg"));
    // No exit event for a process that never started.
    assert!(rx.recv().await.is_none());
}

/// Log sink shared with the test body.
#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn progress_lines_are_logged_while_running() {
    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    // The current-thread test runtime polls the stderr task on this thread.
    let _guard = tracing::subscriber::set_default(subscriber);

    let (tx, mut rx) = session_channel();
    let mut launcher = FfmpegLauncher::current();
    let mut control = launcher
        .launch(
            SessionId(9),
            &script(r#"printf 'frame=1\rframe=2\rframe=3\r' >&2; read c; [ "$c" = q ]"#),
            tx,
        )
        .unwrap();

    // Progress must show up before the encoder exits, not at the end.
    let logged = tokio::time::timeout(Duration::from_secs(10), async {
        while !log.contents().contains("frame=3") {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(logged.is_ok(), "log so far: {}", log.contents());
    assert!(log.contents().contains("frame=2"));

    control.request_stop();
    assert_eq!(
        next_exit(&mut rx).await,
        SessionEvent::EncoderExited {
            session: SessionId(9),
            code: Some(0)
        }
    );
}
