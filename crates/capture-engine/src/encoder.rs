//! External encoder invocation and process supervision.
//!
//! The encoder grabs the full virtual desktop plus one audio input and crops
//! the selection out in its filter graph. It is stopped by writing `q` to its
//! stdin and closing the pipe; it then finalizes the file and exits on its own.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::sync::oneshot;

use spancap_common::config::{EncoderSettings, VideoGrabber};
use spancap_common::error::{SpancapError, SpancapResult};
use spancap_platform_core::VirtualBounds;

use crate::event::{EventSender, SessionEvent, SessionId};
use crate::geometry::CropBox;

/// Byte that asks ffmpeg to finish the output and quit.
pub const GRACEFUL_STOP_BYTE: u8 = b'q';

/// What the encoder should capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRegion {
    /// Grabbed area: the whole virtual desktop.
    pub bounds: VirtualBounds,
    /// Selection inside `bounds`.
    pub crop: CropBox,
    /// Extra pixels trimmed from every edge of `crop`.
    pub margin_px: u32,
}

/// A fully built encoder command line.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub output_path: PathBuf,
}

impl EncoderInvocation {
    /// Build the ffmpeg arguments for `region`.
    ///
    /// `x11_display` is the X server to grab from and is only used with
    /// [`VideoGrabber::X11grab`].
    pub fn build(
        settings: &EncoderSettings,
        region: &CaptureRegion,
        x11_display: &str,
        output_path: PathBuf,
    ) -> Self {
        let bounds = region.bounds;
        let video_size = format!("{}x{}", bounds.width, bounds.height);
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "warning".into(),
            "-nostats".into(),
        ];

        match settings.grabber {
            VideoGrabber::X11grab => {
                args.extend([
                    "-f".into(),
                    settings.grabber.as_str().into(),
                    "-framerate".into(),
                    settings.framerate.to_string(),
                    "-video_size".into(),
                    video_size,
                    "-i".into(),
                    format!("{x11_display}+{},{}", bounds.x, bounds.y),
                ]);
            }
            VideoGrabber::Gdigrab => {
                args.extend([
                    "-f".into(),
                    settings.grabber.as_str().into(),
                    "-framerate".into(),
                    settings.framerate.to_string(),
                    "-offset_x".into(),
                    bounds.x.to_string(),
                    "-offset_y".into(),
                    bounds.y.to_string(),
                    "-video_size".into(),
                    video_size,
                    "-i".into(),
                    "desktop".into(),
                ]);
            }
        }

        args.extend([
            "-f".into(),
            settings.audio_format.clone(),
            "-i".into(),
            settings.audio_source.clone(),
            "-filter_complex".into(),
            filter_graph(&region.crop, region.margin_px),
            "-map".into(),
            "[v_out]".into(),
            "-map".into(),
            "[a_out]".into(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            settings.preset.clone(),
            "-crf".into(),
            settings.crf.to_string(),
            "-pix_fmt".into(),
            settings.pixel_format.clone(),
            "-c:a".into(),
            settings.audio_codec.clone(),
            "-b:a".into(),
            settings.audio_bitrate.clone(),
            "-movflags".into(),
            "+faststart".into(),
            output_path.to_string_lossy().into_owned(),
        ]);

        Self {
            program: settings.binary.clone(),
            args,
            output_path,
        }
    }

    /// Shell-style rendering for logs and dry runs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .map(|arg| shell_quote(&arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Video: crop the selection, trim the margin, restart timestamps.
/// Audio: resample for timestamp continuity, restart timestamps.
pub fn filter_graph(crop: &CropBox, margin_px: u32) -> String {
    let mut video = format!(
        "[0:v]crop={}:{}:{}:{}",
        crop.width, crop.height, crop.x, crop.y
    );
    if margin_px > 0 {
        let trim = margin_px * 2;
        video.push_str(&format!(
            ",crop=iw-{trim}:ih-{trim}:{margin_px}:{margin_px}"
        ));
    }
    video.push_str(",setpts=PTS-STARTPTS[v_out]");
    format!("{video};[1:a]aresample=async=1,asetpts=PTS-STARTPTS[a_out]")
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:,+=@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Hands out output paths that are never reused within a process.
#[derive(Debug, Default)]
pub struct OutputNamer {
    issued: HashSet<PathBuf>,
}

impl OutputNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `<dir>/capture-<stamp>.<ext>`, adding `-N` when the file
    /// exists or the name was already handed out. Creates `dir`.
    pub fn allocate(&mut self, dir: &Path, stamp: &str, extension: &str) -> SpancapResult<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let extension = extension.trim_start_matches('.');
        let mut candidate = dir.join(format!("capture-{stamp}.{extension}"));
        let mut suffix = 1u32;
        while candidate.exists() || self.issued.contains(&candidate) {
            candidate = dir.join(format!("capture-{stamp}-{suffix}.{extension}"));
            suffix += 1;
        }

        self.issued.insert(candidate.clone());
        Ok(candidate)
    }
}

/// Control side of a running encoder.
pub trait EncoderControl: Send {
    /// OS process id, when known.
    fn pid(&self) -> Option<u32>;

    /// Ask the encoder to finalize and exit. Never blocks; repeated calls
    /// are no-ops.
    fn request_stop(&mut self);
}

/// Spawns encoder processes.
///
/// Implementations must post exactly one [`SessionEvent::EncoderExited`]
/// for `session` to `events` once the process is gone.
pub trait EncoderLauncher {
    fn launch(
        &mut self,
        session: SessionId,
        invocation: &EncoderInvocation,
        events: EventSender,
    ) -> SpancapResult<Box<dyn EncoderControl>>;
}

/// Runs ffmpeg under a tokio runtime.
pub struct FfmpegLauncher {
    runtime: tokio::runtime::Handle,
}

impl FfmpegLauncher {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self { runtime }
    }

    /// Use the runtime of the calling task.
    ///
    /// Panics outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl EncoderLauncher for FfmpegLauncher {
    fn launch(
        &mut self,
        session: SessionId,
        invocation: &EncoderInvocation,
        events: EventSender,
    ) -> SpancapResult<Box<dyn EncoderControl>> {
        // Pipe registration needs the runtime's reactor.
        let _guard = self.runtime.enter();

        tracing::debug!(args = ?invocation.args, "Spawning encoder");
        let mut command = std::process::Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        // Keep terminal Ctrl+C away from the encoder; it only stops on `q`.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = Command::from(command)
            .spawn()
            .map_err(|e| {
                SpancapError::encoder(format!(
                    "Failed to start {}: {e}",
                    invocation.program.display()
                ))
            })?;

        let pid = child.id();
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SpancapError::encoder("Failed to capture encoder stdin"))?;

        if let Some(stderr) = child.stderr.take() {
            self.runtime.spawn(drain_stderr(stderr, pid));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        self.runtime
            .spawn(supervise(child, stdin, stop_rx, session, events));

        tracing::info!(
            ?pid,
            %session,
            output = %invocation.output_path.display(),
            "Encoder process started"
        );

        Ok(Box::new(FfmpegControl {
            pid,
            stop: Some(stop_tx),
        }))
    }
}

struct FfmpegControl {
    pid: Option<u32>,
    stop: Option<oneshot::Sender<()>>,
}

impl EncoderControl for FfmpegControl {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn request_stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The supervisor may already be gone if the process just exited.
            let _ = stop.send(());
        }
    }
}

/// Longest stderr line kept; the rest of an over-long line is dropped.
const MAX_LINE_BYTES: usize = 4096;

/// Splits encoder stderr into lines on `\n` or `\r`.
///
/// ffmpeg ends progress updates with a bare `\r`, so newline-only splitting
/// would hold a single growing line until exit.
#[derive(Debug, Default)]
struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    fn push(&mut self, chunk: &[u8], mut emit: impl FnMut(&str)) {
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                self.flush(&mut emit);
            } else if self.pending.len() < MAX_LINE_BYTES {
                self.pending.push(byte);
            }
        }
    }

    fn flush(&mut self, mut emit: impl FnMut(&str)) {
        if !self.pending.is_empty() {
            emit(String::from_utf8_lossy(&self.pending).trim_end());
            self.pending.clear();
        }
    }
}

/// Log encoder diagnostics line by line until the pipe closes.
async fn drain_stderr(stderr: ChildStderr, pid: Option<u32>) {
    let mut reader = BufReader::new(stderr);
    let mut splitter = LineSplitter::default();
    let log = |line: &str| tracing::debug!(target: "spancap::encoder", ?pid, "{line}");

    loop {
        let chunk = match reader.fill_buf().await {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(?pid, error = %e, "Failed reading encoder stderr");
                break;
            }
        };
        if chunk.is_empty() {
            break;
        }
        let read = chunk.len();
        splitter.push(chunk, log);
        reader.consume(read);
    }
    splitter.flush(log);
}

/// Own the child: forward the stop request, wait for exit, report it once.
async fn supervise(
    mut child: Child,
    stdin: ChildStdin,
    mut stop_rx: oneshot::Receiver<()>,
    session: SessionId,
    events: EventSender,
) {
    let mut stdin = Some(stdin);

    let status = tokio::select! {
        status = child.wait() => status,
        requested = &mut stop_rx => {
            if requested.is_ok() {
                if let Some(pipe) = stdin.take() {
                    send_graceful_stop(pipe).await;
                }
            }
            child.wait().await
        }
    };

    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            tracing::warn!(%session, error = %e, "Failed to wait on encoder");
            None
        }
    };

    if events
        .send(SessionEvent::EncoderExited { session, code })
        .is_err()
    {
        tracing::debug!(%session, "Session event channel closed before encoder exit");
    }
}

async fn send_graceful_stop(mut pipe: ChildStdin) {
    if let Err(e) = pipe.write_all(&[GRACEFUL_STOP_BYTE]).await {
        tracing::warn!(error = %e, "Failed to send stop byte to encoder");
    }
    if let Err(e) = pipe.shutdown().await {
        tracing::debug!(error = %e, "Encoder stdin already closed");
    }
}
