//! Fixed-cadence recording of the capture surface.
//!
//! The controller never waits on the renderer: whenever it is sampled it
//! writes the latest capture pixels once for every frame slot that has
//! elapsed since the last sample. The clock stops while playback is paused
//! so the video stays in step with the muxed audio.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::element::AudioElement;
use crate::encode::ffmpeg::{self, EncoderOptions, FfmpegEncoder};
use crate::error::VisualizerError;
use crate::render::surface::Surface;

pub const DEFAULT_OUTPUT: &str = "audio-visualization.webm";
pub const DEFAULT_CAPTURE_FPS: u32 = 30;

/// Destination for raw RGBA frames.
pub trait FrameSink {
    fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()>;

    /// Flushes and closes the container.
    fn finish(self: Box<Self>) -> Result<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureArtifact {
    pub path: PathBuf,
    pub frames_written: u64,
    pub width: u32,
    pub height: u32,
}

struct Recording {
    sink: Box<dyn FrameSink>,
    width: u32,
    height: u32,
    started: Duration,
    paused_at: Option<Duration>,
    next_slot: u64,
    frames_written: u64,
    /// Last frame that matched the recording size, replayed on mismatch.
    last_good: Vec<u8>,
    size_warned: bool,
}

pub struct CaptureController {
    fps: u32,
    output: PathBuf,
    options: EncoderOptions,
    recording: Option<Recording>,
    last_error: Option<String>,
}

impl CaptureController {
    pub fn new(output: impl Into<PathBuf>, fps: u32, options: EncoderOptions) -> Self {
        Self {
            fps: fps.max(1),
            output: output.into(),
            options,
            recording: None,
            last_error: None,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Why the last recording was abandoned, if it was.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn frames_written(&self) -> u64 {
        self.recording.as_ref().map_or(0, |r| r.frames_written)
    }

    /// Starts recording `surface` muxed with the element's audio from its
    /// current position. Starting while already recording does nothing.
    pub fn start(
        &mut self,
        element: &AudioElement,
        surface: &Surface,
        now: Duration,
    ) -> Result<(), VisualizerError> {
        if self.is_recording() {
            return Ok(());
        }
        let audio = element.source_path().ok_or_else(|| {
            VisualizerError::unsupported("recording needs audio loaded from a file")
        })?;
        let (width, height) = surface.dimensions();
        if width == 0 || height == 0 {
            return Err(VisualizerError::unsupported("capture surface has no size yet"));
        }
        if !ffmpeg::ffmpeg_available() {
            return Err(VisualizerError::unsupported(
                "ffmpeg was not found on PATH; recording is unavailable",
            ));
        }
        let encoder = FfmpegEncoder::new(
            &self.output,
            audio,
            element.current_time(),
            width,
            height,
            self.fps,
            &self.options,
        )
        .map_err(|e| VisualizerError::unsupported(format!("{:#}", e)))?;
        self.start_with_sink(Box::new(encoder), width, height, now);
        Ok(())
    }

    /// Starts recording into an arbitrary sink at a fixed frame size.
    pub fn start_with_sink(&mut self, sink: Box<dyn FrameSink>, width: u32, height: u32, now: Duration) {
        if self.is_recording() {
            return;
        }
        log::info!("Recording {}x{} @ {}fps to {}", width, height, self.fps, self.output.display());
        self.last_error = None;
        self.recording = Some(Recording {
            sink,
            width,
            height,
            started: now,
            paused_at: None,
            next_slot: 0,
            frames_written: 0,
            last_good: vec![0; width as usize * height as usize * 4],
            size_warned: false,
        });
    }

    pub fn is_paused(&self) -> bool {
        self.recording.as_ref().is_some_and(|r| r.paused_at.is_some())
    }

    /// Freezes the frame clock at `now`. Slots stop accruing until
    /// [`CaptureController::resume`].
    pub fn pause(&mut self, now: Duration) {
        if let Some(rec) = self.recording.as_mut() {
            if rec.paused_at.is_none() {
                log::debug!("Recording paused after {} frames", rec.frames_written);
                rec.paused_at = Some(now);
            }
        }
    }

    /// Restarts the frame clock, discounting the time spent paused.
    pub fn resume(&mut self, now: Duration) {
        if let Some(rec) = self.recording.as_mut() {
            if let Some(paused_at) = rec.paused_at.take() {
                let paused = now.saturating_sub(paused_at);
                rec.started += paused;
                log::debug!("Recording resumed after {:.2}s paused", paused.as_secs_f64());
            }
        }
    }

    /// Writes one frame per slot elapsed up to `now`. A surface of the wrong
    /// size is not written; the last matching frame stands in for it so the
    /// slot count never drifts. Returns how many frames were written.
    pub fn sample(&mut self, now: Duration, surface: &Surface) -> usize {
        let fps = self.fps as f64;
        let Some(rec) = self.recording.as_mut() else {
            return 0;
        };
        if rec.paused_at.is_some() {
            return 0;
        }
        let elapsed = now.saturating_sub(rec.started).as_secs_f64();
        let due = (elapsed * fps).floor() as u64 + 1;
        if rec.next_slot >= due {
            return 0;
        }

        let frame: &[u8] = if surface.dimensions() == (rec.width, rec.height) {
            rec.size_warned = false;
            rec.last_good.clear();
            rec.last_good.extend_from_slice(surface.as_bytes());
            surface.as_bytes()
        } else {
            if !rec.size_warned {
                log::warn!(
                    "Capture surface is {}x{} but the recording is {}x{}; repeating the last frame",
                    surface.width(),
                    surface.height(),
                    rec.width,
                    rec.height
                );
                rec.size_warned = true;
            }
            &rec.last_good
        };

        let mut written = 0;
        let mut failure = None;
        while rec.next_slot < due {
            if let Err(err) = rec.sink.write_frame(frame) {
                failure = Some(format!("{:#}", err));
                break;
            }
            rec.next_slot += 1;
            rec.frames_written += 1;
            written += 1;
        }
        if let Some(reason) = failure {
            self.abort(reason);
        }
        written
    }

    /// Finalizes the current recording, if any.
    pub fn stop(&mut self) -> Option<Result<CaptureArtifact>> {
        let rec = self.recording.take()?;
        let artifact = CaptureArtifact {
            path: self.output.clone(),
            frames_written: rec.frames_written,
            width: rec.width,
            height: rec.height,
        };
        log::info!("Recording stopped after {} frames", rec.frames_written);
        Some(rec.sink.finish().map(|_| artifact))
    }

    fn abort(&mut self, reason: String) {
        log::error!("Recording aborted: {}", reason);
        if let Some(rec) = self.recording.take() {
            if let Err(err) = rec.sink.finish() {
                log::debug!("Closing aborted recording failed: {:#}", err);
            }
        }
        self.last_error = Some(reason);
    }
}
