//! Application glue: one loaded track, one refresh loop, one renderer and an
//! optional recording, wired together the way a player UI would wire them.

use std::path::PathBuf;
use std::time::Duration;

use crate::audio::analyser::AnalyserOptions;
use crate::audio::decode::AudioData;
use crate::audio::element::{AudioElement, MediaEvent};
use crate::audio::spectrum::SpectrumSource;
use crate::capture::{CaptureArtifact, CaptureController, FrameSink, DEFAULT_CAPTURE_FPS, DEFAULT_OUTPUT};
use crate::encode::ffmpeg::EncoderOptions;
use crate::render::dual::{DisplayViewport, DualSurfaceRenderer, TickReport};
use crate::schedule::VirtualDisplay;
use crate::visual::{StyleEngine, VisualizerSettings};

/// Builds the frame sink for a new recording of the given size. Replaces the
/// ffmpeg encoder when set.
pub type SinkFactory = Box<dyn FnMut(u32, u32) -> Box<dyn FrameSink>>;

#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub viewport: DisplayViewport,
    pub refresh_hz: u32,
    pub capture_fps: u32,
    pub output: PathBuf,
    pub encoder: EncoderOptions,
    /// Start recording whenever playback starts.
    pub record: bool,
    /// Fixed seed for particle randomness.
    pub seed: Option<u64>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            viewport: DisplayViewport::new(960.0, 540.0, 1.0),
            refresh_hz: 60,
            capture_fps: DEFAULT_CAPTURE_FPS,
            output: PathBuf::from(DEFAULT_OUTPUT),
            encoder: EncoderOptions::default(),
            record: true,
            seed: None,
        }
    }
}

pub struct Session {
    display: VirtualDisplay,
    spectrum: SpectrumSource,
    element: Option<AudioElement>,
    settings: VisualizerSettings,
    renderer: DualSurfaceRenderer,
    capture: CaptureController,
    record: bool,
    sink_factory: Option<SinkFactory>,
    artifacts: Vec<CaptureArtifact>,
    messages: Vec<String>,
    frames_published: u64,
}

impl Session {
    pub fn new(options: SessionOptions, settings: VisualizerSettings) -> Self {
        let engine = options.seed.map_or_else(StyleEngine::new, StyleEngine::with_seed);
        let mut renderer = DualSurfaceRenderer::new(options.viewport, engine);
        renderer.apply_settings(&settings);
        Self {
            display: VirtualDisplay::new(options.refresh_hz),
            spectrum: SpectrumSource::new(AnalyserOptions::default()),
            element: None,
            settings,
            renderer,
            capture: CaptureController::new(options.output, options.capture_fps, options.encoder),
            record: options.record,
            sink_factory: None,
            artifacts: Vec::new(),
            messages: Vec::new(),
            frames_published: 0,
        }
    }

    pub fn set_sink_factory(&mut self, factory: SinkFactory) {
        self.sink_factory = Some(factory);
    }

    pub fn settings(&self) -> &VisualizerSettings {
        &self.settings
    }

    pub fn element(&self) -> Option<&AudioElement> {
        self.element.as_ref()
    }

    pub fn renderer(&self) -> &DualSurfaceRenderer {
        &self.renderer
    }

    pub fn spectrum(&self) -> &SpectrumSource {
        &self.spectrum
    }

    pub fn capture(&self) -> &CaptureController {
        &self.capture
    }

    pub fn display_clock(&self) -> Duration {
        self.display.now()
    }

    /// User-facing messages collected so far (failed recordings, playback
    /// refusals and similar).
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn artifacts(&self) -> &[CaptureArtifact] {
        &self.artifacts
    }

    pub fn frames_published(&self) -> u64 {
        self.frames_published
    }

    pub fn current_time(&self) -> f64 {
        self.element.as_ref().map_or(0.0, AudioElement::current_time)
    }

    pub fn is_playing(&self) -> bool {
        self.element.as_ref().is_some_and(|el| !el.paused())
    }

    /// Replaces the current track. Playback of the old one stops, any
    /// recording is finalized and the analysis graph is rebuilt.
    pub fn load(&mut self, data: AudioData) {
        if let Some(old) = self.element.as_mut() {
            old.pause();
            old.drain_events();
        }
        self.finish_recording();
        self.spectrum.teardown(&mut self.display);

        let element = AudioElement::new(data);
        log::info!("Loaded {:.2}s of audio at {}Hz", element.duration(), element.sample_rate());
        if let Err(err) = self.spectrum.attach(&element, &mut self.display) {
            self.report(format!("Audio analysis unavailable: {}", err));
        }
        self.element = Some(element);
    }

    pub fn play(&mut self) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        if let Err(err) = element.play() {
            self.report(format!("Playback failed: {}", err));
        }
    }

    pub fn pause(&mut self) {
        if let Some(element) = self.element.as_mut() {
            element.pause();
        }
    }

    /// Flips playback based on the element's own paused flag at the moment
    /// of the call.
    pub fn toggle_play_pause(&mut self) {
        match self.element.as_ref().map(AudioElement::paused) {
            Some(true) => self.play(),
            Some(false) => self.pause(),
            None => {}
        }
    }

    /// Edits the settings. A new style or resolution takes effect before the
    /// next tick.
    pub fn update_settings(&mut self, edit: impl FnOnce(&mut VisualizerSettings)) {
        let before = self.settings;
        edit(&mut self.settings);
        if self.settings != before {
            self.renderer.apply_settings(&self.settings);
        }
    }

    pub fn set_viewport(&mut self, viewport: DisplayViewport) {
        self.renderer.set_viewport(viewport);
    }

    /// Advances the virtual display by one refresh. Returns the render report
    /// when a frequency frame was published (and therefore painted).
    pub fn step(&mut self) -> Option<TickReport> {
        let due = self.display.vsync();
        let now = self.display.now();
        let interval = self.display.refresh_interval();

        let events = match self.element.as_mut() {
            Some(element) => {
                element.advance(interval);
                element.drain_events()
            }
            None => Vec::new(),
        };
        for event in events {
            self.handle_event(event, now);
        }

        let mut report = None;
        if let Some(element) = self.element.as_ref() {
            for handle in due {
                if let Some(frame) = self.spectrum.on_refresh(handle, element, &mut self.display) {
                    report = Some(self.renderer.tick(frame.bins(), &self.settings));
                    self.frames_published += 1;
                }
            }
        }

        if self.capture.is_recording() {
            self.capture.sample(now, self.renderer.capture());
            if !self.capture.is_recording() {
                let reason = self.capture.last_error().unwrap_or("unknown error").to_string();
                self.report(format!("Recording stopped: {}", reason));
            }
        }
        report
    }

    /// Steps until playback stops, up to `max_steps` refreshes. Returns the
    /// number of refreshes run.
    pub fn run_until_stopped(&mut self, max_steps: u64) -> u64 {
        let mut steps = 0;
        while steps < max_steps {
            self.step();
            steps += 1;
            if !self.is_playing() && !self.spectrum.is_polling() {
                break;
            }
        }
        steps
    }

    /// Finalizes any recording and shuts the refresh loop down. Returns every
    /// artifact produced during the session.
    pub fn finish(&mut self) -> Vec<CaptureArtifact> {
        self.teardown();
        std::mem::take(&mut self.artifacts)
    }

    pub fn teardown(&mut self) {
        self.pause();
        if let Some(element) = self.element.as_mut() {
            element.drain_events();
        }
        self.finish_recording();
        self.spectrum.teardown(&mut self.display);
    }

    fn handle_event(&mut self, event: MediaEvent, now: Duration) {
        log::debug!("Media event {:?} at {:.3}s", event, self.current_time());
        match event {
            MediaEvent::Play => {
                self.spectrum.sync_playback(true, &mut self.display);
                if self.capture.is_recording() {
                    self.capture.resume(now);
                } else if self.record {
                    self.start_recording(now);
                }
            }
            MediaEvent::Pause => {
                self.spectrum.sync_playback(false, &mut self.display);
                self.capture.pause(now);
            }
            MediaEvent::Ended => self.finish_recording(),
        }
    }

    fn start_recording(&mut self, now: Duration) {
        if self.capture.is_recording() {
            return;
        }
        let Some(element) = self.element.as_ref() else {
            return;
        };
        let surface = self.renderer.capture();
        if let Some(factory) = self.sink_factory.as_mut() {
            let (w, h) = surface.dimensions();
            self.capture.start_with_sink(factory(w, h), w, h, now);
            return;
        }
        let started = self.capture.start(element, surface, now);
        if let Err(err) = started {
            self.report(format!("Could not start recording: {}", err));
        }
    }

    fn finish_recording(&mut self) {
        match self.capture.stop() {
            Some(Ok(artifact)) => {
                log::info!(
                    "Recorded {} frames to {}",
                    artifact.frames_written,
                    artifact.path.display()
                );
                self.artifacts.push(artifact);
            }
            Some(Err(err)) => self.report(format!("Recording failed: {:#}", err)),
            None => {}
        }
    }

    fn report(&mut self, message: String) {
        log::warn!("{}", message);
        self.messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::MemorySink;
    use crate::visual::{Resolution, VisualStyle};

    fn tone(secs: f32) -> AudioData {
        let rate = 8_000;
        let samples = (0..(secs * rate as f32) as usize)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / rate as f32).sin() * 0.8)
            .collect();
        AudioData::from_samples(samples, rate)
    }

    fn options(record: bool) -> SessionOptions {
        SessionOptions {
            viewport: DisplayViewport::new(64.0, 36.0, 1.0),
            record,
            seed: Some(7),
            ..Default::default()
        }
    }

    fn settings() -> VisualizerSettings {
        VisualizerSettings { resolution: Resolution::Hd720, ..Default::default() }
    }

    #[test]
    fn nothing_renders_until_play() {
        let mut session = Session::new(options(false), settings());
        session.load(tone(1.0));
        for _ in 0..10 {
            assert!(session.step().is_none());
        }
        assert_eq!(session.frames_published(), 0);
    }

    #[test]
    fn publishes_once_per_refresh_while_playing() {
        let mut session = Session::new(options(false), settings());
        session.load(tone(1.0));
        session.play();
        assert!(session.step().is_none());
        for _ in 0..10 {
            let report = session.step().expect("frame published");
            assert_eq!(session.spectrum().frame().len(), 256);
            assert_eq!(report.particles, 0);
        }
        assert_eq!(session.frames_published(), 10);
        assert_eq!(session.renderer().capture().dimensions(), (1280, 720));
        assert_eq!(session.renderer().display().dimensions(), (64, 36));
    }

    #[test]
    fn toggle_pauses_and_resumes() {
        let mut session = Session::new(options(false), settings());
        session.load(tone(2.0));
        session.toggle_play_pause();
        for _ in 0..5 {
            session.step();
        }
        session.toggle_play_pause();
        assert!(!session.is_playing());
        let published = session.frames_published();
        for _ in 0..5 {
            assert!(session.step().is_none());
        }
        assert_eq!(session.frames_published(), published);
        assert!(!session.spectrum().is_polling());

        session.toggle_play_pause();
        session.step();
        assert!(session.step().is_some());
    }

    #[test]
    fn records_from_play_until_ended() {
        let mut session = Session::new(options(true), settings());
        let (sink, tape) = MemorySink::new();
        let mut sink = Some(sink);
        session.set_sink_factory(Box::new(move |_, _| -> Box<dyn FrameSink> {
            Box::new(sink.take().unwrap_or_else(|| MemorySink::new().0))
        }));
        session.load(tone(1.0));
        session.play();
        let steps = session.run_until_stopped(1_000);
        assert!(steps >= 59 && steps <= 62, "{} steps", steps);

        let artifacts = session.finish();
        assert_eq!(artifacts.len(), 1);
        let frames = artifacts[0].frames_written;
        assert!((29..=32).contains(&frames), "{} frames", frames);
        assert_eq!((artifacts[0].width, artifacts[0].height), (1280, 720));
        assert_eq!(tape.borrow().frames.len() as u64, frames);
        assert!(tape.borrow().finished);
        assert!(session.messages().is_empty());
    }

    #[test]
    fn pausing_mid_recording_keeps_video_as_long_as_audio() {
        let mut session = Session::new(options(true), settings());
        let (sink, tape) = MemorySink::new();
        let mut sink = Some(sink);
        session.set_sink_factory(Box::new(move |_, _| -> Box<dyn FrameSink> {
            Box::new(sink.take().unwrap_or_else(|| MemorySink::new().0))
        }));
        session.load(tone(1.0));
        session.play();
        for _ in 0..30 {
            session.step();
        }
        session.pause();
        for _ in 0..120 {
            session.step();
        }
        assert!(session.capture().is_paused());
        let written_while_paused = tape.borrow().frames.len();
        assert!((14..=17).contains(&written_while_paused), "{} frames", written_while_paused);

        session.play();
        session.run_until_stopped(1_000);
        let artifacts = session.finish();
        assert_eq!(artifacts.len(), 1);
        // 1 s of audio at 30 fps, however long the pause lasted.
        let frames = artifacts[0].frames_written;
        assert!((29..=32).contains(&frames), "{} frames", frames);
        assert_eq!(tape.borrow().frames.len() as u64, frames);
    }

    #[test]
    fn recording_without_a_file_reports_and_keeps_drawing() {
        let mut session = Session::new(options(true), settings());
        session.load(tone(1.0));
        session.play();
        session.step();
        assert!(session.step().is_some());
        assert!(!session.capture().is_recording());
        assert_eq!(session.messages().len(), 1);
        assert!(session.messages()[0].contains("Could not start recording"));
    }

    #[test]
    fn loading_a_new_track_stops_the_old_one() {
        let mut session = Session::new(options(true), settings());
        session.set_sink_factory(Box::new(|_, _| -> Box<dyn FrameSink> { Box::new(MemorySink::new().0) }));
        session.load(tone(2.0));
        session.play();
        for _ in 0..10 {
            session.step();
        }
        assert!(session.capture().is_recording());

        session.load(tone(1.0));
        assert!(!session.capture().is_recording());
        assert_eq!(session.artifacts().len(), 1);
        assert!(!session.is_playing());
        assert!(!session.spectrum().is_polling());
        assert!(session.step().is_none());
    }

    #[test]
    fn settings_change_applies_before_next_tick() {
        let mut session = Session::new(options(false), settings());
        session.load(tone(2.0));
        session.update_settings(|s| s.style = VisualStyle::Particles);
        session.play();
        for _ in 0..60 {
            session.step();
        }
        session.update_settings(|s| {
            s.style = VisualStyle::Galaxy;
            s.resolution = Resolution::Uhd2160;
        });
        assert!(session.renderer().engine().particles().is_empty());
        assert_eq!(session.renderer().capture().dimensions(), (3840, 2160));
    }
}
