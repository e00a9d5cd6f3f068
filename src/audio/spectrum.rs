use std::ops::Deref;

use super::analyser::AnalyserOptions;
use super::element::AudioElement;
use super::graph::{AudioGraph, GraphState};
use crate::error::Result;
use crate::schedule::{RefreshHandle, RefreshScheduler};

/// One tick's worth of byte magnitudes, one per frequency bin.
///
/// The buffer is reused; each publication overwrites the previous values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrequencyFrame {
    bins: Vec<u8>,
    sequence: u64,
}

impl FrequencyFrame {
    pub fn silent(bin_count: usize) -> Self {
        Self { bins: vec![0; bin_count], sequence: 0 }
    }

    pub fn from_bins(bins: Vec<u8>) -> Self {
        Self { bins, sequence: 0 }
    }

    /// How many times this buffer has been published.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }
}

impl Deref for FrequencyFrame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bins
    }
}

/// Turns a playing [`AudioElement`] into a stream of [`FrequencyFrame`]s, one
/// per display refresh.
pub struct SpectrumSource {
    options: AnalyserOptions,
    graph: Option<AudioGraph>,
    frame: FrequencyFrame,
    pending: Option<RefreshHandle>,
}

impl Default for SpectrumSource {
    fn default() -> Self {
        Self::new(AnalyserOptions::default())
    }
}

impl SpectrumSource {
    pub fn new(options: AnalyserOptions) -> Self {
        Self {
            options,
            graph: None,
            frame: FrequencyFrame::silent(options.fft_size / 2),
            pending: None,
        }
    }

    pub fn frame(&self) -> &FrequencyFrame {
        &self.frame
    }

    pub fn graph(&self) -> Option<&AudioGraph> {
        self.graph.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.pending.is_some()
    }

    /// Binds the source to `element`, building its analysis graph the first
    /// time only. A different element replaces (and closes) the old graph.
    pub fn attach(&mut self, element: &AudioElement, scheduler: &mut dyn RefreshScheduler) -> Result<()> {
        if self.graph.as_ref().is_some_and(|g| g.element_id() == element.id()) {
            return Ok(());
        }
        self.teardown(scheduler);
        let graph = AudioGraph::connect(element, self.options)?;
        self.frame = FrequencyFrame::silent(graph.frequency_bin_count());
        self.graph = Some(graph);
        Ok(())
    }

    /// Starts or stops the polling loop to match the play intent.
    pub fn sync_playback(&mut self, playing: bool, scheduler: &mut dyn RefreshScheduler) {
        self.cancel(scheduler);
        if !playing {
            return;
        }
        if let Some(graph) = self.graph.as_mut() {
            if graph.state() == GraphState::Suspended {
                if let Err(err) = graph.resume() {
                    log::warn!("Audio graph could not resume: {}", err);
                }
            }
        }
        self.pending = Some(scheduler.request_refresh());
    }

    /// Refresh callback. Reads the spectrum, re-arms the loop and returns the
    /// published frame; stale or cancelled handles publish nothing.
    pub fn on_refresh(
        &mut self,
        handle: RefreshHandle,
        element: &AudioElement,
        scheduler: &mut dyn RefreshScheduler,
    ) -> Option<&FrequencyFrame> {
        if self.pending != Some(handle) {
            return None;
        }
        if let Some(graph) = self.graph.as_mut() {
            // A graph that is not running leaves the previous values in place.
            graph.read_byte_frequency_data(element, &mut self.frame.bins);
        }
        self.frame.sequence += 1;
        self.pending = Some(scheduler.request_refresh());
        Some(&self.frame)
    }

    /// Cancels polling and closes the graph.
    pub fn teardown(&mut self, scheduler: &mut dyn RefreshScheduler) {
        self.cancel(scheduler);
        if let Some(mut graph) = self.graph.take() {
            graph.close();
        }
    }

    fn cancel(&mut self, scheduler: &mut dyn RefreshScheduler) {
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_refresh(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::AudioData;
    use crate::schedule::VirtualDisplay;
    use std::time::Duration;

    fn tone_element() -> AudioElement {
        let samples = (0..48_000)
            .map(|i| (2.0 * std::f32::consts::PI * 3000.0 * i as f32 / 48_000.0).sin())
            .collect();
        AudioElement::new(AudioData::from_samples(samples, 48_000))
    }

    #[test]
    fn nothing_is_published_before_playing() {
        let mut display = VirtualDisplay::new(60);
        let mut source = SpectrumSource::default();
        let el = tone_element();
        source.attach(&el, &mut display).unwrap();
        assert!(!source.is_polling());
        assert!(display.vsync().is_empty());
    }

    #[test]
    fn publishes_256_bins_every_refresh_while_playing() {
        let mut display = VirtualDisplay::new(60);
        let mut source = SpectrumSource::default();
        let mut el = tone_element();
        source.attach(&el, &mut display).unwrap();
        el.play().unwrap();
        source.sync_playback(true, &mut display);
        assert_eq!(source.graph().unwrap().state(), GraphState::Running);

        for tick in 1..=5u64 {
            let fired = display.vsync();
            assert_eq!(fired.len(), 1);
            el.advance(display.refresh_interval());
            let frame = source.on_refresh(fired[0], &el, &mut display).expect("frame");
            assert_eq!(frame.len(), 256);
            assert_eq!(frame.sequence(), tick);
        }
        assert!(source.frame()[32] > 0);
    }

    #[test]
    fn pause_cancels_the_pending_refresh() {
        let mut display = VirtualDisplay::new(60);
        let mut source = SpectrumSource::default();
        let el = tone_element();
        source.attach(&el, &mut display).unwrap();
        source.sync_playback(true, &mut display);
        source.sync_playback(false, &mut display);
        source.sync_playback(false, &mut display);
        assert!(!source.is_polling());
        assert_eq!(display.pending_count(), 0);
    }

    #[test]
    fn stale_handles_publish_nothing() {
        let mut display = VirtualDisplay::new(60);
        let mut source = SpectrumSource::default();
        let el = tone_element();
        source.attach(&el, &mut display).unwrap();
        source.sync_playback(true, &mut display);
        let fired = display.vsync();
        source.sync_playback(false, &mut display);
        assert!(source.on_refresh(fired[0], &el, &mut display).is_none());
    }

    #[test]
    fn graph_is_built_once_per_element() {
        let mut display = VirtualDisplay::new(60);
        let mut source = SpectrumSource::default();
        let mut el = tone_element();
        source.attach(&el, &mut display).unwrap();
        source.sync_playback(true, &mut display);
        el.seek(0.5);
        let fired = display.vsync();
        source.on_refresh(fired[0], &el, &mut display);
        let before = source.frame().clone();

        // Re-attaching the same element must keep the graph (and its state).
        source.attach(&el, &mut display).unwrap();
        assert_eq!(source.graph().unwrap().state(), GraphState::Running);
        assert_eq!(source.frame(), &before);

        let other = tone_element();
        source.attach(&other, &mut display).unwrap();
        assert_eq!(source.graph().unwrap().element_id(), other.id());
        assert_eq!(source.graph().unwrap().state(), GraphState::Suspended);
        assert!(!source.is_polling());
    }

    #[test]
    fn teardown_closes_everything() {
        let mut display = VirtualDisplay::new(60);
        let mut source = SpectrumSource::default();
        let mut el = tone_element();
        source.attach(&el, &mut display).unwrap();
        source.sync_playback(true, &mut display);
        el.advance(Duration::from_millis(10));
        source.teardown(&mut display);
        source.teardown(&mut display);
        assert!(source.graph().is_none());
        assert_eq!(display.pending_count(), 0);
    }
}
