use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::decode::AudioData;
use crate::error::{Result, VisualizerError};

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaEvent {
    Play,
    Pause,
    Ended,
}

/// A playable track with media-element semantics: an authoritative `paused`
/// flag, a playback position driven by the display clock, and queued
/// play/pause/ended events.
pub struct AudioElement {
    id: ElementId,
    data: Arc<AudioData>,
    position: usize,
    paused: bool,
    ended: bool,
    events: VecDeque<MediaEvent>,
}

impl AudioElement {
    pub fn new(data: AudioData) -> Self {
        Self {
            id: ElementId(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed)),
            data: Arc::new(data),
            position: 0,
            paused: true,
            ended: false,
            events: VecDeque::new(),
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn ended(&self) -> bool {
        self.ended
    }

    pub fn sample_rate(&self) -> u32 {
        self.data.sample_rate
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.data.source.as_deref()
    }

    pub fn current_time(&self) -> f64 {
        if self.data.sample_rate == 0 {
            return 0.0;
        }
        self.position as f64 / self.data.sample_rate as f64
    }

    pub fn duration(&self) -> f64 {
        self.data.duration_secs()
    }

    /// Starts playback. Playing an ended element restarts it from the top.
    pub fn play(&mut self) -> Result<()> {
        if self.data.sample_rate == 0 || self.data.samples.is_empty() {
            return Err(VisualizerError::unsupported("the loaded audio has no playable samples"));
        }
        if self.ended {
            self.position = 0;
            self.ended = false;
        }
        if self.paused {
            self.paused = false;
            self.events.push_back(MediaEvent::Play);
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.events.push_back(MediaEvent::Pause);
        }
    }

    pub fn seek(&mut self, secs: f64) {
        let target = (secs.max(0.0) * self.data.sample_rate as f64) as usize;
        self.position = target.min(self.data.samples.len());
        self.ended = false;
    }

    /// Moves the playhead forward by `elapsed` while playing. Reaching the end
    /// pauses the element and queues `Pause` then `Ended`.
    pub fn advance(&mut self, elapsed: Duration) {
        if self.paused {
            return;
        }
        let step = (elapsed.as_secs_f64() * self.data.sample_rate as f64).round() as usize;
        self.position = (self.position + step).min(self.data.samples.len());
        if self.position >= self.data.samples.len() {
            self.paused = true;
            self.ended = true;
            self.events.push_back(MediaEvent::Pause);
            self.events.push_back(MediaEvent::Ended);
        }
    }

    pub fn drain_events(&mut self) -> Vec<MediaEvent> {
        self.events.drain(..).collect()
    }

    /// Up to `len` samples ending at the playhead.
    pub fn recent_samples(&self, len: usize) -> &[f32] {
        let end = self.position.min(self.data.samples.len());
        &self.data.samples[end.saturating_sub(len)..end]
    }
}
