use super::analyser::{Analyser, AnalyserOptions};
use super::element::{AudioElement, ElementId};
use crate::error::{Result, VisualizerError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphState {
    /// Freshly built graphs start here until playback explicitly resumes them.
    Suspended,
    Running,
    Closed,
}

/// Processing graph bound to one element: source -> analyser -> output.
pub struct AudioGraph {
    element: ElementId,
    analyser: Analyser,
    state: GraphState,
    source_connected: bool,
    output_connected: bool,
}

impl AudioGraph {
    pub fn connect(element: &AudioElement, options: AnalyserOptions) -> Result<Self> {
        if element.sample_rate() == 0 {
            return Err(VisualizerError::unsupported(
                "cannot build an analysis graph for audio without a sample rate",
            ));
        }
        let analyser = Analyser::new(options)?;
        log::debug!(
            "Analysis graph connected: window={} bins={} rate={}Hz",
            analyser.fft_size(),
            analyser.frequency_bin_count(),
            element.sample_rate()
        );
        Ok(Self {
            element: element.id(),
            analyser,
            state: GraphState::Suspended,
            source_connected: true,
            output_connected: true,
        })
    }

    pub fn element_id(&self) -> ElementId {
        self.element
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.analyser.frequency_bin_count()
    }

    pub fn is_connected(&self) -> bool {
        self.source_connected && self.output_connected
    }

    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            GraphState::Closed => Err(VisualizerError::unsupported("audio graph is closed")),
            GraphState::Suspended => {
                log::debug!("Resuming suspended audio graph");
                self.state = GraphState::Running;
                Ok(())
            }
            GraphState::Running => Ok(()),
        }
    }

    /// Reads the current spectrum into `out`. Returns false and leaves `out`
    /// untouched when the graph is not running, is disconnected, or belongs
    /// to a different element.
    pub fn read_byte_frequency_data(&mut self, element: &AudioElement, out: &mut [u8]) -> bool {
        if self.state != GraphState::Running || !self.is_connected() || element.id() != self.element {
            return false;
        }
        let window = element.recent_samples(self.analyser.fft_size());
        self.analyser.byte_frequency_data(window, out);
        true
    }

    pub fn disconnect(&mut self) {
        self.source_connected = false;
        self.output_connected = false;
    }

    pub fn close(&mut self) {
        if self.state != GraphState::Closed {
            self.disconnect();
            self.analyser.reset();
            self.state = GraphState::Closed;
            log::debug!("Audio graph closed");
        }
    }
}
