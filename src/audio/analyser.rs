use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::error::{Result, VisualizerError};

/// Analysis window the spectrum source uses; yields 256 bins.
pub const FFT_SIZE: usize = 512;

#[derive(Clone, Copy, Debug)]
pub struct AnalyserOptions {
    pub fft_size: usize,
    /// Weight of the previous block in the temporal smoothing (0.0-1.0).
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserOptions {
    fn default() -> Self {
        Self {
            fft_size: FFT_SIZE,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

/// Frequency-analysis node producing byte magnitudes.
///
/// Blackman window, `|X[k]| / N`, exponential smoothing across calls, then a
/// linear map of `[min_decibels, max_decibels]` onto `0..=255`.
pub struct Analyser {
    options: AnalyserOptions,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl Analyser {
    pub fn new(options: AnalyserOptions) -> Result<Self> {
        let n = options.fft_size;
        if !n.is_power_of_two() || !(32..=32_768).contains(&n) {
            return Err(VisualizerError::unsupported(format!(
                "analysis window {} must be a power of two between 32 and 32768",
                n
            )));
        }
        if options.max_decibels <= options.min_decibels {
            return Err(VisualizerError::unsupported(
                "analyser max_decibels must exceed min_decibels",
            ));
        }

        let mut planner = FftPlanner::<f32>::new();
        Ok(Self {
            options,
            fft: planner.plan_fft_forward(n),
            window: blackman_window(n),
            buffer: vec![Complex::new(0.0, 0.0); n],
            smoothed: vec![0.0; n / 2],
        })
    }

    pub fn fft_size(&self) -> usize {
        self.options.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.options.fft_size / 2
    }

    /// Forgets the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Analyses `time_domain` (the most recent `fft_size` samples; shorter
    /// input is zero-padded at the front) and writes one byte per bin into
    /// `out`. Extra output slots are left untouched.
    pub fn byte_frequency_data(&mut self, time_domain: &[f32], out: &mut [u8]) {
        let n = self.options.fft_size;
        let take = time_domain.len().min(n);
        let lead = n - take;
        let recent = &time_domain[time_domain.len() - take..];

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < lead { 0.0 } else { recent[i - lead] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let tau = self.options.smoothing.clamp(0.0, 1.0);
        let range = self.options.max_decibels - self.options.min_decibels;
        let scale = 1.0 / n as f32;
        for (k, out_byte) in out.iter_mut().take(n / 2).enumerate() {
            let magnitude = self.buffer[k].norm() * scale;
            let s = tau * self.smoothed[k] + (1.0 - tau) * magnitude;
            self.smoothed[k] = s;
            *out_byte = if s > 0.0 {
                let db = 20.0 * s.log10();
                let level = 255.0 * (db - self.options.min_decibels) / range;
                level.floor().clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    let a0 = 0.42;
    let a1 = 0.5;
    let a2 = 0.08;
    (0..size)
        .map(|i| {
            let x = i as f32 / size as f32;
            a0 - a1 * (2.0 * std::f32::consts::PI * x).cos()
                + a2 * (4.0 * std::f32::consts::PI * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn rejects_non_power_of_two_windows() {
        let opts = AnalyserOptions { fft_size: 500, ..Default::default() };
        assert!(Analyser::new(opts).is_err());
    }

    #[test]
    fn default_window_yields_256_bins() {
        let analyser = Analyser::new(AnalyserOptions::default()).unwrap();
        assert_eq!(analyser.fft_size(), 512);
        assert_eq!(analyser.frequency_bin_count(), 256);
    }

    #[test]
    fn silence_maps_to_zero() {
        let mut analyser = Analyser::new(AnalyserOptions::default()).unwrap();
        let mut out = [7u8; 256];
        analyser.byte_frequency_data(&[0.0; 512], &mut out);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let opts = AnalyserOptions { smoothing: 0.0, ..Default::default() };
        let mut analyser = Analyser::new(opts).unwrap();
        // 48k / 512 = 93.75 Hz per bin; bin 32 = 3000 Hz
        let tone = sine(3000.0, 48_000.0, 512);
        let mut out = [0u8; 256];
        analyser.byte_frequency_data(&tone, &mut out);
        let peak = out.iter().enumerate().max_by_key(|(_, v)| **v).map(|(i, _)| i).unwrap();
        assert!((31..=33).contains(&peak), "peak at bin {}", peak);
        assert!(out[32] > 200);
        assert!(out[200] < out[32]);
    }

    #[test]
    fn smoothing_carries_energy_into_silence() {
        let mut analyser = Analyser::new(AnalyserOptions::default()).unwrap();
        let tone = sine(3000.0, 48_000.0, 512);
        let mut out = [0u8; 256];
        analyser.byte_frequency_data(&tone, &mut out);
        analyser.byte_frequency_data(&[0.0; 512], &mut out);
        assert!(out[32] > 0, "smoothed bin should decay, not vanish");
        analyser.reset();
        analyser.byte_frequency_data(&[0.0; 512], &mut out);
        assert_eq!(out[32], 0);
    }

    #[test]
    fn short_input_is_zero_padded() {
        let mut analyser = Analyser::new(AnalyserOptions::default()).unwrap();
        let mut out = [0u8; 256];
        analyser.byte_frequency_data(&[0.0; 10], &mut out);
        assert!(out.iter().all(|&b| b == 0));
    }
}
