//! YIN fundamental-frequency tracking.
//!
//! De Cheveigné & Kawahara (2002), with the frame defaults librosa uses:
//! 2048-sample frames, 512-sample hop and a 0.1 trough threshold.

use crate::emotion::AnalysisFailure;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

pub const DEFAULT_FRAME_LENGTH: usize = 2048;
pub const DEFAULT_HOP_LENGTH: usize = 512;
pub const DEFAULT_TROUGH_THRESHOLD: f64 = 0.1;

/// MIDI note 36.
pub const NOTE_C2: u8 = 36;
/// MIDI note 96.
pub const NOTE_C7: u8 = 96;

/// Equal-tempered frequency of a MIDI note, A4 = 440 Hz.
pub fn midi_to_hz(note: u8) -> f64 {
    440.0 * 2f64.powf((f64::from(note) - 69.0) / 12.0)
}

#[derive(Clone, Debug, PartialEq)]
pub struct PitchTracker {
    pub fmin_hz: f64,
    pub fmax_hz: f64,
    pub frame_length: usize,
    pub hop_length: usize,
    pub trough_threshold: f64,
}

impl Default for PitchTracker {
    fn default() -> Self {
        Self {
            fmin_hz: midi_to_hz(NOTE_C2),
            fmax_hz: midi_to_hz(NOTE_C7),
            frame_length: DEFAULT_FRAME_LENGTH,
            hop_length: DEFAULT_HOP_LENGTH,
            trough_threshold: DEFAULT_TROUGH_THRESHOLD,
        }
    }
}

impl PitchTracker {
    /// Per-frame f0 estimates; `None` marks frames with no reliable period.
    ///
    /// A signal shorter than one frame yields no frames at all.
    pub fn track(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<Vec<Option<f64>>, AnalysisFailure> {
        if sample_rate == 0 {
            return Err(AnalysisFailure::InvalidSampleRate);
        }
        if self.hop_length == 0 || self.fmin_hz <= 0.0 || self.fmax_hz <= self.fmin_hz {
            return Err(AnalysisFailure::InvalidParameters);
        }

        let sr = f64::from(sample_rate);
        let min_period = ((sr / self.fmax_hz).floor() as usize).max(1);
        let max_period = (sr / self.fmin_hz).ceil() as usize;
        if max_period + 1 >= self.frame_length || min_period >= max_period {
            return Err(AnalysisFailure::FrameTooShort {
                frame_length: self.frame_length,
                max_period,
            });
        }

        if samples.len() < self.frame_length {
            return Ok(Vec::new());
        }

        let mut difference = DifferenceFn::new(self.frame_length, max_period);
        let mut diff = vec![0.0f64; max_period + 1];
        let mut cmndf = vec![1.0f64; max_period + 1];

        let frames = samples
            .windows(self.frame_length)
            .step_by(self.hop_length)
            .map(|frame| {
                difference.compute(frame, &mut diff);
                normalize(&diff, &mut cmndf);
                self.pick_period(&cmndf, min_period, max_period)
                    .map(|period| sr / period)
            })
            .collect();

        Ok(frames)
    }

    fn pick_period(&self, cmndf: &[f64], min_period: usize, max_period: usize) -> Option<f64> {
        let mut tau = (min_period..=max_period).find(|&t| cmndf[t] < self.trough_threshold)?;
        while tau < max_period && cmndf[tau + 1] < cmndf[tau] {
            tau += 1;
        }

        if tau <= 1 || tau >= max_period {
            return Some(tau as f64);
        }

        let (a, b, c) = (cmndf[tau - 1], cmndf[tau], cmndf[tau + 1]);
        let denom = a - 2.0 * b + c;
        let shift = if denom.abs() > f64::EPSILON {
            (0.5 * (a - c) / denom).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        Some(tau as f64 + shift)
    }
}

/// Squared-difference function d(tau) over a fixed integration window of
/// `frame_length - max_period` samples.
///
/// Computed as `e(0) + e(tau) - 2 r(tau)`, where `e` are windowed energies
/// from a running sum of squares and `r` is the cross-correlation of the
/// window with the frame, taken through one forward FFT per operand and one
/// inverse FFT. No circular wrap reaches lags `0..=max_period` because the
/// FFT length equals the frame length.
struct DifferenceFn {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    window: usize,
    max_period: usize,
    head: Vec<Complex<f64>>,
    full: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    energy: Vec<f64>,
}

impl DifferenceFn {
    fn new(frame_length: usize, max_period: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(frame_length);
        let inverse = planner.plan_fft_inverse(frame_length);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Self {
            forward,
            inverse,
            window: frame_length - max_period,
            max_period,
            head: vec![Complex::default(); frame_length],
            full: vec![Complex::default(); frame_length],
            scratch: vec![Complex::default(); scratch_len],
            energy: vec![0.0; frame_length + 1],
        }
    }

    fn compute(&mut self, frame: &[f32], diff: &mut [f64]) {
        let n = frame.len();

        for (i, (&sample, (head, full))) in frame
            .iter()
            .zip(self.head.iter_mut().zip(self.full.iter_mut()))
            .enumerate()
        {
            let x = f64::from(sample);
            *full = Complex::new(x, 0.0);
            *head = if i < self.window {
                Complex::new(x, 0.0)
            } else {
                Complex::default()
            };
            self.energy[i + 1] = self.energy[i] + x * x;
        }

        self.forward
            .process_with_scratch(&mut self.head, &mut self.scratch);
        self.forward
            .process_with_scratch(&mut self.full, &mut self.scratch);
        for (h, f) in self.head.iter_mut().zip(&self.full) {
            *h = h.conj() * f;
        }
        self.inverse
            .process_with_scratch(&mut self.head, &mut self.scratch);

        // rustfft leaves transforms unnormalized.
        let scale = 1.0 / n as f64;
        let e0 = self.energy[self.window];
        diff[0] = 0.0;
        for tau in 1..=self.max_period {
            let e_tau = self.energy[tau + self.window] - self.energy[tau];
            let r = self.head[tau].re * scale;
            // Rounding can push exact zeros slightly negative.
            diff[tau] = (e0 + e_tau - 2.0 * r).max(0.0);
        }
    }
}

/// Cumulative mean normalized difference. Silent frames normalize to 1.
fn normalize(diff: &[f64], cmndf: &mut [f64]) {
    cmndf[0] = 1.0;
    let mut running = 0.0f64;
    for tau in 1..diff.len() {
        running += diff[tau];
        cmndf[tau] = if running > 0.0 {
            diff[tau] * tau as f64 / running
        } else {
            1.0
        };
    }
}
