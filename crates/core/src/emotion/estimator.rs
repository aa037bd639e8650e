use crate::decode::{decode_audio, FormatHint, Waveform};
use crate::emotion::{classify, AcousticFeatures, AnalysisFailure, Estimate, PitchTracker};
use bytes::Bytes;

const LOG_TARGET: &str = "emotion::estimator";

/// Maps signal energy and mean pitch to an [`EmotionLabel`](crate::emotion::EmotionLabel).
///
/// Stateless apart from its tracker parameters; share it freely across tasks.
#[derive(Clone, Debug, Default)]
pub struct EmotionEstimator {
    tracker: PitchTracker,
}

impl EmotionEstimator {
    pub fn new(tracker: PitchTracker) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &PitchTracker {
        &self.tracker
    }

    /// Never fails: analysis errors become [`Estimate::Fallback`].
    pub fn estimate(&self, waveform: &Waveform) -> Estimate {
        match self.analyze(waveform) {
            Ok(features) => {
                let label = classify(features.energy, features.mean_pitch_hz);
                tracing::debug!(
                    target: LOG_TARGET,
                    energy = features.energy,
                    mean_pitch_hz = features.mean_pitch_hz,
                    voiced_frames = features.voiced_frames,
                    total_frames = features.total_frames,
                    %label,
                    "emotion estimated"
                );
                Estimate::Analyzed { label, features }
            }
            Err(reason) => fallback(reason),
        }
    }

    /// Decodes an uploaded file before estimating; decode errors fall back too.
    pub fn estimate_encoded(&self, audio: Bytes, hint: &FormatHint) -> Estimate {
        match decode_audio(audio, hint) {
            Ok(waveform) => self.estimate(&waveform),
            Err(e) => fallback(AnalysisFailure::Decode(e.to_string())),
        }
    }

    pub fn analyze(&self, waveform: &Waveform) -> Result<AcousticFeatures, AnalysisFailure> {
        let samples = &waveform.samples;
        if samples.is_empty() {
            return Err(AnalysisFailure::EmptySignal);
        }
        if waveform.sample_rate == 0 {
            return Err(AnalysisFailure::InvalidSampleRate);
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(AnalysisFailure::NonFiniteSamples);
        }

        let energy = samples
            .iter()
            .map(|&s| f64::from(s) * f64::from(s))
            .sum::<f64>()
            / samples.len() as f64;
        if !energy.is_finite() {
            return Err(AnalysisFailure::Numerical(format!("energy = {energy}")));
        }

        let frames = self.tracker.track(samples, waveform.sample_rate)?;
        let voiced: Vec<f64> = frames
            .iter()
            .flatten()
            .copied()
            .filter(|f0| f0.is_finite())
            .collect();
        let mean_pitch = if voiced.is_empty() {
            0.0
        } else {
            voiced.iter().sum::<f64>() / voiced.len() as f64
        };

        Ok(AcousticFeatures {
            energy: energy as f32,
            mean_pitch_hz: mean_pitch as f32,
            voiced_frames: voiced.len(),
            total_frames: frames.len(),
        })
    }
}

fn fallback(reason: AnalysisFailure) -> Estimate {
    tracing::warn!(target: LOG_TARGET, error = %reason, "emotion analysis failed, using neutral");
    Estimate::Fallback { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::native::tests::wav_bytes;
    use crate::emotion::EmotionLabel;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f32::consts::PI;

    const SR: u32 = 16_000;

    fn sine(freq: f32, amplitude: f32) -> Waveform {
        let samples = (0..SR)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / SR as f32).sin())
            .collect();
        Waveform::new(samples, SR)
    }

    fn noise(amplitude: f32, seed: u64) -> Waveform {
        let mut rng = StdRng::seed_from_u64(seed);
        let samples = (0..SR)
            .map(|_| rng.random_range(-amplitude..amplitude))
            .collect();
        Waveform::new(samples, SR)
    }

    #[test]
    fn loud_high_tone_is_energetic() {
        let estimate = EmotionEstimator::default().estimate(&sine(200.0, 0.9));
        let features = estimate.features().copied().unwrap();
        assert!(features.energy > 0.1);
        assert!((features.mean_pitch_hz - 200.0).abs() < 2.0);
        assert_eq!(estimate.label(), EmotionLabel::Energetic);
    }

    #[test]
    fn loud_low_tone_is_tense() {
        let estimate = EmotionEstimator::default().estimate(&sine(100.0, 0.9));
        assert_eq!(estimate.label(), EmotionLabel::Tense);
    }

    #[test]
    fn quiet_low_tone_is_calm() {
        let estimate = EmotionEstimator::default().estimate(&sine(100.0, 0.2));
        let features = estimate.features().copied().unwrap();
        assert!(features.energy < 0.05);
        assert_eq!(estimate.label(), EmotionLabel::Calm);
    }

    #[test]
    fn quiet_unvoiced_signal_is_sad() {
        let estimator = EmotionEstimator::default();

        let estimate = estimator.estimate(&noise(0.05, 7));
        let features = estimate.features().copied().unwrap();
        assert_eq!(features.voiced_frames, 0);
        assert_eq!(features.mean_pitch_hz, 0.0);
        assert_eq!(estimate.label(), EmotionLabel::Sad);

        let silence = Waveform::new(vec![0.0; SR as usize], SR);
        assert_eq!(estimator.estimate(&silence).label(), EmotionLabel::Sad);
    }

    #[test]
    fn quiet_high_tone_is_sad() {
        let estimate = EmotionEstimator::default().estimate(&sine(300.0, 0.2));
        assert_eq!(estimate.label(), EmotionLabel::Sad);
    }

    #[test]
    fn mid_energy_is_neutral_at_any_pitch() {
        let estimator = EmotionEstimator::default();
        for freq in [90.0, 180.0, 600.0] {
            let estimate = estimator.estimate(&sine(freq, 0.4));
            assert!(!estimate.is_fallback());
            assert_eq!(estimate.label(), EmotionLabel::Neutral, "{freq} Hz");
        }
    }

    #[test]
    fn empty_waveform_falls_back_to_neutral() {
        let estimate = EmotionEstimator::default().estimate(&Waveform::new(Vec::new(), SR));
        assert_eq!(
            estimate,
            Estimate::Fallback {
                reason: AnalysisFailure::EmptySignal
            }
        );
        assert_eq!(estimate.label(), EmotionLabel::Neutral);
    }

    #[test]
    fn degenerate_inputs_fall_back_to_neutral() {
        let estimator = EmotionEstimator::default();

        let zero_rate = Waveform::new(vec![0.5; 4096], 0);
        assert!(estimator.estimate(&zero_rate).is_fallback());

        let mut samples = vec![0.1; 4096];
        samples[10] = f32::NAN;
        let estimate = estimator.estimate(&Waveform::new(samples, SR));
        assert_eq!(
            estimate,
            Estimate::Fallback {
                reason: AnalysisFailure::NonFiniteSamples
            }
        );
    }

    #[test]
    fn short_waveform_still_gets_a_label() {
        let estimate = EmotionEstimator::default().estimate(&Waveform::new(vec![0.5; 200], SR));
        let features = estimate.features().copied().unwrap();
        assert_eq!(features.total_frames, 0);
        assert_eq!(estimate.label(), EmotionLabel::Tense);
    }

    #[test]
    fn always_returns_a_known_label() {
        let estimator = EmotionEstimator::default();
        for seed in 0..4 {
            for amplitude in [0.01, 0.3, 0.45, 1.0] {
                let label = estimator.estimate(&noise(amplitude, seed)).label();
                assert!(EmotionLabel::ALL.contains(&label));
            }
        }
    }

    #[test]
    fn estimate_is_idempotent() {
        let estimator = EmotionEstimator::default();
        let waveform = sine(140.0, 0.6);
        assert_eq!(estimator.estimate(&waveform), estimator.estimate(&waveform));
    }

    #[test]
    fn encoded_wav_is_decoded_then_estimated() {
        let waveform = sine(100.0, 0.2);
        let wav = wav_bytes(&waveform.samples, SR, 1);
        let estimate = EmotionEstimator::default().estimate_encoded(wav, &FormatHint::wav());
        assert_eq!(estimate.label(), EmotionLabel::Calm);
    }

    #[test]
    fn undecodable_upload_falls_back_to_neutral() {
        let estimate = EmotionEstimator::default()
            .estimate_encoded(Bytes::from_static(b"\x00\x01garbage"), &FormatHint::default());
        assert!(matches!(
            estimate,
            Estimate::Fallback {
                reason: AnalysisFailure::Decode(_)
            }
        ));
        assert_eq!(estimate.label(), EmotionLabel::Neutral);
    }
}
